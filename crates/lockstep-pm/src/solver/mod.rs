//! Resolution pipeline: candidates in, ordered operations out.
//!
//! A run goes through five stages:
//!
//! 1. [`PoolBuilder`] filters repository packages by stability floor and
//!    platform availability into a [`Pool`] with dense ids. Dropped
//!    packages are remembered so problems can say why they were dropped.
//! 2. [`RuleGenerator`] turns the [`Request`] and the pool into clauses:
//!    root requirements, fixed packages, requires, conflicts, one version
//!    per name and alias links.
//! 3. [`Solver`] runs CDCL over those clauses. It propagates through the
//!    [`WatchGraph`], branches in [`Policy`] order, learns a clause per
//!    conflict and restarts after each level-0 conflict until every
//!    independent [`Problem`] is collected. It gives up once its
//!    [`SolverBudget`] is spent or its cancel flag is set.
//! 4. [`Transaction`] diffs the [`Solution`] against the prior packages and
//!    orders the operations by their requires.
//! 5. The caller records the solution in the lock through
//!    `crate::lock::Locker`.
//!
//! # Example
//!
//! ```ignore
//! use lockstep_pm::solver::{Policy, Pool, Request, Solver};
//!
//! let pool = Pool::builder().add_packages(packages).build();
//!
//! let mut request = Request::new();
//! request.require("vendor/package", "^1.0");
//!
//! let policy = Policy::from_request(&request);
//! match Solver::new(&pool, &policy).solve(&request) {
//!     Ok(transaction) => println!("{} operations", transaction.len()),
//!     Err(err) => println!("No solution: {err}"),
//! }
//! ```

mod decisions;
mod policy;
mod pool;
mod problem;
mod request;
mod rule;
mod rule_generator;
mod rule_set;
mod solver;
mod transaction;
mod watch_graph;


pub use decisions::Decisions;
pub use policy::Policy;
pub use pool::{FilterReason, FilteredPackage, PackageId, Pool, PoolBuilder, PoolEntry, PLATFORM_REPO};
pub use problem::{Problem, ProblemRule, ProblemSet};
pub use request::{RootAlias, RootRequire, Request};
pub use rule::{Literal, Rule, RuleId, RuleType};
pub use rule_generator::RuleGenerator;
pub use rule_set::{RuleSet, RuleSetStats};
pub use solver::{Solution, Solver, SolverBudget, SolverStats};
pub use transaction::{Operation, Transaction};
pub use watch_graph::WatchGraph;
