use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::try_join_all;

use super::Repository;
use crate::package::Package;
use crate::solver::{Pool, PoolBuilder, Request};
use crate::util::is_platform_package;
use crate::Result;

/// Ordered repositories. Earlier repositories take priority.
#[derive(Clone, Default)]
pub struct RepositorySet {
    repositories: Vec<Arc<dyn Repository>>,
}

impl RepositorySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, repository: Arc<dyn Repository>) {
        self.repositories.push(repository);
    }

    pub fn with(mut self, repository: impl Repository + 'static) -> Self {
        self.add(Arc::new(repository));
        self
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Load every package reachable from `request` and build a pool.
    ///
    /// Names are fetched in breadth-first waves; the names of one wave are
    /// fetched concurrently and merged back in wave order, then repository
    /// order, so the pool does not depend on completion order. A name is
    /// owned by the first repository that returns a package of that name;
    /// packages of that name from later repositories are ignored.
    ///
    /// Platform packages are never fetched, they come from the request's
    /// platform facts.
    pub async fn load_pool(&self, request: &Request) -> Result<Pool> {
        let mut builder = PoolBuilder::new().for_request(request);
        for (priority, repository) in self.repositories.iter().enumerate() {
            builder = builder.set_priority(repository.name(), priority as i32);
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut owner: HashMap<String, usize> = HashMap::new();
        let mut wave: Vec<String> = Vec::new();

        let roots = request
            .requires
            .keys()
            .cloned()
            .chain(request.fixed_packages.iter().map(|p| p.name.to_lowercase()))
            .chain(request.updatable_packages.iter().map(|p| p.name.to_lowercase()));
        for name in roots {
            if !is_platform_package(&name) && seen.insert(name.clone()) {
                wave.push(name);
            }
        }

        let mut depth = 0;
        let mut loaded = 0usize;
        while !wave.is_empty() {
            log::debug!("Fetching wave {} with {} names", depth, wave.len());

            let results = try_join_all(wave.iter().map(|name| self.fetch_from_all(name))).await?;

            let mut next = Vec::new();
            for per_repository in results {
                for (index, packages) in per_repository.into_iter().enumerate() {
                    for package in packages {
                        let key = package.name.to_lowercase();
                        if *owner.entry(key).or_insert(index) != index {
                            continue;
                        }

                        for dependency in package.require.keys() {
                            let dependency = dependency.to_lowercase();
                            if !is_platform_package(&dependency) && seen.insert(dependency.clone()) {
                                next.push(dependency);
                            }
                        }

                        loaded += 1;
                        builder = builder.add_package_from_repo(package, self.repositories[index].name());
                    }
                }
            }

            wave = next;
            depth += 1;
        }

        log::debug!("Loaded {} package versions for {} names in {} waves", loaded, seen.len(), depth);
        Ok(builder.build())
    }

    async fn fetch_from_all(&self, name: &str) -> Result<Vec<Vec<Package>>> {
        try_join_all(self.repositories.iter().map(|repository| repository.fetch_versions(name))).await
    }
}
