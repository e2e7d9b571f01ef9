// Package model for resolution
//
// A Package is one concrete version of a named package together with its
// links. AliasPackage presents an existing package under another version.

mod alias;
mod convert;
mod package;

pub use alias::AliasPackage;
pub use package::Package;
