//! Small helpers shared across modules.

/// Check if a package name refers to a platform package (runtime, extension,
/// system library or the package manager itself).
pub fn is_platform_package(name: &str) -> bool {
    let name = name.to_lowercase();
    name == "php"
        || name.starts_with("php-")
        || name.starts_with("ext-")
        || name.starts_with("lib-")
        || name == "hhvm"
        || name == "composer"
        || name == "composer-plugin-api"
        || name == "composer-runtime-api"
}
