//! The platform package registry, as seen from the resolver.
//!
//! On device this is backed by `PackageManager.getApplicationInfo(pkg,
//! GET_META_DATA)` on the Java side (see `ffi`). Tests and host tooling use
//! [`StaticRegistry`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::RegistryError;

/// Manifest `<meta-data>` bundle of an installed package.
pub type Metadata = HashMap<String, String>;

/// Query capability bound to the platform's package registry.
pub trait PackageRegistry {
    /// Fetch the metadata bundle of `package`.
    ///
    /// `Ok(None)` means the package exists but declares no metadata.
    /// Unknown packages must fail with [`RegistryError::NotFound`].
    fn metadata(&self, package: &str) -> Result<Option<Metadata>, RegistryError>;
}

impl<T: PackageRegistry + ?Sized> PackageRegistry for &T {
    fn metadata(&self, package: &str) -> Result<Option<Metadata>, RegistryError> {
        (**self).metadata(package)
    }
}

impl<T: PackageRegistry + ?Sized> PackageRegistry for Arc<T> {
    fn metadata(&self, package: &str) -> Result<Option<Metadata>, RegistryError> {
        (**self).metadata(package)
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Installed(Option<Metadata>),
    Broken(String),
}

/// Fixed in-memory registry.
///
/// Every call to [`PackageRegistry::metadata`] is counted, which lets callers
/// observe whether the resolver hit its cache.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    packages: HashMap<String, Entry>,
    lookups: AtomicUsize,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an installed package with the given metadata.
    pub fn with_package<I, K, V>(mut self, package: &str, metadata: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let bundle = metadata
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.packages
            .insert(package.to_string(), Entry::Installed(Some(bundle)));
        self
    }

    /// Register an installed package whose application info carries no bundle.
    pub fn with_bare_package(mut self, package: &str) -> Self {
        self.packages
            .insert(package.to_string(), Entry::Installed(None));
        self
    }

    /// Register a package whose lookup fails with [`RegistryError::Unavailable`].
    pub fn with_unavailable(mut self, package: &str, reason: &str) -> Self {
        self.packages
            .insert(package.to_string(), Entry::Broken(reason.to_string()));
        self
    }

    /// Number of metadata queries served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl PackageRegistry for StaticRegistry {
    fn metadata(&self, package: &str) -> Result<Option<Metadata>, RegistryError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        match self.packages.get(package) {
            Some(Entry::Installed(bundle)) => Ok(bundle.clone()),
            Some(Entry::Broken(reason)) => Err(RegistryError::Unavailable(reason.clone())),
            None => Err(RegistryError::NotFound(package.to_string())),
        }
    }
}
