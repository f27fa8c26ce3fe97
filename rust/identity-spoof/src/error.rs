//! Error types shared by the registry seam and the resolver.

use std::fmt;

/// Failures reported by a [`PackageRegistry`](crate::registry::PackageRegistry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The named package is not installed.
    NotFound(String),
    /// The registry could not answer (binder died, permission denied, ...).
    Unavailable(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NotFound(pkg) => write!(f, "package not found: {}", pkg),
            RegistryError::Unavailable(reason) => {
                write!(f, "package registry unavailable: {}", reason)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Errors surfaced by the spoof resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpoofError {
    /// A registry failure other than "not found", which is absorbed.
    Registry(RegistryError),
    /// The spoofed signature declared by `package` is not valid hex.
    MalformedSignature { package: String, reason: String },
    /// The metadata key namespace is blank.
    InvalidNamespace(String),
}

impl fmt::Display for SpoofError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpoofError::Registry(e) => write!(f, "registry error: {}", e),
            SpoofError::MalformedSignature { package, reason } => {
                write!(f, "malformed spoofed signature for {}: {}", package, reason)
            }
            SpoofError::InvalidNamespace(ns) => write!(f, "invalid metadata namespace {:?}", ns),
        }
    }
}

impl std::error::Error for SpoofError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpoofError::Registry(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RegistryError> for SpoofError {
    fn from(e: RegistryError) -> Self {
        SpoofError::Registry(e)
    }
}
