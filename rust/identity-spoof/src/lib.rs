//! Package identity spoofing core for the Android compatibility layer.
//!
//! Some apps only talk to a backend after checking the caller's package name
//! or signing certificate against an allow-list. A package can opt into
//! presenting a different identity by declaring
//! `<namespace>.SPOOFED_PACKAGE_NAME` and `<namespace>.SPOOFED_PACKAGE_SIGNATURE`
//! in its manifest metadata; [`SpoofResolver`] substitutes those values
//! wherever the real identity would be reported.
//!
//! The native hook reaches the resolver through the C ABI in [`ffi`].

pub mod cache;
pub mod error;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod keys;
pub mod registry;
pub mod resolver;
pub mod signature;

pub use cache::SpoofCache;
pub use error::{RegistryError, SpoofError};
pub use keys::SpoofKeys;
pub use registry::{Metadata, PackageRegistry, StaticRegistry};
pub use resolver::SpoofResolver;
