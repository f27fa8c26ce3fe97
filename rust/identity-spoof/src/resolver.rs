//! Identity spoof resolver.
//!
//! Replaces the package name or signature that an identity check would see
//! with the values a package declares about itself in its manifest metadata.
//! Lookups go through a [`SpoofCache`]; only values that are actually present
//! are cached, so packages without a spoof are re-queried every time.

use log::{error, info};

use crate::cache::{Slot, SpoofCache};
use crate::error::{RegistryError, SpoofError};
use crate::keys::SpoofKeys;
use crate::registry::{Metadata, PackageRegistry};
use crate::signature::{decode_signature, signature_digest};

/// Resolves spoofed identities for installed packages.
#[derive(Debug)]
pub struct SpoofResolver<R> {
    registry: R,
    keys: SpoofKeys,
    cache: SpoofCache,
}

impl<R: PackageRegistry> SpoofResolver<R> {
    /// Create a resolver reading the default `org.microg.gms.*` keys.
    pub fn new(registry: R) -> Self {
        Self::with_keys(registry, SpoofKeys::default())
    }

    pub fn with_keys(registry: R, keys: SpoofKeys) -> Self {
        SpoofResolver {
            registry,
            keys,
            cache: SpoofCache::new(),
        }
    }

    pub fn keys(&self) -> &SpoofKeys {
        &self.keys
    }

    pub fn cache(&self) -> &SpoofCache {
        &self.cache
    }

    /// Fetch the metadata bundle of `package`.
    ///
    /// An unknown package is logged and reported as "no metadata". Other
    /// registry failures are returned to the caller.
    pub fn fetch_metadata(&self, package: &str) -> Result<Option<Metadata>, SpoofError> {
        match self.registry.metadata(package) {
            Ok(bundle) => Ok(bundle),
            Err(RegistryError::NotFound(_)) => {
                error!("Failed to fetch metadata: package {} not found", package);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn lookup(&self, slot: Slot, package: &str) -> Result<Option<String>, SpoofError> {
        if let Some(cached) = self.cache.get(slot, package) {
            return Ok(Some(cached));
        }
        let key = match slot {
            Slot::Name => &self.keys.package_name,
            Slot::Signature => &self.keys.signature,
        };
        let value = self
            .fetch_metadata(package)?
            .and_then(|mut bundle| bundle.remove(key.as_str()));
        Ok(value.map(|v| self.cache.insert(slot, package, v)))
    }

    /// Spoofed signature hex declared by `package`, ignoring empty declarations.
    fn spoofed_signature(&self, package: &str) -> Result<Option<String>, SpoofError> {
        if package.is_empty() {
            return Ok(None);
        }
        Ok(self
            .lookup(Slot::Signature, package)?
            .filter(|sig| !sig.is_empty()))
    }

    /// Substitute `name` with the package name it declares for itself.
    ///
    /// `None` and `""` pass through without touching the registry.
    pub fn spoof_package_name(&self, name: Option<&str>) -> Result<Option<String>, SpoofError> {
        let name = match name {
            Some(n) if !n.is_empty() => n,
            other => return Ok(other.map(str::to_owned)),
        };
        match self.lookup(Slot::Name, name)? {
            Some(spoofed) if !spoofed.is_empty() => {
                info!("Spoofing package name {} -> {}", name, spoofed);
                Ok(Some(spoofed))
            }
            _ => Ok(Some(name.to_owned())),
        }
    }

    /// Substitute the hex-encoded signature of `package`.
    pub fn spoof_signature_hex(
        &self,
        package: &str,
        real: Option<&str>,
    ) -> Result<Option<String>, SpoofError> {
        match self.spoofed_signature(package)? {
            Some(spoofed) => {
                info!("Spoofing signature of {}", package);
                Ok(Some(spoofed))
            }
            None => Ok(real.map(str::to_owned)),
        }
    }

    /// Substitute the raw signature bytes of `package`.
    ///
    /// The declared hex is decoded only when a spoof is configured; a
    /// malformed declaration yields [`SpoofError::MalformedSignature`].
    pub fn spoof_signature_bytes(
        &self,
        package: &str,
        real: Option<&[u8]>,
    ) -> Result<Option<Vec<u8>>, SpoofError> {
        match self.spoofed_signature(package)? {
            Some(spoofed) => {
                let bytes = decode_signature(package, &spoofed)?;
                info!("Spoofing signature of {} ({} bytes)", package, bytes.len());
                Ok(Some(bytes))
            }
            None => Ok(real.map(<[u8]>::to_vec)),
        }
    }

    /// Substitute the SHA-256 certificate digest of `package`.
    pub fn spoof_signature_digest(
        &self,
        package: &str,
        real_digest: Option<&[u8]>,
    ) -> Result<Option<Vec<u8>>, SpoofError> {
        match self.spoofed_signature(package)? {
            Some(spoofed) => {
                let digest = signature_digest(&decode_signature(package, &spoofed)?);
                info!("Spoofing signature digest of {}", package);
                Ok(Some(digest))
            }
            None => Ok(real_digest.map(<[u8]>::to_vec)),
        }
    }

    /// Whether `package` declares a spoofed name or signature.
    pub fn is_spoofed(&self, package: &str) -> Result<bool, SpoofError> {
        if package.is_empty() {
            return Ok(false);
        }
        let name = self.lookup(Slot::Name, package)?;
        if name.is_some_and(|n| !n.is_empty()) {
            return Ok(true);
        }
        Ok(self.spoofed_signature(package)?.is_some())
    }
}
