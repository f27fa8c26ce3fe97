//! Metadata key names a package declares to opt into spoofing.
//!
//! A package sets these in its own manifest `<meta-data>` entries, e.g.
//!
//! ```text
//! <meta-data android:name="org.microg.gms.SPOOFED_PACKAGE_NAME"
//!            android:value="com.google.android.gms" />
//! ```

use crate::error::SpoofError;

/// Namespace used when the embedding application does not supply one.
pub const DEFAULT_NAMESPACE: &str = "org.microg.gms";

const PACKAGE_NAME_SUFFIX: &str = "SPOOFED_PACKAGE_NAME";
const SIGNATURE_SUFFIX: &str = "SPOOFED_PACKAGE_SIGNATURE";

/// The pair of metadata keys the resolver reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoofKeys {
    /// Key holding the spoofed package name.
    pub package_name: String,
    /// Key holding the spoofed signature, hex-encoded.
    pub signature: String,
}

impl SpoofKeys {
    /// Build both keys under `namespace`.
    ///
    /// Surrounding whitespace and a trailing `.` are ignored, so
    /// `"org.example."` and `"org.example"` produce the same keys.
    pub fn for_namespace(namespace: &str) -> Result<Self, SpoofError> {
        let ns = namespace.trim().trim_end_matches('.');
        if ns.is_empty() {
            return Err(SpoofError::InvalidNamespace(namespace.to_string()));
        }
        Ok(SpoofKeys {
            package_name: format!("{}.{}", ns, PACKAGE_NAME_SUFFIX),
            signature: format!("{}.{}", ns, SIGNATURE_SUFFIX),
        })
    }
}

impl Default for SpoofKeys {
    fn default() -> Self {
        SpoofKeys {
            package_name: format!("{}.{}", DEFAULT_NAMESPACE, PACKAGE_NAME_SUFFIX),
            signature: format!("{}.{}", DEFAULT_NAMESPACE, SIGNATURE_SUFFIX),
        }
    }
}
