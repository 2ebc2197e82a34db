//! Change detection for SECURE properties.
//!
//! The pipeline service never returns the plaintext of a `SECURE` property.
//! Instead it reports a digest record of the form
//! `hash:SHA3-512:<hex>`, where the hex part is an HMAC-SHA3-512 of the
//! plaintext keyed by the property's scope path (`pipeline.trigger.name`).
//!
//! During planning the configured plaintext is compared against that record by
//! recomputing the digest, so an unchanged secret does not show up as a diff
//! on every run. All other property types compare plaintext directly.
//!
//! # Example
//!
//! ```
//! use tekton_pipeline_provider::secret::{
//!     secure_digest, should_suppress_diff, PropertyType, SecretDescriptor,
//! };
//!
//! let descriptor = SecretDescriptor::new(PropertyType::Secure, ["p1", "t1", "name1"]);
//! let stored = secure_digest(&descriptor.scope_path, "secretValue").to_string();
//!
//! assert!(should_suppress_diff(&descriptor, "secretValue", &stored));
//! assert!(!should_suppress_diff(&descriptor, "differentValue", &stored));
//! ```

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha3::Sha3_512;

use crate::error::ProviderError;

type HmacSha3_512 = Hmac<Sha3_512>;

/// Algorithm name embedded in every digest record.
pub const DIGEST_ALGORITHM: &str = "SHA3-512";

const DIGEST_PREFIX: &str = "hash";

/// Hex length of a SHA3-512 output.
const DIGEST_HEX_LEN: usize = 128;

/// Separator used to derive the HMAC key from a scope path.
pub const SCOPE_SEPARATOR: char = '.';

/// The declared type of a pipeline or trigger property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    /// Plain text value.
    Text,
    /// Secret value, stored upstream and in state as a digest record.
    Secure,
    /// One of a fixed set of options.
    SingleSelect,
    /// Reference into a toolchain integration.
    Integration,
    /// Reference into an App Configuration instance.
    Appconfig,
}

impl PropertyType {
    /// Every property type, in wire order.
    pub const ALL: [PropertyType; 5] = [
        PropertyType::Integration,
        PropertyType::Secure,
        PropertyType::SingleSelect,
        PropertyType::Text,
        PropertyType::Appconfig,
    ];

    /// The wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Secure => "SECURE",
            Self::SingleSelect => "SINGLE_SELECT",
            Self::Integration => "INTEGRATION",
            Self::Appconfig => "APPCONFIG",
        }
    }

    /// Whether values of this type are kept as digest records.
    pub fn is_secure(&self) -> bool {
        matches!(self, Self::Secure)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ProviderError::Validation(format!("unknown property type '{}'", s)))
    }
}

/// Identifies a property value for change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretDescriptor {
    /// Ordered identifiers locating the property (pipeline, trigger, name).
    pub scope_path: Vec<String>,
    /// The declared type of the property.
    pub declared_type: PropertyType,
}

impl SecretDescriptor {
    /// Create a descriptor from a type and scope path.
    pub fn new<I, S>(declared_type: PropertyType, scope_path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scope_path: scope_path.into_iter().map(Into::into).collect(),
            declared_type,
        }
    }

    /// The HMAC key for this property.
    pub fn derive_key(&self) -> String {
        derive_key(&self.scope_path)
    }
}

/// A digest record as persisted for SECURE values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredDigest {
    hex: String,
}

impl StoredDigest {
    /// Parse a `hash:SHA3-512:<hex>` record.
    ///
    /// Returns `None` for anything that is not a well-formed record, including
    /// plaintext values.
    pub fn parse(record: &str) -> Option<Self> {
        let mut parts = record.splitn(3, ':');
        let prefix = parts.next()?;
        let algorithm = parts.next()?;
        let hex = parts.next()?;

        let well_formed = prefix == DIGEST_PREFIX
            && algorithm == DIGEST_ALGORITHM
            && hex.len() == DIGEST_HEX_LEN
            && hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));

        well_formed.then(|| Self {
            hex: hex.to_string(),
        })
    }

    /// The lowercase hex digest.
    pub fn as_hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for StoredDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", DIGEST_PREFIX, DIGEST_ALGORITHM, self.hex)
    }
}

/// Check whether a value is a digest record rather than plaintext.
pub fn is_digest_record(value: &str) -> bool {
    StoredDigest::parse(value).is_some()
}

/// Join scope components into the HMAC key.
///
/// Components are joined verbatim; embedded separators are not escaped, so
/// `["a.b", "c"]` and `["a", "b.c"]` derive the same key.
pub fn derive_key<S: AsRef<str>>(scope_path: &[S]) -> String {
    let mut key = String::new();
    for (i, part) in scope_path.iter().enumerate() {
        if i > 0 {
            key.push(SCOPE_SEPARATOR);
        }
        key.push_str(part.as_ref());
    }
    key
}

/// Compute the digest record the pipeline service keeps for a SECURE value.
pub fn secure_digest<S: AsRef<str>>(scope_path: &[S], plaintext: &str) -> StoredDigest {
    let key = derive_key(scope_path);
    let mut mac =
        HmacSha3_512::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(plaintext.as_bytes());

    StoredDigest {
        hex: hex::encode(mac.finalize().into_bytes()),
    }
}

/// Decide whether a candidate value is unchanged relative to the stored one.
///
/// Returns `true` when no update is needed. For SECURE properties the stored
/// value is a digest record and the candidate plaintext is hashed with the
/// descriptor's scope before comparing; other types compare exactly.
pub fn should_suppress_diff(descriptor: &SecretDescriptor, candidate: &str, stored: &str) -> bool {
    match descriptor.declared_type {
        PropertyType::Secure => {
            secure_digest(&descriptor.scope_path, candidate).to_string() == stored
        },
        PropertyType::Text
        | PropertyType::SingleSelect
        | PropertyType::Integration
        | PropertyType::Appconfig => candidate == stored,
    }
}
