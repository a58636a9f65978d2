//! Instance identity: canonical UUIDs and metadata uri helpers.
//!
//! Every instance is identified by a canonical UUID string (36 lowercase
//! characters in `8-4-4-4-12` form). [`get_uuid`] derives one from a
//! caller-supplied id:
//! * an empty id yields a fresh random version 4 UUID,
//! * an id that already is a canonical UUID is copied verbatim,
//! * any other id deterministically yields a version 5 SHA-1 UUID under
//!   the DNS namespace, so the same name maps to the same UUID on every
//!   machine.
//!
//! Results are always lowercased for reproducibility.
//!
//! Metadata uris have the canonical form `namespace/version/name`;
//! [`join_meta_uri`] and [`split_meta_uri`] convert between the joined
//! form and its components, splitting on the last two `/` separators.

// used to generate and hash UUIDs
use uuid::Uuid;

use crate::error::{DLiteError, Result};

/// Length of a canonical UUID string, excluding any terminator.
pub const UUID_LENGTH: usize = 36;

/// How the UUID returned by [`get_uuid`] was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UuidVersion {
    /// The id already was a canonical UUID and was copied verbatim.
    Copy,
    /// A random version 4 UUID was generated from an empty id.
    Random,
    /// A version 5 SHA-1 UUID was derived from the id under the DNS
    /// namespace.
    Hashed,
}

impl UuidVersion {
    /// The UUID version number: 0 for a verbatim copy, 4 for random,
    /// 5 for SHA-1 derived.
    pub fn number(self) -> u8 {
        match self {
            UuidVersion::Copy => 0,
            UuidVersion::Random => 4,
            UuidVersion::Hashed => 5,
        }
    }
}

/// Returns a canonical UUID derived from `id` together with the way it
/// was obtained.
pub fn get_uuid(id: &str) -> (String, UuidVersion) {
    get_uuid_n(id, id.len())
}

/// Like [`get_uuid`], but considers at most the first `len` bytes of `id`.
pub fn get_uuid_n(id: &str, len: usize) -> (String, UuidVersion) {
    let id = &id[..len.min(id.len())];
    if id.is_empty() {
        (Uuid::new_v4().to_string(), UuidVersion::Random)
    } else if is_canonical_uuid(id) {
        (id.to_ascii_lowercase(), UuidVersion::Copy)
    } else {
        let uuid = Uuid::new_v5(&Uuid::NAMESPACE_DNS, id.as_bytes());
        (uuid.to_string(), UuidVersion::Hashed)
    }
}

/// Checks the strict canonical form: 36 characters, hyphens at positions
/// 8, 13, 18 and 23, hex digits everywhere else.
fn is_canonical_uuid(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != UUID_LENGTH {
        return false;
    }
    bytes.iter().enumerate().all(|(i, &c)| match i {
        8 | 13 | 18 | 23 => c == b'-',
        _ => c.is_ascii_hexdigit(),
    })
}

/// Returns the uri for metadata defined by `name`, `version` and
/// `namespace`, constructed as `namespace/version/name`.
pub fn join_meta_uri(name: &str, version: &str, namespace: &str) -> String {
    format!("{namespace}/{version}/{name}")
}

/// Splits a metadata uri into its `(name, version, namespace)` components
/// using the last and second-to-last `/` as separators.
pub fn split_meta_uri(uri: &str) -> Result<(String, String, String)> {
    let invalid = || DLiteError::Identity(format!("invalid metadata uri: '{uri}'"));
    let p = uri.rfind('/').ok_or_else(invalid)?;
    let q = uri[..p].rfind('/').filter(|&q| q > 0).ok_or_else(invalid)?;
    Ok((
        uri[p + 1..].to_owned(),
        uri[q + 1..p].to_owned(),
        uri[..q].to_owned(),
    ))
}
