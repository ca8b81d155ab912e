//! Resource-kind scoped cache keys.
//!
//! A key is a resource kind plus a discriminator (role name, query digest)
//! and renders as `<kind>_<discriminator>`, so every key of one kind
//! shares the `<kind>_` prefix and can be enumerated or bulk-cleared
//! without knowing the individual discriminators.
//!
//! Registered kinds must not be prefixes of one another; the facade's
//! kind catalogue upholds this.

use std::fmt;

use super::CacheError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: String,
    discriminator: String,
}

impl CacheKey {
    /// Build a key from a resource kind and a discriminator.
    ///
    /// Both components must be non-empty and storage-safe (ASCII
    /// alphanumerics, `_`, `-`); keys double as file names in the
    /// file-backed store.
    pub fn new(kind: &str, discriminator: &str) -> Result<Self, CacheError> {
        validate(kind, "kind")?;
        validate(discriminator, "discriminator")?;
        Ok(Self {
            kind: kind.to_string(),
            discriminator: discriminator.to_string(),
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    /// The string the snapshot store is keyed by.
    pub fn storage_key(&self) -> String {
        format!("{}_{}", self.kind, self.discriminator)
    }

    /// Prefix shared by every key of `kind`.
    pub fn prefix_for(kind: &str) -> String {
        format!("{}_", kind)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind, self.discriminator)
    }
}

fn validate(part: &str, what: &str) -> Result<(), CacheError> {
    if part.is_empty() {
        return Err(CacheError::InvalidKey(format!("{} must not be empty", what)));
    }
    if !part
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(CacheError::InvalidKey(format!(
            "{} contains characters unsafe for storage: {:?}",
            what, part
        )));
    }
    Ok(())
}
