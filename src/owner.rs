//! Identity of whoever owns an execution context.

use std::fmt;
use std::sync::Arc;

/// Opaque key naming the owner of one execution context.
///
/// Cloning is cheap; the name is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerKey(Arc<str>);

impl OwnerKey {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for OwnerKey {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<u64> for OwnerKey {
    fn from(id: u64) -> Self {
        Self::new(id.to_string())
    }
}

impl From<&OwnerKey> for OwnerKey {
    fn from(key: &OwnerKey) -> Self {
        key.clone()
    }
}

impl AsRef<str> for OwnerKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
