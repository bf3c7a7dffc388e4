//! CAS token type
//!
//! Every read of a document returns the CAS value of the snapshot it saw, and
//! every conditional write carries the CAS it expects the document to still
//! have. The store issues a fresh token on each successful write.
//!
//! ## Comparison
//!
//! Tokens are opaque. Only equality against the document's *current* token is
//! meaningful, so `Cas` deliberately implements `Eq` but not `Ord`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque document version used for optimistic concurrency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cas(u64);

impl Cas {
    /// Wrap a raw token issued by a store
    pub const fn from_raw(raw: u64) -> Self {
        Cas(raw)
    }

    /// Raw token value, for store implementations
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cas:{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cas_round_trips_raw_value() {
        let cas = Cas::from_raw(42);
        assert_eq!(cas.as_raw(), 42);
    }

    #[test]
    fn test_cas_equality() {
        assert_eq!(Cas::from_raw(7), Cas::from_raw(7));
        assert_ne!(Cas::from_raw(7), Cas::from_raw(8));
    }

    #[test]
    fn test_cas_display() {
        assert_eq!(Cas::from_raw(255).to_string(), "cas:0xff");
    }
}
