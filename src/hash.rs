// src/hash.rs

//! Content fingerprints for change detection
//!
//! Transactions are fingerprinted with SHA-256 over a versioned canonical
//! form so the reconciler can tell "unchanged since last sync" without
//! comparing every column and posting. The version prefix lets the canonical
//! form evolve: a new prefix simply makes every stored hash mismatch once.

use sha2::{Digest, Sha256};

/// Field separator in canonical forms
const FIELD_SEPARATOR: u8 = 0;

/// Incremental SHA-256 over NUL-terminated text fields
pub struct ContentHasher {
    state: Sha256,
}

impl ContentHasher {
    /// Start a hash whose canonical form begins with the `version` field
    pub fn new(version: &str) -> Self {
        let mut hasher = Self {
            state: Sha256::new(),
        };
        hasher.field(version);
        hasher
    }

    /// Append text followed by the field separator
    pub fn field(&mut self, value: &str) -> &mut Self {
        self.state.update(value.as_bytes());
        self.state.update([FIELD_SEPARATOR]);
        self
    }

    /// Finish and return lowercase hex
    pub fn finalize(self) -> String {
        hex::encode(self.state.finalize())
    }
}
