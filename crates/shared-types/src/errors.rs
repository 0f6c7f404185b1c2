//! # Error Types
//!
//! Errors raised while constructing shared ledger entities.

use thiserror::Error;

/// Errors produced when parsing an [`Address`](crate::Address).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Address has the wrong number of characters.
    #[error("Invalid address length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Address contains a character outside the base32 alphabet.
    #[error("Invalid address character {character:?} at position {position}")]
    InvalidCharacter {
        /// Offending character
        character: char,
        /// Zero-based position in the address
        position: usize,
    },
}
