//! # Unit Composer Test Suite
//!
//! Cross-crate scenarios exercising the composer with its in-memory
//! adapters.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs           # Seeded ledgers, signers, services
//!     ├── composition_flows.rs  # Disclosure, hashing, kinds, save + broadcast
//!     ├── concurrency.rs        # Address group locking, pool usage, parallel signing
//!     ├── failure_injection.rs  # One release per failure, at every stage
//!     └── signers.rs            # Seed-phrase and raw-key signing end to end
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p composer-tests
//! cargo test -p composer-tests integration::concurrency::
//! ```

#![allow(dead_code)]

pub mod integration;
