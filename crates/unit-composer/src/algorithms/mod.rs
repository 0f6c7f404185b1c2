//! # Algorithms Module
//!
//! The composition pipeline stages.

pub mod address_lock;
pub mod author_assembler;
pub mod input_selector;
pub mod messages;
pub mod parent_selector;
pub mod signature_collector;
pub mod unit_finalizer;
pub mod unit_hash;

pub use address_lock::{lock_key, AddressLock, AddressLockManager, LOCK_KEY_PREFIX};
pub use author_assembler::{assemble_author, assemble_authors, decide_disclosure};
pub use input_selector::{compose_payment, select_inputs, InputSelection};
pub use parent_selector::{
    check_unstable_predecessors, fetch_light_props, select_parents, validate_vendor_response,
};
pub use signature_collector::collect_signatures;
pub use unit_finalizer::{finalize_unit, stamp_round_fields};
pub use unit_hash::{ball_hash, hash_to_sign, unit_hash};
