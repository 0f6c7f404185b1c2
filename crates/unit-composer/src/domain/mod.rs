//! # Domain Module
//!
//! Core domain types for unit composition.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod state;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use state::*;
pub use value_objects::*;
