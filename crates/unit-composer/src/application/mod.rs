//! # Application Module
//!
//! The composer service driving the pipeline stages through the ports.

pub mod service;

pub use service::UnitComposerService;
