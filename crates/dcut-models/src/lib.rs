//! Shared data models for the DreamCut video generation backend.
//!
//! This crate provides Serde-serializable types for:
//! - Generation records and their status state machine
//! - Append-only metadata merging (jsonb semantics)
//! - Provider task id validation

pub mod generation;
pub mod metadata;

pub use generation::{GenerationRecord, GenerationStatus, is_valid_task_id};
pub use metadata::merge_metadata;
