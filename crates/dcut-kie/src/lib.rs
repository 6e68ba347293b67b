//! Typed client for the KIE Veo video generation API.
//!
//! This crate provides:
//! - Job submission and extension (`POST /api/v1/veo/generate`, `/extend`)
//! - Task status queries (`GET /api/v1/veo/record-info`)
//! - Best-effort 1080p upgrade lookup (`GET /api/v1/veo/get-1080p-video`)
//! - The `VideoProvider` trait so reconciliation logic can substitute a
//!   fake provider in tests

pub mod client;
pub mod error;
pub mod provider;
pub mod types;

pub use client::{KieClient, KieConfig};
pub use error::{KieError, KieResult};
pub use provider::VideoProvider;
pub use types::{
    AspectRatio, ExtendVideoParams, GenerateResponse, GenerateVideoParams, GenerationType,
    KieModel, RecordInfo, RecordInfoResponse, RecordResult, TaskState,
};
