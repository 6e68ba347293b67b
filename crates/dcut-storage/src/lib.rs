//! S3-compatible blob storage client for archived renders.
//!
//! This crate provides:
//! - Byte upload with explicit content type
//! - Time-limited presigned GET URLs
//! - Deterministic render-key construction for archived generations
//! - The `BlobStore` trait so reconciliation logic can run against an
//!   in-memory store in tests

pub mod client;
pub mod error;
pub mod keys;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use keys::generated_video_key;
pub use store::BlobStore;
