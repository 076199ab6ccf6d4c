//! WordPress REST client: media upload, tag resolution, post composition
//! and creation, each network step behind the dual-transport retry policy.

mod client;
pub mod compose;
pub mod transport;

pub use client::{Category, Media, NewPost, Post, Rendered, TagTerm, User, WordPressClient};

use thiserror::Error;
use transport::TransportError;

/// Client-side cap on media uploads.
pub const MAX_UPLOAD_BYTES: usize = 50_000_000;

/// Failures from the publish orchestration.
///
/// Media-upload and post-creation failures are fatal to the attempt; tag
/// failures never surface here (they degrade to omitted tags inside
/// [`WordPressClient::resolve_tags`]).
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("connection is not configured")]
    NotConfigured,
    #[error("post title is empty")]
    EmptyTitle,
    #[error("connection test failed: {0}")]
    ConnectionTest(TransportError),
    #[error("tag resolution failed: {0}")]
    TagResolution(TransportError),
    #[error("media upload failed: {0}")]
    MediaUpload(TransportError),
    #[error("media file too large: {0} bytes (limit {MAX_UPLOAD_BYTES})")]
    MediaTooLarge(usize),
    #[error("post creation failed: {0}")]
    PostCreation(TransportError),
    #[error("post listing failed: {0}")]
    PostListing(TransportError),
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
}
