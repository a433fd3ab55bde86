//! # contract: the Substack gateway interface
//!
//! This module defines a single trait ([`SubstackGateway`]) through which every
//! resource operation reaches the platform. The core crate never talks to the
//! network itself; the HTTP implementation lives in the `substack-relay` crate
//! and tests use the generated [`MockSubstackGateway`].
//!
//! ## Interface & Extensibility
//! - All methods are async and return [`GatewayError`], a boxed error, so
//!   transport, decoding and API failures surface uniformly.
//! - Records are the plain data types from [`crate::model`].
//! - Publishing takes a finished [`NoteDocument`]; composing it is the caller's job
//!   (see [`crate::convert::compose_note`]).
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; the mock is exported under the
//!   `test-export-mocks` feature so downstream crates can use it in their tests.

use async_trait::async_trait;

#[allow(unused_imports)]
use mockall::{automock, predicate::*};

use crate::model::{Comment, Note, Post, Profile};
use crate::note::NoteDocument;

/// Error type for gateway calls (simple boxed error, as for every upstream client).
pub type GatewayError = Box<dyn std::error::Error + Send + Sync>;

/// Read and publish access to one authenticated Substack session.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SubstackGateway: Send + Sync {
    /// Profile of the authenticated user.
    async fn own_profile(&self) -> Result<Profile, GatewayError>;

    /// Public profile by handle (without the leading `@`).
    async fn profile_by_slug(&self, slug: &str) -> Result<Profile, GatewayError>;

    async fn profile_by_id(&self, user_id: u64) -> Result<Profile, GatewayError>;

    /// User ids the authenticated user follows, in platform order.
    async fn followee_ids(&self) -> Result<Vec<u64>, GatewayError>;

    /// Most recent posts by an author, newest first, at most `limit`.
    async fn posts_by_author(&self, user_id: u64, limit: usize)
        -> Result<Vec<Post>, GatewayError>;

    async fn post_by_id(&self, post_id: u64) -> Result<Post, GatewayError>;

    /// Most recent notes by an author, newest first, at most `limit`.
    async fn notes_by_author(&self, user_id: u64, limit: usize)
        -> Result<Vec<Note>, GatewayError>;

    async fn note_by_id(&self, note_id: u64) -> Result<Note, GatewayError>;

    /// Comments on a post, at most `limit`.
    async fn comments_for_post(
        &self,
        post_id: u64,
        limit: usize,
    ) -> Result<Vec<Comment>, GatewayError>;

    async fn comment_by_id(&self, comment_id: u64) -> Result<Comment, GatewayError>;

    /// Publish a note as the authenticated user.
    async fn publish_note(&self, note: &NoteDocument) -> Result<Note, GatewayError>;
}
