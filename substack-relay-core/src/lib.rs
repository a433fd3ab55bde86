#![doc = "substack-relay-core: note composition and resource routing for substack-relay."]

//! This crate holds everything that does not touch the network: the markdown
//! lexer and note converter, the immutable note builder, record types, the
//! [`contract::SubstackGateway`] trait, request routing and output shaping.
//! The HTTP client and CLI live in the `substack-relay` crate.
//!
//! # Usage
//! Compose a note with [`convert::compose_note`], or run a batch of
//! [`operation::RequestItem`]s against any gateway with [`operation::execute`].

pub mod cache;
pub mod contract;
pub mod convert;
pub mod credentials;
pub mod format;
pub mod markdown;
pub mod model;
pub mod note;
pub mod operation;

pub use contract::{GatewayError, SubstackGateway};
pub use convert::{compose_note, parse_markdown_to_note, NoteError, NoteFormat};
pub use credentials::{CredentialError, Credentials};
pub use note::{NoteBuilder, NoteCanvas, NoteDocument, ParagraphHandle};
pub use operation::{execute, ExecuteOptions, Request, RequestItem};
