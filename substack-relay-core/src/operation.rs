//! # operation: resource/operation routing and execution
//!
//! Input arrives as [`RequestItem`]s: a resource name, an operation name and a
//! loose parameter map, exactly the shape a workflow host hands over. Each item
//! is validated into a typed [`Request`], run against a [`SubstackGateway`] by
//! [`dispatch`], and shaped into JSON output items by [`crate::format`].
//!
//! # Responsibilities
//! - Validate names and parameters up front ([`RouteError`])
//! - Resolve "own" and slug-addressed requests to user ids before fetching
//! - Compose notes from markdown or plain bodies before publishing
//! - Run batches in order, either failing fast or emitting error items ([`execute`])
//!
//! # Navigation
//! - Entrypoints: [`execute`], [`dispatch`], [`Request::from_item`]

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::contract::{GatewayError, SubstackGateway};
use crate::convert::{compose_note, NoteError, NoteFormat};
use crate::format;

/// Result count used when a request does not carry a `limit`.
pub const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Profile,
    Post,
    Note,
    Comment,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Profile => "profile",
            Resource::Post => "post",
            Resource::Note => "note",
            Resource::Comment => "comment",
        }
    }

    /// Wire names of the operations this resource accepts.
    pub fn operations(&self) -> &'static [&'static str] {
        match self {
            Resource::Profile => &[
                "getOwnProfile",
                "getProfileBySlug",
                "getProfileById",
                "getFollowees",
            ],
            Resource::Post => &["getAll", "getPostsBySlug", "getPostsById", "getPostById"],
            Resource::Note => &[
                "create",
                "get",
                "getNotesBySlug",
                "getNotesById",
                "getNoteById",
            ],
            Resource::Comment => &["getAll", "getCommentById"],
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "profile" => Ok(Resource::Profile),
            "post" => Ok(Resource::Post),
            "note" => Ok(Resource::Note),
            "comment" => Ok(Resource::Comment),
            _ => Err(RouteError::UnknownResource(s.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("unknown resource `{0}`")]
    UnknownResource(String),
    #[error("unknown operation `{operation}` for resource `{resource}`")]
    UnknownOperation { resource: Resource, operation: String },
    #[error("missing required parameter `{0}`")]
    MissingParameter(String),
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },
}

/// One unit of work as handed over by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestItem {
    pub resource: String,
    pub operation: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl RequestItem {
    pub fn new(resource: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            operation: operation.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }
}

/// Whose content a listing request is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Author {
    Own,
    Slug(String),
    Id(u64),
}

/// A validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    OwnProfile,
    ProfileBySlug { slug: String },
    ProfileById { user_id: u64 },
    Followees { limit: usize },
    Posts { author: Author, limit: usize },
    PostById { post_id: u64 },
    CreateNote { body: String, format: NoteFormat },
    Notes { author: Author, limit: usize },
    NoteById { note_id: u64 },
    Comments { post_id: u64, limit: usize },
    CommentById { comment_id: u64 },
}

impl Request {
    pub fn from_item(item: &RequestItem, default_limit: usize) -> Result<Self, RouteError> {
        let resource: Resource = item.resource.parse()?;
        let params = Params {
            map: &item.params,
            default_limit,
        };
        let request = match (resource, item.operation.as_str()) {
            (Resource::Profile, "getOwnProfile") => Request::OwnProfile,
            (Resource::Profile, "getProfileBySlug") => Request::ProfileBySlug {
                slug: params.slug()?,
            },
            (Resource::Profile, "getProfileById") => Request::ProfileById {
                user_id: params.id("userId")?,
            },
            (Resource::Profile, "getFollowees") => Request::Followees {
                limit: params.limit()?,
            },
            (Resource::Post, "getAll") => Request::Posts {
                author: Author::Own,
                limit: params.limit()?,
            },
            (Resource::Post, "getPostsBySlug") => Request::Posts {
                author: Author::Slug(params.slug()?),
                limit: params.limit()?,
            },
            (Resource::Post, "getPostsById") => Request::Posts {
                author: Author::Id(params.id("userId")?),
                limit: params.limit()?,
            },
            (Resource::Post, "getPostById") => Request::PostById {
                post_id: params.id("postId")?,
            },
            (Resource::Note, "create") => Request::CreateNote {
                body: params.string("body")?.to_string(),
                format: params.note_format()?,
            },
            (Resource::Note, "get") => Request::Notes {
                author: Author::Own,
                limit: params.limit()?,
            },
            (Resource::Note, "getNotesBySlug") => Request::Notes {
                author: Author::Slug(params.slug()?),
                limit: params.limit()?,
            },
            (Resource::Note, "getNotesById") => Request::Notes {
                author: Author::Id(params.id("userId")?),
                limit: params.limit()?,
            },
            (Resource::Note, "getNoteById") => Request::NoteById {
                note_id: params.id("noteId")?,
            },
            (Resource::Comment, "getAll") => Request::Comments {
                post_id: params.id("postId")?,
                limit: params.limit()?,
            },
            (Resource::Comment, "getCommentById") => Request::CommentById {
                comment_id: params.id("commentId")?,
            },
            (resource, operation) => {
                return Err(RouteError::UnknownOperation {
                    resource,
                    operation: operation.to_string(),
                })
            }
        };
        Ok(request)
    }

    pub fn resource(&self) -> Resource {
        match self {
            Request::OwnProfile
            | Request::ProfileBySlug { .. }
            | Request::ProfileById { .. }
            | Request::Followees { .. } => Resource::Profile,
            Request::Posts { .. } | Request::PostById { .. } => Resource::Post,
            Request::CreateNote { .. } | Request::Notes { .. } | Request::NoteById { .. } => {
                Resource::Note
            }
            Request::Comments { .. } | Request::CommentById { .. } => Resource::Comment,
        }
    }
}

struct Params<'a> {
    map: &'a Map<String, Value>,
    default_limit: usize,
}

impl<'a> Params<'a> {
    fn present(&self, name: &str) -> Option<&'a Value> {
        self.map.get(name).filter(|value| !value.is_null())
    }

    fn string(&self, name: &str) -> Result<&'a str, RouteError> {
        match self.present(name) {
            None => Err(RouteError::MissingParameter(name.to_string())),
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(invalid(name, "expected a string")),
        }
    }

    fn slug(&self) -> Result<String, RouteError> {
        let slug = self.string("slug")?.trim().trim_start_matches('@');
        if slug.is_empty() {
            return Err(RouteError::MissingParameter("slug".to_string()));
        }
        Ok(slug.to_string())
    }

    fn id(&self, name: &str) -> Result<u64, RouteError> {
        match self.present(name) {
            None => Err(RouteError::MissingParameter(name.to_string())),
            Some(value) => as_u64(value).ok_or_else(|| invalid(name, "expected a positive integer id")),
        }
    }

    fn limit(&self) -> Result<usize, RouteError> {
        let Some(value) = self.present("limit") else {
            return Ok(self.default_limit);
        };
        match as_u64(value) {
            Some(0) => Err(invalid("limit", "must be at least 1")),
            Some(limit) => Ok(usize::try_from(limit).unwrap_or(usize::MAX)),
            None => Err(invalid("limit", "expected a positive integer")),
        }
    }

    fn note_format(&self) -> Result<NoteFormat, RouteError> {
        match self.present("contentType") {
            None => Ok(NoteFormat::default()),
            Some(Value::String(value)) => value
                .parse()
                .map_err(|e: crate::convert::UnknownNoteFormat| invalid("contentType", &e.to_string())),
            Some(_) => Err(invalid("contentType", "expected a string")),
        }
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn invalid(name: &str, reason: &str) -> RouteError {
    RouteError::InvalidParameter {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Note(#[from] NoteError),
    #[error("substack request failed: {0}")]
    Gateway(GatewayError),
}

impl From<GatewayError> for OperationError {
    fn from(error: GatewayError) -> Self {
        OperationError::Gateway(error)
    }
}

/// Run one validated request and shape its records into output items.
pub async fn dispatch<G>(gateway: &G, request: &Request) -> Result<Vec<Value>, OperationError>
where
    G: SubstackGateway + ?Sized,
{
    debug!(?request, "[DISPATCH] Running request");
    let items = match request {
        Request::OwnProfile => vec![format::profile(&gateway.own_profile().await?)],
        Request::ProfileBySlug { slug } => {
            vec![format::profile(&gateway.profile_by_slug(slug).await?)]
        }
        Request::ProfileById { user_id } => {
            vec![format::profile(&gateway.profile_by_id(*user_id).await?)]
        }
        Request::Followees { limit } => {
            let ids = gateway.followee_ids().await?;
            info!(followees = ids.len(), limit, "[DISPATCH] Resolving followee profiles");
            let lookups = ids
                .into_iter()
                .take(*limit)
                .map(|id| gateway.profile_by_id(id));
            let profiles = try_join_all(lookups).await?;
            profiles.iter().map(format::profile).collect()
        }
        Request::Posts { author, limit } => {
            let user_id = resolve_author(gateway, author).await?;
            let posts = gateway.posts_by_author(user_id, *limit).await?;
            posts.iter().take(*limit).map(format::post).collect()
        }
        Request::PostById { post_id } => vec![format::post(&gateway.post_by_id(*post_id).await?)],
        Request::CreateNote { body, format: note_format } => {
            let document = compose_note(body, *note_format)?;
            info!(
                format = %note_format,
                paragraphs = document.paragraphs.len(),
                "[NOTE] Publishing note"
            );
            let note = gateway.publish_note(&document).await?;
            info!(note_id = note.id, "[NOTE] Note published");
            vec![format::created_note(&note)]
        }
        Request::Notes { author, limit } => {
            let user_id = resolve_author(gateway, author).await?;
            let notes = gateway.notes_by_author(user_id, *limit).await?;
            notes.iter().take(*limit).map(format::note).collect()
        }
        Request::NoteById { note_id } => vec![format::note(&gateway.note_by_id(*note_id).await?)],
        Request::Comments { post_id, limit } => {
            let comments = gateway.comments_for_post(*post_id, *limit).await?;
            comments.iter().take(*limit).map(format::comment).collect()
        }
        Request::CommentById { comment_id } => {
            vec![format::comment(&gateway.comment_by_id(*comment_id).await?)]
        }
    };
    Ok(items)
}

async fn resolve_author<G>(gateway: &G, author: &Author) -> Result<u64, GatewayError>
where
    G: SubstackGateway + ?Sized,
{
    match author {
        Author::Id(id) => Ok(*id),
        Author::Own => Ok(gateway.own_profile().await?.id),
        Author::Slug(slug) => Ok(gateway.profile_by_slug(slug).await?.id),
    }
}

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Emit an error item for a failed request instead of aborting the batch.
    pub continue_on_fail: bool,
    pub default_limit: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            continue_on_fail: false,
            default_limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Error)]
#[error("item {index} ({resource}/{operation}) failed: {source}")]
pub struct ExecuteError {
    pub index: usize,
    pub resource: String,
    pub operation: String,
    #[source]
    pub source: OperationError,
}

/// Run a batch of request items in order and collect their output items.
pub async fn execute<G>(
    gateway: &G,
    items: &[RequestItem],
    options: &ExecuteOptions,
) -> Result<Vec<Value>, ExecuteError>
where
    G: SubstackGateway + ?Sized,
{
    info!(
        items = items.len(),
        continue_on_fail = options.continue_on_fail,
        "[EXECUTE] Starting execution"
    );
    let mut output = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let result = match Request::from_item(item, options.default_limit) {
            Ok(request) => dispatch(gateway, &request).await,
            Err(e) => Err(OperationError::from(e)),
        };

        match result {
            Ok(values) => {
                info!(
                    index,
                    resource = %item.resource,
                    operation = %item.operation,
                    produced = values.len(),
                    "[EXECUTE] Item succeeded"
                );
                output.extend(values);
            }
            Err(e) if options.continue_on_fail => {
                warn!(
                    index,
                    resource = %item.resource,
                    operation = %item.operation,
                    error = %e,
                    "[EXECUTE] Item failed, continuing"
                );
                output.push(format::error_item(
                    &e.to_string(),
                    &item.resource,
                    &item.operation,
                ));
            }
            Err(source) => {
                error!(
                    index,
                    resource = %item.resource,
                    operation = %item.operation,
                    error = %source,
                    "[EXECUTE][ERROR] Item failed"
                );
                return Err(ExecuteError {
                    index,
                    resource: item.resource.clone(),
                    operation: item.operation.clone(),
                    source,
                });
            }
        }
    }

    info!(produced = output.len(), "[EXECUTE] Execution complete");
    Ok(output)
}
