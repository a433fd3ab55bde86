#![doc = "HTTP gateway: implements the core SubstackGateway contract against the Substack web API."]
//
//! # Substack client (CLI <-> Core)
//!
//! [`SubstackClient`] is the networked implementation of
//! [`substack_relay_core::contract::SubstackGateway`]. It authenticates with the
//! `substack.sid` session cookie and maps the platform's JSON responses onto the
//! core record types.
//!
//! ## Client Usage
//!
//! - Construct with [`SubstackClient::new`] from validated [`Credentials`], or with
//!   [`SubstackClient::new_from_env`] (`SUBSTACK_PUBLICATION_ADDRESS`,
//!   `SUBSTACK_API_KEY`, optional `SUBSTACK_API_BASE`).
//! - Most endpoints live under the global API base; post comments are read from
//!   the publication's own host.
//! - Any non-success status becomes an error carrying the status and response body.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::env;

use substack_relay_core::contract::{GatewayError, SubstackGateway};
use substack_relay_core::credentials::Credentials;
use substack_relay_core::format::format_url;
use substack_relay_core::model::{Comment, Note, Post, Profile};
use substack_relay_core::note::NoteDocument;

pub const DEFAULT_API_BASE: &str = "https://substack.com/api/v1";

/// Largest page requested from the posts listing.
const POSTS_PAGE_SIZE: usize = 50;

pub struct SubstackClient {
    http: reqwest::Client,
    api_base: String,
    publication_url: String,
}

impl SubstackClient {
    pub fn new(credentials: &Credentials, api_base: Option<&str>) -> Result<Self, GatewayError> {
        credentials.validate()?;
        let publication_url = credentials.publication_url()?;

        let mut cookie = HeaderValue::from_str(&format!("substack.sid={}", credentials.api_key.trim()))?;
        cookie.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("substack-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let api_base = api_base
            .map(str::trim)
            .filter(|base| !base.is_empty())
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
            .to_string();

        tracing::info!(
            publication = %publication_url,
            api_base = %api_base,
            "Initialized SubstackClient"
        );
        Ok(SubstackClient {
            http,
            api_base,
            publication_url,
        })
    }

    pub fn new_from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok(); // loads environment variables from .env if present
        match (
            env::var("SUBSTACK_PUBLICATION_ADDRESS"),
            env::var("SUBSTACK_API_KEY"),
        ) {
            (Ok(address), Ok(api_key)) => {
                let api_base = env::var("SUBSTACK_API_BASE").ok();
                Self::new(&Credentials::new(address, api_key), api_base.as_deref())
            }
            (Err(e), _) => {
                tracing::error!(error = ?e, "SUBSTACK_PUBLICATION_ADDRESS missing in environment");
                Err(Box::new(e))
            }
            (_, Err(e)) => {
                tracing::error!(error = ?e, "SUBSTACK_API_KEY missing in environment");
                Err(Box::new(e))
            }
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn publication_url(&self) -> &str {
        &self.publication_url
    }

    fn api_url(&self, path: &str) -> String {
        format_url(&self.api_base, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        self.send(self.http.get(url).query(query), Method::GET, url)
            .await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        method: Method,
        url: &str,
    ) -> Result<T, GatewayError> {
        tracing::debug!(%method, url, "Sending Substack request");
        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, %method, url, "Substack request could not be sent");
            e
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, %method, url, body = %body, "Substack API returned an error");
            return Err(format!("{method} {url} failed with status {status}: {body}").into());
        }
        let parsed = response.json::<T>().await.map_err(|e| {
            tracing::error!(error = %e, %method, url, "Failed to decode Substack response");
            format!("failed to decode response from {url}: {e}")
        })?;
        Ok(parsed)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandleOptions {
    #[serde(default)]
    potential_handles: Vec<PotentialHandle>,
}

#[derive(Debug, Deserialize)]
struct PotentialHandle {
    handle: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiProfile {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    handle: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
}

impl From<ApiProfile> for Profile {
    fn from(api: ApiProfile) -> Self {
        Profile {
            id: api.id,
            name: api.name.unwrap_or_default(),
            handle: api.handle.unwrap_or_default(),
            bio: api.bio,
            photo_url: api.photo_url,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Followee {
    Id(u64),
    User { id: u64 },
}

impl Followee {
    fn id(&self) -> u64 {
        match self {
            Followee::Id(id) | Followee::User { id } => *id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiPost {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    canonical_url: Option<String>,
    #[serde(default)]
    post_date: Option<String>,
    #[serde(default, rename = "type")]
    post_type: Option<String>,
    #[serde(default)]
    audience: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl From<ApiPost> for Post {
    fn from(api: ApiPost) -> Self {
        Post {
            id: api.id,
            title: api.title,
            subtitle: api.subtitle,
            slug: api.slug,
            url: api.canonical_url,
            post_date: api.post_date,
            post_type: api.post_type,
            audience: api.audience,
            description: api.description,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostsPage {
    #[serde(default)]
    posts: Vec<ApiPost>,
}

#[derive(Debug, Deserialize)]
struct PostEnvelope {
    post: ApiPost,
}

/// A comment as the API returns it. Notes are comments too.
#[derive(Debug, Deserialize)]
struct ApiComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    user_id: Option<u64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    handle: Option<String>,
    #[serde(default)]
    post_id: Option<u64>,
    #[serde(default)]
    reaction_count: Option<u64>,
    #[serde(default)]
    restacks: Option<u64>,
}

impl ApiComment {
    fn into_note(self) -> Note {
        Note {
            id: self.id,
            body: self.body.unwrap_or_default(),
            date: self.date,
            author_id: self.user_id.unwrap_or_default(),
            author_name: self.name,
            author_handle: self.handle,
            likes: self.reaction_count.unwrap_or_default(),
            restacks: self.restacks.unwrap_or_default(),
        }
    }

    fn into_comment(self) -> Comment {
        Comment {
            id: self.id,
            body: self.body.unwrap_or_default(),
            date: self.date,
            post_id: self.post_id,
            author_id: self.user_id,
            author_name: self.name,
            likes: self.reaction_count.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedPage {
    #[serde(default)]
    items: Vec<FeedItem>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    comment: Option<ApiComment>,
}

#[derive(Debug, Deserialize)]
struct CommentEnvelope {
    item: FeedItem,
}

#[derive(Debug, Deserialize)]
struct CommentsPage {
    #[serde(default)]
    comments: Vec<ApiComment>,
}

impl SubstackClient {
    async fn comment_item(&self, id: u64) -> Result<ApiComment, GatewayError> {
        let url = self.api_url(&format!("reader/comment/{id}"));
        let envelope: CommentEnvelope = self.get_json(&url, &[]).await?;
        envelope
            .item
            .comment
            .ok_or_else(|| format!("comment {id} not found in response").into())
    }
}

#[async_trait]
impl SubstackGateway for SubstackClient {
    async fn own_profile(&self) -> Result<Profile, GatewayError> {
        let options: HandleOptions = self.get_json(&self.api_url("handle/options"), &[]).await?;
        let handle = options
            .potential_handles
            .iter()
            .find(|h| h.kind.as_deref() == Some("existing"))
            .or_else(|| options.potential_handles.first())
            .map(|h| h.handle.clone())
            .ok_or("no handle is associated with this session")?;
        tracing::info!(handle = %handle, "Resolved own handle");
        self.profile_by_slug(&handle).await
    }

    async fn profile_by_slug(&self, slug: &str) -> Result<Profile, GatewayError> {
        let url = self.api_url(&format!("user/{slug}/public_profile"));
        let profile: ApiProfile = self.get_json(&url, &[]).await?;
        Ok(profile.into())
    }

    async fn profile_by_id(&self, user_id: u64) -> Result<Profile, GatewayError> {
        let url = self.api_url(&format!("user/{user_id}/profile"));
        let profile: ApiProfile = self.get_json(&url, &[]).await?;
        Ok(profile.into())
    }

    async fn followee_ids(&self) -> Result<Vec<u64>, GatewayError> {
        let followees: Vec<Followee> = self.get_json(&self.api_url("feed/following"), &[]).await?;
        Ok(followees.iter().map(Followee::id).collect())
    }

    async fn posts_by_author(&self, user_id: u64, limit: usize) -> Result<Vec<Post>, GatewayError> {
        let url = self.api_url("profile/posts");
        let mut posts = Vec::new();
        while posts.len() < limit {
            let page_size = (limit - posts.len()).min(POSTS_PAGE_SIZE);
            let query = [
                ("profile_user_id", user_id.to_string()),
                ("offset", posts.len().to_string()),
                ("limit", page_size.to_string()),
            ];
            let page: PostsPage = self.get_json(&url, &query).await?;
            let received = page.posts.len();
            posts.extend(page.posts.into_iter().map(Post::from));
            tracing::debug!(user_id, received, total = posts.len(), "Fetched posts page");
            if received < page_size {
                break;
            }
        }
        posts.truncate(limit);
        Ok(posts)
    }

    async fn post_by_id(&self, post_id: u64) -> Result<Post, GatewayError> {
        let url = self.api_url(&format!("posts/by-id/{post_id}"));
        let envelope: PostEnvelope = self.get_json(&url, &[]).await?;
        Ok(envelope.post.into())
    }

    async fn notes_by_author(&self, user_id: u64, limit: usize) -> Result<Vec<Note>, GatewayError> {
        let url = self.api_url(&format!("reader/feed/profile/{user_id}"));
        let mut notes = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![("types", "note".to_string())];
            if let Some(cursor) = &cursor {
                query.push(("cursor", cursor.clone()));
            }
            let page: FeedPage = self.get_json(&url, &query).await?;
            let received = page.items.len();
            notes.extend(
                page.items
                    .into_iter()
                    .filter(|item| item.kind.as_deref().map_or(true, |kind| kind == "comment"))
                    .filter_map(|item| item.comment)
                    .map(ApiComment::into_note),
            );
            tracing::debug!(user_id, received, total = notes.len(), "Fetched notes page");
            match page.next_cursor {
                Some(next) if notes.len() < limit && received > 0 && cursor.as_ref() != Some(&next) => {
                    cursor = Some(next);
                }
                _ => break,
            }
        }
        notes.truncate(limit);
        Ok(notes)
    }

    async fn note_by_id(&self, note_id: u64) -> Result<Note, GatewayError> {
        Ok(self.comment_item(note_id).await?.into_note())
    }

    async fn comments_for_post(
        &self,
        post_id: u64,
        limit: usize,
    ) -> Result<Vec<Comment>, GatewayError> {
        let url = format_url(
            &self.publication_url,
            &format!("api/v1/post/{post_id}/comments"),
        );
        let query = [("all_comments", "true".to_string())];
        let page: CommentsPage = self.get_json(&url, &query).await?;
        Ok(page
            .comments
            .into_iter()
            .take(limit)
            .map(|comment| {
                let mut comment = comment.into_comment();
                comment.post_id.get_or_insert(post_id);
                comment
            })
            .collect())
    }

    async fn comment_by_id(&self, comment_id: u64) -> Result<Comment, GatewayError> {
        Ok(self.comment_item(comment_id).await?.into_comment())
    }

    async fn publish_note(&self, note: &NoteDocument) -> Result<Note, GatewayError> {
        let url = self.api_url("comment/feed");
        let payload = json!({
            "bodyJson": note.to_body_json(),
            "tabId": "for-you",
            "surface": "feed",
            "replyMinimumRole": "everyone",
        });
        tracing::info!(paragraphs = note.paragraphs.len(), "Publishing note");
        let created: ApiComment = self
            .send(self.http.post(&url).json(&payload), Method::POST, &url)
            .await?;
        let mut published = created.into_note();
        if published.body.is_empty() {
            published.body = note.plain_text();
        }
        tracing::info!(note_id = published.id, "Successfully published note");
        Ok(published)
    }
}
