//! # model: records read from and published to Substack
//!
//! Plain data returned by [`crate::contract::SubstackGateway`] and shaped for
//! output by [`crate::format`]. Optional fields are whatever the platform may
//! omit for a record.

use serde::{Deserialize, Serialize};

pub const SUBSTACK_WEB_URL: &str = "https://substack.com";

/// A Substack user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Numeric user id.
    pub id: u64,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Handle without the leading `@`.
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl Profile {
    pub fn url(&self) -> String {
        format!("{SUBSTACK_WEB_URL}/@{}", self.handle)
    }
}

/// A published post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub subtitle: Option<String>,
    /// Path segment of the post on its publication.
    pub slug: String,
    /// Canonical URL, when the platform reports one.
    pub url: Option<String>,
    /// Publication timestamp (RFC 3339).
    pub post_date: Option<String>,
    /// `newsletter`, `podcast`, `thread` and so on.
    pub post_type: Option<String>,
    /// Who can read it, e.g. `everyone` or `only_paid`.
    pub audience: Option<String>,
    pub description: Option<String>,
}

/// A short-form note. Notes are comments on the user's own feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: u64,
    pub body: String,
    pub date: Option<String>,
    pub author_id: u64,
    pub author_name: Option<String>,
    pub author_handle: Option<String>,
    pub likes: u64,
    pub restacks: u64,
}

impl Note {
    pub fn url(&self) -> String {
        match self.author_handle.as_deref().filter(|h| !h.is_empty()) {
            Some(handle) => format!("{SUBSTACK_WEB_URL}/@{handle}/note/c-{}", self.id),
            None => format!("{SUBSTACK_WEB_URL}/note/c-{}", self.id),
        }
    }
}

/// A comment on a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    /// Plain-text body.
    pub body: String,
    pub date: Option<String>,
    /// Post the comment belongs to.
    pub post_id: Option<u64>,
    pub author_id: Option<u64>,
    pub author_name: Option<String>,
    /// Reaction count.
    pub likes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_fields_default_when_absent() {
        let profile: Profile = serde_json::from_str(r#"{ "id": 3 }"#).unwrap();
        assert_eq!(profile.name, "");
        assert_eq!(profile.bio, None);
        assert_eq!(profile.url(), "https://substack.com/@");
    }

    #[test]
    fn test_note_url_without_handle_uses_bare_path() {
        let note = Note {
            id: 9,
            body: "hi".to_string(),
            date: None,
            author_id: 1,
            author_name: None,
            author_handle: Some(String::new()),
            likes: 0,
            restacks: 0,
        };
        assert_eq!(note.url(), "https://substack.com/note/c-9");
    }
}
