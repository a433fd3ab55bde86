//! Output shaping: every record leaves the crate as one flat JSON object.

use serde_json::{json, Value};

use crate::model::{Comment, Note, Post, Profile};

pub fn profile(profile: &Profile) -> Value {
    json!({
        "id": profile.id,
        "name": profile.name,
        "handle": profile.handle,
        "bio": profile.bio,
        "photoUrl": profile.photo_url,
        "profileUrl": profile.url(),
    })
}

pub fn post(post: &Post) -> Value {
    json!({
        "id": post.id,
        "title": post.title,
        "subtitle": post.subtitle,
        "slug": post.slug,
        "url": post.url,
        "postDate": post.post_date,
        "type": post.post_type,
        "audience": post.audience,
        "description": post.description,
    })
}

pub fn note(note: &Note) -> Value {
    json!({
        "noteId": note.id,
        "body": note.body,
        "url": note.url(),
        "date": note.date,
        "userId": note.author_id,
        "authorName": note.author_name,
        "likes": note.likes,
        "restacks": note.restacks,
        "type": "note",
    })
}

/// A freshly published note, flagged as such.
pub fn created_note(created: &Note) -> Value {
    let mut value = note(created);
    value["success"] = json!(true);
    value["status"] = json!("published");
    value
}

pub fn comment(comment: &Comment) -> Value {
    json!({
        "id": comment.id,
        "body": comment.body,
        "date": comment.date,
        "postId": comment.post_id,
        "userId": comment.author_id,
        "authorName": comment.author_name,
        "likes": comment.likes,
    })
}

/// Item emitted in place of a failed request when execution continues on failure.
pub fn error_item(message: &str, resource: &str, operation: &str) -> Value {
    json!({
        "success": false,
        "error": message,
        "metadata": {
            "status": "error",
            "resource": resource,
            "operation": operation,
        },
    })
}

/// Join a base URL and a path with exactly one slash between them.
pub fn format_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}
