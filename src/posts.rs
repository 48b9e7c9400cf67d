//! Posts, likes and comments.

use serde::Serialize;

use crate::error::{SocialError, SocialResult};
use crate::logging::user_id;
use crate::storage::{now_secs, CommentRow, PostRow, Storage, UserBrief};
use crate::users::brief;

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: i64,
    pub author: UserBrief,
    pub content: String,
    pub image: String,
    pub likes: Vec<UserBrief>,
    pub comment_count: u32,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Result of a like toggle: the post id and the ids of everyone who likes it.
#[derive(Debug, Clone, Serialize)]
pub struct LikeState {
    pub id: i64,
    pub likes: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub author: UserBrief,
    pub text: String,
    pub created_at: u64,
}

fn load_post(storage: &Storage, id: i64) -> SocialResult<PostRow> {
    storage.get_post(id)?.ok_or(SocialError::NotFound("post"))
}

fn post_view(storage: &Storage, row: PostRow) -> SocialResult<PostView> {
    Ok(PostView {
        author: brief(storage, row.author_id)?,
        likes: storage.list_likers(row.id)?,
        comment_count: storage.count_comments(row.id)?,
        id: row.id,
        content: row.content,
        image: row.image,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn comment_view(storage: &Storage, row: CommentRow) -> SocialResult<CommentView> {
    Ok(CommentView {
        author: brief(storage, row.author_id)?,
        id: row.id,
        post_id: row.post_id,
        text: row.text,
        created_at: row.created_at,
    })
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

pub fn create_post(
    storage: &Storage,
    author: i64,
    content: &str,
    image: Option<String>,
) -> SocialResult<PostView> {
    if content.trim().is_empty() {
        return Err(SocialError::InvalidOperation(
            "post content is required".to_string(),
        ));
    }
    let now = now_secs();
    let id = storage.insert_post(&PostRow {
        id: 0,
        author_id: author,
        content: content.to_string(),
        image: image.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    })?;
    tracing::info!("post {id} created by {}", user_id(author));
    get_post(storage, id)
}

/// All posts, newest first.
pub fn list_posts(storage: &Storage) -> SocialResult<Vec<PostView>> {
    let mut result = Vec::new();
    for row in storage.list_posts()? {
        result.push(post_view(storage, row)?);
    }
    Ok(result)
}

pub fn get_post(storage: &Storage, id: i64) -> SocialResult<PostView> {
    let row = load_post(storage, id)?;
    post_view(storage, row)
}

/// Author-only edit. Absent or empty content keeps the old text.
pub fn update_post(
    storage: &Storage,
    caller: i64,
    id: i64,
    content: Option<String>,
) -> SocialResult<PostView> {
    let row = load_post(storage, id)?;
    if row.author_id != caller {
        return Err(SocialError::Unauthorized("only the author can edit a post"));
    }
    if let Some(content) = content.filter(|c| !c.trim().is_empty()) {
        storage.update_post_content(id, &content, now_secs())?;
    }
    get_post(storage, id)
}

/// Author-only delete. Takes the post's comments and likes with it.
pub fn delete_post(storage: &Storage, caller: i64, id: i64) -> SocialResult<()> {
    let row = load_post(storage, id)?;
    if row.author_id != caller {
        return Err(SocialError::Unauthorized("only the author can delete a post"));
    }
    storage.in_transaction(|s| s.delete_post(id).map_err(SocialError::from))?;
    tracing::info!("post {id} deleted by {}", user_id(caller));
    Ok(())
}

/// Add the caller to the post's likes, or remove them if already present.
pub fn toggle_like(storage: &Storage, caller: i64, id: i64) -> SocialResult<LikeState> {
    load_post(storage, id)?;
    let likes = storage.in_transaction(|s| {
        if s.has_like(id, caller)? {
            s.delete_like(id, caller)?;
        } else {
            s.insert_like(id, caller, now_secs())?;
        }
        let ids = s.list_likers(id)?.into_iter().map(|u| u.id).collect();
        Ok::<Vec<i64>, SocialError>(ids)
    })?;
    Ok(LikeState { id, likes })
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

pub fn create_comment(
    storage: &Storage,
    author: i64,
    post_id: i64,
    text: &str,
) -> SocialResult<CommentView> {
    if text.trim().is_empty() {
        return Err(SocialError::InvalidOperation(
            "comment text is required".to_string(),
        ));
    }
    load_post(storage, post_id)?;
    let row = CommentRow {
        id: 0,
        post_id,
        author_id: author,
        text: text.to_string(),
        created_at: now_secs(),
    };
    let id = storage.insert_comment(&row)?;
    comment_view(storage, CommentRow { id, ..row })
}

/// Comments on a post, newest first. An unknown post has no comments.
pub fn list_comments(storage: &Storage, post_id: i64) -> SocialResult<Vec<CommentView>> {
    let mut result = Vec::new();
    for row in storage.list_comments(post_id)? {
        result.push(comment_view(storage, row)?);
    }
    Ok(result)
}

pub fn delete_comment(storage: &Storage, caller: i64, id: i64) -> SocialResult<()> {
    let row = storage
        .get_comment(id)?
        .ok_or(SocialError::NotFound("comment"))?;
    if row.author_id != caller {
        return Err(SocialError::Unauthorized(
            "only the author can delete a comment",
        ));
    }
    storage.delete_comment(id)?;
    Ok(())
}
