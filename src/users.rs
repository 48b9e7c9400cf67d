//! Profile directory: registration, profile reads and updates.

use serde::{Deserialize, Serialize};

use crate::error::{SocialError, SocialResult};
use crate::storage::{now_secs, ExperienceEntry, Storage, UserBrief, UserRow};

/// Registration request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub skills: Option<Vec<String>>,
    #[serde(default)]
    pub experience: Option<Vec<ExperienceEntry>>,
}

/// Partial profile update. Absent or empty text fields keep their old value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub skills: Option<Vec<String>>,
    pub experience: Option<Vec<ExperienceEntry>>,
}

/// A user as returned to clients, with the connection set resolved.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub bio: String,
    pub avatar: String,
    pub skills: Vec<String>,
    pub experience: Vec<ExperienceEntry>,
    pub connections: Vec<UserBrief>,
    pub created_at: u64,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Keep `old` unless `new` carries a non-empty value.
fn merge_text(old: String, new: Option<String>) -> String {
    match new {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => old,
    }
}

/// Fetch the brief projection of a user that must exist.
pub(crate) fn brief(storage: &Storage, id: i64) -> SocialResult<UserBrief> {
    storage
        .get_user_brief(id)?
        .ok_or(SocialError::NotFound("user"))
}

fn to_view(storage: &Storage, row: UserRow) -> SocialResult<UserView> {
    let mut connections = Vec::new();
    for peer_id in storage.list_user_connections(row.id)? {
        if let Some(peer) = storage.get_user_brief(peer_id)? {
            connections.push(peer);
        }
    }
    Ok(UserView {
        id: row.id,
        name: row.name,
        email: row.email,
        bio: row.bio,
        avatar: row.avatar,
        skills: row.skills,
        experience: row.experience,
        connections,
        created_at: row.created_at,
    })
}

pub fn register(storage: &Storage, new: NewUser) -> SocialResult<UserView> {
    let name = new.name.trim().to_string();
    let email = normalize_email(&new.email);
    if name.is_empty() || email.is_empty() {
        return Err(SocialError::InvalidOperation(
            "name and email are required".to_string(),
        ));
    }

    let row = UserRow {
        id: 0,
        name,
        email,
        bio: new.bio.unwrap_or_default(),
        avatar: new.avatar.unwrap_or_default(),
        skills: new.skills.unwrap_or_default(),
        experience: new.experience.unwrap_or_default(),
        created_at: now_secs(),
    };
    let id = storage.insert_user(&row)?;
    tracing::info!("registered user {}", crate::logging::user_id(id));
    get_user(storage, id)
}

pub fn get_user(storage: &Storage, id: i64) -> SocialResult<UserView> {
    let row = storage.get_user(id)?.ok_or(SocialError::NotFound("user"))?;
    to_view(storage, row)
}

pub fn get_profile(storage: &Storage, caller: i64) -> SocialResult<UserView> {
    get_user(storage, caller)
}

pub fn update_profile(
    storage: &Storage,
    caller: i64,
    update: ProfileUpdate,
) -> SocialResult<UserView> {
    let old = storage
        .get_user(caller)?
        .ok_or(SocialError::NotFound("user"))?;

    let email = match update.email {
        Some(e) if !e.trim().is_empty() => normalize_email(&e),
        _ => old.email.clone(),
    };
    let row = UserRow {
        id: old.id,
        name: merge_text(old.name, update.name),
        email,
        bio: merge_text(old.bio, update.bio),
        avatar: merge_text(old.avatar, update.avatar),
        skills: update.skills.unwrap_or(old.skills),
        experience: update.experience.unwrap_or(old.experience),
        created_at: old.created_at,
    };
    storage.update_user(&row)?;
    tracing::debug!("profile updated for {}", crate::logging::user_id(caller));
    get_user(storage, caller)
}

pub fn list_users(storage: &Storage) -> SocialResult<Vec<UserView>> {
    let mut result = Vec::new();
    for row in storage.list_users()? {
        result.push(to_view(storage, row)?);
    }
    Ok(result)
}
