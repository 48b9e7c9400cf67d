//! Notification emitter.
//!
//! Mutating components never write notification rows themselves. They
//! [`publish`] a [`SocialEvent`] into the outbox table inside the same
//! transaction as their own writes. The [`NotificationWriter`] is the single
//! consumer of the outbox: it turns events into notification records and
//! applies the message dedup policy.
//!
//! The writer runs synchronously at the end of each mutating request. An event
//! whose drain fails stays in the outbox and is picked up by the next drain.

use serde::{Deserialize, Serialize};

use crate::error::{SocialError, SocialResult};
use crate::storage::{
    now_secs, NotificationKind, NotificationRow, RelatedModel, Storage, StorageError, UserBrief,
};

/// Longest message prefix quoted in a message notification, in characters.
pub const PREVIEW_CHARS: usize = 50;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Domain events that may produce notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SocialEvent {
    ConnectionRequested {
        connection_id: i64,
        requester_id: i64,
        requester_name: String,
        recipient_id: i64,
    },
    ConnectionAccepted {
        connection_id: i64,
        requester_id: i64,
        recipient_id: i64,
        recipient_name: String,
    },
    MessageSent {
        message_id: i64,
        sender_id: i64,
        sender_name: String,
        recipient_id: i64,
        content: String,
    },
}

impl SocialEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SocialEvent::ConnectionRequested { .. } => "connection_requested",
            SocialEvent::ConnectionAccepted { .. } => "connection_accepted",
            SocialEvent::MessageSent { .. } => "message_sent",
        }
    }
}

/// Append an event to the outbox. Call inside the transaction that performs
/// the mutation the event describes.
pub fn publish(storage: &Storage, event: &SocialEvent) -> Result<i64, StorageError> {
    let payload = serde_json::to_string(event)?;
    storage.insert_outbox(event.kind(), &payload, now_secs())
}

/// Content line of a message notification.
pub fn message_preview(sender_name: &str, content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    let ellipsis = if chars.next().is_some() { "..." } else { "" };
    format!("New message from {sender_name}: {head}{ellipsis}")
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Parameters of a single notification record.
#[derive(Debug, Clone)]
pub struct Emit {
    pub recipient_id: i64,
    pub sender_id: i64,
    pub kind: NotificationKind,
    pub content: String,
    pub related_id: i64,
    pub related_model: RelatedModel,
}

/// Persist a notification with `read = false`.
pub fn emit(storage: &Storage, e: Emit) -> Result<i64, StorageError> {
    storage.insert_notification(&NotificationRow {
        id: 0,
        recipient_id: e.recipient_id,
        sender_id: e.sender_id,
        kind: e.kind,
        content: e.content,
        read: false,
        related_id: Some(e.related_id),
        related_model: Some(e.related_model),
        created_at: now_secs(),
    })
}

/// Sole consumer of the outbox.
pub struct NotificationWriter<'a> {
    storage: &'a Storage,
}

impl<'a> NotificationWriter<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Process every pending outbox event in publication order.
    /// Returns the number of notification records written.
    pub fn drain(&self) -> Result<u32, StorageError> {
        let mut written = 0;
        for row in self.storage.list_pending_outbox()? {
            let event: SocialEvent = match serde_json::from_str(&row.payload) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("dropping malformed outbox event {}: {e}", row.id);
                    self.storage.delete_outbox(row.id)?;
                    continue;
                }
            };
            let created = self.storage.in_transaction(|s| {
                let created = self.apply(s, &event)?;
                s.delete_outbox(row.id)?;
                Ok::<_, StorageError>(created)
            })?;
            if created {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Drain, logging instead of failing. The caller's mutation has already
    /// committed; undrained events stay queued for the next request.
    pub fn drain_logged(&self) {
        match self.drain() {
            Ok(0) => {}
            Ok(n) => tracing::debug!("wrote {n} notification(s)"),
            Err(e) => tracing::warn!("notification drain failed, events kept in outbox: {e}"),
        }
    }

    fn apply(&self, s: &Storage, event: &SocialEvent) -> Result<bool, StorageError> {
        match event {
            SocialEvent::ConnectionRequested {
                connection_id,
                requester_id,
                requester_name,
                recipient_id,
            } => {
                emit(
                    s,
                    Emit {
                        recipient_id: *recipient_id,
                        sender_id: *requester_id,
                        kind: NotificationKind::ConnectionRequest,
                        content: format!("{requester_name} sent you a connection request"),
                        related_id: *connection_id,
                        related_model: RelatedModel::Connection,
                    },
                )?;
                Ok(true)
            }
            SocialEvent::ConnectionAccepted {
                connection_id,
                requester_id,
                recipient_id,
                recipient_name,
            } => {
                emit(
                    s,
                    Emit {
                        recipient_id: *requester_id,
                        sender_id: *recipient_id,
                        kind: NotificationKind::ConnectionAccepted,
                        content: format!("{recipient_name} accepted your connection request"),
                        related_id: *connection_id,
                        related_model: RelatedModel::Connection,
                    },
                )?;
                Ok(true)
            }
            SocialEvent::MessageSent {
                message_id,
                sender_id,
                sender_name,
                recipient_id,
                content,
            } => {
                // One unread message notification per sender/recipient pair.
                if s.find_unread_notification(*recipient_id, *sender_id, NotificationKind::Message)?
                    .is_some()
                {
                    return Ok(false);
                }
                emit(
                    s,
                    Emit {
                        recipient_id: *recipient_id,
                        sender_id: *sender_id,
                        kind: NotificationKind::Message,
                        content: message_preview(sender_name, content),
                        related_id: *message_id,
                        related_model: RelatedModel::Message,
                    },
                )?;
                Ok(true)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Recipient operations
// ---------------------------------------------------------------------------

/// A notification joined with its sender.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    pub id: i64,
    pub recipient_id: i64,
    pub sender: UserBrief,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub content: String,
    pub read: bool,
    pub related_id: Option<i64>,
    pub related_model: Option<RelatedModel>,
    pub created_at: u64,
}

fn to_view(storage: &Storage, row: NotificationRow) -> SocialResult<NotificationView> {
    let sender = crate::users::brief(storage, row.sender_id)?;
    Ok(NotificationView {
        id: row.id,
        recipient_id: row.recipient_id,
        sender,
        kind: row.kind,
        content: row.content,
        read: row.read,
        related_id: row.related_id,
        related_model: row.related_model,
        created_at: row.created_at,
    })
}

/// Load a notification and check the caller is its recipient.
fn owned(storage: &Storage, caller: i64, id: i64) -> SocialResult<NotificationRow> {
    let row = storage
        .get_notification(id)?
        .ok_or(SocialError::NotFound("notification"))?;
    if row.recipient_id != caller {
        return Err(SocialError::Unauthorized("notification belongs to another user"));
    }
    Ok(row)
}

/// The caller's notifications, newest first.
pub fn list(storage: &Storage, caller: i64) -> SocialResult<Vec<NotificationView>> {
    let mut result = Vec::new();
    for row in storage.list_notifications(caller)? {
        result.push(to_view(storage, row)?);
    }
    Ok(result)
}

pub fn unread_count(storage: &Storage, caller: i64) -> SocialResult<u32> {
    Ok(storage.count_unread_notifications(caller)?)
}

pub fn mark_read(storage: &Storage, caller: i64, id: i64) -> SocialResult<NotificationView> {
    let mut row = owned(storage, caller, id)?;
    storage.mark_notification_read(id)?;
    row.read = true;
    to_view(storage, row)
}

/// Mark every unread notification of the caller as read; returns how many changed.
pub fn mark_all_read(storage: &Storage, caller: i64) -> SocialResult<u32> {
    Ok(storage.mark_all_notifications_read(caller)?)
}

pub fn delete(storage: &Storage, caller: i64, id: i64) -> SocialResult<()> {
    owned(storage, caller, id)?;
    storage.delete_notification(id)?;
    Ok(())
}
