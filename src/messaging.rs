//! Messaging log: directed messages, threads, conversations and unread counts.

use serde::Serialize;

use crate::error::{SocialError, SocialResult};
use crate::logging::{msg_id, user_id};
use crate::notifications::{publish, NotificationWriter, SocialEvent};
use crate::storage::{now_secs, MessageRow, Storage, UserBrief};
use crate::users::brief;

/// A message joined with sender and recipient projections.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: i64,
    pub sender: UserBrief,
    pub recipient: UserBrief,
    pub content: String,
    pub read: bool,
    pub created_at: u64,
}

fn to_view(
    row: MessageRow,
    sender: &UserBrief,
    recipient: &UserBrief,
) -> MessageView {
    MessageView {
        id: row.id,
        sender: sender.clone(),
        recipient: recipient.clone(),
        content: row.content,
        read: row.read,
        created_at: row.created_at,
    }
}

/// Store a message and publish its notification event.
pub fn send_message(
    storage: &Storage,
    sender: i64,
    recipient_id: i64,
    content: &str,
) -> SocialResult<MessageView> {
    if !storage.user_exists(recipient_id)? {
        return Err(SocialError::NotFound("user"));
    }
    if recipient_id == sender {
        return Err(SocialError::InvalidOperation(
            "cannot message yourself".to_string(),
        ));
    }
    if content.trim().is_empty() {
        return Err(SocialError::InvalidOperation(
            "message content is required".to_string(),
        ));
    }

    let sender_brief = brief(storage, sender)?;
    let recipient_brief = brief(storage, recipient_id)?;
    let row = MessageRow {
        id: 0,
        sender_id: sender,
        recipient_id,
        content: content.to_string(),
        read: false,
        created_at: now_secs(),
    };

    let id = storage.in_transaction(|s| {
        let id = s.insert_message(&row)?;
        publish(
            s,
            &SocialEvent::MessageSent {
                message_id: id,
                sender_id: sender,
                sender_name: sender_brief.name.clone(),
                recipient_id,
                content: row.content.clone(),
            },
        )?;
        Ok::<_, SocialError>(id)
    })?;
    NotificationWriter::new(storage).drain_logged();

    tracing::info!(
        "message {} sent: {} -> {}",
        msg_id(id),
        user_id(sender),
        user_id(recipient_id)
    );
    Ok(to_view(
        MessageRow { id, ..row },
        &sender_brief,
        &recipient_brief,
    ))
}

/// Every message between the caller and `other`, oldest first.
///
/// Marks the messages `other` sent to the caller as read. The returned list
/// shows read flags as they were before that update.
pub fn get_thread(storage: &Storage, caller: i64, other: i64) -> SocialResult<Vec<MessageView>> {
    let other_brief = brief(storage, other)?;
    let caller_brief = brief(storage, caller)?;

    let rows = storage.list_thread(caller, other)?;
    let marked = storage.mark_thread_read(caller, other)?;
    if marked > 0 {
        tracing::debug!(
            "marked {marked} message(s) from {} read for {}",
            user_id(other),
            user_id(caller)
        );
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            if row.sender_id == caller {
                to_view(row, &caller_brief, &other_brief)
            } else {
                to_view(row, &other_brief, &caller_brief)
            }
        })
        .collect())
}

/// Distinct users the caller has exchanged messages with.
pub fn list_conversations(storage: &Storage, caller: i64) -> SocialResult<Vec<UserBrief>> {
    Ok(storage.list_conversation_peers(caller)?)
}

/// Number of unread messages addressed to the caller.
pub fn unread_count(storage: &Storage, caller: i64) -> SocialResult<u32> {
    Ok(storage.count_unread_messages(caller)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications;
    use crate::storage::{NotificationKind, RelatedModel};
    use crate::users::tests::make_user;

    fn setup() -> (Storage, i64, i64) {
        let storage = Storage::open_in_memory().unwrap();
        let a = make_user(&storage, "Ada");
        let b = make_user(&storage, "Bob");
        (storage, a, b)
    }

    #[test]
    fn test_send_validation() {
        let (storage, a, _b) = setup();
        assert!(matches!(
            send_message(&storage, a, 404, "hi"),
            Err(SocialError::NotFound(_))
        ));
        assert!(matches!(
            send_message(&storage, a, a, "hi"),
            Err(SocialError::InvalidOperation(_))
        ));
        assert!(storage.list_thread(a, a).unwrap().is_empty());
        assert_eq!(storage.counts().unwrap().messages, 0);
    }

    #[test]
    fn test_empty_content_rejected() {
        let (storage, a, b) = setup();
        assert!(matches!(
            send_message(&storage, a, b, "   "),
            Err(SocialError::InvalidOperation(_))
        ));
        assert_eq!(unread_count(&storage, b).unwrap(), 0);
    }

    #[test]
    fn test_burst_produces_single_notification() {
        let (storage, a, b) = setup();
        let first = send_message(&storage, a, b, "one").unwrap();
        send_message(&storage, a, b, "two").unwrap();
        send_message(&storage, a, b, "three").unwrap();

        assert_eq!(unread_count(&storage, b).unwrap(), 3);
        let notes = notifications::list(&storage, b).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::Message);
        assert_eq!(notes[0].content, "New message from Ada: one");
        assert_eq!(notes[0].related_id, Some(first.id));
        assert_eq!(notes[0].related_model, Some(RelatedModel::Message));
    }

    #[test]
    fn test_outbox_is_empty_after_sends() {
        let (storage, a, b) = setup();
        for i in 0..100 {
            send_message(&storage, a, b, &format!("msg {i}")).unwrap();
        }
        assert_eq!(storage.count_outbox().unwrap(), 0);
        let rows: i64 = storage
            .raw()
            .query_row("SELECT COUNT(*) FROM outbox", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
        assert_eq!(unread_count(&storage, b).unwrap(), 100);
    }

    #[test]
    fn test_dedup_is_per_sender() {
        let (storage, a, b) = setup();
        let c = make_user(&storage, "Cy");
        send_message(&storage, a, b, "from ada").unwrap();
        send_message(&storage, c, b, "from cy").unwrap();
        assert_eq!(notifications::list(&storage, b).unwrap().len(), 2);
    }

    #[test]
    fn test_read_notification_reenables_message_notifications() {
        let (storage, a, b) = setup();
        send_message(&storage, a, b, "one").unwrap();
        let id = notifications::list(&storage, b).unwrap()[0].id;
        notifications::mark_read(&storage, b, id).unwrap();

        send_message(&storage, a, b, "two").unwrap();
        let notes = notifications::list(&storage, b).unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notifications::unread_count(&storage, b).unwrap(), 1);
    }

    #[test]
    fn test_thread_marks_only_incoming_read() {
        let (storage, a, b) = setup();
        let c = make_user(&storage, "Cy");
        send_message(&storage, a, b, "a1").unwrap();
        send_message(&storage, b, a, "b1").unwrap();
        send_message(&storage, a, b, "a2").unwrap();
        send_message(&storage, c, b, "c1").unwrap();

        let thread = get_thread(&storage, b, a).unwrap();
        let bodies: Vec<&str> = thread.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(bodies, vec!["a1", "b1", "a2"]);
        assert!(thread.iter().all(|m| !m.read));
        assert_eq!(thread[1].sender.id, b);

        // Only Cy's message remains unread for Bob; Ada's copy of b1 is untouched.
        assert_eq!(unread_count(&storage, b).unwrap(), 1);
        assert_eq!(unread_count(&storage, a).unwrap(), 1);

        let again = get_thread(&storage, b, a).unwrap();
        assert!(again.iter().filter(|m| m.sender.id == a).all(|m| m.read));
    }

    #[test]
    fn test_thread_with_missing_user() {
        let (storage, a, _b) = setup();
        assert!(matches!(
            get_thread(&storage, a, 777),
            Err(SocialError::NotFound(_))
        ));
    }

    #[test]
    fn test_conversations_are_distinct_peers() {
        let (storage, a, b) = setup();
        let c = make_user(&storage, "Cy");
        send_message(&storage, a, b, "1").unwrap();
        send_message(&storage, b, a, "2").unwrap();
        send_message(&storage, c, a, "3").unwrap();

        let peers = list_conversations(&storage, a).unwrap();
        let ids: Vec<i64> = peers.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b, c]);
        assert_eq!(list_conversations(&storage, c).unwrap().len(), 1);
    }
}
