//! Connection lifecycle manager.
//!
//! A connection starts `pending` when the requester creates it, becomes
//! `accepted` when the recipient accepts, and is deleted on reject or removal.
//! Only this module mutates users' connection sets, and always both sides
//! within one transaction, so the graph stays symmetric.

use serde::Serialize;

use crate::error::{SocialError, SocialResult};
use crate::logging::{conn_id, user_id};
use crate::notifications::{publish, NotificationWriter, SocialEvent};
use crate::storage::{now_secs, ConnectionRow, ConnectionStatus, Storage, UserBrief};
use crate::users::brief;

/// A connection joined with both user projections.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionView {
    pub id: i64,
    pub requester: UserBrief,
    pub recipient: UserBrief,
    pub status: ConnectionStatus,
    pub created_at: u64,
    pub updated_at: u64,
}

fn to_view(storage: &Storage, row: &ConnectionRow) -> SocialResult<ConnectionView> {
    Ok(ConnectionView {
        id: row.id,
        requester: brief(storage, row.requester_id)?,
        recipient: brief(storage, row.recipient_id)?,
        status: row.status,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn load(storage: &Storage, id: i64) -> SocialResult<ConnectionRow> {
    storage
        .get_connection(id)?
        .ok_or(SocialError::NotFound("connection"))
}

/// Create a pending connection from `requester` to `recipient_id` and notify
/// the recipient.
pub fn request_connection(
    storage: &Storage,
    requester: i64,
    recipient_id: i64,
) -> SocialResult<ConnectionView> {
    if !storage.user_exists(recipient_id)? {
        return Err(SocialError::NotFound("user"));
    }
    if recipient_id == requester {
        return Err(SocialError::InvalidOperation(
            "cannot connect with yourself".to_string(),
        ));
    }
    if storage
        .find_connection_between(requester, recipient_id)?
        .is_some()
    {
        return Err(SocialError::Conflict(
            "connection already exists".to_string(),
        ));
    }

    let requester_name = brief(storage, requester)?.name;
    // The pair index rejects a concurrent duplicate that slipped past the check above.
    let id = storage.in_transaction(|s| {
        let id = s.insert_connection(requester, recipient_id, now_secs())?;
        publish(
            s,
            &SocialEvent::ConnectionRequested {
                connection_id: id,
                requester_id: requester,
                requester_name,
                recipient_id,
            },
        )?;
        Ok::<_, SocialError>(id)
    })?;
    NotificationWriter::new(storage).drain_logged();

    tracing::info!(
        "connection {} requested: {} -> {}",
        conn_id(id),
        user_id(requester),
        user_id(recipient_id)
    );
    to_view(storage, &load(storage, id)?)
}

/// Accept a pending request addressed to `caller`.
///
/// Accepting a connection that is already accepted fails with
/// `InvalidOperation` rather than re-running the side effects.
pub fn accept_connection(
    storage: &Storage,
    caller: i64,
    connection_id: i64,
) -> SocialResult<ConnectionView> {
    let row = load(storage, connection_id)?;
    if row.recipient_id != caller {
        return Err(SocialError::Unauthorized("only the recipient can accept"));
    }
    if row.status == ConnectionStatus::Accepted {
        return Err(SocialError::InvalidOperation(
            "connection already accepted".to_string(),
        ));
    }

    let recipient_name = brief(storage, caller)?.name;
    storage.in_transaction(|s| {
        let now = now_secs();
        s.update_connection_status(row.id, ConnectionStatus::Accepted, now)?;
        s.add_user_connection(row.requester_id, row.recipient_id, now)?;
        s.add_user_connection(row.recipient_id, row.requester_id, now)?;
        publish(
            s,
            &SocialEvent::ConnectionAccepted {
                connection_id: row.id,
                requester_id: row.requester_id,
                recipient_id: row.recipient_id,
                recipient_name,
            },
        )?;
        Ok::<_, SocialError>(())
    })?;
    NotificationWriter::new(storage).drain_logged();

    tracing::info!(
        "connection {} accepted by {} (requester {})",
        conn_id(row.id),
        user_id(caller),
        user_id(row.requester_id)
    );
    to_view(storage, &load(storage, row.id)?)
}

/// Reject a request addressed to `caller`. The connection is deleted and no
/// notification is sent.
pub fn reject_connection(storage: &Storage, caller: i64, connection_id: i64) -> SocialResult<()> {
    let row = load(storage, connection_id)?;
    if row.recipient_id != caller {
        return Err(SocialError::Unauthorized("only the recipient can reject"));
    }
    storage.delete_connection(row.id)?;
    tracing::info!("connection {} rejected by {}", conn_id(row.id), user_id(caller));
    Ok(())
}

/// Remove a connection the caller is party to, retracting both users'
/// connection set entries.
pub fn remove_connection(storage: &Storage, caller: i64, connection_id: i64) -> SocialResult<()> {
    let row = load(storage, connection_id)?;
    if !row.involves(caller) {
        return Err(SocialError::Unauthorized("not a party to this connection"));
    }
    storage.in_transaction(|s| {
        s.delete_connection(row.id)?;
        s.remove_user_connection(row.requester_id, row.recipient_id)?;
        s.remove_user_connection(row.recipient_id, row.requester_id)?;
        Ok::<_, SocialError>(())
    })?;
    tracing::info!("connection {} removed by {}", conn_id(row.id), user_id(caller));
    Ok(())
}

/// Pending requests addressed to the caller.
pub fn list_requests(storage: &Storage, caller: i64) -> SocialResult<Vec<ConnectionView>> {
    let mut result = Vec::new();
    for row in storage.list_pending_connections(caller)? {
        result.push(to_view(storage, &row)?);
    }
    Ok(result)
}

/// Accepted connections the caller is party to.
pub fn list_connections(storage: &Storage, caller: i64) -> SocialResult<Vec<ConnectionView>> {
    let mut result = Vec::new();
    for row in storage.list_accepted_connections(caller)? {
        result.push(to_view(storage, &row)?);
    }
    Ok(result)
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
    fn test_request_creates_pending_and_notifies() {
        let (storage, a, b) = setup();
        let conn = request_connection(&storage, a, b).unwrap();
        assert_eq!(conn.status, ConnectionStatus::Pending);
        assert_eq!(conn.requester.name, "Ada");
        assert_eq!(conn.recipient.name, "Bob");

        let notes = notifications::list(&storage, b).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::ConnectionRequest);
        assert_eq!(notes[0].content, "Ada sent you a connection request");
        assert_eq!(notes[0].related_id, Some(conn.id));
        assert_eq!(notes[0].related_model, Some(RelatedModel::Connection));
        assert!(notifications::list(&storage, a).unwrap().is_empty());

        let requests = list_requests(&storage, b).unwrap();
        assert_eq!(requests.len(), 1);
        assert!(list_requests(&storage, a).unwrap().is_empty());
    }

    #[test]
    fn test_request_validation() {
        let (storage, a, b) = setup();
        assert!(matches!(
            request_connection(&storage, a, 999),
            Err(SocialError::NotFound(_))
        ));
        assert!(matches!(
            request_connection(&storage, a, a),
            Err(SocialError::InvalidOperation(_))
        ));

        request_connection(&storage, a, b).unwrap();
        assert!(matches!(
            request_connection(&storage, a, b),
            Err(SocialError::Conflict(_))
        ));
        // Reverse direction is the same unordered pair.
        assert!(matches!(
            request_connection(&storage, b, a),
            Err(SocialError::Conflict(_))
        ));
        assert_eq!(notifications::list(&storage, a).unwrap().len(), 0);
    }

    #[test]
    fn test_request_conflicts_after_accept() {
        let (storage, a, b) = setup();
        let conn = request_connection(&storage, a, b).unwrap();
        accept_connection(&storage, b, conn.id).unwrap();

        assert!(matches!(
            request_connection(&storage, b, a),
            Err(SocialError::Conflict(_))
        ));
        assert!(matches!(
            request_connection(&storage, a, b),
            Err(SocialError::Conflict(_))
        ));
        assert_eq!(storage.counts().unwrap().connections, 1);
        assert_eq!(list_requests(&storage, a).unwrap().len(), 0);
    }

    #[test]
    fn test_accept_makes_graph_symmetric() {
        let (storage, a, b) = setup();
        let conn = request_connection(&storage, a, b).unwrap();

        assert!(matches!(
            accept_connection(&storage, a, conn.id),
            Err(SocialError::Unauthorized(_))
        ));

        let accepted = accept_connection(&storage, b, conn.id).unwrap();
        assert_eq!(accepted.status, ConnectionStatus::Accepted);
        assert_eq!(storage.list_user_connections(a).unwrap(), vec![b]);
        assert_eq!(storage.list_user_connections(b).unwrap(), vec![a]);

        let notes = notifications::list(&storage, a).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::ConnectionAccepted);
        assert_eq!(notes[0].content, "Bob accepted your connection request");
        assert_eq!(notes[0].sender.id, b);

        assert!(matches!(
            accept_connection(&storage, b, conn.id),
            Err(SocialError::InvalidOperation(_))
        ));
        assert_eq!(storage.list_user_connections(a).unwrap(), vec![b]);

        assert_eq!(list_connections(&storage, a).unwrap().len(), 1);
        assert_eq!(list_connections(&storage, b).unwrap().len(), 1);
        assert!(list_requests(&storage, b).unwrap().is_empty());
    }

    #[test]
    fn test_reject_deletes_without_notifying() {
        let (storage, a, b) = setup();
        let conn = request_connection(&storage, a, b).unwrap();

        assert!(matches!(
            reject_connection(&storage, a, conn.id),
            Err(SocialError::Unauthorized(_))
        ));
        reject_connection(&storage, b, conn.id).unwrap();

        assert!(storage.get_connection(conn.id).unwrap().is_none());
        assert!(notifications::list(&storage, a).unwrap().is_empty());
        assert!(storage.list_user_connections(b).unwrap().is_empty());
        assert!(matches!(
            reject_connection(&storage, b, conn.id),
            Err(SocialError::NotFound(_))
        ));

        // The pair is free again.
        request_connection(&storage, b, a).unwrap();
    }

    #[test]
    fn test_remove_retracts_both_sides() {
        let (storage, a, b) = setup();
        let c = make_user(&storage, "Cy");
        let conn = request_connection(&storage, a, b).unwrap();
        accept_connection(&storage, b, conn.id).unwrap();

        assert!(matches!(
            remove_connection(&storage, c, conn.id),
            Err(SocialError::Unauthorized(_))
        ));
        remove_connection(&storage, a, conn.id).unwrap();

        assert!(storage.get_connection(conn.id).unwrap().is_none());
        assert!(storage.list_user_connections(a).unwrap().is_empty());
        assert!(storage.list_user_connections(b).unwrap().is_empty());
        assert!(list_connections(&storage, b).unwrap().is_empty());
    }

    #[test]
    fn test_failed_accept_leaves_graph_unchanged() {
        let (storage, a, b) = setup();
        let conn = request_connection(&storage, a, b).unwrap();
        storage
            .raw()
            .execute_batch(&format!(
                "CREATE TRIGGER fail_accept BEFORE INSERT ON user_connections
                 WHEN NEW.user_id = {b}
                 BEGIN SELECT RAISE(ABORT, 'injected failure'); END;"
            ))
            .unwrap();

        let result = accept_connection(&storage, b, conn.id);
        assert!(matches!(result, Err(SocialError::Storage(_))));

        let row = storage.get_connection(conn.id).unwrap().unwrap();
        assert_eq!(row.status, ConnectionStatus::Pending);
        assert!(storage.list_user_connections(a).unwrap().is_empty());
        assert!(storage.list_user_connections(b).unwrap().is_empty());
        assert!(notifications::list(&storage, a).unwrap().is_empty());
        assert!(storage.list_pending_outbox().unwrap().is_empty());
    }

    #[test]
    fn test_failed_remove_leaves_graph_unchanged() {
        let (storage, a, b) = setup();
        let conn = request_connection(&storage, a, b).unwrap();
        accept_connection(&storage, b, conn.id).unwrap();
        storage
            .raw()
            .execute_batch(&format!(
                "CREATE TRIGGER fail_remove BEFORE DELETE ON user_connections
                 WHEN OLD.user_id = {b}
                 BEGIN SELECT RAISE(ABORT, 'injected failure'); END;"
            ))
            .unwrap();

        assert!(remove_connection(&storage, a, conn.id).is_err());
        assert!(storage.get_connection(conn.id).unwrap().is_some());
        assert_eq!(storage.list_user_connections(a).unwrap(), vec![b]);
        assert_eq!(storage.list_user_connections(b).unwrap(), vec![a]);
    }
}
