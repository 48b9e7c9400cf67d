//! Route handler modules for the linkhub REST API.

pub mod comments;
pub mod connections;
pub mod health;
pub mod messages;
pub mod notifications;
pub mod posts;
pub mod users;
