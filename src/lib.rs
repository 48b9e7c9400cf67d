pub mod connections;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod notifications;
pub mod posts;
pub mod storage;
pub mod users;
pub mod web;
