//! linkhub-web: REST server for profiles, posts, connections, messages and
//! notifications, persisted in SQLite.

#[tokio::main]
async fn main() {
    linkhub::web::run().await;
}
