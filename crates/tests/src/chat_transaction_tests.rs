//! Sends with `database.transactions` on. Transactions need a replica set,
//! so these run only when RESIDENT__TEST__REPLICA_SET_URL points at one.

use crate::fixtures::test_app::TestApp;
use mongodb::bson::oid::ObjectId;
use resident_house_db::models::ThreadId;
use resident_house_services::dao::{
    base::DaoError,
    chat::{ChatDao, OutgoingMessage},
};
use serde_json::Value;

const REPLICA_SET_URL: &str = "RESIDENT__TEST__REPLICA_SET_URL";

async fn spawn_transactional() -> Option<TestApp> {
    let Ok(url) = std::env::var(REPLICA_SET_URL) else {
        eprintln!("{REPLICA_SET_URL} not set, skipping transactional send test");
        return None;
    };
    let app = TestApp::spawn_with_settings(move |s| {
        s.database.url = url;
        s.database.transactions = true;
    })
    .await;
    Some(app)
}

#[tokio::test]
async fn transactional_send_updates_summary_and_unread_count() {
    let Some(app) = spawn_transactional().await else {
        return;
    };
    let b = app.seed_building().await;

    let chat_id = app
        .open_chat(&b.resident_a.access_token, &b.resident_b.id)
        .await;
    app.send_chat_message(&b.resident_a.access_token, &chat_id, "hola")
        .await;
    app.send_chat_message(&b.resident_a.access_token, &chat_id, "sigues?")
        .await;

    let resp = app
        .auth_get("/api/chat", &b.resident_b.access_token)
        .send()
        .await
        .unwrap();
    let threads: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0]["last_message"], "sigues?");
    assert_eq!(threads[0]["unread_count"], 2);

    let resp = app
        .auth_get(
            &format!("/api/chat/{}/message", chat_id),
            &b.resident_b.access_token,
        )
        .send()
        .await
        .unwrap();
    let messages: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(messages.len(), 2);
}

#[tokio::test]
async fn transactional_send_to_missing_thread_leaves_no_message() {
    let Some(app) = spawn_transactional().await else {
        return;
    };
    let dao = ChatDao::new(&app.db, true);

    let sender = ObjectId::new().to_hex();
    let receiver = ObjectId::new().to_hex();
    let thread_id = ThreadId::for_pair(&sender, &receiver).unwrap();

    // The thread was never created, so the summary update matches nothing
    // and the message insert is rolled back with it.
    let result = dao
        .send_message(
            &thread_id,
            OutgoingMessage {
                sender_id: sender,
                receiver_id: receiver,
                text: "nadie".to_string(),
                sender_name: "Fantasma".to_string(),
                sender_photo: None,
                image_url: None,
            },
        )
        .await;
    assert!(matches!(result, Err(DaoError::NotFound)));
    assert!(dao.list_messages(&thread_id).await.unwrap().is_empty());
}
