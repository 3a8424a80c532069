use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{BulletinPost, ChatThread, Message, PackageEntry, User, VisitorEntry};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Users
    create_indexes(
        db,
        User::COLLECTION,
        vec![
            index_unique(bson::doc! { "email": 1 }),
            index(bson::doc! { "role": 1, "display_name": 1 }),
            index(bson::doc! { "display_name": 1 }),
        ],
    )
    .await?;

    // Chats (the _id is the sorted participant pair, no extra unique index needed)
    create_indexes(
        db,
        ChatThread::COLLECTION,
        vec![index(bson::doc! { "participants": 1, "last_message_time": -1 })],
    )
    .await?;

    // Messages
    create_indexes(
        db,
        Message::COLLECTION,
        vec![index(bson::doc! { "chat_id": 1, "created_at": 1 })],
    )
    .await?;

    // Visitor log
    create_indexes(
        db,
        VisitorEntry::COLLECTION,
        vec![
            index(bson::doc! { "entry_time": -1 }),
            index(bson::doc! { "concierge_id": 1, "entry_time": -1 }),
            index(bson::doc! { "visiting_apartment": 1, "entry_time": -1 }),
            index(bson::doc! { "exit_time": 1, "entry_time": -1 }),
        ],
    )
    .await?;

    // Package log
    create_indexes(
        db,
        PackageEntry::COLLECTION,
        vec![
            index(bson::doc! { "received_time": -1 }),
            index(bson::doc! { "picked_up_time": 1, "received_time": -1 }),
            index(bson::doc! { "apartment": 1, "received_time": -1 }),
        ],
    )
    .await?;

    // Bulletin board
    create_indexes(
        db,
        BulletinPost::COLLECTION,
        vec![
            index(bson::doc! { "created_at": -1 }),
            index(bson::doc! { "author_id": 1, "created_at": -1 }),
        ],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
