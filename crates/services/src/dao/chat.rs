use bson::{doc, oid::ObjectId, DateTime, Document};
use futures::Stream;
use mongodb::{Client, Database};
use resident_house_db::models::{ChatThread, Message, ThreadId, ThreadIdError};
use tracing::{debug, info, warn};

use super::base::{BaseDao, DaoError, DaoResult};
use crate::feed::{ChangeFeed, Topic, live_query};

impl From<ThreadIdError> for DaoError {
    fn from(err: ThreadIdError) -> Self {
        DaoError::InvalidReference(err.to_string())
    }
}

pub struct OutgoingMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub sender_name: String,
    pub sender_photo: Option<String>,
    pub image_url: Option<String>,
}

pub struct ChatDao {
    pub threads: BaseDao<ChatThread>,
    pub messages: BaseDao<Message>,
    client: Client,
    transactional: bool,
}

impl ChatDao {
    pub fn new(db: &Database, transactional: bool) -> Self {
        Self {
            threads: BaseDao::new(db, ChatThread::COLLECTION),
            messages: BaseDao::without_update_stamp(db, Message::COLLECTION),
            client: db.client().clone(),
            transactional,
        }
    }

    /// Resolves the thread for an unordered pair, creating it on first use.
    pub async fn get_or_create_thread(&self, a: &str, b: &str) -> DaoResult<ChatThread> {
        let thread_id = ThreadId::for_pair(a, b)?;

        if let Some(thread) = self.threads.find_one(doc! { "_id": thread_id.as_str() }).await? {
            return Ok(thread);
        }

        let thread = ChatThread::new(&thread_id);
        match self.threads.insert_with_id(&thread).await {
            Ok(()) => {
                info!(chat_id = %thread_id, "Created chat thread");
                Ok(thread)
            }
            // Lost a creation race; the other writer's document is the same thread.
            Err(DaoError::DuplicateKey(_)) => self.threads.find_by_id(thread_id.as_str()).await,
            Err(e) => Err(e),
        }
    }

    /// Appends a message, then refreshes the thread summary and bumps the
    /// receiver's unread counter.
    pub async fn send_message(
        &self,
        thread_id: &ThreadId,
        outgoing: OutgoingMessage,
    ) -> DaoResult<Message> {
        if thread_id.peer_of(&outgoing.sender_id) != Some(outgoing.receiver_id.as_str()) {
            return Err(DaoError::InvalidReference(format!(
                "{} and {} are not the participants of {}",
                outgoing.sender_id, outgoing.receiver_id, thread_id
            )));
        }

        let now = DateTime::now();
        let mut message = Message {
            id: None,
            chat_id: thread_id.to_string(),
            sender_id: outgoing.sender_id,
            receiver_id: outgoing.receiver_id,
            text: outgoing.text,
            image_url: outgoing.image_url,
            sender_name: outgoing.sender_name,
            sender_photo: outgoing.sender_photo.unwrap_or_default(),
            read: false,
            created_at: now,
        };

        let summary = summary_update(&message);
        let id = if self.transactional {
            self.write_in_transaction(thread_id, &message, summary).await?
        } else {
            self.write_sequentially(thread_id, &message, summary).await?
        };

        message.id = Some(id);
        debug!(chat_id = %thread_id, message_id = %id, "Message sent");
        Ok(message)
    }

    async fn write_sequentially(
        &self,
        thread_id: &ThreadId,
        message: &Message,
        summary: Document,
    ) -> DaoResult<ObjectId> {
        let id = self.messages.insert_one(message).await?;
        // A failure past this point leaves the message stored with a stale
        // thread summary.
        let matched = self
            .threads
            .collection()
            .update_one(doc! { "_id": thread_id.as_str() }, summary)
            .await?
            .matched_count
            > 0;
        if !matched {
            warn!(chat_id = %thread_id, "Message stored for a thread that does not exist");
        }
        Ok(id)
    }

    async fn write_in_transaction(
        &self,
        thread_id: &ThreadId,
        message: &Message,
        summary: Document,
    ) -> DaoResult<ObjectId> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        let inserted = self
            .messages
            .collection()
            .insert_one(message)
            .session(&mut session)
            .await?;
        let id = inserted.inserted_id.as_object_id().ok_or_else(|| {
            DaoError::Validation("inserted_id is not an ObjectId".to_string())
        })?;

        let updated = self
            .threads
            .collection()
            .update_one(doc! { "_id": thread_id.as_str() }, summary)
            .session(&mut session)
            .await?;
        if updated.matched_count == 0 {
            session.abort_transaction().await?;
            return Err(DaoError::NotFound);
        }

        session.commit_transaction().await?;
        Ok(id)
    }

    /// Messages of a thread, oldest first.
    pub async fn list_messages(&self, thread_id: &ThreadId) -> DaoResult<Vec<Message>> {
        self.messages
            .find_many(
                doc! { "chat_id": thread_id.as_str() },
                Some(doc! { "created_at": 1, "_id": 1 }),
            )
            .await
    }

    /// Live view of a thread: the full ordered message list, re-emitted after
    /// every change. Dropping the stream stops it.
    pub fn subscribe_messages(
        &self,
        feed: &ChangeFeed,
        thread_id: ThreadId,
    ) -> impl Stream<Item = DaoResult<Vec<Message>>> + Send + 'static {
        let messages = self.messages.clone();
        let topic = Topic::Chat(thread_id.to_string());
        live_query(feed, topic, move || {
            let messages = messages.clone();
            let chat_id = thread_id.to_string();
            async move {
                messages
                    .find_many(
                        doc! { "chat_id": chat_id },
                        Some(doc! { "created_at": 1, "_id": 1 }),
                    )
                    .await
            }
        })
    }

    /// Resets `user_id`'s unread counter. Per-message read flags are left as
    /// they are. Failures are logged, not returned.
    pub async fn mark_read(&self, thread_id: &ThreadId, user_id: &str) {
        let mut set = Document::new();
        set.insert(format!("unread_count.{}", user_id), 0_i64);
        if let Err(e) = self
            .threads
            .update_by_id(thread_id.as_str(), doc! { "$set": set })
            .await
        {
            warn!(chat_id = %thread_id, user_id, %e, "Failed to reset unread counter");
        }
    }

    /// Flags one message as read. The only mutation a stored message accepts.
    pub async fn mark_message_read(
        &self,
        thread_id: &ThreadId,
        message_id: ObjectId,
    ) -> DaoResult<()> {
        let matched = self
            .messages
            .update_one(
                doc! { "_id": message_id, "chat_id": thread_id.as_str() },
                doc! { "$set": { "read": true } },
            )
            .await?;
        if !matched {
            return Err(DaoError::NotFound);
        }
        Ok(())
    }

    /// Threads the user takes part in, most recent activity first. Failures
    /// are logged and yield an empty list.
    pub async fn list_threads_for_user(&self, user_id: &str) -> Vec<ChatThread> {
        match self
            .threads
            .find_many(
                doc! { "participants": user_id },
                Some(doc! { "last_message_time": -1 }),
            )
            .await
        {
            Ok(mut threads) => {
                order_by_recent_activity(&mut threads);
                threads
            }
            Err(e) => {
                warn!(user_id, %e, "Failed to list chat threads");
                Vec::new()
            }
        }
    }
}

fn summary_update(message: &Message) -> Document {
    let mut inc = Document::new();
    inc.insert(format!("unread_count.{}", message.receiver_id), 1_i64);
    doc! {
        "$set": {
            "last_message": &message.text,
            "last_message_time": message.created_at,
            "updated_at": message.created_at,
        },
        "$inc": inc,
    }
}

/// Sorts descending by last-message time. Stable, so ties keep query order.
pub fn order_by_recent_activity(threads: &mut [ChatThread]) {
    threads.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
}
