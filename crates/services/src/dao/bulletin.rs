use bson::{doc, oid::ObjectId, DateTime, Document};
use futures::Stream;
use mongodb::Database;
use resident_house_db::models::{BulletinPost, Category, User};
use serde::Deserialize;
use tracing::{info, warn};

use super::base::{BaseDao, DaoError, DaoResult};
use crate::feed::{ChangeFeed, Topic, live_query};
use crate::storage::{BULLETIN_IMAGE_PREFIX, ObjectStore, validate_key};

#[derive(Debug, Deserialize)]
pub struct NewBulletinPost {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: Category,
    /// Key returned by the image upload endpoint.
    pub image_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BulletinUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
}

impl BulletinUpdate {
    fn to_set_document(&self) -> DaoResult<Document> {
        let mut set = Document::new();
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(DaoError::Validation("title must not be empty".to_string()));
            }
            set.insert("title", title.trim());
        }
        if let Some(description) = &self.description {
            set.insert("description", description.clone());
        }
        if let Some(category) = self.category {
            set.insert("category", bson::to_bson(&category)?);
        }
        Ok(set)
    }
}

pub struct BulletinDao {
    pub base: BaseDao<BulletinPost>,
}

impl BulletinDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, BulletinPost::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        author: &User,
        post: NewBulletinPost,
        store: &dyn ObjectStore,
    ) -> DaoResult<BulletinPost> {
        if post.title.trim().is_empty() {
            return Err(DaoError::Validation("title is required".to_string()));
        }
        if let Some(key) = &post.image_key {
            if !key.starts_with(BULLETIN_IMAGE_PREFIX) || validate_key(key).is_err() {
                return Err(DaoError::Validation(format!("{} is not a bulletin image", key)));
            }
        }
        let author_id = author
            .id
            .ok_or_else(|| DaoError::InvalidReference("author has no id".to_string()))?;

        let now = DateTime::now();
        let record = BulletinPost {
            id: None,
            title: post.title.trim().to_string(),
            description: post.description,
            image_url: post.image_key.as_deref().map(|key| store.url_for(key)),
            image_key: post.image_key,
            author_id,
            author_name: author.display_name.clone(),
            author_photo: author.photo_url.clone(),
            author_role: author.role,
            category: post.category,
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&record).await?;
        info!(%id, %author_id, "Bulletin post created");
        self.base.find_by_id(id).await
    }

    pub async fn find(&self, id: ObjectId) -> DaoResult<BulletinPost> {
        self.base.find_by_id(id).await
    }

    /// Every post, newest first.
    pub async fn list_all(&self) -> DaoResult<Vec<BulletinPost>> {
        self.base
            .find_many(doc! {}, Some(doc! { "created_at": -1, "_id": -1 }))
            .await
    }

    pub async fn list_by_author(&self, author_id: ObjectId) -> DaoResult<Vec<BulletinPost>> {
        self.base
            .find_many(
                doc! { "author_id": author_id },
                Some(doc! { "created_at": -1, "_id": -1 }),
            )
            .await
    }

    pub async fn update(&self, id: ObjectId, update: &BulletinUpdate) -> DaoResult<BulletinPost> {
        let set = update.to_set_document()?;
        if !set.is_empty() && !self.base.update_by_id(id, doc! { "$set": set }).await? {
            return Err(DaoError::NotFound);
        }
        self.base.find_by_id(id).await
    }

    /// Removes the post, then its image. An image that cannot be removed is
    /// logged and left behind; the post is gone either way.
    pub async fn delete(&self, id: ObjectId, store: &dyn ObjectStore) -> DaoResult<()> {
        let post = self.base.find_by_id(id).await?;
        if !self.base.delete_one(doc! { "_id": id }).await? {
            return Err(DaoError::NotFound);
        }
        info!(%id, "Bulletin post deleted");

        if let Some(key) = post.image_key {
            if let Err(e) = store.delete(&key).await {
                warn!(%id, key = %key, %e, "Failed to remove bulletin image");
            }
        }
        Ok(())
    }

    pub fn subscribe(
        &self,
        feed: &ChangeFeed,
    ) -> impl Stream<Item = DaoResult<Vec<BulletinPost>>> + Send + 'static {
        let base = self.base.clone();
        live_query(feed, Topic::Bulletin, move || {
            let base = base.clone();
            async move {
                base.find_many(doc! {}, Some(doc! { "created_at": -1, "_id": -1 }))
                    .await
            }
        })
    }
}
