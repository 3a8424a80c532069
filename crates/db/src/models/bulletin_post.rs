use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::user::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulletinPost {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    /// Object store key backing `image_url`, used for cleanup on delete.
    pub image_key: Option<String>,
    pub author_id: ObjectId,
    pub author_name: String,
    #[serde(default)]
    pub author_photo: String,
    pub author_role: Role,
    #[serde(default)]
    pub category: Category,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Lost,
    Found,
    Event,
    #[default]
    Announcement,
    Other,
}

impl BulletinPost {
    pub const COLLECTION: &'static str = "anuncios";
}
