use std::collections::HashSet;

use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use mongodb::Database;
use resident_house_db::models::{Role, User};
use serde::Deserialize;
use tracing::warn;

use super::base::{BaseDao, DaoError, DaoResult};

pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub password_hash: String,
    pub phone_number: String,
    pub address: String,
    pub apartment_number: String,
}

/// Editable profile fields. `None` leaves the stored value untouched.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub apartment_number: Option<String>,
    pub photo_url: Option<String>,
}

impl ProfileUpdate {
    /// Builds the `$set` body. A provided display name is trimmed and must not
    /// end up empty, whichever caller the update comes from.
    fn to_set_document(&self) -> DaoResult<Document> {
        let display_name = match self.display_name.as_deref().map(str::trim) {
            Some("") => {
                return Err(DaoError::Validation(
                    "display_name must not be empty".to_string(),
                ));
            }
            trimmed => trimmed.map(str::to_string),
        };
        let mut set = Document::new();
        let fields = [
            ("display_name", &display_name),
            ("phone_number", &self.phone_number),
            ("address", &self.address),
            ("apartment_number", &self.apartment_number),
            ("photo_url", &self.photo_url),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                set.insert(key, value.clone());
            }
        }
        Ok(set)
    }
}

pub struct UserDao {
    pub base: BaseDao<User>,
}

impl UserDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, User::COLLECTION),
        }
    }

    /// Creates the profile document mirrored from a new credential.
    /// New users start online, as registration signs them in.
    pub async fn create(&self, new_user: NewUser) -> DaoResult<User> {
        let now = DateTime::now();
        let user = User {
            id: None,
            email: new_user.email.to_lowercase(),
            display_name: new_user.display_name,
            role: new_user.role,
            password_hash: Some(new_user.password_hash),
            phone_number: new_user.phone_number,
            address: new_user.address,
            apartment_number: new_user.apartment_number,
            photo_url: String::new(),
            is_online: true,
            last_seen: Some(now),
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&user).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> DaoResult<User> {
        self.base
            .find_one(doc! { "email": email.to_lowercase() })
            .await?
            .ok_or(DaoError::NotFound)
    }

    /// All users ordered by display name, optionally narrowed to one role.
    pub async fn list(&self, role: Option<Role>) -> DaoResult<Vec<User>> {
        let filter = match role {
            Some(role) => doc! { "role": role.as_str() },
            None => doc! {},
        };
        self.base
            .find_many(filter, Some(doc! { "display_name": 1 }))
            .await
    }

    /// Everyone the caller can start a chat with. Read path: a failed query
    /// is logged and yields an empty directory.
    pub async fn contacts(&self, user_id: ObjectId) -> Vec<User> {
        match self
            .base
            .find_many(
                doc! { "_id": { "$ne": user_id } },
                Some(doc! { "display_name": 1 }),
            )
            .await
        {
            Ok(users) => dedup_by_id(users),
            Err(e) => {
                warn!(?user_id, %e, "Failed to load contacts");
                Vec::new()
            }
        }
    }

    pub async fn update_presence(&self, user_id: ObjectId, is_online: bool) -> DaoResult<bool> {
        self.base
            .update_by_id(
                user_id,
                doc! {
                    "$set": {
                        "is_online": is_online,
                        "last_seen": DateTime::now(),
                    }
                },
            )
            .await
    }

    pub async fn update_profile(
        &self,
        user_id: ObjectId,
        update: &ProfileUpdate,
    ) -> DaoResult<User> {
        let set = update.to_set_document()?;
        if !set.is_empty() {
            let matched = self.base.update_by_id(user_id, doc! { "$set": set }).await?;
            if !matched {
                return Err(DaoError::NotFound);
            }
        }
        self.base.find_by_id(user_id).await
    }

    /// Swaps the password hash only while `current` is still the stored one,
    /// so two requests holding the same reset token cannot both apply.
    pub async fn replace_password_hash(
        &self,
        user_id: ObjectId,
        current: Option<&str>,
        password_hash: String,
    ) -> DaoResult<bool> {
        let current = current.map_or(Bson::Null, |hash| Bson::String(hash.to_string()));
        self.base
            .update_one(
                doc! { "_id": user_id, "password_hash": current },
                doc! { "$set": { "password_hash": password_hash } },
            )
            .await
    }
}

fn dedup_by_id(users: Vec<User>) -> Vec<User> {
    let mut seen = HashSet::new();
    users
        .into_iter()
        .filter(|u| seen.insert(u.id))
        .collect()
}
