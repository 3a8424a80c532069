//! Concierge registers: the visitor log and the package log.
//!
//! Both are append-mostly lists of records that start open (visitor inside,
//! parcel waiting) and are closed exactly once (exit, pickup). The shared
//! behaviour lives in [`LogDao`], parameterized by a [`LogRecord`].

use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use chrono::{Duration, NaiveTime, Utc};
use futures::Stream;
use mongodb::Database;
use resident_house_db::models::{PackageEntry, VisitorEntry};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::info;

use super::base::{BaseDao, DaoError, DaoResult};
use crate::feed::{ChangeFeed, Topic, live_query};

/// Realtime visitor view size.
pub const RECENT_LIMIT: i64 = 50;

/// Widest real-world UTC offsets, in minutes.
const MAX_TZ_OFFSET_MINUTES: i32 = 14 * 60;

pub trait LogRecord: Serialize + DeserializeOwned + Clone + Unpin + Send + Sync + 'static {
    const COLLECTION: &'static str;
    const TOPIC: Topic;
    /// Timestamp set on creation; lists sort on it, newest first.
    const OPENED_AT: &'static str;
    /// Timestamp set by the one-way close transition.
    const CLOSED_AT: &'static str;
    const APARTMENT: &'static str;
    const SEARCH_FIELDS: &'static [&'static str];
}

impl LogRecord for VisitorEntry {
    const COLLECTION: &'static str = VisitorEntry::COLLECTION;
    const TOPIC: Topic = Topic::VisitorLog;
    const OPENED_AT: &'static str = "entry_time";
    const CLOSED_AT: &'static str = "exit_time";
    const APARTMENT: &'static str = "visiting_apartment";
    const SEARCH_FIELDS: &'static [&'static str] =
        &["visitor_name", "visiting_apartment", "visiting_resident"];
}

impl LogRecord for PackageEntry {
    const COLLECTION: &'static str = PackageEntry::COLLECTION;
    const TOPIC: Topic = Topic::PackageLog;
    const OPENED_AT: &'static str = "received_time";
    const CLOSED_AT: &'static str = "picked_up_time";
    const APARTMENT: &'static str = "apartment";
    const SEARCH_FIELDS: &'static [&'static str] = &["recipient_name", "apartment", "tracking_code"];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    #[default]
    All,
    Today,
    /// Visitors still inside, parcels still waiting.
    #[serde(alias = "active", alias = "pending")]
    Open,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogFilter {
    #[serde(default)]
    pub category: LogCategory,
    pub search: Option<String>,
    /// Caller's UTC offset, used to resolve "today".
    pub tz_offset_minutes: Option<i32>,
}

impl LogFilter {
    pub fn to_document<R: LogRecord>(&self, now: chrono::DateTime<Utc>) -> Document {
        let mut filter = Document::new();

        match self.category {
            LogCategory::All => {}
            LogCategory::Today => {
                let (start, end) = day_bounds(now, self.tz_offset_minutes.unwrap_or(0));
                filter.insert(
                    R::OPENED_AT,
                    doc! {
                        "$gte": DateTime::from_chrono(start),
                        "$lt": DateTime::from_chrono(end),
                    },
                );
            }
            LogCategory::Open => {
                filter.insert(R::CLOSED_AT, Bson::Null);
            }
        }

        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = escape_regex(term);
            let clauses: Vec<Document> = R::SEARCH_FIELDS
                .iter()
                .map(|field| doc! { *field: { "$regex": &pattern, "$options": "i" } })
                .collect();
            filter.insert("$or", clauses);
        }

        filter
    }
}

/// UTC start and end of the calendar day containing `now` at the given offset.
pub fn day_bounds(
    now: chrono::DateTime<Utc>,
    tz_offset_minutes: i32,
) -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
    let offset = Duration::minutes(
        tz_offset_minutes.clamp(-MAX_TZ_OFFSET_MINUTES, MAX_TZ_OFFSET_MINUTES) as i64,
    );
    let local_midnight = (now + offset).date_naive().and_time(NaiveTime::MIN).and_utc();
    let start = local_midnight - offset;
    (start, start + Duration::days(1))
}

pub fn escape_regex(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(
            c,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '#' | '-'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn newest_first<R: LogRecord>() -> Document {
    let opened_at = R::OPENED_AT;
    doc! { opened_at: -1, "_id": -1 }
}

fn required(field: &str, value: &str) -> DaoResult<()> {
    if value.trim().is_empty() {
        return Err(DaoError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct NewVisitorEntry {
    pub visitor_name: String,
    #[serde(default)]
    pub visitor_document: String,
    #[serde(default)]
    pub visitor_phone: String,
    #[serde(default)]
    pub visiting_apartment: String,
    #[serde(default)]
    pub visiting_resident: String,
    #[serde(default)]
    pub vehicle_plate: String,
    #[serde(default)]
    pub notes: String,
}

impl NewVisitorEntry {
    pub fn into_entry(self, concierge_id: ObjectId, concierge_name: &str) -> DaoResult<VisitorEntry> {
        required("visitor_name", &self.visitor_name)?;
        let now = DateTime::now();
        Ok(VisitorEntry {
            id: None,
            concierge_id,
            concierge_name: concierge_name.to_string(),
            visitor_name: self.visitor_name.trim().to_string(),
            visitor_document: self.visitor_document,
            visitor_phone: self.visitor_phone,
            visiting_apartment: self.visiting_apartment,
            visiting_resident: self.visiting_resident,
            entry_time: now,
            exit_time: None,
            vehicle_plate: self.vehicle_plate,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct NewPackageEntry {
    pub recipient_name: String,
    pub tracking_code: String,
    pub apartment: String,
    #[serde(default)]
    pub carrier: String,
    #[serde(default)]
    pub storage_location: String,
    #[serde(default)]
    pub notes: String,
}

impl NewPackageEntry {
    pub fn into_entry(self, concierge_id: ObjectId, concierge_name: &str) -> DaoResult<PackageEntry> {
        required("recipient_name", &self.recipient_name)?;
        required("tracking_code", &self.tracking_code)?;
        required("apartment", &self.apartment)?;
        let now = DateTime::now();
        Ok(PackageEntry {
            id: None,
            concierge_id,
            concierge_name: concierge_name.to_string(),
            recipient_name: self.recipient_name.trim().to_string(),
            tracking_code: self.tracking_code.trim().to_string(),
            apartment: self.apartment.trim().to_string(),
            carrier: self.carrier,
            storage_location: self.storage_location,
            received_time: now,
            picked_up_time: None,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Editable visitor fields after check-in.
#[derive(Debug, Default, Deserialize)]
pub struct VisitorDetailsUpdate {
    pub notes: Option<String>,
    pub vehicle_plate: Option<String>,
}

pub struct LogDao<R: LogRecord> {
    pub base: BaseDao<R>,
}

pub type VisitorLogDao = LogDao<VisitorEntry>;
pub type PackageLogDao = LogDao<PackageEntry>;

impl<R: LogRecord> LogDao<R> {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, R::COLLECTION),
        }
    }

    pub async fn create(&self, record: &R) -> DaoResult<R> {
        let id = self.base.insert_one(record).await?;
        info!(collection = R::COLLECTION, %id, "Log entry registered");
        self.base.find_by_id(id).await
    }

    pub async fn find(&self, id: ObjectId) -> DaoResult<R> {
        self.base.find_by_id(id).await
    }

    /// Filtered list, newest first.
    pub async fn list(&self, filter: &LogFilter) -> DaoResult<Vec<R>> {
        self.base
            .find_many(
                filter.to_document::<R>(Utc::now()),
                Some(newest_first::<R>()),
            )
            .await
    }

    pub async fn list_by_concierge(&self, concierge_id: ObjectId) -> DaoResult<Vec<R>> {
        self.base
            .find_many(
                doc! { "concierge_id": concierge_id },
                Some(newest_first::<R>()),
            )
            .await
    }

    pub async fn list_by_apartment(&self, apartment: &str) -> DaoResult<Vec<R>> {
        let apartment_field = R::APARTMENT;
        self.base
            .find_many(
                doc! { apartment_field: apartment },
                Some(newest_first::<R>()),
            )
            .await
    }

    /// Records the exit/pickup time. Applies once; closing a closed record is
    /// a [`DaoError::Conflict`].
    pub async fn close(&self, id: ObjectId) -> DaoResult<R> {
        let closed_at = R::CLOSED_AT;
        let closed = self
            .base
            .update_one(
                doc! { "_id": id, closed_at: Bson::Null },
                doc! { "$set": { closed_at: DateTime::now() } },
            )
            .await?;

        if !closed {
            return match self.base.find_one(doc! { "_id": id }).await? {
                Some(_) => Err(DaoError::Conflict(format!("{} already closed", id))),
                None => Err(DaoError::NotFound),
            };
        }

        info!(collection = R::COLLECTION, %id, "Log entry closed");
        self.base.find_by_id(id).await
    }

    pub async fn delete(&self, id: ObjectId) -> DaoResult<()> {
        if !self.base.delete_one(doc! { "_id": id }).await? {
            return Err(DaoError::NotFound);
        }
        Ok(())
    }

    /// Live view of the newest `limit` entries.
    pub fn subscribe_recent(
        &self,
        feed: &ChangeFeed,
        limit: i64,
    ) -> impl Stream<Item = DaoResult<Vec<R>>> + Send + 'static {
        let base = self.base.clone();
        live_query(feed, R::TOPIC, move || {
            let base = base.clone();
            async move {
                base.find_many_limited(doc! {}, Some(newest_first::<R>()), Some(limit))
                    .await
            }
        })
    }
}

impl LogDao<VisitorEntry> {
    pub async fn update_details(
        &self,
        id: ObjectId,
        update: &VisitorDetailsUpdate,
    ) -> DaoResult<VisitorEntry> {
        let mut set = Document::new();
        if let Some(notes) = &update.notes {
            set.insert("notes", notes.clone());
        }
        if let Some(plate) = &update.vehicle_plate {
            set.insert("vehicle_plate", plate.clone());
        }
        if !set.is_empty() && !self.base.update_by_id(id, doc! { "$set": set }).await? {
            return Err(DaoError::NotFound);
        }
        self.base.find_by_id(id).await
    }
}
