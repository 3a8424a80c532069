use std::collections::HashMap;
use std::fmt;

use bson::DateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A two-party conversation. The document id is always the [`ThreadId`]
/// derived from its two participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatThread {
    #[serde(rename = "_id")]
    pub id: String,
    pub participants: Vec<String>,
    #[serde(default)]
    pub last_message: String,
    pub last_message_time: DateTime,
    #[serde(default)]
    pub unread_count: HashMap<String, i64>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl ChatThread {
    pub const COLLECTION: &'static str = "chats";

    pub fn new(thread_id: &ThreadId) -> Self {
        let now = DateTime::now();
        let (a, b) = thread_id.participants();
        let unread_count = HashMap::from([(a.to_string(), 0), (b.to_string(), 0)]);
        Self {
            id: thread_id.to_string(),
            participants: vec![a.to_string(), b.to_string()],
            last_message: String::new(),
            last_message_time: now,
            unread_count,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn unread_for(&self, user_id: &str) -> i64 {
        self.unread_count.get(user_id).copied().unwrap_or(0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThreadIdError {
    #[error("thread id is empty")]
    Empty,
    #[error("thread id contains an unresolved placeholder: {0}")]
    Placeholder(String),
    #[error("thread id must join exactly two participant ids: {0}")]
    Shape(String),
    #[error("thread participants are not in sorted order: {0}")]
    Unsorted(String),
    #[error("a thread needs two distinct participants")]
    SameParticipant,
    #[error("participant id must be ASCII alphanumeric: {0}")]
    Participant(String),
}

/// Deterministic identifier of a two-party thread: the two participant ids
/// sorted ascending and joined with [`ThreadId::SEPARATOR`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadId(String);

const PLACEHOLDERS: [&str; 2] = ["undefined", "null"];

impl ThreadId {
    pub const SEPARATOR: char = '_';

    /// Derives the thread id for an unordered pair of user ids.
    pub fn for_pair(a: &str, b: &str) -> Result<Self, ThreadIdError> {
        check_participant(a)?;
        check_participant(b)?;
        if a == b {
            return Err(ThreadIdError::SameParticipant);
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        Ok(Self(format!("{}{}{}", first, Self::SEPARATOR, second)))
    }

    /// Validates an id received from a client. Only ids that [`for_pair`]
    /// could have produced are accepted.
    ///
    /// [`for_pair`]: ThreadId::for_pair
    pub fn parse(raw: &str) -> Result<Self, ThreadIdError> {
        if raw.is_empty() {
            return Err(ThreadIdError::Empty);
        }
        if PLACEHOLDERS.iter().any(|p| raw.contains(p)) {
            return Err(ThreadIdError::Placeholder(raw.to_string()));
        }
        let mut parts = raw.split(Self::SEPARATOR);
        let (a, b) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), None) if !a.is_empty() && !b.is_empty() => (a, b),
            _ => return Err(ThreadIdError::Shape(raw.to_string())),
        };
        check_participant(a)?;
        check_participant(b)?;
        if a == b {
            return Err(ThreadIdError::SameParticipant);
        }
        if a > b {
            return Err(ThreadIdError::Unsorted(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn participants(&self) -> (&str, &str) {
        // Construction guarantees exactly one separator.
        self.0
            .split_once(Self::SEPARATOR)
            .unwrap_or((self.0.as_str(), ""))
    }

    pub fn contains(&self, user_id: &str) -> bool {
        let (a, b) = self.participants();
        a == user_id || b == user_id
    }

    /// The participant that is not `user_id`, if `user_id` is in the thread.
    pub fn peer_of(&self, user_id: &str) -> Option<&str> {
        match self.participants() {
            (a, b) if a == user_id => Some(b),
            (a, b) if b == user_id => Some(a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn check_participant(id: &str) -> Result<(), ThreadIdError> {
    if id.is_empty() {
        return Err(ThreadIdError::Empty);
    }
    if PLACEHOLDERS.contains(&id) {
        return Err(ThreadIdError::Placeholder(id.to_string()));
    }
    if id.contains(ThreadId::SEPARATOR) {
        return Err(ThreadIdError::Shape(id.to_string()));
    }
    // Participant ids become field names in `unread_count`; `.` or `$` would
    // turn the counter into a nested path or an operator.
    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ThreadIdError::Participant(id.to_string()));
    }
    Ok(())
}
