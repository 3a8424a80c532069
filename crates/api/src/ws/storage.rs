use bson::oid::ObjectId;
use dashmap::DashMap;

/// Tracks open WebSocket connections by user ID.
/// Each user can have multiple connections (multiple tabs/devices).
pub struct WsStorage {
    connections: DashMap<ObjectId, Vec<String>>,
}

impl WsStorage {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn add(&self, user_id: ObjectId, connection_id: String) {
        self.connections
            .entry(user_id)
            .or_default()
            .push(connection_id);
    }

    pub fn remove(&self, user_id: &ObjectId, connection_id: &str) {
        self.connections
            .remove_if_mut(user_id, |_, ids| {
                ids.retain(|id| id != connection_id);
                ids.is_empty()
            });
    }

    pub fn connection_count(&self) -> usize {
        self.connections
            .iter()
            .map(|r| r.value().len())
            .sum()
    }
}

impl Default for WsStorage {
    fn default() -> Self {
        Self::new()
    }
}
