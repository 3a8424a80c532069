use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// One visitor check-in registered by a concierge ("bitácora").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitorEntry {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub concierge_id: ObjectId,
    pub concierge_name: String,
    pub visitor_name: String,
    /// National id card or other identity document number.
    #[serde(default)]
    pub visitor_document: String,
    #[serde(default)]
    pub visitor_phone: String,
    #[serde(default)]
    pub visiting_apartment: String,
    #[serde(default)]
    pub visiting_resident: String,
    pub entry_time: DateTime,
    pub exit_time: Option<DateTime>,
    #[serde(default)]
    pub vehicle_plate: String,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl VisitorEntry {
    pub const COLLECTION: &'static str = "bitacora";

    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }
}
