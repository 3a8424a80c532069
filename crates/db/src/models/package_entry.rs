use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageEntry {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub concierge_id: ObjectId,
    pub concierge_name: String,
    pub recipient_name: String,
    pub tracking_code: String,
    pub apartment: String,
    #[serde(default)]
    pub carrier: String,
    /// Where the parcel is kept until pickup (storeroom, locker, ...).
    #[serde(default)]
    pub storage_location: String,
    pub received_time: DateTime,
    pub picked_up_time: Option<DateTime>,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl PackageEntry {
    pub const COLLECTION: &'static str = "packetes";

    pub fn is_pending(&self) -> bool {
        self.picked_up_time.is_none()
    }
}
