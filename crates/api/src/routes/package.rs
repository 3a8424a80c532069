use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use resident_house_db::models::PackageEntry;
use resident_house_services::{Topic, dao::log::NewPackageEntry};
use serde::Serialize;

use super::{format_time, parse_object_id, visitor::LogQuery};
use crate::{error::ApiError, extractors::auth::ConciergeUser, state::AppState};

#[derive(Debug, Serialize)]
pub struct PackageResponse {
    pub id: String,
    pub concierge_id: String,
    pub concierge_name: String,
    pub recipient_name: String,
    pub tracking_code: String,
    pub apartment: String,
    pub carrier: String,
    pub storage_location: String,
    pub received_time: String,
    pub picked_up_time: Option<String>,
    pub notes: String,
    pub pending: bool,
}

pub fn to_response(p: PackageEntry) -> PackageResponse {
    PackageResponse {
        pending: p.is_pending(),
        id: p.id.map(|id| id.to_hex()).unwrap_or_default(),
        concierge_id: p.concierge_id.to_hex(),
        concierge_name: p.concierge_name,
        recipient_name: p.recipient_name,
        tracking_code: p.tracking_code,
        apartment: p.apartment,
        carrier: p.carrier,
        storage_location: p.storage_location,
        received_time: format_time(p.received_time),
        picked_up_time: p.picked_up_time.map(format_time),
        notes: p.notes,
    }
}

pub async fn list(
    State(state): State<AppState>,
    _concierge: ConciergeUser,
    Query(params): Query<LogQuery>,
) -> Result<Json<Vec<PackageResponse>>, ApiError> {
    let entries = if let Some(apartment) = &params.apartment {
        state.packages.list_by_apartment(apartment).await?
    } else if let Some(concierge_id) = &params.concierge_id {
        let cid = parse_object_id(concierge_id, "concierge_id")?;
        state.packages.list_by_concierge(cid).await?
    } else {
        state.packages.list(&params.filter()).await?
    };
    Ok(Json(entries.into_iter().map(to_response).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    ConciergeUser(auth): ConciergeUser,
    Json(body): Json<NewPackageEntry>,
) -> Result<(StatusCode, Json<PackageResponse>), ApiError> {
    let concierge = state.users.base.find_by_id(auth.user_id).await?;
    let entry = body.into_entry(auth.user_id, &concierge.display_name)?;
    let entry = state.packages.create(&entry).await?;

    state.feed.notify(&Topic::PackageLog);
    Ok((StatusCode::CREATED, Json(to_response(entry))))
}

pub async fn get(
    State(state): State<AppState>,
    _concierge: ConciergeUser,
    Path(entry_id): Path<String>,
) -> Result<Json<PackageResponse>, ApiError> {
    let id = parse_object_id(&entry_id, "entry_id")?;
    let entry = state.packages.find(id).await?;
    Ok(Json(to_response(entry)))
}

/// Records the pickup. Only once.
pub async fn register_pickup(
    State(state): State<AppState>,
    _concierge: ConciergeUser,
    Path(entry_id): Path<String>,
) -> Result<Json<PackageResponse>, ApiError> {
    let id = parse_object_id(&entry_id, "entry_id")?;
    let entry = state.packages.close(id).await?;

    state.feed.notify(&Topic::PackageLog);
    Ok(Json(to_response(entry)))
}

pub async fn delete(
    State(state): State<AppState>,
    _concierge: ConciergeUser,
    Path(entry_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_object_id(&entry_id, "entry_id")?;
    state.packages.delete(id).await?;

    state.feed.notify(&Topic::PackageLog);
    Ok(StatusCode::NO_CONTENT)
}
