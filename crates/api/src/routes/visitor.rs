use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use resident_house_db::models::VisitorEntry;
use resident_house_services::{
    Topic,
    dao::log::{LogCategory, LogFilter, NewVisitorEntry, VisitorDetailsUpdate},
};
use serde::{Deserialize, Serialize};

use super::{format_time, parse_object_id};
use crate::{error::ApiError, extractors::auth::ConciergeUser, state::AppState};

/// Query string of the log listings. `apartment` and `concierge_id` select a
/// plain listing and take precedence over the category/search filter.
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub category: LogCategory,
    pub search: Option<String>,
    pub tz_offset_minutes: Option<i32>,
    pub apartment: Option<String>,
    pub concierge_id: Option<String>,
}

impl LogQuery {
    pub fn filter(&self) -> LogFilter {
        LogFilter {
            category: self.category,
            search: self.search.clone(),
            tz_offset_minutes: self.tz_offset_minutes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VisitorResponse {
    pub id: String,
    pub concierge_id: String,
    pub concierge_name: String,
    pub visitor_name: String,
    pub visitor_document: String,
    pub visitor_phone: String,
    pub visiting_apartment: String,
    pub visiting_resident: String,
    pub entry_time: String,
    pub exit_time: Option<String>,
    pub vehicle_plate: String,
    pub notes: String,
    pub inside: bool,
}

pub fn to_response(v: VisitorEntry) -> VisitorResponse {
    VisitorResponse {
        inside: v.is_open(),
        id: v.id.map(|id| id.to_hex()).unwrap_or_default(),
        concierge_id: v.concierge_id.to_hex(),
        concierge_name: v.concierge_name,
        visitor_name: v.visitor_name,
        visitor_document: v.visitor_document,
        visitor_phone: v.visitor_phone,
        visiting_apartment: v.visiting_apartment,
        visiting_resident: v.visiting_resident,
        entry_time: format_time(v.entry_time),
        exit_time: v.exit_time.map(format_time),
        vehicle_plate: v.vehicle_plate,
        notes: v.notes,
    }
}

pub async fn list(
    State(state): State<AppState>,
    _concierge: ConciergeUser,
    Query(params): Query<LogQuery>,
) -> Result<Json<Vec<VisitorResponse>>, ApiError> {
    let entries = if let Some(apartment) = &params.apartment {
        state.visitors.list_by_apartment(apartment).await?
    } else if let Some(concierge_id) = &params.concierge_id {
        let cid = parse_object_id(concierge_id, "concierge_id")?;
        state.visitors.list_by_concierge(cid).await?
    } else {
        state.visitors.list(&params.filter()).await?
    };
    Ok(Json(entries.into_iter().map(to_response).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    ConciergeUser(auth): ConciergeUser,
    Json(body): Json<NewVisitorEntry>,
) -> Result<(StatusCode, Json<VisitorResponse>), ApiError> {
    let concierge = state.users.base.find_by_id(auth.user_id).await?;
    let entry = body.into_entry(auth.user_id, &concierge.display_name)?;
    let entry = state.visitors.create(&entry).await?;

    state.feed.notify(&Topic::VisitorLog);
    Ok((StatusCode::CREATED, Json(to_response(entry))))
}

pub async fn get(
    State(state): State<AppState>,
    _concierge: ConciergeUser,
    Path(entry_id): Path<String>,
) -> Result<Json<VisitorResponse>, ApiError> {
    let id = parse_object_id(&entry_id, "entry_id")?;
    let entry = state.visitors.find(id).await?;
    Ok(Json(to_response(entry)))
}

pub async fn update(
    State(state): State<AppState>,
    _concierge: ConciergeUser,
    Path(entry_id): Path<String>,
    Json(body): Json<VisitorDetailsUpdate>,
) -> Result<Json<VisitorResponse>, ApiError> {
    let id = parse_object_id(&entry_id, "entry_id")?;
    let entry = state.visitors.update_details(id, &body).await?;

    state.feed.notify(&Topic::VisitorLog);
    Ok(Json(to_response(entry)))
}

/// Records the visitor leaving. Only once.
pub async fn register_exit(
    State(state): State<AppState>,
    _concierge: ConciergeUser,
    Path(entry_id): Path<String>,
) -> Result<Json<VisitorResponse>, ApiError> {
    let id = parse_object_id(&entry_id, "entry_id")?;
    let entry = state.visitors.close(id).await?;

    state.feed.notify(&Topic::VisitorLog);
    Ok(Json(to_response(entry)))
}

pub async fn delete(
    State(state): State<AppState>,
    _concierge: ConciergeUser,
    Path(entry_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_object_id(&entry_id, "entry_id")?;
    state.visitors.delete(id).await?;

    state.feed.notify(&Topic::VisitorLog);
    Ok(StatusCode::NO_CONTENT)
}
