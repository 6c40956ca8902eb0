use super::{AppState, ticket};
use crate::{
    Error, Result,
    request::{RawInputs, params},
    types::{Endpoint, HtsgetResponse, TicketPostBody},
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use std::collections::HashMap;

pub async fn get_reads(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<HtsgetResponse>> {
    let raw = RawInputs {
        id,
        query,
        ..RawInputs::default()
    };
    ticket(&state, Endpoint::Reads, &raw, params::ticket_get_order(Endpoint::Reads)).await
}

pub async fn post_reads(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: std::result::Result<Json<TicketPostBody>, JsonRejection>,
) -> Result<Json<HtsgetResponse>> {
    let Json(body) = body.map_err(|e| Error::InvalidInput(e.body_text()))?;
    let raw = RawInputs {
        id,
        body: Some(body),
        ..RawInputs::default()
    };
    ticket(&state, Endpoint::Reads, &raw, params::ticket_post_order(Endpoint::Reads)).await
}
