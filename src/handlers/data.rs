use super::AppState;
use crate::formats;
use crate::pipeline::trim::{TrimSpec, trimmed_stream};
use crate::request::{HtsgetRequest, RawInputs, params, parse_and_validate};
use crate::types::{DataClass, Endpoint};
use crate::{Error, Result};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use std::collections::HashMap;

/// Serve one block of a reads ticket.
pub async fn get_reads_data(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response> {
    serve_block(&state, Endpoint::Reads, RawInputs { id, query, headers, body: None }).await
}

/// Serve one block of a variants ticket.
pub async fn get_variants_data(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response> {
    serve_block(&state, Endpoint::Variants, RawInputs { id, query, headers, body: None }).await
}

async fn serve_block(state: &AppState, endpoint: Endpoint, raw: RawInputs) -> Result<Response> {
    let ctx = state.validation_context(endpoint);
    let request = parse_and_validate(endpoint, &raw, params::data_order(endpoint), &ctx).await?;

    if request.is_unfiltered() {
        serve_bytes(state, &request).await
    } else {
        serve_pipeline(state, &request).await
    }
}

/// Whole object, or the requested byte range of it, straight from storage.
async fn serve_bytes(state: &AppState, request: &HtsgetRequest) -> Result<Response> {
    let total = state.storage.head_length(&request.location).await?;
    let builder = Response::builder()
        .header(header::CONTENT_TYPE, request.format.content_type())
        .header(header::ACCEPT_RANGES, "bytes");

    let response = match request.range {
        Some(range) => {
            let (start, end) = range.resolve(total)?;
            let stream = state.storage.read_range(&request.location, start, end).await?;
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, total))
                .header(header::CONTENT_LENGTH, end - start + 1)
                .body(Body::from_stream(stream))
        }
        None if total == 0 => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, 0)
            .body(Body::empty()),
        None => {
            let stream = state.storage.read_range(&request.location, 0, total - 1).await?;
            builder
                .status(StatusCode::OK)
                .header(header::CONTENT_LENGTH, total)
                .body(Body::from_stream(stream))
        }
    };
    response.map_err(|e| Error::Internal(format!("failed to build response: {}", e)))
}

/// Run the block's tool chain and stream its trimmed output.
async fn serve_pipeline(state: &AppState, request: &HtsgetRequest) -> Result<Response> {
    let head_bytes_to_drop = match request.block.class {
        DataClass::Header => 0,
        DataClass::Body => {
            state
                .tools
                .header_size(request.format, &request.location)
                .await?
        }
    };
    let spec = TrimSpec::new(
        head_bytes_to_drop,
        formats::trailer(request.format),
        request.block.is_last(),
    );

    let chain = state.tools.block_chain(request);
    tracing::info!(
        id = %request.id,
        block = request.block.id,
        blocks = request.block.count,
        class = request.block.class.as_str(),
        head_bytes_to_drop,
        tail_bytes_to_drop = spec.tail_bytes_to_drop(),
        %chain,
        "streaming block"
    );

    let (stdout, handle) = chain.spawn()?.into_parts();
    let stream = trimmed_stream(stdout, spec, handle.wait());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, request.format.content_type())
        .body(Body::from_stream(stream))
        .map_err(|e| Error::Internal(format!("failed to build response: {}", e)))
}
