mod data;
mod reads;
mod service_info;
mod variants;

pub use data::{get_reads_data, get_variants_data};
pub use reads::{get_reads, post_reads};
pub use service_info::{reads_service_info, variants_service_info};
pub use variants::{get_variants, post_variants};

use crate::formats::{HeaderReader, Tools};
use crate::registry::Registry;
use crate::request::params::ParamOrder;
use crate::request::{RawInputs, ValidationContext, parse_and_validate};
use crate::storage::Storage;
use crate::ticket::TicketPlanner;
use crate::types::{Endpoint, HtsgetResponse, HtsgetResponseBody};
use crate::Result;
use axum::{Json, Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use url::Url;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub base_url: Url,
    pub chunk_size: u64,
    pub reads: Arc<Registry>,
    pub variants: Arc<Registry>,
    pub storage: Arc<dyn Storage>,
    pub header_reader: Arc<dyn HeaderReader>,
    pub tools: Arc<Tools>,
}

impl AppState {
    pub fn registry(&self, endpoint: Endpoint) -> &Registry {
        match endpoint {
            Endpoint::Reads => &self.reads,
            Endpoint::Variants => &self.variants,
        }
    }

    pub fn validation_context(&self, endpoint: Endpoint) -> ValidationContext<'_> {
        ValidationContext::new(self.registry(endpoint), self.header_reader.as_ref())
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // ticket endpoints
        .route("/reads/service-info", get(reads_service_info))
        .route("/reads/:id", get(get_reads).post(post_reads))
        .route("/variants/service-info", get(variants_service_info))
        .route("/variants/:id", get(get_variants).post(post_variants))
        // data endpoints (ticket URLs point here)
        .route("/reads/data/:id", get(get_reads_data))
        .route("/variants/data/:id", get(get_variants_data))
        .route("/service-info", get(reads_service_info))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Validate a ticket request and plan its blocks.
async fn ticket(
    state: &AppState,
    endpoint: Endpoint,
    raw: &RawInputs,
    order: ParamOrder,
) -> Result<Json<HtsgetResponse>> {
    let ctx = state.validation_context(endpoint);
    let request = parse_and_validate(endpoint, raw, order, &ctx).await?;

    let planner = TicketPlanner::new(&state.base_url, state.chunk_size, state.storage.as_ref());
    let urls = planner.plan(&request).await?;

    Ok(Json(HtsgetResponse {
        htsget: HtsgetResponseBody {
            format: request.format,
            urls,
        },
    }))
}
