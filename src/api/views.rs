use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::error::FetchError;
use crate::query::buckets::{AovBucket, FicoBucket};
use crate::query::cache::CachedTable;
use crate::query::metric_set::MetricSet;
use crate::query::window::{FunnelFilter, ReportingWindow};
use crate::views::aov::{self, AovView};
use crate::views::apr::{self, ZeroAprView};
use crate::views::fico::{self, FicoDropoffView, FunnelSummary};
use crate::views::term::{self, TermSelectionView};
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Query parameters shared by all view endpoints.
#[derive(Debug, Deserialize)]
pub struct ViewParams {
    #[serde(default = "default_period")]
    pub period: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub fico_bucket: Option<String>,
    pub aov_bucket: Option<String>,
}

fn default_period() -> String {
    "30d".to_string()
}

impl ViewParams {
    /// Resolve the reporting window from explicit dates or the named period,
    /// then apply any bucket filters.
    pub fn window(&self, today: NaiveDate) -> Result<ReportingWindow, ApiError> {
        let window = match (&self.start_date, &self.end_date) {
            (Some(start), Some(end)) => ReportingWindow::parse(start, end)?,
            (None, None) => ReportingWindow::from_period(&self.period, today)?,
            _ => {
                return Err(ApiError::BadRequest(
                    "start_date and end_date must be provided together".to_string(),
                ))
            }
        };

        let fico_bucket = match self.fico_bucket.as_deref() {
            None | Some("") => None,
            Some(slug) => Some(FicoBucket::from_slug(slug).ok_or_else(|| {
                ApiError::BadRequest(format!("Unknown fico_bucket: {slug}"))
            })?),
        };
        let aov_bucket = match self.aov_bucket.as_deref() {
            None | Some("") => None,
            Some(slug) => Some(AovBucket::from_slug(slug).ok_or_else(|| {
                ApiError::BadRequest(format!("Unknown aov_bucket: {slug}"))
            })?),
        };

        Ok(window.with_filter(FunnelFilter {
            fico_bucket,
            aov_bucket,
        }))
    }
}

/// Envelope for every view: the window it covers, where the data came from,
/// and when it was fetched.
#[derive(Debug, Serialize)]
pub struct ViewResponse<T> {
    pub window: ReportingWindow,
    pub source: String,
    /// Fetch time of the oldest table the view was derived from.
    pub fetched_at: DateTime<Utc>,
    /// Every underlying table came back empty.
    pub no_data: bool,
    #[serde(flatten)]
    pub view: T,
}

/// Fetch `sets` for the requested window on the blocking pool, then derive
/// the view from the tables in the same order.
async fn load_view<T, F>(
    state: Arc<AppState>,
    params: &ViewParams,
    sets: &'static [MetricSet],
    derive: F,
) -> Result<Json<ViewResponse<T>>, ApiError>
where
    F: FnOnce(&[CachedTable]) -> T,
{
    let window = params.window(state.clock.now().date_naive())?;

    let worker = Arc::clone(&state);
    let fetched = tokio::task::spawn_blocking(move || {
        sets.iter()
            .map(|&set| worker.service.fetch(&window, set))
            .collect::<Result<Vec<_>, FetchError>>()
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Query task panicked: {e}")))??;

    let fetched_at = fetched
        .iter()
        .map(|f| f.fetched_at)
        .min()
        .unwrap_or_else(|| state.clock.now());
    let no_data = fetched.iter().all(|f| f.table.is_empty());

    Ok(Json(ViewResponse {
        window,
        source: state.service.table().to_string(),
        fetched_at,
        no_data,
        view: derive(&fetched),
    }))
}

/// GET /api/views/summary: Headline approved / selected / dropoff totals.
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewParams>,
) -> Result<Json<ViewResponse<FunnelSummary>>, ApiError> {
    load_view(state, &params, &[MetricSet::FicoDropoff], |t| {
        fico::summary(&fico::fico_dropoff(&t[0].table))
    })
    .await
}

/// GET /api/views/fico-dropoff: Term selection dropoff by FICO bucket.
pub async fn get_fico_dropoff(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewParams>,
) -> Result<Json<ViewResponse<FicoDropoffView>>, ApiError> {
    load_view(state, &params, &[MetricSet::FicoDropoff], |t| {
        fico::fico_dropoff(&t[0].table)
    })
    .await
}

/// GET /api/views/term-selection: Confirmation with vs without a selected term.
pub async fn get_term_selection(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewParams>,
) -> Result<Json<ViewResponse<TermSelectionView>>, ApiError> {
    load_view(state, &params, &[MetricSet::TermConfirmation], |t| {
        term::term_selection(&t[0].table)
    })
    .await
}

/// GET /api/views/aov: Dropoff by order value plus the FICO x AOV heatmap.
pub async fn get_aov(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewParams>,
) -> Result<Json<ViewResponse<AovView>>, ApiError> {
    load_view(
        state,
        &params,
        &[MetricSet::AovDropoff, MetricSet::FicoAovMatrix],
        |t| aov::aov_analysis(&t[0].table, &t[1].table),
    )
    .await
}

/// GET /api/views/zero-apr: 0% APR offer impact on $1000+ orders.
pub async fn get_zero_apr(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewParams>,
) -> Result<Json<ViewResponse<ZeroAprView>>, ApiError> {
    load_view(state, &params, &[MetricSet::ZeroApr], |t| {
        apr::zero_apr(&t[0].table)
    })
    .await
}

/// POST /api/cache/clear: Drop all cached query results.
pub async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let cleared = state.service.cache().len();
    state.service.invalidate();
    Json(serde_json::json!({ "cleared": cleared }))
}
