pub mod errors;
pub mod views;

use crate::clock::Clock;
use crate::query::service::FunnelQueryService;
use crate::warehouse::auth::AuthMethod;
use crate::warehouse::Warehouse;
use std::sync::Arc;

/// Shared application state for the HTTP handlers.
pub struct AppState {
    pub service: FunnelQueryService<Box<dyn Warehouse>>,
    /// Resolves "today" for named periods.
    pub clock: Arc<dyn Clock>,
    pub auth_method: AuthMethod,
    pub dashboard_origin: Option<String>,
}
