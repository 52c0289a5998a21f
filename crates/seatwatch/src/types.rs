use std::sync::Arc;

use crate::broadcast::Broadcaster;
use crate::config::AppConfig;
use crate::stats::StatsAggregator;
use crate::store::SeatStore;
use crate::sync::Synchronizer;
use crate::tracking::TrackingService;

/// Shared state handed to every HTTP handler.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<SeatStore>,
    pub sync: Arc<Synchronizer>,
    pub tracking: TrackingService,
    pub stats: StatsAggregator,
    pub broadcaster: Broadcaster,
}
