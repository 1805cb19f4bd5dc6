//! Application state.

use std::sync::Arc;
use std::time::Instant;

use bistro_core::promotion::DiscountService;
use bistro_core::table::FloorMonitor;
use bistro_core::Database;

use crate::config::Config;
use crate::services::RealtimeService;

/// Shared application state
#[allow(dead_code)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Database connection
    pub db: Arc<Database>,
    /// Checkout discount engine
    pub discounts: Arc<DiscountService>,
    /// Floor read API (alerts, heat map, occupancy)
    pub floor: Arc<FloorMonitor>,
    /// Realtime feed loops
    pub realtime: Arc<RealtimeService>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, db: Database) -> Arc<Self> {
        let db = Arc::new(db);
        Arc::new(Self {
            config: Arc::new(config),
            discounts: Arc::new(DiscountService::new(Arc::clone(&db))),
            floor: Arc::new(FloorMonitor::new(Arc::clone(&db))),
            realtime: Arc::new(RealtimeService::new(Arc::clone(&db))),
            db,
            start_time: Instant::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_wires_shared_database() {
        let db = Database::open_in_memory().unwrap();
        db.init_schema().unwrap();
        let state = AppState::new(Config::default(), db);

        state.db.ping().unwrap();
        // The facades answer against the same (empty) store
        let summary = state.floor.occupancy_summary("default").unwrap();
        assert_eq!(summary.total, 0);
        assert!(state.start_time.elapsed().as_secs() < 5);
    }
}
