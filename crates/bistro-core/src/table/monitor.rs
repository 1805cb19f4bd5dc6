//! Floor monitoring facade.
//!
//! Scope-level read API over the session store: turn-time alerts,
//! heat map, and the occupancy summary. Everything here is computed
//! fresh per call; the realtime broadcast loop in the server polls
//! these on its tick.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{HeatMapAggregator, HeatMapEntry, TableStatus, TurnTimeAlert, TurnTimeTracker};
use crate::db::Database;
use crate::error::Result;

/// Lookback window for heat-map aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatMapPeriod {
    /// Since local midnight (the default window).
    Today,
    /// Trailing N days.
    LastDays(u32),
}

impl HeatMapPeriod {
    /// Window start for this period, relative to `now`.
    pub fn window_start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc())
                .unwrap_or(now),
            Self::LastDays(days) => now - Duration::days(i64::from(days)),
        }
    }
}

/// Live occupancy snapshot for a restaurant scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancySummary {
    pub total: usize,
    pub occupied: usize,
    pub available: usize,
    pub reserved: usize,
    /// Occupied share of all active tables, 0-100.
    pub occupancy_rate: f64,
    pub current_guests: i64,
    pub avg_turn_time_today: f64,
}

/// Read-side facade over tables and sessions for one restaurant.
pub struct FloorMonitor {
    db: Arc<Database>,
}

impl FloorMonitor {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Turn-time alerts for currently occupied tables, severity
    /// descending.
    pub fn turn_time_alerts(&self, restaurant_id: &str) -> Result<Vec<TurnTimeAlert>> {
        let sessions = self.db.active_sessions(restaurant_id)?;
        Ok(TurnTimeTracker::alerts(&sessions, Utc::now()))
    }

    /// Heat-map entries over the requested lookback window.
    pub fn heat_map(
        &self,
        restaurant_id: &str,
        period: HeatMapPeriod,
    ) -> Result<Vec<HeatMapEntry>> {
        let now = Utc::now();
        let window_start = period.window_start(now);
        let tables = self.db.tables(restaurant_id)?;
        let sessions = self.db.sessions_since(restaurant_id, window_start)?;
        Ok(HeatMapAggregator::aggregate(
            &tables,
            &sessions,
            window_start,
            now,
        ))
    }

    /// Live occupancy counts plus today's average completed turn time.
    pub fn occupancy_summary(&self, restaurant_id: &str) -> Result<OccupancySummary> {
        let now = Utc::now();
        let tables = self.db.tables(restaurant_id)?;
        let active = self.db.active_sessions(restaurant_id)?;

        let occupied_ids: HashSet<&str> = active.iter().map(|s| s.table_id.as_str()).collect();
        let total = tables.len();
        let occupied = tables
            .iter()
            .filter(|t| occupied_ids.contains(t.id.as_str()))
            .count();
        let reserved = tables
            .iter()
            .filter(|t| t.status == TableStatus::Reserved && !occupied_ids.contains(t.id.as_str()))
            .count();
        let available = total.saturating_sub(occupied + reserved);

        let occupancy_rate = if total > 0 {
            occupied as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let current_guests = active.iter().map(|s| i64::from(s.guest_count)).sum();

        let today_start = HeatMapPeriod::Today.window_start(now);
        let today = self.db.sessions_since(restaurant_id, today_start)?;
        let completed: Vec<i64> = today
            .iter()
            .filter_map(|s| s.end_time.map(|end| (end - s.start_time).num_minutes()))
            .collect();
        let avg_turn_time_today = if completed.is_empty() {
            0.0
        } else {
            completed.iter().sum::<i64>() as f64 / completed.len() as f64
        };

        Ok(OccupancySummary {
            total,
            occupied,
            available,
            reserved,
            occupancy_rate,
            current_guests,
            avg_turn_time_today,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewTable, NewTableSession};

    fn test_db() -> Arc<Database> {
        let db = Database::open_in_memory().unwrap();
        db.init_schema().unwrap();
        Arc::new(db)
    }

    fn seed_table(db: &Database, id: &str, status: &str) {
        db.create_table(&NewTable {
            id: id.to_string(),
            restaurant_id: "default".to_string(),
            name: format!("Table {id}"),
            capacity: 4,
            status: status.to_string(),
        })
        .unwrap();
    }

    fn seed_session(
        db: &Database,
        id: &str,
        table_id: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        guests: i32,
        order_total: Option<f64>,
    ) {
        db.create_session(&NewTableSession {
            id: id.to_string(),
            restaurant_id: "default".to_string(),
            table_id: table_id.to_string(),
            start_time: start,
            guest_count: guests,
            server_id: None,
        })
        .unwrap();
        if let Some(end) = end {
            db.close_session(id, end, order_total).unwrap();
        }
    }

    #[test]
    fn test_occupancy_summary_counts() {
        let db = test_db();
        seed_table(&db, "t1", "available");
        seed_table(&db, "t2", "available");
        seed_table(&db, "t3", "reserved");
        seed_table(&db, "t4", "available");

        let now = Utc::now();
        seed_session(&db, "s1", "t1", now - Duration::minutes(30), None, 3, None);
        seed_session(&db, "s2", "t2", now - Duration::minutes(10), None, 2, None);

        let monitor = FloorMonitor::new(db);
        let summary = monitor.occupancy_summary("default").unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.occupied, 2);
        assert_eq!(summary.reserved, 1);
        assert_eq!(summary.available, 1);
        assert!((summary.occupancy_rate - 50.0).abs() < 1e-9);
        assert_eq!(summary.current_guests, 5);
    }

    #[test]
    fn test_occupancy_summary_empty_floor() {
        let db = test_db();
        let monitor = FloorMonitor::new(db);
        let summary = monitor.occupancy_summary("default").unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.occupancy_rate, 0.0);
        assert_eq!(summary.avg_turn_time_today, 0.0);
    }

    #[test]
    fn test_turn_time_alerts_from_store() {
        let db = test_db();
        seed_table(&db, "t1", "available");
        let now = Utc::now();
        // Three hours in: past excessive for any meal period
        seed_session(&db, "s1", "t1", now - Duration::hours(3), None, 2, None);

        let monitor = FloorMonitor::new(db);
        let alerts = monitor.turn_time_alerts("default").unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].table_id, "t1");
        assert_eq!(alerts[0].alert_level, crate::table::AlertLevel::Excessive);
    }

    #[test]
    fn test_heat_map_covers_all_tables() {
        let db = test_db();
        seed_table(&db, "t1", "available");
        seed_table(&db, "t2", "available");
        let now = Utc::now();
        seed_session(
            &db,
            "s1",
            "t1",
            now - Duration::minutes(90),
            Some(now - Duration::minutes(30)),
            2,
            Some(85.0),
        );

        let monitor = FloorMonitor::new(db);
        let entries = monitor.heat_map("default", HeatMapPeriod::Today).unwrap();
        assert_eq!(entries.len(), 2);
        for entry in &entries {
            assert!((0.0..=100.0).contains(&entry.heat_score));
        }
    }
}
