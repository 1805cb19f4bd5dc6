//! Table and floor-management domain types.

pub mod heat_map;
pub mod monitor;
pub mod turn_time;

pub use heat_map::{ColorBand, HeatMapAggregator, HeatMapEntry, TableStats};
pub use monitor::{FloorMonitor, HeatMapPeriod, OccupancySummary};
pub use turn_time::{AlertLevel, TurnTimeAlert, TurnTimeTracker};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Table floor status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Available,
    Occupied,
    Reserved,
}

impl TableStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::Reserved => "reserved",
        }
    }

    /// Parse from the database representation; unrecognized values
    /// fall back to available.
    pub fn parse(s: &str) -> Self {
        match s {
            "occupied" => Self::Occupied,
            "reserved" => Self::Reserved,
            _ => Self::Available,
        }
    }
}

/// A physical table on the floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiningTable {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    pub capacity: i32,
    pub status: TableStatus,
    pub is_active: bool,
}

/// One party's occupancy of a table. `end_time` of `None` means the
/// session is still active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSession {
    pub id: String,
    pub restaurant_id: String,
    pub table_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub guest_count: i32,
    pub server_id: Option<String>,
    pub order_total: Option<f64>,
}

impl TableSession {
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    /// Elapsed minutes from start to end (or `now` while active).
    pub fn duration_minutes(&self, now: DateTime<Utc>) -> i64 {
        let end = self.end_time.unwrap_or(now);
        (end - self.start_time).num_minutes().max(0)
    }
}

/// Meal period, derived from the session start hour. Drives the
/// expected turn time used for alert classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealPeriod {
    Breakfast,
    Lunch,
    Dinner,
    OffPeak,
}

impl MealPeriod {
    /// Period for an hour of day (0-23).
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=10 => Self::Breakfast,
            11..=14 => Self::Lunch,
            17..=22 => Self::Dinner,
            _ => Self::OffPeak,
        }
    }

    /// Expected turn time for a party seated in this period.
    pub fn expected_turn_minutes(self) -> i64 {
        match self {
            Self::Breakfast => 45,
            Self::Lunch => 60,
            Self::Dinner => 90,
            Self::OffPeak => 75,
        }
    }
}
