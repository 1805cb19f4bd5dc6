//! Table heat-map scoring.
//!
//! The heat score is a deterministic pure function of four per-table
//! inputs over a lookback window, blended with fixed weights. Entries
//! are ephemeral: recomputed per window, never persisted here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DiningTable, TableSession};

/// Scoring weights. Fixed by contract.
const OCCUPANCY_WEIGHT: f64 = 0.30;
const SESSION_WEIGHT: f64 = 0.25;
const REVENUE_WEIGHT: f64 = 0.25;
const TURN_EFFICIENCY_WEIGHT: f64 = 0.20;

/// Assumed ceilings/optimum for component normalization.
const SESSIONS_PER_DAY_CEILING: f64 = 8.0;
const REVENUE_PER_HOUR_CEILING: f64 = 400.0;
const OPTIMAL_TURN_MINUTES: f64 = 60.0;

/// Per-table inputs to the heat score.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TableStats {
    /// Percent of the window the table was occupied (0-100).
    pub occupancy_rate: f64,
    pub session_count: u32,
    pub revenue_per_hour: f64,
    /// Average completed turn time in minutes; 0 when no turns completed.
    pub avg_turn_time: f64,
}

/// Discrete presentation band. UIs depend on these exact thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorBand {
    Hot,
    Warm,
    Medium,
    Cool,
    Cold,
}

impl ColorBand {
    /// Band for a heat score. Inclusive lower bounds, no gaps.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Hot
        } else if score >= 60.0 {
            Self::Warm
        } else if score >= 40.0 {
            Self::Medium
        } else if score >= 20.0 {
            Self::Cool
        } else {
            Self::Cold
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Medium => "medium",
            Self::Cool => "cool",
            Self::Cold => "cold",
        }
    }
}

/// One table's heat-map output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatMapEntry {
    pub table_id: String,
    pub table_name: String,
    pub heat_score: f64,
    pub color_band: ColorBand,
    pub occupancy_rate: f64,
    pub revenue_per_hour: f64,
    pub turn_count: u32,
    pub avg_turn_time: f64,
}

/// Computes normalized heat scores over a lookback window.
#[derive(Debug, Default)]
pub struct HeatMapAggregator;

impl HeatMapAggregator {
    /// Heat score in `[0, 100]`, clamped defensively: malformed or
    /// negative upstream stats must never produce an out-of-range
    /// score.
    pub fn score(stats: &TableStats) -> f64 {
        let occupancy_score = stats.occupancy_rate.clamp(0.0, 100.0);
        let session_score =
            (f64::from(stats.session_count) / SESSIONS_PER_DAY_CEILING * 100.0).clamp(0.0, 100.0);
        let revenue_score =
            (stats.revenue_per_hour / REVENUE_PER_HOUR_CEILING * 100.0).clamp(0.0, 100.0);
        let turn_efficiency = if stats.avg_turn_time > 0.0 {
            // Linear in the distance from the optimum, floored at 0.
            // Faster-than-optimum turns earn above 100; only the
            // blended score is clamped.
            (100.0
                - (stats.avg_turn_time - OPTIMAL_TURN_MINUTES) / OPTIMAL_TURN_MINUTES * 50.0)
                .max(0.0)
        } else {
            // No completed turns yet: neutral.
            50.0
        };

        let score = OCCUPANCY_WEIGHT * occupancy_score
            + SESSION_WEIGHT * session_score
            + REVENUE_WEIGHT * revenue_score
            + TURN_EFFICIENCY_WEIGHT * turn_efficiency;
        score.clamp(0.0, 100.0)
    }

    /// Heat-map entries for a set of tables over `[window_start, now]`.
    pub fn aggregate(
        tables: &[DiningTable],
        sessions: &[TableSession],
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Vec<HeatMapEntry> {
        let window_minutes = ((now - window_start).num_minutes()).max(1) as f64;

        tables
            .iter()
            .map(|table| {
                let stats = Self::table_stats(&table.id, sessions, window_start, now, window_minutes);
                let heat_score = Self::score(&stats);
                HeatMapEntry {
                    table_id: table.id.clone(),
                    table_name: table.name.clone(),
                    heat_score,
                    color_band: ColorBand::from_score(heat_score),
                    occupancy_rate: stats.occupancy_rate,
                    revenue_per_hour: stats.revenue_per_hour,
                    turn_count: stats.session_count,
                    avg_turn_time: stats.avg_turn_time,
                }
            })
            .collect()
    }

    fn table_stats(
        table_id: &str,
        sessions: &[TableSession],
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
        window_minutes: f64,
    ) -> TableStats {
        let mut occupied_minutes = 0.0;
        let mut revenue = 0.0;
        let mut session_count = 0u32;
        let mut completed_turns = 0u32;
        let mut completed_minutes = 0.0;

        for session in sessions.iter().filter(|s| s.table_id == table_id) {
            let end = session.end_time.unwrap_or(now).min(now);
            let start = session.start_time.max(window_start);
            if end <= start {
                continue;
            }
            session_count += 1;
            occupied_minutes += (end - start).num_minutes() as f64;
            revenue += session.order_total.unwrap_or(0.0);

            if let Some(end_time) = session.end_time {
                completed_turns += 1;
                completed_minutes += (end_time - session.start_time).num_minutes() as f64;
            }
        }

        TableStats {
            occupancy_rate: occupied_minutes / window_minutes * 100.0,
            session_count,
            revenue_per_hour: revenue / (window_minutes / 60.0),
            avg_turn_time: if completed_turns > 0 {
                completed_minutes / f64::from(completed_turns)
            } else {
                0.0
            },
        }
    }
}
