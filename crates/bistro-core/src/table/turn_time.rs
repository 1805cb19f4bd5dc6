//! Turn-time alert classification.
//!
//! Alerts are ephemeral: recomputed fresh on every monitoring tick as
//! a pure function of the active sessions plus wall-clock time,
//! never persisted.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::{MealPeriod, TableSession};

/// Alert severity for an occupied table, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Warning,
    Critical,
    Excessive,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Excessive => "excessive",
        }
    }

    /// Classify a current/expected duration ratio.
    ///
    /// Below 0.8 the table is on pace and excluded from the alert
    /// feed entirely.
    fn classify(ratio: f64) -> Option<Self> {
        if ratio >= 1.5 {
            Some(Self::Excessive)
        } else if ratio >= 1.0 {
            Some(Self::Critical)
        } else if ratio >= 0.8 {
            Some(Self::Warning)
        } else {
            None
        }
    }
}

/// A table running at or past its expected turn time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnTimeAlert {
    pub table_id: String,
    pub session_id: String,
    pub current_duration_minutes: i64,
    pub expected_duration_minutes: i64,
    pub alert_level: AlertLevel,
    /// Minutes past the expected duration. Uncapped, unlike progress.
    pub overrun_minutes: i64,
    /// Progress toward the expected duration, capped at 100.
    pub progress_percentage: f64,
}

/// Classifies occupied tables into alert levels.
#[derive(Debug, Default)]
pub struct TurnTimeTracker;

impl TurnTimeTracker {
    /// Alerts for the currently active sessions, severity descending.
    ///
    /// Ties within a severity keep the input order (stable sort).
    /// Tables below the warning threshold are excluded.
    pub fn alerts(sessions: &[TableSession], now: DateTime<Utc>) -> Vec<TurnTimeAlert> {
        let mut alerts: Vec<TurnTimeAlert> = sessions
            .iter()
            .filter(|s| s.is_active())
            .filter_map(|s| Self::evaluate(s, now))
            .collect();
        alerts.sort_by(|a, b| b.alert_level.cmp(&a.alert_level));
        alerts
    }

    fn evaluate(session: &TableSession, now: DateTime<Utc>) -> Option<TurnTimeAlert> {
        let expected = MealPeriod::from_hour(session.start_time.hour()).expected_turn_minutes();
        let current = session.duration_minutes(now);
        let ratio = current as f64 / expected as f64;

        let alert_level = AlertLevel::classify(ratio)?;
        Some(TurnTimeAlert {
            table_id: session.table_id.clone(),
            session_id: session.id.clone(),
            current_duration_minutes: current,
            expected_duration_minutes: expected,
            alert_level,
            overrun_minutes: (current - expected).max(0),
            progress_percentage: (ratio * 100.0).min(100.0),
        })
    }
}
