//! RealtimeService - periodic floor snapshot broadcasting.
//!
//! One background task per (restaurant scope, feed), not per
//! connection: each tick recomputes the snapshot once and fans it out
//! to every subscriber of that scope through a broadcast channel.
//! A tick's transient failure is logged and the loop continues; it
//! never takes the task down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bistro_core::table::{FloorMonitor, HeatMapEntry, HeatMapPeriod, OccupancySummary, TurnTimeAlert};
use bistro_core::{Database, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info};

/// Which snapshot a feed carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    /// Turn-time alerts plus occupancy, ~10s cadence.
    Floor,
    /// Heat-map scores, ~30s cadence.
    HeatMap,
}

impl FeedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Floor => "floor",
            Self::HeatMap => "heat_map",
        }
    }
}

/// Floor feed payload: alerts and occupancy in one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct FloorSnapshot {
    pub restaurant_id: String,
    pub generated_at: DateTime<Utc>,
    pub alerts: Vec<TurnTimeAlert>,
    pub occupancy: OccupancySummary,
}

/// Heat-map feed payload.
#[derive(Debug, Clone, Serialize)]
pub struct HeatMapSnapshot {
    pub restaurant_id: String,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<HeatMapEntry>,
}

/// Handle for a running feed task
struct FeedHandle {
    task: JoinHandle<()>,
    sender: broadcast::Sender<String>,
}

/// RealtimeService manages the periodic snapshot loops.
pub struct RealtimeService {
    db: Arc<Database>,
    /// Active feeds: "restaurant_id:feed" -> FeedHandle
    feeds: RwLock<HashMap<String, FeedHandle>>,
    /// Lock for starting/stopping operations
    operation_lock: Mutex<()>,
}

impl RealtimeService {
    /// Create a new realtime service
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            feeds: RwLock::new(HashMap::new()),
            operation_lock: Mutex::new(()),
        }
    }

    fn feed_key(restaurant_id: &str, feed: FeedKind) -> String {
        format!("{restaurant_id}:{}", feed.as_str())
    }

    /// Start a feed for a restaurant scope, replacing any running one.
    ///
    /// Idempotent: starting an already-running feed stops the old
    /// task first. Returns a receiver for the new feed.
    pub async fn start_feed(
        self: &Arc<Self>,
        restaurant_id: &str,
        feed: FeedKind,
        tick: Duration,
    ) -> broadcast::Receiver<String> {
        let _lock = self.operation_lock.lock().await;
        self.stop_feed_inner(restaurant_id, feed).await;

        info!(
            restaurant_id = %restaurant_id,
            feed = feed.as_str(),
            tick_secs = tick.as_secs(),
            "Starting realtime feed"
        );

        let (sender, receiver) = broadcast::channel(16);
        let db = Arc::clone(&self.db);
        let scope = restaurant_id.to_string();
        let tx = sender.clone();

        let task = tokio::spawn(async move {
            let monitor = FloorMonitor::new(db);
            let mut ticker = interval(tick);
            loop {
                ticker.tick().await;
                match Self::build_snapshot(&monitor, &scope, feed) {
                    Ok(snapshot) => {
                        // No subscribers is fine; the send just drops.
                        let _ = tx.send(snapshot);
                    }
                    Err(e) => {
                        error!(
                            restaurant_id = %scope,
                            feed = feed.as_str(),
                            error = %e,
                            "Feed tick failed"
                        );
                    }
                }
            }
        });

        let mut feeds = self.feeds.write().await;
        feeds.insert(Self::feed_key(restaurant_id, feed), FeedHandle { task, sender });
        receiver
    }

    /// Build one serialized snapshot for a feed.
    fn build_snapshot(monitor: &FloorMonitor, restaurant_id: &str, feed: FeedKind) -> Result<String> {
        let json = match feed {
            FeedKind::Floor => {
                let snapshot = FloorSnapshot {
                    restaurant_id: restaurant_id.to_string(),
                    generated_at: Utc::now(),
                    alerts: monitor.turn_time_alerts(restaurant_id)?,
                    occupancy: monitor.occupancy_summary(restaurant_id)?,
                };
                serde_json::to_string(&snapshot)?
            }
            FeedKind::HeatMap => {
                let snapshot = HeatMapSnapshot {
                    restaurant_id: restaurant_id.to_string(),
                    generated_at: Utc::now(),
                    entries: monitor.heat_map(restaurant_id, HeatMapPeriod::Today)?,
                };
                serde_json::to_string(&snapshot)?
            }
        };
        debug!(restaurant_id = %restaurant_id, feed = feed.as_str(), "Snapshot built");
        Ok(json)
    }

    /// Subscribe to a running feed.
    pub async fn subscribe(
        &self,
        restaurant_id: &str,
        feed: FeedKind,
    ) -> Option<broadcast::Receiver<String>> {
        let feeds = self.feeds.read().await;
        feeds
            .get(&Self::feed_key(restaurant_id, feed))
            .map(|h| h.sender.subscribe())
    }

    /// Whether a feed is currently running.
    pub async fn is_running(&self, restaurant_id: &str, feed: FeedKind) -> bool {
        let feeds = self.feeds.read().await;
        feeds.contains_key(&Self::feed_key(restaurant_id, feed))
    }

    /// Stop a feed (internal, assumes the operation lock is held).
    ///
    /// Cancel-and-await: the task is aborted and then awaited so no
    /// further tick can run after this returns.
    async fn stop_feed_inner(&self, restaurant_id: &str, feed: FeedKind) {
        let handle = {
            let mut feeds = self.feeds.write().await;
            feeds.remove(&Self::feed_key(restaurant_id, feed))
        };
        if let Some(handle) = handle {
            handle.task.abort();
            let _ = handle.task.await;
            info!(
                restaurant_id = %restaurant_id,
                feed = feed.as_str(),
                "Stopped realtime feed"
            );
        }
    }

    /// Stop a feed for a restaurant scope.
    pub async fn stop_feed(&self, restaurant_id: &str, feed: FeedKind) {
        let _lock = self.operation_lock.lock().await;
        self.stop_feed_inner(restaurant_id, feed).await;
    }

    /// Stop all running feeds.
    pub async fn stop_all(&self) {
        let _lock = self.operation_lock.lock().await;
        let drained: Vec<(String, FeedHandle)> = {
            let mut feeds = self.feeds.write().await;
            feeds.drain().collect()
        };
        for (key, handle) in drained {
            handle.task.abort();
            let _ = handle.task.await;
            info!(feed_key = %key, "Stopped realtime feed");
        }
    }
}
