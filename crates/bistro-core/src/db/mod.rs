//! SQLite persistence collaborator for bistro.
//!
//! Owns the promotion catalog, coupons, usage records, and the
//! table/session store. The engines consume these as plain records;
//! the only mutable shared state are the usage counters, which are
//! updated through single conditional `UPDATE` statements so a capped
//! coupon or promotion can never be oversold by concurrent checkouts.

pub mod types;

pub use types::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::promotion::{decode_conditions, Coupon, CouponUsage, Promotion, PromotionType, TargetType};
use crate::table::{DiningTable, TableSession, TableStatus};

/// Database connection wrapper.
///
/// Thread-safe via internal Mutex. All database operations acquire the lock.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open database at a specific path.
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(Error::Database)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(Error::Database)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create tables if they do not exist.
    pub fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS promotion (
                 id TEXT PRIMARY KEY,
                 restaurant_id TEXT NOT NULL DEFAULT 'default',
                 name TEXT NOT NULL,
                 promotion_type TEXT NOT NULL,
                 discount_value REAL NOT NULL DEFAULT 0,
                 max_discount_amount REAL,
                 min_order_amount REAL,
                 target_type TEXT NOT NULL DEFAULT 'order_total',
                 target_items TEXT NOT NULL DEFAULT '[]',
                 conditions TEXT NOT NULL DEFAULT '{}',
                 stackable INTEGER NOT NULL DEFAULT 0,
                 priority INTEGER NOT NULL DEFAULT 0,
                 auto_apply INTEGER NOT NULL DEFAULT 0,
                 is_active INTEGER NOT NULL DEFAULT 1,
                 start_date TEXT,
                 end_date TEXT,
                 usage_limit INTEGER,
                 per_customer_limit INTEGER,
                 current_uses INTEGER NOT NULL DEFAULT 0,
                 customer_tiers TEXT NOT NULL DEFAULT '[]'
             );
             CREATE TABLE IF NOT EXISTS coupon (
                 id TEXT PRIMARY KEY,
                 code TEXT NOT NULL UNIQUE,
                 promotion_id TEXT NOT NULL,
                 is_active INTEGER NOT NULL DEFAULT 1,
                 valid_from TEXT,
                 valid_until TEXT,
                 max_uses INTEGER,
                 current_uses INTEGER NOT NULL DEFAULT 0,
                 customer_id TEXT
             );
             CREATE TABLE IF NOT EXISTS coupon_usage (
                 id TEXT PRIMARY KEY,
                 coupon_code TEXT NOT NULL,
                 promotion_id TEXT NOT NULL,
                 customer_id TEXT,
                 order_id TEXT NOT NULL,
                 discount_amount REAL NOT NULL,
                 used_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS dining_table (
                 id TEXT PRIMARY KEY,
                 restaurant_id TEXT NOT NULL DEFAULT 'default',
                 name TEXT NOT NULL,
                 capacity INTEGER NOT NULL DEFAULT 2,
                 status TEXT NOT NULL DEFAULT 'available',
                 is_active INTEGER NOT NULL DEFAULT 1
             );
             CREATE TABLE IF NOT EXISTS table_session (
                 id TEXT PRIMARY KEY,
                 restaurant_id TEXT NOT NULL DEFAULT 'default',
                 table_id TEXT NOT NULL,
                 start_time TEXT NOT NULL,
                 end_time TEXT,
                 guest_count INTEGER NOT NULL DEFAULT 1,
                 server_id TEXT,
                 order_total REAL
             );
             CREATE INDEX IF NOT EXISTS idx_coupon_usage_promo_customer
                 ON coupon_usage (promotion_id, customer_id);
             CREATE INDEX IF NOT EXISTS idx_session_restaurant
                 ON table_session (restaurant_id, end_time);",
        )
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Check database connectivity.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute_batch("SELECT 1").map_err(Error::Database)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Promotion Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a promotion.
    pub fn create_promotion(&self, promo: &NewPromotion) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute(
            "INSERT INTO promotion (id, restaurant_id, name, promotion_type, discount_value,
                                    max_discount_amount, min_order_amount, target_type,
                                    target_items, conditions, stackable, priority, auto_apply,
                                    start_date, end_date, usage_limit, per_customer_limit,
                                    customer_tiers)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                promo.id,
                promo.restaurant_id,
                promo.name,
                promo.promotion_type,
                promo.discount_value,
                promo.max_discount_amount,
                promo.min_order_amount,
                promo.target_type,
                serde_json::to_string(&promo.target_items)?,
                promo.conditions.to_string(),
                promo.stackable,
                promo.priority,
                promo.auto_apply,
                promo.start_date.map(|d| d.to_rfc3339()),
                promo.end_date.map(|d| d.to_rfc3339()),
                promo.usage_limit,
                promo.per_customer_limit,
                serde_json::to_string(&promo.customer_tiers)?,
            ],
        )?;
        Ok(())
    }

    /// Get promotion by ID.
    pub fn get_promotion(&self, id: &str) -> Result<Option<Promotion>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, restaurant_id, name, promotion_type, discount_value,
                    max_discount_amount, min_order_amount, target_type, target_items,
                    conditions, stackable, priority, auto_apply, is_active, start_date,
                    end_date, usage_limit, per_customer_limit, current_uses, customer_tiers
             FROM promotion WHERE id = ?1",
        )?;
        Ok(stmt.query_row(params![id], Self::map_promotion).optional()?)
    }

    /// Active auto-apply promotions inside their date window.
    pub fn auto_apply_promotions(
        &self,
        restaurant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Promotion>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let now = now.to_rfc3339();
        let mut stmt = conn.prepare(
            "SELECT id, restaurant_id, name, promotion_type, discount_value,
                    max_discount_amount, min_order_amount, target_type, target_items,
                    conditions, stackable, priority, auto_apply, is_active, start_date,
                    end_date, usage_limit, per_customer_limit, current_uses, customer_tiers
             FROM promotion
             WHERE restaurant_id = ?1 AND is_active = 1 AND auto_apply = 1
               AND (start_date IS NULL OR start_date <= ?2)
               AND (end_date IS NULL OR end_date >= ?2)
             ORDER BY priority DESC",
        )?;
        let promotions = stmt
            .query_map(params![restaurant_id, now], Self::map_promotion)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(promotions)
    }

    /// Consume one use of a promotion, honoring its usage limit.
    ///
    /// Single conditional UPDATE: the compare and the increment happen
    /// in one statement, so concurrent checkouts cannot oversell a
    /// capped promotion. Returns whether a use was consumed.
    pub fn increment_promotion_use(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let rows = conn.execute(
            "UPDATE promotion SET current_uses = current_uses + 1
             WHERE id = ?1 AND (usage_limit IS NULL OR current_uses < usage_limit)",
            params![id],
        )?;
        Ok(rows > 0)
    }

    fn map_promotion(row: &rusqlite::Row<'_>) -> rusqlite::Result<Promotion> {
        let promotion_type: String = row.get(3)?;
        let target_type: String = row.get(7)?;
        let target_items: String = row.get(8)?;
        let conditions: String = row.get(9)?;
        let start_date: Option<String> = row.get(14)?;
        let end_date: Option<String> = row.get(15)?;
        let customer_tiers: String = row.get(19)?;

        let conditions_value: serde_json::Value =
            serde_json::from_str(&conditions).unwrap_or(serde_json::Value::Null);

        Ok(Promotion {
            id: row.get(0)?,
            restaurant_id: row.get(1)?,
            name: row.get(2)?,
            promotion_type: PromotionType::parse(&promotion_type),
            discount_value: row.get(4)?,
            max_discount_amount: row.get(5)?,
            min_order_amount: row.get(6)?,
            target_type: TargetType::parse(&target_type),
            target_items: serde_json::from_str(&target_items).unwrap_or_default(),
            conditions: decode_conditions(&conditions_value),
            stackable: row.get(10)?,
            priority: row.get(11)?,
            auto_apply: row.get(12)?,
            is_active: row.get(13)?,
            start_date: start_date.and_then(|s| Self::parse_datetime(&s)),
            end_date: end_date.and_then(|s| Self::parse_datetime(&s)),
            usage_limit: row.get(16)?,
            per_customer_limit: row.get(17)?,
            current_uses: row.get(18)?,
            customer_tiers: serde_json::from_str(&customer_tiers).unwrap_or_default(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Coupon Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a coupon.
    pub fn create_coupon(&self, coupon: &NewCoupon) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute(
            "INSERT INTO coupon (id, code, promotion_id, valid_from, valid_until, max_uses,
                                 customer_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                coupon.id,
                coupon.code,
                coupon.promotion_id,
                coupon.valid_from.map(|d| d.to_rfc3339()),
                coupon.valid_until.map(|d| d.to_rfc3339()),
                coupon.max_uses,
                coupon.customer_id,
            ],
        )?;
        Ok(())
    }

    /// Update a coupon's validity envelope (window, cap, restriction).
    pub fn update_coupon_validity(&self, coupon: &NewCoupon) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute(
            "UPDATE coupon SET valid_from = ?2, valid_until = ?3, max_uses = ?4,
                               customer_id = ?5
             WHERE id = ?1",
            params![
                coupon.id,
                coupon.valid_from.map(|d| d.to_rfc3339()),
                coupon.valid_until.map(|d| d.to_rfc3339()),
                coupon.max_uses,
                coupon.customer_id,
            ],
        )?;
        Ok(())
    }

    /// Get coupon by code.
    pub fn get_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, code, promotion_id, is_active, valid_from, valid_until, max_uses,
                    current_uses, customer_id
             FROM coupon WHERE code = ?1",
        )?;
        Ok(stmt.query_row(params![code], Self::map_coupon).optional()?)
    }

    /// Consume one use of a coupon.
    ///
    /// The increment and the deactivate-at-cap run in the same
    /// conditional UPDATE: when `current_uses + 1` reaches `max_uses`
    /// the coupon flips inactive atomically with the increment.
    /// Returns whether a use was consumed; a `false` means the caller
    /// lost the race to the cap.
    pub fn redeem_coupon(&self, code: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let rows = conn.execute(
            "UPDATE coupon
             SET current_uses = current_uses + 1,
                 is_active = CASE
                     WHEN max_uses IS NOT NULL AND current_uses + 1 >= max_uses THEN 0
                     ELSE is_active
                 END
             WHERE code = ?1 AND is_active = 1
               AND (max_uses IS NULL OR current_uses < max_uses)",
            params![code],
        )?;
        Ok(rows > 0)
    }

    /// Record a coupon redemption.
    pub fn record_coupon_usage(&self, usage: &CouponUsage) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute(
            "INSERT INTO coupon_usage (id, coupon_code, promotion_id, customer_id, order_id,
                                       discount_amount, used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                usage.id,
                usage.coupon_code,
                usage.promotion_id,
                usage.customer_id,
                usage.order_id,
                usage.discount_amount,
                usage.used_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Times a customer has used a promotion (through any coupon).
    pub fn customer_promotion_use_count(&self, promotion_id: &str, customer_id: &str) -> Result<i64> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM coupon_usage WHERE promotion_id = ?1 AND customer_id = ?2",
            params![promotion_id, customer_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn map_coupon(row: &rusqlite::Row<'_>) -> rusqlite::Result<Coupon> {
        let valid_from: Option<String> = row.get(4)?;
        let valid_until: Option<String> = row.get(5)?;
        Ok(Coupon {
            id: row.get(0)?,
            code: row.get(1)?,
            promotion_id: row.get(2)?,
            is_active: row.get(3)?,
            valid_from: valid_from.and_then(|s| Self::parse_datetime(&s)),
            valid_until: valid_until.and_then(|s| Self::parse_datetime(&s)),
            max_uses: row.get(6)?,
            current_uses: row.get(7)?,
            customer_id: row.get(8)?,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Table & Session Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a dining table.
    pub fn create_table(&self, table: &NewTable) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute(
            "INSERT INTO dining_table (id, restaurant_id, name, capacity, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                table.id,
                table.restaurant_id,
                table.name,
                table.capacity,
                table.status,
            ],
        )?;
        Ok(())
    }

    /// All active tables for a restaurant.
    pub fn tables(&self, restaurant_id: &str) -> Result<Vec<DiningTable>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, restaurant_id, name, capacity, status, is_active
             FROM dining_table WHERE restaurant_id = ?1 AND is_active = 1
             ORDER BY name",
        )?;
        let tables = stmt
            .query_map(params![restaurant_id], Self::map_table)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tables)
    }

    /// Open a table session.
    pub fn create_session(&self, session: &NewTableSession) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute(
            "INSERT INTO table_session (id, restaurant_id, table_id, start_time, guest_count,
                                        server_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.id,
                session.restaurant_id,
                session.table_id,
                session.start_time.to_rfc3339(),
                session.guest_count,
                session.server_id,
            ],
        )?;
        Ok(())
    }

    /// Close a session, recording the final order value.
    pub fn close_session(
        &self,
        session_id: &str,
        end_time: DateTime<Utc>,
        order_total: Option<f64>,
    ) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let rows = conn.execute(
            "UPDATE table_session SET end_time = ?2, order_total = ?3 WHERE id = ?1",
            params![session_id, end_time.to_rfc3339(), order_total],
        )?;
        if rows == 0 {
            return Err(Error::TableNotFound(format!("session {session_id}")));
        }
        Ok(())
    }

    /// Currently active sessions (no end time).
    pub fn active_sessions(&self, restaurant_id: &str) -> Result<Vec<TableSession>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, restaurant_id, table_id, start_time, end_time, guest_count, server_id,
                    order_total
             FROM table_session WHERE restaurant_id = ?1 AND end_time IS NULL
             ORDER BY start_time",
        )?;
        let sessions = stmt
            .query_map(params![restaurant_id], Self::map_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Sessions overlapping the window starting at `since`: anything
    /// still active plus anything that ended inside the window.
    pub fn sessions_since(
        &self,
        restaurant_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TableSession>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, restaurant_id, table_id, start_time, end_time, guest_count, server_id,
                    order_total
             FROM table_session
             WHERE restaurant_id = ?1 AND (end_time IS NULL OR end_time >= ?2)
             ORDER BY start_time",
        )?;
        let sessions = stmt
            .query_map(params![restaurant_id, since.to_rfc3339()], Self::map_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    fn map_table(row: &rusqlite::Row<'_>) -> rusqlite::Result<DiningTable> {
        let status: String = row.get(4)?;
        Ok(DiningTable {
            id: row.get(0)?,
            restaurant_id: row.get(1)?,
            name: row.get(2)?,
            capacity: row.get(3)?,
            status: TableStatus::parse(&status),
            is_active: row.get(5)?,
        })
    }

    fn map_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<TableSession> {
        let start_time: String = row.get(3)?;
        let end_time: Option<String> = row.get(4)?;
        Ok(TableSession {
            id: row.get(0)?,
            restaurant_id: row.get(1)?,
            table_id: row.get(2)?,
            start_time: Self::parse_datetime(&start_time).unwrap_or_else(Utc::now),
            end_time: end_time.and_then(|s| Self::parse_datetime(&s)),
            guest_count: row.get(5)?,
            server_id: row.get(6)?,
            order_total: row.get(7)?,
        })
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promotion::PromotionCondition;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.init_schema().unwrap();
        db
    }

    fn new_promotion(id: &str) -> NewPromotion {
        NewPromotion {
            id: id.to_string(),
            restaurant_id: "default".to_string(),
            name: format!("Promo {id}"),
            promotion_type: "percentage_discount".to_string(),
            discount_value: 10.0,
            max_discount_amount: Some(25.0),
            min_order_amount: None,
            target_type: "order_total".to_string(),
            target_items: Vec::new(),
            conditions: serde_json::json!({"min_items": 2}),
            stackable: true,
            priority: 3,
            auto_apply: true,
            start_date: None,
            end_date: None,
            usage_limit: Some(100),
            per_customer_limit: None,
            customer_tiers: vec!["gold".to_string()],
        }
    }

    #[test]
    fn test_open_path_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bistro.db");

        let db = Database::open_path(&path).unwrap();
        db.init_schema().unwrap();
        db.create_promotion(&new_promotion("p1")).unwrap();
        drop(db);

        let db = Database::open_path(&path).unwrap();
        db.init_schema().unwrap();
        assert!(db.get_promotion("p1").unwrap().is_some());
    }

    #[test]
    fn test_schema_init_is_idempotent() {
        let db = test_db();
        db.init_schema().unwrap();
        db.ping().unwrap();
    }

    #[test]
    fn test_promotion_round_trip_decodes_conditions() {
        let db = test_db();
        db.create_promotion(&new_promotion("p1")).unwrap();

        let promo = db.get_promotion("p1").unwrap().unwrap();
        assert_eq!(promo.name, "Promo p1");
        assert_eq!(promo.priority, 3);
        assert_eq!(promo.max_discount_amount, Some(25.0));
        assert_eq!(promo.customer_tiers, vec!["gold".to_string()]);
        assert!(matches!(
            promo.conditions.as_slice(),
            [PromotionCondition::MinItems(2)]
        ));
    }

    #[test]
    fn test_auto_apply_respects_date_window() {
        let db = test_db();
        let mut expired = new_promotion("expired");
        expired.end_date = Some(Utc::now() - chrono::Duration::days(1));
        db.create_promotion(&expired).unwrap();
        db.create_promotion(&new_promotion("live")).unwrap();

        let promos = db.auto_apply_promotions("default", Utc::now()).unwrap();
        assert_eq!(promos.len(), 1);
        assert_eq!(promos[0].id, "live");
    }

    #[test]
    fn test_increment_promotion_use_honors_limit() {
        let db = test_db();
        let mut promo = new_promotion("limited");
        promo.usage_limit = Some(2);
        db.create_promotion(&promo).unwrap();

        assert!(db.increment_promotion_use("limited").unwrap());
        assert!(db.increment_promotion_use("limited").unwrap());
        // Cap reached: the conditional update refuses further uses
        assert!(!db.increment_promotion_use("limited").unwrap());
        assert_eq!(db.get_promotion("limited").unwrap().unwrap().current_uses, 2);
    }

    #[test]
    fn test_redeem_coupon_deactivates_at_cap() {
        let db = test_db();
        db.create_coupon(&NewCoupon {
            id: "c1".to_string(),
            code: "TWICE".to_string(),
            promotion_id: "p1".to_string(),
            valid_from: None,
            valid_until: None,
            max_uses: Some(2),
            customer_id: None,
        })
        .unwrap();

        assert!(db.redeem_coupon("TWICE").unwrap());
        let coupon = db.get_coupon("TWICE").unwrap().unwrap();
        assert_eq!(coupon.current_uses, 1);
        assert!(coupon.is_active);

        assert!(db.redeem_coupon("TWICE").unwrap());
        let coupon = db.get_coupon("TWICE").unwrap().unwrap();
        assert_eq!(coupon.current_uses, 2);
        assert!(!coupon.is_active);

        assert!(!db.redeem_coupon("TWICE").unwrap());
    }

    #[test]
    fn test_redeem_unlimited_coupon_stays_active() {
        let db = test_db();
        db.create_coupon(&NewCoupon {
            id: "c1".to_string(),
            code: "FOREVER".to_string(),
            promotion_id: "p1".to_string(),
            valid_from: None,
            valid_until: None,
            max_uses: None,
            customer_id: None,
        })
        .unwrap();

        for _ in 0..5 {
            assert!(db.redeem_coupon("FOREVER").unwrap());
        }
        let coupon = db.get_coupon("FOREVER").unwrap().unwrap();
        assert_eq!(coupon.current_uses, 5);
        assert!(coupon.is_active);
    }

    #[test]
    fn test_session_round_trip() {
        let db = test_db();
        db.create_table(&NewTable {
            id: "t1".to_string(),
            restaurant_id: "default".to_string(),
            name: "Window 1".to_string(),
            capacity: 4,
            status: "available".to_string(),
        })
        .unwrap();

        let start = Utc::now() - chrono::Duration::minutes(45);
        db.create_session(&NewTableSession {
            id: "s1".to_string(),
            restaurant_id: "default".to_string(),
            table_id: "t1".to_string(),
            start_time: start,
            guest_count: 3,
            server_id: Some("srv-1".to_string()),
        })
        .unwrap();

        let active = db.active_sessions("default").unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].is_active());
        assert_eq!(active[0].guest_count, 3);

        db.close_session("s1", Utc::now(), Some(64.5)).unwrap();
        assert!(db.active_sessions("default").unwrap().is_empty());

        let recent = db
            .sessions_since("default", Utc::now() - chrono::Duration::hours(2))
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].order_total, Some(64.5));
    }

    #[test]
    fn test_close_unknown_session_errors() {
        let db = test_db();
        let err = db.close_session("nope", Utc::now(), None).unwrap_err();
        assert!(matches!(err, Error::TableNotFound(_)));
    }
}
