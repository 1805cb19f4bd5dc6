//! Coupon validation and redemption.
//!
//! Validation runs an ordered list of checks where the first failure
//! wins; each failure carries a specific human-readable reason that
//! is surfaced directly to API callers. Redemption goes through the
//! database's atomic conditional increment so a capped coupon can
//! never be oversold by concurrent checkouts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::promotion::{DiscountCalculator, OrderLine};

/// A redeemable code bound to a promotion, with its own usage and
/// validity envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: String,
    pub code: String,
    pub promotion_id: String,
    pub is_active: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub max_uses: Option<i64>,
    pub current_uses: i64,
    /// When set, only this customer may redeem the coupon.
    pub customer_id: Option<String>,
}

/// Result of validating a coupon against an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponValidation {
    pub is_valid: bool,
    pub discount_amount: f64,
    pub error: Option<String>,
}

impl CouponValidation {
    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            discount_amount: 0.0,
            error: Some(reason.into()),
        }
    }
}

/// A recorded coupon redemption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponUsage {
    pub id: String,
    pub coupon_code: String,
    pub promotion_id: String,
    pub customer_id: Option<String>,
    pub order_id: String,
    pub discount_amount: f64,
    pub used_at: DateTime<Utc>,
}

/// Validates coupon codes and records redemptions.
pub struct CouponGate {
    db: Arc<Database>,
    calculator: DiscountCalculator,
}

impl CouponGate {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            calculator: DiscountCalculator::new(),
        }
    }

    /// Validate a coupon code against an order.
    ///
    /// Checks run in order and short-circuit on the first failure:
    /// existence/active, not-yet-valid, expired, usage limit,
    /// customer restriction, per-customer promotion limit, parent
    /// promotion active, minimum order amount. Only after all checks
    /// pass is the discount amount computed.
    pub fn validate(
        &self,
        code: &str,
        customer_id: Option<&str>,
        order_total: f64,
        lines: &[OrderLine],
    ) -> Result<CouponValidation> {
        let now = Utc::now();

        let Some(coupon) = self.db.get_coupon(code)? else {
            return Ok(CouponValidation::rejected("Invalid coupon code"));
        };
        if !coupon.is_active {
            // Deactivated by reaching its cap: surface the usage-limit
            // reason, not the generic inactive one.
            if coupon.max_uses.is_some_and(|max| coupon.current_uses >= max) {
                return Ok(CouponValidation::rejected("Coupon usage limit reached"));
            }
            return Ok(CouponValidation::rejected("Coupon is no longer active"));
        }
        if let Some(from) = coupon.valid_from {
            if now < from {
                return Ok(CouponValidation::rejected("Coupon is not yet valid"));
            }
        }
        if let Some(until) = coupon.valid_until {
            if now > until {
                return Ok(CouponValidation::rejected("Coupon has expired"));
            }
        }
        if let Some(max) = coupon.max_uses {
            if coupon.current_uses >= max {
                return Ok(CouponValidation::rejected("Coupon usage limit reached"));
            }
        }
        if let Some(owner) = &coupon.customer_id {
            if customer_id != Some(owner.as_str()) {
                return Ok(CouponValidation::rejected(
                    "Coupon is not valid for this customer",
                ));
            }
        }

        let Some(promotion) = self.db.get_promotion(&coupon.promotion_id)? else {
            return Ok(CouponValidation::rejected(
                "Promotion for this coupon no longer exists",
            ));
        };
        if let (Some(limit), Some(customer)) = (promotion.per_customer_limit, customer_id) {
            let used = self
                .db
                .customer_promotion_use_count(&promotion.id, customer)?;
            if used >= limit {
                return Ok(CouponValidation::rejected(
                    "You have reached the usage limit for this promotion",
                ));
            }
        }
        if !promotion.is_active {
            return Ok(CouponValidation::rejected(
                "Promotion for this coupon is not active",
            ));
        }
        if let Some(min) = promotion.min_order_amount {
            if order_total < min {
                return Ok(CouponValidation::rejected(format!(
                    "Order total must be at least ${min:.2} to use this coupon"
                )));
            }
        }

        let discount_amount = self.calculator.calculate(&promotion, order_total, lines);
        Ok(CouponValidation {
            is_valid: true,
            discount_amount,
            error: None,
        })
    }

    /// Record a successful coupon application.
    ///
    /// Re-validates, then consumes one use through the database's
    /// conditional increment: the increment and the
    /// deactivate-at-cap happen in a single statement, so two
    /// concurrent redemptions of a coupon with one use left resolve
    /// to exactly one success.
    pub fn use_coupon(
        &self,
        code: &str,
        customer_id: Option<&str>,
        order_id: &str,
        order_total: f64,
        lines: &[OrderLine],
    ) -> Result<CouponUsage> {
        let validation = self.validate(code, customer_id, order_total, lines)?;
        if !validation.is_valid {
            return Err(Error::CouponRejected(
                validation
                    .error
                    .unwrap_or_else(|| "Coupon validation failed".to_string()),
            ));
        }

        let Some(coupon) = self.db.get_coupon(code)? else {
            return Err(Error::CouponNotFound(code.to_string()));
        };

        // The atomic gate: loses the race -> usage limit reason.
        if !self.db.redeem_coupon(code)? {
            return Err(Error::CouponRejected(
                "Coupon usage limit reached".to_string(),
            ));
        }

        if !self.db.increment_promotion_use(&coupon.promotion_id)? {
            warn!(
                promotion_id = %coupon.promotion_id,
                code = %code,
                "promotion usage limit reached while redeeming coupon"
            );
        }

        let usage = CouponUsage {
            id: Uuid::new_v4().to_string(),
            coupon_code: code.to_string(),
            promotion_id: coupon.promotion_id.clone(),
            customer_id: customer_id.map(str::to_string),
            order_id: order_id.to_string(),
            discount_amount: validation.discount_amount,
            used_at: Utc::now(),
        };
        self.db.record_coupon_usage(&usage)?;

        info!(
            code = %code,
            order_id = %order_id,
            discount = usage.discount_amount,
            "coupon redeemed"
        );
        Ok(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewCoupon, NewPromotion};
    use chrono::Duration;
    use std::thread;

    fn test_db() -> Arc<Database> {
        let db = Database::open_in_memory().unwrap();
        db.init_schema().unwrap();
        Arc::new(db)
    }

    fn seed_promotion(db: &Database, id: &str) {
        db.create_promotion(&NewPromotion {
            id: id.to_string(),
            restaurant_id: "default".to_string(),
            name: format!("Promo {id}"),
            promotion_type: "fixed_discount".to_string(),
            discount_value: 10.0,
            max_discount_amount: None,
            min_order_amount: None,
            target_type: "order_total".to_string(),
            target_items: Vec::new(),
            conditions: serde_json::json!({}),
            stackable: true,
            priority: 0,
            auto_apply: false,
            start_date: None,
            end_date: None,
            usage_limit: None,
            per_customer_limit: None,
            customer_tiers: Vec::new(),
        })
        .unwrap();
    }

    fn seed_coupon(db: &Database, code: &str, promotion_id: &str) -> NewCoupon {
        let coupon = NewCoupon {
            id: format!("coupon-{code}"),
            code: code.to_string(),
            promotion_id: promotion_id.to_string(),
            valid_from: None,
            valid_until: None,
            max_uses: None,
            customer_id: None,
        };
        db.create_coupon(&coupon).unwrap();
        coupon
    }

    #[test]
    fn test_validate_unknown_code() {
        let db = test_db();
        let gate = CouponGate::new(db);
        let v = gate.validate("NOPE", None, 50.0, &[]).unwrap();
        assert!(!v.is_valid);
        assert_eq!(v.error.as_deref(), Some("Invalid coupon code"));
    }

    #[test]
    fn test_validate_happy_path() {
        let db = test_db();
        seed_promotion(&db, "p1");
        seed_coupon(&db, "SAVE10", "p1");

        let gate = CouponGate::new(db);
        let v = gate.validate("SAVE10", None, 50.0, &[]).unwrap();
        assert!(v.is_valid);
        assert_eq!(v.discount_amount, 10.0);
        assert!(v.error.is_none());
    }

    #[test]
    fn test_validate_not_yet_valid() {
        let db = test_db();
        seed_promotion(&db, "p1");
        let mut coupon = seed_coupon(&db, "LATER", "p1");
        coupon.valid_from = Some(Utc::now() + Duration::days(1));
        db.update_coupon_validity(&coupon).unwrap();

        let gate = CouponGate::new(db);
        let v = gate.validate("LATER", None, 50.0, &[]).unwrap();
        assert_eq!(v.error.as_deref(), Some("Coupon is not yet valid"));
    }

    #[test]
    fn test_validate_expired() {
        let db = test_db();
        seed_promotion(&db, "p1");
        let mut coupon = seed_coupon(&db, "OLD", "p1");
        coupon.valid_until = Some(Utc::now() - Duration::days(1));
        db.update_coupon_validity(&coupon).unwrap();

        let gate = CouponGate::new(db);
        let v = gate.validate("OLD", None, 50.0, &[]).unwrap();
        assert_eq!(v.error.as_deref(), Some("Coupon has expired"));
    }

    #[test]
    fn test_validate_customer_restriction() {
        let db = test_db();
        seed_promotion(&db, "p1");
        let mut coupon = seed_coupon(&db, "MINE", "p1");
        coupon.customer_id = Some("alice".to_string());
        db.update_coupon_validity(&coupon).unwrap();

        let gate = CouponGate::new(db);
        let v = gate.validate("MINE", Some("bob"), 50.0, &[]).unwrap();
        assert_eq!(
            v.error.as_deref(),
            Some("Coupon is not valid for this customer")
        );

        let v = gate.validate("MINE", Some("alice"), 50.0, &[]).unwrap();
        assert!(v.is_valid);
    }

    #[test]
    fn test_validate_min_order_amount() {
        let db = test_db();
        db.create_promotion(&NewPromotion {
            id: "p-min".to_string(),
            restaurant_id: "default".to_string(),
            name: "Min order".to_string(),
            promotion_type: "fixed_discount".to_string(),
            discount_value: 5.0,
            max_discount_amount: None,
            min_order_amount: Some(40.0),
            target_type: "order_total".to_string(),
            target_items: Vec::new(),
            conditions: serde_json::json!({}),
            stackable: true,
            priority: 0,
            auto_apply: false,
            start_date: None,
            end_date: None,
            usage_limit: None,
            per_customer_limit: None,
            customer_tiers: Vec::new(),
        })
        .unwrap();
        seed_coupon(&db, "MIN40", "p-min");

        let gate = CouponGate::new(db);
        let v = gate.validate("MIN40", None, 30.0, &[]).unwrap();
        assert!(!v.is_valid);
        assert!(v.error.unwrap().contains("$40.00"));
    }

    #[test]
    fn test_validate_cap_deactivated_reports_usage_limit() {
        let db = test_db();
        seed_promotion(&db, "p1");
        let mut coupon = seed_coupon(&db, "ONCE", "p1");
        coupon.max_uses = Some(1);
        db.update_coupon_validity(&coupon).unwrap();

        // Redeeming to the cap deactivates the coupon in the same
        // statement; validation must still name the limit as the reason
        assert!(db.redeem_coupon("ONCE").unwrap());
        let gate = CouponGate::new(db);
        let v = gate.validate("ONCE", None, 50.0, &[]).unwrap();
        assert!(!v.is_valid);
        assert_eq!(v.error.as_deref(), Some("Coupon usage limit reached"));
    }

    #[test]
    fn test_use_coupon_records_usage() {
        let db = test_db();
        seed_promotion(&db, "p1");
        seed_coupon(&db, "SAVE10", "p1");

        let gate = CouponGate::new(Arc::clone(&db));
        let usage = gate
            .use_coupon("SAVE10", Some("alice"), "order-1", 50.0, &[])
            .unwrap();
        assert_eq!(usage.coupon_code, "SAVE10");
        assert_eq!(usage.discount_amount, 10.0);

        let coupon = db.get_coupon("SAVE10").unwrap().unwrap();
        assert_eq!(coupon.current_uses, 1);
        assert_eq!(db.customer_promotion_use_count("p1", "alice").unwrap(), 1);
    }

    #[test]
    fn test_use_coupon_cap_race_one_winner() {
        let db = test_db();
        seed_promotion(&db, "p1");
        let mut coupon = seed_coupon(&db, "ONCE", "p1");
        coupon.max_uses = Some(1);
        db.update_coupon_validity(&coupon).unwrap();

        let gate = Arc::new(CouponGate::new(Arc::clone(&db)));
        let mut handles = Vec::new();
        for i in 0..2 {
            let gate = Arc::clone(&gate);
            handles.push(thread::spawn(move || {
                gate.use_coupon("ONCE", None, &format!("order-{i}"), 50.0, &[])
            }));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one redemption must win");

        let failure = results.into_iter().find(|r| r.is_err()).unwrap();
        match failure {
            Err(Error::CouponRejected(reason)) => {
                assert_eq!(reason, "Coupon usage limit reached");
            }
            other => panic!("expected CouponRejected, got {other:?}"),
        }

        // Cap reached: the coupon deactivates in the same statement
        let coupon = db.get_coupon("ONCE").unwrap().unwrap();
        assert_eq!(coupon.current_uses, 1);
        assert!(!coupon.is_active);
    }

    #[test]
    fn test_per_customer_limit() {
        let db = test_db();
        db.create_promotion(&NewPromotion {
            id: "p-once".to_string(),
            restaurant_id: "default".to_string(),
            name: "Once per customer".to_string(),
            promotion_type: "fixed_discount".to_string(),
            discount_value: 5.0,
            max_discount_amount: None,
            min_order_amount: None,
            target_type: "order_total".to_string(),
            target_items: Vec::new(),
            conditions: serde_json::json!({}),
            stackable: true,
            priority: 0,
            auto_apply: false,
            start_date: None,
            end_date: None,
            usage_limit: None,
            per_customer_limit: Some(1),
            customer_tiers: Vec::new(),
        })
        .unwrap();
        seed_coupon(&db, "ONE-EACH", "p-once");

        let gate = CouponGate::new(Arc::clone(&db));
        gate.use_coupon("ONE-EACH", Some("alice"), "order-1", 50.0, &[])
            .unwrap();

        let v = gate.validate("ONE-EACH", Some("alice"), 50.0, &[]).unwrap();
        assert_eq!(
            v.error.as_deref(),
            Some("You have reached the usage limit for this promotion")
        );

        // A different customer is unaffected
        let v = gate.validate("ONE-EACH", Some("bob"), 50.0, &[]).unwrap();
        assert!(v.is_valid);
    }
}
