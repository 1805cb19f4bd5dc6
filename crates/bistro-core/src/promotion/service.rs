//! Checkout discount orchestration.
//!
//! Ties the catalog, coupon gate, calculator, and stacking resolver
//! together behind one call. Partial success is the default posture:
//! an invalid coupon or a broken promotion record lands in
//! `invalid_coupons`/`warnings` instead of failing the request.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::promotion::{
    AppliedPromotion, CouponGate, DiscountCalculator, EligibilityContext, OrderLine, Promotion,
    PromotionType, StackingResolver,
};

/// Input to a checkout discount calculation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscountRequest {
    pub customer_id: Option<String>,
    pub customer_tier: Option<String>,
    pub order_total: f64,
    pub order_lines: Vec<OrderLine>,
    /// Coupon codes presented at checkout.
    #[serde(default)]
    pub coupon_codes: Vec<String>,
    /// Explicitly requested promotion ids (bypass the auto-apply
    /// requirement, not the eligibility gates).
    #[serde(default)]
    pub promotion_ids: Vec<String>,
}

/// A coupon that failed validation, with the user-facing reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidCoupon {
    pub code: String,
    pub reason: String,
}

/// Complete checkout result. Always returned, possibly with zero
/// discount and populated warnings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutDiscounts {
    pub original_total: f64,
    pub final_total: f64,
    pub total_discount: f64,
    pub applied_promotions: Vec<AppliedPromotion>,
    pub invalid_coupons: Vec<InvalidCoupon>,
    pub warnings: Vec<String>,
}

/// Discount engine facade over the promotion catalog.
pub struct DiscountService {
    db: Arc<Database>,
    calculator: DiscountCalculator,
    gate: CouponGate,
}

impl DiscountService {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            gate: CouponGate::new(Arc::clone(&db)),
            calculator: DiscountCalculator::new(),
            db,
        }
    }

    /// Coupon gate for validate/redeem calls outside checkout.
    pub fn coupon_gate(&self) -> &CouponGate {
        &self.gate
    }

    /// Compute the discount breakdown for an order.
    ///
    /// Candidate promotions come from three sources: active
    /// auto-apply promotions, explicitly requested promotion ids, and
    /// the promotions behind valid coupon codes. Candidates then pass
    /// the eligibility gates and go through stacking resolution.
    pub fn calculate_order_discounts(
        &self,
        restaurant_id: &str,
        request: &DiscountRequest,
    ) -> Result<CheckoutDiscounts> {
        if request.order_total < 0.0 {
            return Err(Error::InvalidOrder(format!(
                "order total cannot be negative: {}",
                request.order_total
            )));
        }
        if !request.order_total.is_finite() {
            return Err(Error::InvalidOrder("order total is not finite".to_string()));
        }

        let now = Utc::now();
        let mut warnings = Vec::new();
        let mut invalid_coupons = Vec::new();
        let mut candidates: Vec<Promotion> = Vec::new();

        // Auto-apply promotions in their active window.
        candidates.extend(self.db.auto_apply_promotions(restaurant_id, now)?);

        // Explicitly requested promotions.
        for id in &request.promotion_ids {
            match self.db.get_promotion(id)? {
                Some(p) => candidates.push(p),
                None => warnings.push(format!("Promotion not found: {id}")),
            }
        }

        // Coupon-backed promotions, gated by coupon validity.
        for code in &request.coupon_codes {
            let validation = self.gate.validate(
                code,
                request.customer_id.as_deref(),
                request.order_total,
                &request.order_lines,
            )?;
            if !validation.is_valid {
                invalid_coupons.push(InvalidCoupon {
                    code: code.clone(),
                    reason: validation
                        .error
                        .unwrap_or_else(|| "Coupon validation failed".to_string()),
                });
                continue;
            }
            if let Some(coupon) = self.db.get_coupon(code)? {
                if let Some(p) = self.db.get_promotion(&coupon.promotion_id)? {
                    candidates.push(p);
                }
            }
        }

        // One promotion enters the stack once, whatever brought it in.
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        candidates.dedup_by(|a, b| a.id == b.id);

        let ctx = EligibilityContext {
            order_total: request.order_total,
            lines: &request.order_lines,
            customer_tier: request.customer_tier.as_deref(),
            now,
        };
        let mut eligible = Vec::new();
        for promotion in candidates {
            if !promotion.is_candidate(&ctx) {
                debug!(promotion_id = %promotion.id, "promotion not applicable, excluded");
                continue;
            }
            if let Some(limit) = promotion.per_customer_limit {
                if let Some(customer) = request.customer_id.as_deref() {
                    if self
                        .db
                        .customer_promotion_use_count(&promotion.id, customer)?
                        >= limit
                    {
                        debug!(promotion_id = %promotion.id, "per-customer limit reached");
                        continue;
                    }
                }
            }
            if let PromotionType::Unknown(t) = &promotion.promotion_type {
                warnings.push(format!(
                    "Promotion '{}' has unsupported type '{t}' and yields no discount",
                    promotion.name
                ));
            }
            eligible.push(promotion);
        }

        let resolved = StackingResolver::resolve(eligible);
        let breakdown = StackingResolver::apply(
            &self.calculator,
            request.order_total,
            &request.order_lines,
            &resolved,
        );

        Ok(CheckoutDiscounts {
            original_total: breakdown.original_total,
            final_total: breakdown.final_total,
            total_discount: breakdown.total_discount,
            applied_promotions: breakdown.applied_promotions,
            invalid_coupons,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewCoupon, NewPromotion};

    fn test_db() -> Arc<Database> {
        let db = Database::open_in_memory().unwrap();
        db.init_schema().unwrap();
        Arc::new(db)
    }

    fn new_promotion(id: &str, promotion_type: &str, value: f64) -> NewPromotion {
        NewPromotion {
            id: id.to_string(),
            restaurant_id: "default".to_string(),
            name: format!("Promo {id}"),
            promotion_type: promotion_type.to_string(),
            discount_value: value,
            max_discount_amount: None,
            min_order_amount: None,
            target_type: "order_total".to_string(),
            target_items: Vec::new(),
            conditions: serde_json::json!({}),
            stackable: true,
            priority: 0,
            auto_apply: true,
            start_date: None,
            end_date: None,
            usage_limit: None,
            per_customer_limit: None,
            customer_tiers: Vec::new(),
        }
    }

    fn request(total: f64) -> DiscountRequest {
        DiscountRequest {
            order_total: total,
            ..Default::default()
        }
    }

    #[test]
    fn test_negative_total_is_invalid() {
        let service = DiscountService::new(test_db());
        let err = service
            .calculate_order_discounts("default", &request(-5.0))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOrder(_)));
    }

    #[test]
    fn test_no_candidates_returns_unchanged_totals() {
        let service = DiscountService::new(test_db());
        let result = service
            .calculate_order_discounts("default", &request(80.0))
            .unwrap();
        assert_eq!(result.original_total, 80.0);
        assert_eq!(result.final_total, 80.0);
        assert_eq!(result.total_discount, 0.0);
        assert!(result.applied_promotions.is_empty());
    }

    #[test]
    fn test_auto_apply_stacking_flow() {
        let db = test_db();
        let mut pct = new_promotion("pct", "percentage_discount", 10.0);
        pct.priority = 10;
        db.create_promotion(&pct).unwrap();
        let mut fixed = new_promotion("fixed", "fixed_discount", 15.0);
        fixed.priority = 5;
        db.create_promotion(&fixed).unwrap();

        let service = DiscountService::new(db);
        let result = service
            .calculate_order_discounts("default", &request(130.0))
            .unwrap();
        // 130 * 0.9 = 117, then 117 - 15 = 102
        assert_eq!(result.final_total, 102.0);
        assert_eq!(result.applied_promotions.len(), 2);
        assert_eq!(result.applied_promotions[0].promotion_id, "pct");
    }

    #[test]
    fn test_invalid_coupon_is_collected_not_fatal() {
        let db = test_db();
        db.create_promotion(&new_promotion("pct", "percentage_discount", 10.0))
            .unwrap();

        let service = DiscountService::new(db);
        let mut req = request(100.0);
        req.coupon_codes = vec!["BOGUS".to_string()];
        let result = service.calculate_order_discounts("default", &req).unwrap();

        assert_eq!(result.invalid_coupons.len(), 1);
        assert_eq!(result.invalid_coupons[0].code, "BOGUS");
        assert_eq!(result.invalid_coupons[0].reason, "Invalid coupon code");
        // The auto-apply promotion still applied
        assert_eq!(result.final_total, 90.0);
    }

    #[test]
    fn test_coupon_promotion_joins_candidates() {
        let db = test_db();
        let mut promo = new_promotion("coupon-promo", "fixed_discount", 20.0);
        promo.auto_apply = false;
        db.create_promotion(&promo).unwrap();
        db.create_coupon(&NewCoupon {
            id: "c1".to_string(),
            code: "TWENTY".to_string(),
            promotion_id: "coupon-promo".to_string(),
            valid_from: None,
            valid_until: None,
            max_uses: None,
            customer_id: None,
        })
        .unwrap();

        let service = DiscountService::new(db);
        let mut req = request(100.0);
        req.coupon_codes = vec!["TWENTY".to_string()];
        let result = service.calculate_order_discounts("default", &req).unwrap();
        assert_eq!(result.final_total, 80.0);
        assert!(result.invalid_coupons.is_empty());
    }

    #[test]
    fn test_unknown_promotion_type_warns_but_continues() {
        let db = test_db();
        db.create_promotion(&new_promotion("weird", "loyalty_boost", 10.0))
            .unwrap();
        db.create_promotion(&new_promotion("pct", "percentage_discount", 10.0))
            .unwrap();

        let service = DiscountService::new(db);
        let result = service
            .calculate_order_discounts("default", &request(100.0))
            .unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("loyalty_boost"));
        // The healthy promotion still applied
        assert_eq!(result.final_total, 90.0);
    }

    #[test]
    fn test_duplicate_candidate_applied_once() {
        let db = test_db();
        db.create_promotion(&new_promotion("pct", "percentage_discount", 10.0))
            .unwrap();

        let service = DiscountService::new(db);
        let mut req = request(100.0);
        // Auto-apply already brings it in; requesting it again must not double it
        req.promotion_ids = vec!["pct".to_string()];
        let result = service.calculate_order_discounts("default", &req).unwrap();
        assert_eq!(result.applied_promotions.len(), 1);
        assert_eq!(result.final_total, 90.0);
    }

    #[test]
    fn test_final_total_bounds_hold() {
        let db = test_db();
        db.create_promotion(&new_promotion("huge", "fixed_discount", 10_000.0))
            .unwrap();

        let service = DiscountService::new(db);
        let result = service
            .calculate_order_discounts("default", &request(59.99))
            .unwrap();
        assert!(result.final_total >= 0.0);
        assert!(result.final_total <= result.original_total);
        assert_eq!(result.final_total, 0.0);
    }

    #[test]
    fn test_calculation_is_repeatable() {
        let db = test_db();
        db.create_promotion(&new_promotion("pct", "percentage_discount", 7.5))
            .unwrap();

        let service = DiscountService::new(db);
        let req = request(123.45);
        let first = service.calculate_order_discounts("default", &req).unwrap();
        let second = service.calculate_order_discounts("default", &req).unwrap();
        assert_eq!(first.final_total, second.final_total);
        assert_eq!(first.total_discount, second.total_discount);
    }
}
