//! Per-promotion discount calculation.
//!
//! [`DiscountCalculator::calculate`] computes the discount amount one
//! promotion yields against an order total and its line items. It
//! never fails for valid numeric input: an unknown promotion type
//! degrades to a zero discount with a warning log entry, so one bad
//! promotion record cannot block the rest of the checkout.

use tracing::warn;

use super::{BogoRule, OrderLine, Promotion, PromotionType, TierDiscountType};

/// Shipping cost estimate used by free-shipping promotions.
///
/// The reference behavior is a flat estimate; a real carrier-rate
/// lookup can be substituted without touching the calculator.
pub trait ShippingCost: Send + Sync {
    fn estimate(&self, lines: &[OrderLine]) -> f64;
}

/// Flat shipping estimate.
#[derive(Debug, Clone, Copy)]
pub struct FlatShippingCost {
    pub amount: f64,
}

impl Default for FlatShippingCost {
    fn default() -> Self {
        Self { amount: 10.0 }
    }
}

impl ShippingCost for FlatShippingCost {
    fn estimate(&self, _lines: &[OrderLine]) -> f64 {
        self.amount
    }
}

/// Computes per-promotion discount amounts.
pub struct DiscountCalculator {
    shipping: Box<dyn ShippingCost>,
}

impl std::fmt::Debug for DiscountCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscountCalculator").finish_non_exhaustive()
    }
}

impl Default for DiscountCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscountCalculator {
    /// Calculator with the default flat shipping estimate.
    pub fn new() -> Self {
        Self {
            shipping: Box::new(FlatShippingCost::default()),
        }
    }

    /// Calculator with a substituted shipping-cost collaborator.
    pub fn with_shipping(shipping: Box<dyn ShippingCost>) -> Self {
        Self { shipping }
    }

    /// Discount amount this promotion yields against `order_total`.
    ///
    /// Always `>= 0`. A pure function of its inputs: no hidden state,
    /// identical inputs yield identical output.
    pub fn calculate(&self, promotion: &Promotion, order_total: f64, lines: &[OrderLine]) -> f64 {
        let discount = match &promotion.promotion_type {
            PromotionType::PercentageDiscount => {
                let mut d = order_total * (promotion.discount_value / 100.0);
                if let Some(cap) = promotion.max_discount_amount {
                    d = d.min(cap);
                }
                d
            }
            PromotionType::FixedDiscount => {
                // A fixed discount can never exceed the total it discounts.
                promotion.discount_value.min(order_total)
            }
            PromotionType::FreeShipping => {
                let shipping_cost = self.shipping.estimate(lines);
                if promotion.discount_value > 0.0 {
                    promotion.discount_value.min(shipping_cost)
                } else {
                    shipping_cost
                }
            }
            PromotionType::Bogo => {
                let default_rule = BogoRule::default();
                let rule = promotion.bogo_rule().unwrap_or(&default_rule);
                Self::bogo_discount(promotion, rule, lines)
            }
            PromotionType::TieredDiscount => Self::tiered_discount(promotion, order_total),
            PromotionType::BundleDiscount => Self::bundle_discount(promotion, order_total, lines),
            // Cashback is a deferred credit, never an immediate
            // reduction of the checkout total.
            PromotionType::Cashback => 0.0,
            PromotionType::Unknown(other) => {
                warn!(
                    promotion_id = %promotion.id,
                    promotion_type = %other,
                    "unknown promotion type, applying zero discount"
                );
                0.0
            }
        };
        discount.max(0.0)
    }

    /// Buy X get Y at a percentage off, counted per eligible line.
    ///
    /// Eligible lines are processed cheapest first so the discount
    /// lands on the cheaper items (merchant-favorable tie-break).
    fn bogo_discount(promotion: &Promotion, rule: &BogoRule, lines: &[OrderLine]) -> f64 {
        let set_size = rule.buy_quantity + rule.get_quantity;
        if set_size == 0 {
            return 0.0;
        }

        let mut eligible = promotion.eligible_lines(lines);
        eligible.sort_by(|a, b| {
            a.unit_price
                .partial_cmp(&b.unit_price)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut discount = 0.0;
        for line in eligible {
            let sets = line.quantity / set_size;
            discount += f64::from(sets)
                * f64::from(rule.get_quantity)
                * line.unit_price
                * (rule.get_discount_percent / 100.0);
        }
        discount
    }

    /// Highest tier whose threshold the order total meets (inclusive).
    fn tiered_discount(promotion: &Promotion, order_total: f64) -> f64 {
        let Some(tiers) = promotion.tiers() else {
            return 0.0;
        };

        let mut sorted: Vec<_> = tiers.iter().collect();
        sorted.sort_by(|a, b| {
            b.threshold
                .partial_cmp(&a.threshold)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for tier in sorted {
            if order_total >= tier.threshold {
                return match tier.discount_type {
                    TierDiscountType::Percentage => {
                        let mut d = order_total * (tier.discount_value / 100.0);
                        if let Some(cap) = tier.max_discount {
                            d = d.min(cap);
                        }
                        d
                    }
                    TierDiscountType::Fixed => tier.discount_value.min(order_total),
                };
            }
        }
        0.0
    }

    /// All bundle items must be present at or above the required
    /// quantity, otherwise the discount is zero.
    fn bundle_discount(promotion: &Promotion, order_total: f64, lines: &[OrderLine]) -> f64 {
        let Some((bundle, discount_type)) = promotion.bundle() else {
            return 0.0;
        };
        if bundle.is_empty() {
            return 0.0;
        }

        let mut bundle_total = 0.0;
        for required in bundle {
            let Some(line) = lines
                .iter()
                .find(|l| l.item_id == required.item_id && l.quantity >= required.quantity)
            else {
                return 0.0;
            };
            bundle_total += line.line_total();
        }

        match discount_type {
            // Percentage applies to the bundle-item line totals.
            TierDiscountType::Percentage => bundle_total * (promotion.discount_value / 100.0),
            // Fixed is a flat amount against the order.
            TierDiscountType::Fixed => promotion.discount_value.min(order_total),
        }
    }
}
