//! Stacking conflict resolution and sequential application.
//!
//! Non-stackable promotions are mutually exclusive with everything
//! else: at most one is ever applied. The winner between the single
//! best non-stackable promotion and the full stackable set is chosen
//! by comparing declared `discount_value` estimates, not computed
//! discounts. That declared-value heuristic is a known imprecision
//! carried over deliberately; see DESIGN.md.

use serde::{Deserialize, Serialize};

use super::{round_cents, DiscountCalculator, OrderLine, Promotion, PromotionType};

/// One applied promotion line in a discount breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedPromotion {
    pub promotion_id: String,
    pub name: String,
    pub discount_type: PromotionType,
    pub discount_amount: f64,
}

/// Aggregate result of applying a resolved promotion list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountBreakdown {
    pub original_total: f64,
    pub final_total: f64,
    pub total_discount: f64,
    pub applied_promotions: Vec<AppliedPromotion>,
}

impl DiscountBreakdown {
    /// Zero-discount breakdown for an order with no candidates.
    pub fn unchanged(original_total: f64) -> Self {
        Self {
            original_total,
            final_total: original_total,
            total_discount: 0.0,
            applied_promotions: Vec::new(),
        }
    }
}

/// Picks the legally combinable promotion subset and applies it in
/// sequence against a running order total.
#[derive(Debug, Default)]
pub struct StackingResolver;

impl StackingResolver {
    /// Ordered list of promotions to apply sequentially.
    ///
    /// Each side is sorted by `(priority desc, discount_value desc)`.
    /// The returned order is the application order and must be
    /// preserved exactly: later promotions see the already-discounted
    /// running total.
    pub fn resolve(candidates: Vec<Promotion>) -> Vec<Promotion> {
        let (mut stackable, mut non_stackable): (Vec<_>, Vec<_>) =
            candidates.into_iter().partition(|p| p.stackable);

        Self::sort_by_declared_value(&mut stackable);
        Self::sort_by_declared_value(&mut non_stackable);

        if let Some(best_exclusive) = non_stackable.into_iter().next() {
            // Declared-value estimates, not computed discounts.
            let stackable_estimate: f64 = stackable.iter().map(|p| p.discount_value).sum();
            if best_exclusive.discount_value >= stackable_estimate {
                return vec![best_exclusive];
            }
        }
        stackable
    }

    fn sort_by_declared_value(promotions: &mut [Promotion]) {
        promotions.sort_by(|a, b| {
            b.priority.cmp(&a.priority).then_with(|| {
                b.discount_value
                    .partial_cmp(&a.discount_value)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });
    }

    /// Apply a resolved promotion list in order against a running
    /// total. The running total is clamped to zero after every
    /// subtraction, never only at the end.
    pub fn apply(
        calculator: &DiscountCalculator,
        original_total: f64,
        lines: &[OrderLine],
        promotions: &[Promotion],
    ) -> DiscountBreakdown {
        let mut running = original_total;
        let mut applied = Vec::new();

        for promotion in promotions {
            let discount = calculator.calculate(promotion, running, lines);
            // Never let the running total go negative mid-stack.
            let discount = discount.min(running).max(0.0);
            if discount <= 0.0 {
                continue;
            }
            running = (running - discount).max(0.0);
            applied.push(AppliedPromotion {
                promotion_id: promotion.id.clone(),
                name: promotion.name.clone(),
                discount_type: promotion.promotion_type.clone(),
                discount_amount: round_cents(discount),
            });
        }

        let final_total = round_cents(running.max(0.0));
        DiscountBreakdown {
            original_total: round_cents(original_total),
            final_total,
            total_discount: round_cents(original_total - running),
            applied_promotions: applied,
        }
    }
}
