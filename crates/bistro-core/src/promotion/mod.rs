//! Promotion domain types and eligibility rules.
//!
//! A [`Promotion`] is a configured discount campaign. Its free-form
//! `conditions` column is decoded once at load time into typed
//! [`PromotionCondition`] variants; gate conditions are evaluated via
//! exhaustive pattern match, parameter conditions (tiers, bundles,
//! BOGO rules) are looked up by the calculator.

pub mod calculator;
pub mod coupon;
pub mod service;
pub mod stacking;

pub use calculator::{DiscountCalculator, FlatShippingCost, ShippingCost};
pub use coupon::{Coupon, CouponGate, CouponUsage, CouponValidation};
pub use service::{CheckoutDiscounts, DiscountRequest, DiscountService, InvalidCoupon};
pub use stacking::{AppliedPromotion, DiscountBreakdown, StackingResolver};

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ─────────────────────────────────────────────────────────────────────────────
// Enums
// ─────────────────────────────────────────────────────────────────────────────

/// Promotion type.
///
/// Unknown strings are preserved rather than rejected: one
/// unrecognized promotion must not block the rest of the checkout
/// calculation, so decoding never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionType {
    PercentageDiscount,
    FixedDiscount,
    Bogo,
    FreeShipping,
    BundleDiscount,
    TieredDiscount,
    Cashback,
    Unknown(String),
}

impl PromotionType {
    /// Wire/database representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::PercentageDiscount => "percentage_discount",
            Self::FixedDiscount => "fixed_discount",
            Self::Bogo => "bogo",
            Self::FreeShipping => "free_shipping",
            Self::BundleDiscount => "bundle_discount",
            Self::TieredDiscount => "tiered_discount",
            Self::Cashback => "cashback",
            Self::Unknown(s) => s,
        }
    }

    /// Parse from the wire/database representation. Never fails.
    pub fn parse(s: &str) -> Self {
        match s {
            "percentage_discount" => Self::PercentageDiscount,
            "fixed_discount" => Self::FixedDiscount,
            "bogo" => Self::Bogo,
            "free_shipping" => Self::FreeShipping,
            "bundle_discount" => Self::BundleDiscount,
            "tiered_discount" => Self::TieredDiscount,
            "cashback" => Self::Cashback,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl std::fmt::Display for PromotionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PromotionType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PromotionType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// What part of the order a promotion targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    OrderTotal,
    SpecificItems,
    Categories,
    Brands,
    Shipping,
}

impl TargetType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OrderTotal => "order_total",
            Self::SpecificItems => "specific_items",
            Self::Categories => "categories",
            Self::Brands => "brands",
            Self::Shipping => "shipping",
        }
    }

    /// Parse from the database representation; unrecognized values
    /// fall back to targeting the order total.
    pub fn parse(s: &str) -> Self {
        match s {
            "specific_items" => Self::SpecificItems,
            "categories" => Self::Categories,
            "brands" => Self::Brands,
            "shipping" => Self::Shipping,
            _ => Self::OrderTotal,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conditions
// ─────────────────────────────────────────────────────────────────────────────

/// One tier of a tiered discount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountTier {
    /// Order total must be at or above this to qualify (inclusive).
    pub threshold: f64,
    pub discount_type: TierDiscountType,
    pub discount_value: f64,
    #[serde(default)]
    pub max_discount: Option<f64>,
}

/// Numeric interpretation of a tier or bundle discount value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierDiscountType {
    Percentage,
    Fixed,
}

/// One required item of a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleItem {
    pub item_id: String,
    pub quantity: u32,
}

/// Buy X get Y at a percentage off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BogoRule {
    pub buy_quantity: u32,
    pub get_quantity: u32,
    pub get_discount_percent: f64,
}

impl Default for BogoRule {
    fn default() -> Self {
        // Buy one, get one free.
        Self {
            buy_quantity: 1,
            get_quantity: 1,
            get_discount_percent: 100.0,
        }
    }
}

/// Hours/days a promotion is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeRestriction {
    /// Hours of day (0-23). Empty means unrestricted.
    #[serde(default)]
    pub hours: Vec<u32>,
    /// Days of week, 0 = Sunday. Empty means unrestricted.
    #[serde(default)]
    pub days_of_week: Vec<u32>,
}

/// Typed promotion condition, decoded once from the stored JSON map.
///
/// `MinItems`, `RequiredItems`, `RequiredCategories`, and
/// `TimeRestriction` are hard gates: any unmet gate disqualifies the
/// promotion entirely. `Tiers`, `BundleItems`, and `Bogo` are
/// calculation parameters, not gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PromotionCondition {
    MinItems(u32),
    RequiredItems(Vec<String>),
    RequiredCategories(Vec<String>),
    TimeRestriction(TimeRestriction),
    Tiers(Vec<DiscountTier>),
    BundleItems {
        items: Vec<BundleItem>,
        discount_type: TierDiscountType,
    },
    Bogo(BogoRule),
}

/// Decode the stored `conditions` JSON object into typed conditions.
///
/// Unrecognized or malformed keys are skipped with a debug log entry;
/// a bad condition must not take the promotion record down with it.
pub fn decode_conditions(value: &serde_json::Value) -> Vec<PromotionCondition> {
    let Some(map) = value.as_object() else {
        return Vec::new();
    };

    let mut conditions = Vec::new();
    for (key, val) in map {
        let decoded = match key.as_str() {
            "min_items" => val
                .as_u64()
                .map(|n| PromotionCondition::MinItems(n as u32)),
            "required_items" => serde_json::from_value(val.clone())
                .ok()
                .map(PromotionCondition::RequiredItems),
            "required_categories" => serde_json::from_value(val.clone())
                .ok()
                .map(PromotionCondition::RequiredCategories),
            "time_restrictions" => serde_json::from_value(val.clone())
                .ok()
                .map(PromotionCondition::TimeRestriction),
            "tiers" => serde_json::from_value(val.clone())
                .ok()
                .map(PromotionCondition::Tiers),
            "bundle_items" => serde_json::from_value(val.clone()).ok().map(|items| {
                // The bundle's value interpretation rides alongside the
                // item list in the stored map; percentage by default.
                let discount_type = map
                    .get("bundle_discount_type")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or(TierDiscountType::Percentage);
                PromotionCondition::BundleItems {
                    items,
                    discount_type,
                }
            }),
            // Consumed while decoding bundle_items above.
            "bundle_discount_type" => continue,
            "bogo" => serde_json::from_value(val.clone())
                .ok()
                .map(PromotionCondition::Bogo),
            _ => None,
        };
        match decoded {
            Some(c) => conditions.push(c),
            None => debug!(key = %key, "skipping unrecognized promotion condition"),
        }
    }
    conditions
}

// ─────────────────────────────────────────────────────────────────────────────
// Entity types
// ─────────────────────────────────────────────────────────────────────────────

/// A configured discount campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    pub promotion_type: PromotionType,
    /// Declared discount magnitude: percent for percentage types,
    /// currency amount for fixed types.
    pub discount_value: f64,
    pub max_discount_amount: Option<f64>,
    pub min_order_amount: Option<f64>,
    pub target_type: TargetType,
    /// Item/category/brand ids, interpreted per `target_type`.
    pub target_items: Vec<String>,
    pub conditions: Vec<PromotionCondition>,
    pub stackable: bool,
    /// Higher priority applies first.
    pub priority: i32,
    /// Only auto-apply promotions are candidates without an explicit
    /// coupon or requested promotion id.
    pub auto_apply: bool,
    pub is_active: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub usage_limit: Option<i64>,
    pub per_customer_limit: Option<i64>,
    pub current_uses: i64,
    /// Customer tiers this promotion is restricted to. Empty means
    /// unrestricted.
    pub customer_tiers: Vec<String>,
}

/// One line of an order being checked out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub category: Option<String>,
    pub brand: Option<String>,
}

impl OrderLine {
    pub fn line_total(&self) -> f64 {
        f64::from(self.quantity) * self.unit_price
    }
}

/// Inputs to the candidate/eligibility predicate.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityContext<'a> {
    pub order_total: f64,
    pub lines: &'a [OrderLine],
    pub customer_tier: Option<&'a str>,
    pub now: DateTime<Utc>,
}

impl Promotion {
    /// Whether this promotion is a candidate for the given order.
    ///
    /// Any unmet gate disqualifies the promotion entirely: this is
    /// "not applicable", not an error and not a zero discount.
    pub fn is_candidate(&self, ctx: &EligibilityContext<'_>) -> bool {
        if !self.is_active {
            return false;
        }
        if let Some(start) = self.start_date {
            if ctx.now < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if ctx.now > end {
                return false;
            }
        }
        if let Some(min) = self.min_order_amount {
            if ctx.order_total < min {
                return false;
            }
        }
        if !self.customer_tiers.is_empty() {
            match ctx.customer_tier {
                Some(tier) if self.customer_tiers.iter().any(|t| t == tier) => {}
                _ => return false,
            }
        }
        if let Some(limit) = self.usage_limit {
            if self.current_uses >= limit {
                return false;
            }
        }
        self.conditions.iter().all(|c| Self::gate_met(c, ctx))
    }

    fn gate_met(condition: &PromotionCondition, ctx: &EligibilityContext<'_>) -> bool {
        match condition {
            PromotionCondition::MinItems(min) => {
                let total_items: u32 = ctx.lines.iter().map(|l| l.quantity).sum();
                total_items >= *min
            }
            PromotionCondition::RequiredItems(items) => items
                .iter()
                .all(|id| ctx.lines.iter().any(|l| &l.item_id == id)),
            PromotionCondition::RequiredCategories(cats) => cats.iter().all(|cat| {
                ctx.lines
                    .iter()
                    .any(|l| l.category.as_deref() == Some(cat.as_str()))
            }),
            PromotionCondition::TimeRestriction(tr) => {
                if !tr.hours.is_empty() && !tr.hours.contains(&ctx.now.hour()) {
                    return false;
                }
                if !tr.days_of_week.is_empty()
                    && !tr
                        .days_of_week
                        .contains(&ctx.now.weekday().num_days_from_sunday())
                {
                    return false;
                }
                true
            }
            // Calculation parameters, never gates.
            PromotionCondition::Tiers(_)
            | PromotionCondition::BundleItems { .. }
            | PromotionCondition::Bogo(_) => true,
        }
    }

    /// Order lines eligible under this promotion's target.
    pub fn eligible_lines<'a>(&self, lines: &'a [OrderLine]) -> Vec<&'a OrderLine> {
        match self.target_type {
            TargetType::OrderTotal | TargetType::Shipping => lines.iter().collect(),
            TargetType::SpecificItems => lines
                .iter()
                .filter(|l| self.target_items.iter().any(|id| id == &l.item_id))
                .collect(),
            TargetType::Categories => lines
                .iter()
                .filter(|l| {
                    l.category
                        .as_deref()
                        .is_some_and(|c| self.target_items.iter().any(|id| id == c))
                })
                .collect(),
            TargetType::Brands => lines
                .iter()
                .filter(|l| {
                    l.brand
                        .as_deref()
                        .is_some_and(|b| self.target_items.iter().any(|id| id == b))
                })
                .collect(),
        }
    }

    /// First tier list found in the conditions, if any.
    pub fn tiers(&self) -> Option<&[DiscountTier]> {
        self.conditions.iter().find_map(|c| match c {
            PromotionCondition::Tiers(tiers) => Some(tiers.as_slice()),
            _ => None,
        })
    }

    /// Bundle-item list and value interpretation, if any.
    pub fn bundle(&self) -> Option<(&[BundleItem], TierDiscountType)> {
        self.conditions.iter().find_map(|c| match c {
            PromotionCondition::BundleItems {
                items,
                discount_type,
            } => Some((items.as_slice(), *discount_type)),
            _ => None,
        })
    }

    /// BOGO rule from the conditions, if any.
    pub fn bogo_rule(&self) -> Option<&BogoRule> {
        self.conditions.iter().find_map(|c| match c {
            PromotionCondition::Bogo(rule) => Some(rule),
            _ => None,
        })
    }
}

/// Round a currency amount to cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
