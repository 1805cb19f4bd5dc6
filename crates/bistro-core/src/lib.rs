//! bistro-core - Core library for Bistro
//!
//! This crate provides the restaurant-operations engines shared by the
//! bistro server and any embedding application:
//!
//! - **promotion**: discount calculation, stacking resolution, coupon
//!   validation/redemption, checkout orchestration
//! - **table**: turn-time alert classification, heat-map scoring,
//!   occupancy summaries
//! - **db**: direct SQLite access to promotions, coupons, usage
//!   records, tables, and sessions

pub mod db;
pub mod error;
pub mod promotion;
pub mod table;

// Re-export commonly used types
pub use db::Database;
pub use error::{Error, Result};
