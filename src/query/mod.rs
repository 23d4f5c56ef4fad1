//! Analytical store integration.
//!
//! This module provides:
//! - Record types matching the gateway's JSON contract
//! - The `AnalyticsStore` trait and its HTTP implementation
//! - The cross-source join that backs the users view

mod client;
mod resolve;
pub mod types;

pub use client::{AnalyticsStore, HttpAnalyticsStore, QueryError};
pub use resolve::{resolve_users, UsersResolution};
pub use types::{
    EventBreakdownRecord, OverageRecord, RosterRecord, TimestampField, UsageRecord,
    UserUsageRecord,
};
