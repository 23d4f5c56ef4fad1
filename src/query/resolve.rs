//! Cross-source join for the users view.
//!
//! Usage aggregates and roster facts come from different datasets and are
//! fetched concurrently. Usage is the required branch; the roster branch is
//! best-effort and degrades to an empty default on absence or failure, which
//! is a normal display state, not an error.

use super::client::{AnalyticsStore, QueryError};
use super::types::{RosterRecord, UserUsageRecord};
use crate::projection::matches_filter;

/// Combined users-view result: usage rows (store order, credits descending)
/// plus the roster for the scoped organization.
#[derive(Debug, Clone)]
pub struct UsersResolution {
    pub rows: Vec<UserUsageRecord>,
    pub roster: RosterRecord,
}

/// Fan-out/fan-in join of usage and roster for one entity scope.
///
/// `scope` is handed to the store for exact-match narrowing; it may be free
/// text rather than a known organization, so `narrow` is applied afterward
/// as a client-side substring match across {userId, displayName, email,
/// entityId}. The client-side pass is the authoritative filter.
pub async fn resolve_users(
    store: &dyn AnalyticsStore,
    scope: &str,
    narrow: &str,
    window_days: u32,
) -> Result<UsersResolution, QueryError> {
    let (usage, roster) = tokio::join!(
        store.user_usage(scope, window_days),
        store.org_roster(scope),
    );

    let rows = usage?;

    let roster = match roster {
        Ok(Some(roster)) => roster,
        Ok(None) => RosterRecord::empty_for(scope),
        Err(e) => {
            log::warn!("Resolve: roster lookup failed for {}: {}", scope, e);
            RosterRecord::empty_for(scope)
        }
    };

    let needle = narrow.trim().to_lowercase();
    let rows: Vec<UserUsageRecord> = if needle.is_empty() {
        rows
    } else {
        rows.into_iter()
            .filter(|row| matches_filter(row, &needle))
            .collect()
    };

    Ok(UsersResolution { rows, roster })
}
