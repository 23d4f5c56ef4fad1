//! Per-tab view derivation.
//!
//! A `FetchPlan` goes in, a `ViewSnapshot` comes out: fetch the tab's
//! records from the analytical store, run the cross-source join where the
//! tab needs one, project with the plan's filter and sort, and attach the
//! derived figures the renderer displays alongside the rows.

use serde::Serialize;

use crate::projection::{project, SortSpec};
use crate::query::types::{
    EventBreakdownRecord, OverageRecord, RosterRecord, UsageRecord, UserUsageRecord,
};
use crate::query::{resolve_users, AnalyticsStore, QueryError};
use crate::state_machine::{FetchPlan, Tab};

/// Shown on the users tab until an entity scope exists.
pub const USERS_PROMPT: &str = "Select an organization from the Organizations tab";

/// Summary figures over the unfiltered organization result set. The filter
/// narrows the table below these, never the totals themselves.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgTotals {
    pub total_organizations: usize,
    pub total_searches: i64,
    pub total_users: i64,
    pub avg_searches_per_org: f64,
}

impl OrgTotals {
    pub fn compute(rows: &[UsageRecord]) -> OrgTotals {
        let total_organizations = rows.len();
        let total_searches: i64 = rows.iter().map(|r| r.event_count).sum();
        let total_users: i64 = rows.iter().map(|r| r.unique_users).sum();
        // Raw mean; the renderer rounds for display.
        let avg_searches_per_org = if total_organizations == 0 {
            0.0
        } else {
            total_searches as f64 / total_organizations as f64
        };
        OrgTotals {
            total_organizations,
            total_searches,
            total_users,
            avg_searches_per_org,
        }
    }
}

/// A fully derived view, ready for any renderer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub tab: Tab,
    pub window_days: u32,
    pub filter_text: String,
    pub resolved_entity: Option<String>,
    pub sort: Option<SortSpec>,
    pub body: ViewBody,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ViewBody {
    /// Nothing to derive yet; show guidance instead of a table.
    Prompt { message: String },
    /// The derivation failed; the message is the failure's own text.
    Error { message: String },
    Organizations {
        totals: OrgTotals,
        rows: Vec<UsageRecord>,
    },
    Users {
        /// Entity the view is scoped to.
        entity: String,
        /// False when no row carries an email, which is how enterprise
        /// instances look from the outside.
        identity_available: bool,
        roster: RosterRecord,
        rows: Vec<UserUsageRecord>,
    },
    Overages { rows: Vec<OverageRecord> },
    Events {
        /// Whether the breakdown was scoped to one entity.
        scoped: bool,
        rows: Vec<EventBreakdownRecord>,
    },
}

impl ViewSnapshot {
    fn with_body(plan: &FetchPlan, body: ViewBody) -> ViewSnapshot {
        ViewSnapshot {
            tab: plan.tab,
            window_days: plan.window_days,
            filter_text: plan.filter_text.clone(),
            resolved_entity: plan.resolved_entity.clone(),
            sort: plan.sort.clone(),
            body,
        }
    }

    pub fn prompt(plan: &FetchPlan) -> ViewSnapshot {
        ViewSnapshot::with_body(
            plan,
            ViewBody::Prompt {
                message: USERS_PROMPT.to_string(),
            },
        )
    }

    pub fn error(plan: &FetchPlan, message: String) -> ViewSnapshot {
        ViewSnapshot::with_body(plan, ViewBody::Error { message })
    }
}

/// Run one derivation cycle for the plan.
pub async fn derive_view(
    store: &dyn AnalyticsStore,
    plan: &FetchPlan,
) -> Result<ViewSnapshot, QueryError> {
    let body = match plan.tab {
        Tab::Organizations => organizations_body(store, plan).await?,
        Tab::Users => users_body(store, plan).await?,
        Tab::Overages => overages_body(store, plan).await?,
        Tab::Events => events_body(store, plan).await?,
    };
    Ok(ViewSnapshot::with_body(plan, body))
}

async fn organizations_body(
    store: &dyn AnalyticsStore,
    plan: &FetchPlan,
) -> Result<ViewBody, QueryError> {
    let rows = store.organization_usage(plan.window_days).await?;
    // Totals come from the full result set, before the filter narrows it.
    let totals = OrgTotals::compute(&rows);
    let rows = project(&rows, &plan.filter_text, plan.sort.as_ref());
    Ok(ViewBody::Organizations { totals, rows })
}

async fn users_body(store: &dyn AnalyticsStore, plan: &FetchPlan) -> Result<ViewBody, QueryError> {
    let entity = match plan.users_scope() {
        Some(scope) => scope.to_string(),
        None => {
            return Ok(ViewBody::Prompt {
                message: USERS_PROMPT.to_string(),
            })
        }
    };

    let resolution = resolve_users(store, &entity, &plan.filter_text, plan.window_days).await?;
    let identity_available = resolution
        .rows
        .iter()
        .any(|r| r.email.as_deref().is_some_and(|e| !e.is_empty()));
    let rows = project(&resolution.rows, &plan.filter_text, plan.sort.as_ref());
    Ok(ViewBody::Users {
        entity,
        identity_available,
        roster: resolution.roster,
        rows,
    })
}

async fn overages_body(
    store: &dyn AnalyticsStore,
    plan: &FetchPlan,
) -> Result<ViewBody, QueryError> {
    let rows = store.overages().await?;
    let rows = project(&rows, &plan.filter_text, plan.sort.as_ref());
    Ok(ViewBody::Overages { rows })
}

async fn events_body(store: &dyn AnalyticsStore, plan: &FetchPlan) -> Result<ViewBody, QueryError> {
    let scope = plan.events_scope();
    let rows = store.events_breakdown(scope, plan.window_days).await?;
    let scoped = scope.is_some();
    let rows = project(&rows, &plan.filter_text, plan.sort.as_ref());
    Ok(ViewBody::Events { scoped, rows })
}
