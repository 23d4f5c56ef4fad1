//! Record types returned by the analytical store gateway.
//!
//! Field renames follow the gateway's JSON contract, which mixes camelCase
//! (telemetry tables) and snake_case (billing tables). Aggregate columns may
//! come back as JSON null when a group had no matching rows; those decode as
//! zero so downstream math never deals with missing numbers.

use serde::{Deserialize, Deserializer, Serialize};

use crate::projection::{CellValue, TableRecord};

/// A timestamp as the gateway delivers it: either a raw string
/// (`"2024-05-01T12:00:00Z"`) or wrapped in a value object
/// (`{"value": "2024-05-01T12:00:00Z"}`). Both forms resolve to the same
/// instant. Comparison uses the parsed epoch; display uses the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct TimestampField {
    raw: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimestampWire {
    Wrapped { value: String },
    Raw(String),
    Absent(Option<()>),
}

impl<'de> Deserialize<'de> for TimestampField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = match TimestampWire::deserialize(deserializer)? {
            TimestampWire::Wrapped { value } => value,
            TimestampWire::Raw(raw) => raw,
            TimestampWire::Absent(_) => String::new(),
        };
        Ok(TimestampField { raw })
    }
}

impl TimestampField {
    pub fn new(raw: impl Into<String>) -> Self {
        TimestampField { raw: raw.into() }
    }

    /// The raw text as received (empty when the field was absent).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Parse to Unix seconds. Accepts RFC 3339, the civil formats the
    /// analytical store emits, bare dates, and month grains ("2024-05").
    pub fn epoch_seconds(&self) -> Option<i64> {
        parse_epoch(&self.raw)
    }

    /// Calendar date portion for display ("2024-05-01"), or the raw text
    /// when it does not parse.
    pub fn date_display(&self) -> String {
        match self
            .epoch_seconds()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        {
            Some(dt) => dt.format("%Y-%m-%d").to_string(),
            None => self.raw.clone(),
        }
    }
}

pub(crate) fn parse_epoch(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    // BigQuery civil form: "2024-05-01 12:00:00.000 UTC"
    for fmt in ["%Y-%m-%d %H:%M:%S%.f UTC", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    if let Ok(d) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc().timestamp());
    }
    // Month grain used by the billing table
    if let Ok(d) = chrono::NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc().timestamp());
    }
    None
}

fn de_null_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(0))
}

fn de_null_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// Per-organization usage aggregate (top 100 by event count).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(rename = "externalUrl")]
    pub entity_id: String,
    #[serde(default, deserialize_with = "de_null_i64")]
    pub event_count: i64,
    #[serde(default, deserialize_with = "de_null_i64")]
    pub unique_users: i64,
    #[serde(default)]
    pub first_event: TimestampField,
    #[serde(default)]
    pub last_event: TimestampField,
}

impl UsageRecord {
    /// Rounded events per distinct user; 0 when the user count is 0.
    pub fn events_per_user(&self) -> i64 {
        if self.unique_users <= 0 {
            0
        } else {
            (self.event_count as f64 / self.unique_users as f64).round() as i64
        }
    }
}

/// Per-user usage aggregate within one organization (top 500 by credits).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUsageRecord {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "externalUrl")]
    pub entity_id: String,
    /// Absent on enterprise instances that do not expose per-user identity.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "de_null_i64")]
    pub queries_completed: i64,
    #[serde(default, deserialize_with = "de_null_i64")]
    pub error_count: i64,
    #[serde(default, deserialize_with = "de_null_i64")]
    pub cancelled_count: i64,
    #[serde(default, deserialize_with = "de_null_i64")]
    pub total_credits: i64,
    #[serde(default, deserialize_with = "de_null_i64")]
    pub prompt_tokens: i64,
    #[serde(default, deserialize_with = "de_null_i64")]
    pub completion_tokens: i64,
    #[serde(default, deserialize_with = "de_null_i64")]
    pub cached_tokens: i64,
    #[serde(default, deserialize_with = "de_null_i64")]
    pub total_tokens: i64,
    #[serde(default, deserialize_with = "de_null_i64")]
    pub total_tool_calls: i64,
    #[serde(default)]
    pub first_search: TimestampField,
    #[serde(default)]
    pub last_search: TimestampField,
}

impl UserUsageRecord {
    /// Username when the identity source exposes it, raw user id otherwise.
    pub fn display_name(&self) -> &str {
        match self.username.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.user_id,
        }
    }
}

/// Org-level roster facts from the customer-success dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterRecord {
    #[serde(rename = "externalUrl")]
    pub entity_id: String,
    /// Known member emails; empty when the dataset has no row for the entity.
    #[serde(rename = "email", default)]
    pub emails: Vec<String>,
    #[serde(default, deserialize_with = "de_null_i64")]
    pub active_users_past30d: i64,
    #[serde(default, deserialize_with = "de_null_i64")]
    pub active_users_past90d: i64,
}

impl RosterRecord {
    /// The defined default when the roster source has no row for the entity
    /// or the lookup failed. Not an error state.
    pub fn empty_for(entity_id: &str) -> Self {
        RosterRecord {
            entity_id: entity_id.to_string(),
            emails: Vec::new(),
            active_users_past30d: 0,
            active_users_past90d: 0,
        }
    }

    pub fn has_members(&self) -> bool {
        !self.emails.is_empty()
    }
}

/// Monthly overage facts per account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverageRecord {
    #[serde(rename = "external_url")]
    pub entity_id: String,
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub month: TimestampField,
    #[serde(rename = "deep_search_allocation", default, deserialize_with = "de_null_i64")]
    pub allocation: i64,
    #[serde(rename = "ds_queries", default, deserialize_with = "de_null_i64")]
    pub query_count: i64,
    #[serde(rename = "ds_users", default, deserialize_with = "de_null_i64")]
    pub user_count: i64,
    #[serde(rename = "monthly_overage", default, deserialize_with = "de_null_f64")]
    pub overage_amount: f64,
    #[serde(default)]
    pub source_type: String,
}

/// One event name's totals, optionally per organization when the breakdown
/// was scoped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventBreakdownRecord {
    #[serde(rename = "eventName")]
    pub event_name: String,
    #[serde(rename = "externalUrl", default)]
    pub entity_id: Option<String>,
    #[serde(default, deserialize_with = "de_null_i64")]
    pub count: i64,
    #[serde(default, deserialize_with = "de_null_i64")]
    pub unique_users: i64,
}

// Column lookups are keyed by field name. Unknown columns yield Missing,
// which compares equal everywhere and so leaves input order untouched.

impl TableRecord for UsageRecord {
    fn cell(&self, column: &str) -> CellValue<'_> {
        match column {
            "entity_id" => CellValue::Text(&self.entity_id),
            "event_count" => CellValue::Number(self.event_count as f64),
            "unique_users" => CellValue::Number(self.unique_users as f64),
            "events_per_user" => CellValue::Number(self.events_per_user() as f64),
            "first_event" => CellValue::Stamp(&self.first_event),
            "last_event" => CellValue::Stamp(&self.last_event),
            _ => CellValue::Missing,
        }
    }

    fn identity_fields(&self) -> Vec<&str> {
        vec![&self.entity_id]
    }
}

impl TableRecord for UserUsageRecord {
    fn cell(&self, column: &str) -> CellValue<'_> {
        match column {
            "user_id" => CellValue::Text(&self.user_id),
            "username" => CellValue::Text(self.display_name()),
            "email" => CellValue::Text(self.email.as_deref().unwrap_or("")),
            "entity_id" => CellValue::Text(&self.entity_id),
            "queries_completed" => CellValue::Number(self.queries_completed as f64),
            "error_count" => CellValue::Number(self.error_count as f64),
            "cancelled_count" => CellValue::Number(self.cancelled_count as f64),
            "total_credits" => CellValue::Number(self.total_credits as f64),
            "prompt_tokens" => CellValue::Number(self.prompt_tokens as f64),
            "completion_tokens" => CellValue::Number(self.completion_tokens as f64),
            "cached_tokens" => CellValue::Number(self.cached_tokens as f64),
            "total_tokens" => CellValue::Number(self.total_tokens as f64),
            "total_tool_calls" => CellValue::Number(self.total_tool_calls as f64),
            "first_search" => CellValue::Stamp(&self.first_search),
            "last_search" => CellValue::Stamp(&self.last_search),
            _ => CellValue::Missing,
        }
    }

    fn identity_fields(&self) -> Vec<&str> {
        vec![
            &self.user_id,
            self.username.as_deref().unwrap_or(""),
            self.email.as_deref().unwrap_or(""),
            &self.entity_id,
        ]
    }
}

impl TableRecord for OverageRecord {
    fn cell(&self, column: &str) -> CellValue<'_> {
        match column {
            "entity_id" => CellValue::Text(&self.entity_id),
            "account_name" => CellValue::Text(&self.account_name),
            "month" => CellValue::Stamp(&self.month),
            "allocation" => CellValue::Number(self.allocation as f64),
            "query_count" => CellValue::Number(self.query_count as f64),
            "user_count" => CellValue::Number(self.user_count as f64),
            "overage_amount" => CellValue::Number(self.overage_amount),
            "source_type" => CellValue::Text(&self.source_type),
            _ => CellValue::Missing,
        }
    }

    fn identity_fields(&self) -> Vec<&str> {
        vec![&self.entity_id, &self.account_name]
    }
}

impl TableRecord for EventBreakdownRecord {
    fn cell(&self, column: &str) -> CellValue<'_> {
        match column {
            "event_name" => CellValue::Text(&self.event_name),
            "entity_id" => CellValue::Text(self.entity_id.as_deref().unwrap_or("")),
            "count" => CellValue::Number(self.count as f64),
            "unique_users" => CellValue::Number(self.unique_users as f64),
            _ => CellValue::Missing,
        }
    }

    fn identity_fields(&self) -> Vec<&str> {
        vec![self.entity_id.as_deref().unwrap_or("")]
    }
}
