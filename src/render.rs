//! Plain-text rendering of view snapshots.
//!
//! `format_view` is a pure function from snapshot to text so it can be
//! tested without touching stdout. `TextRenderer` is the thin sink that
//! prints the result.

use crate::state_machine::Tab;
use crate::views::{OrgTotals, ViewBody, ViewSnapshot};

/// Sink for finished snapshots. The view loop calls this for every
/// render effect.
pub trait RenderSink: Send + Sync + 'static {
    fn present(&self, view: &ViewSnapshot);
}

/// Renders snapshots to stdout.
pub struct TextRenderer;

impl TextRenderer {
    pub fn new() -> Self {
        TextRenderer
    }
}

impl Default for TextRenderer {
    fn default() -> Self {
        TextRenderer::new()
    }
}

impl RenderSink for TextRenderer {
    fn present(&self, view: &ViewSnapshot) {
        println!("{}", format_view(view));
    }
}

/// Format a snapshot as a text screen: a header naming the tab and its
/// scope, the active view parameters, and the body.
pub fn format_view(view: &ViewSnapshot) -> String {
    let mut out = String::new();

    let scope = if view.tab.is_windowed() {
        format!("last {} days", view.window_days)
    } else {
        "by month".to_string()
    };
    out.push_str(&format!("== {} ({}) ==\n", view.tab, scope));

    let mut status = Vec::new();
    if !view.filter_text.is_empty() {
        status.push(format!("filter: {:?}", view.filter_text));
    }
    if let Some(entity) = &view.resolved_entity {
        status.push(format!("entity: {}", entity));
    }
    if let Some(sort) = &view.sort {
        status.push(format!("sort: {} {}", sort.column, sort.direction.label()));
    }
    if !status.is_empty() {
        out.push_str(&status.join("  |  "));
        out.push('\n');
    }
    out.push('\n');

    match &view.body {
        ViewBody::Prompt { message } => {
            out.push_str(message);
            out.push('\n');
        }
        ViewBody::Error { message } => {
            out.push_str(&format!("error: {}\n", message));
        }
        ViewBody::Organizations { totals, rows } => {
            out.push_str(&format_totals(totals));
            out.push('\n');
            let cells: Vec<Vec<String>> = rows
                .iter()
                .map(|r| {
                    vec![
                        r.entity_id.clone(),
                        group_thousands(r.event_count),
                        group_thousands(r.unique_users),
                        group_thousands(r.events_per_user()),
                        r.first_event.date_display(),
                        r.last_event.date_display(),
                    ]
                })
                .collect();
            out.push_str(&table(
                &[
                    "entity_id",
                    "event_count",
                    "unique_users",
                    "events_per_user",
                    "first_event",
                    "last_event",
                ],
                &cells,
            ));
        }
        ViewBody::Users {
            entity,
            identity_available,
            roster,
            rows,
        } => {
            out.push_str(&format!("## {}\n", entity));
            if !identity_available {
                out.push_str(
                    "Note: per-user email/username is not available for enterprise \
                     instances; identities below may be opaque ids.\n",
                );
            }
            if roster.has_members() {
                out.push_str(&format!(
                    "\nActive users at {} ({} in last 30 days, {} in last 90 days):\n",
                    roster.entity_id, roster.active_users_past30d, roster.active_users_past90d
                ));
                for email in &roster.emails {
                    out.push_str(&format!("  {}\n", email));
                }
            }
            out.push('\n');
            let cells: Vec<Vec<String>> = rows
                .iter()
                .map(|r| {
                    vec![
                        r.display_name().to_string(),
                        r.email.clone().unwrap_or_default(),
                        group_thousands(r.queries_completed),
                        group_thousands(r.error_count),
                        group_thousands(r.cancelled_count),
                        group_thousands(r.total_credits),
                        group_thousands(r.total_tokens),
                        group_thousands(r.total_tool_calls),
                        r.first_search.date_display(),
                        r.last_search.date_display(),
                    ]
                })
                .collect();
            out.push_str(&table(
                &[
                    "username",
                    "email",
                    "queries_completed",
                    "error_count",
                    "cancelled_count",
                    "total_credits",
                    "total_tokens",
                    "total_tool_calls",
                    "first_search",
                    "last_search",
                ],
                &cells,
            ));
        }
        ViewBody::Overages { rows } => {
            let cells: Vec<Vec<String>> = rows
                .iter()
                .map(|r| {
                    vec![
                        r.month.as_str().to_string(),
                        r.account_name.clone(),
                        r.entity_id.clone(),
                        group_thousands(r.allocation),
                        group_thousands(r.query_count),
                        group_thousands(r.user_count),
                        format!("{:.1}", r.overage_amount),
                        r.source_type.clone(),
                    ]
                })
                .collect();
            out.push_str(&table(
                &[
                    "month",
                    "account_name",
                    "entity_id",
                    "allocation",
                    "query_count",
                    "user_count",
                    "overage_amount",
                    "source_type",
                ],
                &cells,
            ));
        }
        ViewBody::Events { scoped, rows } => {
            if *scoped {
                let cells: Vec<Vec<String>> = rows
                    .iter()
                    .map(|r| {
                        vec![
                            r.event_name.clone(),
                            r.entity_id.clone().unwrap_or_default(),
                            group_thousands(r.count),
                            group_thousands(r.unique_users),
                        ]
                    })
                    .collect();
                out.push_str(&table(
                    &["event_name", "entity_id", "count", "unique_users"],
                    &cells,
                ));
            } else {
                let cells: Vec<Vec<String>> = rows
                    .iter()
                    .map(|r| {
                        vec![
                            r.event_name.clone(),
                            group_thousands(r.count),
                            group_thousands(r.unique_users),
                        ]
                    })
                    .collect();
                out.push_str(&table(&["event_name", "count", "unique_users"], &cells));
            }
        }
    }

    out
}

fn format_totals(totals: &OrgTotals) -> String {
    format!(
        "organizations: {}   searches: {}   users: {}   avg searches/org: {}\n",
        totals.total_organizations,
        group_thousands(totals.total_searches),
        group_thousands(totals.total_users),
        group_thousands(totals.avg_searches_per_org.round() as i64)
    )
}

/// Left-aligned column layout with a dashed rule under the header.
fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return "(no rows)\n".to_string();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
    }

    let mut out = String::new();
    let render_row = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    out.push_str(&render_row(&header_cells));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("  "));
    out.push('\n');
    for row in rows {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out
}

/// "1234567" -> "1,234,567". Matches how counts read in the original
/// dashboard cards.
fn group_thousands(n: i64) -> String {
    let negative = n < 0;
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if negative {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
