//! Dashboard state machine.
//!
//! All view state lives in a single `ViewState` value owned by the view
//! loop. Input arrives as `Event`s, the pure `reduce` function computes the
//! next state plus a list of `Effect`s, and the loop executes the effects.
//! Nothing outside `reduce` mutates the state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::projection::{SortSpec, ValueKind};
use crate::views::ViewSnapshot;

/// Trailing window applied to windowed tabs when nothing else is configured.
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// The four dashboard tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Organizations,
    Users,
    Overages,
    Events,
}

impl Tab {
    /// Human-readable tab name.
    pub fn label(&self) -> &'static str {
        match self {
            Tab::Organizations => "Organizations",
            Tab::Users => "Users",
            Tab::Overages => "Overages",
            Tab::Events => "Events",
        }
    }

    /// All tabs in display order.
    pub fn all() -> &'static [Tab] {
        &[Tab::Organizations, Tab::Users, Tab::Overages, Tab::Events]
    }

    /// Parse a console keyword into a tab.
    pub fn parse(word: &str) -> Option<Tab> {
        match word.to_lowercase().as_str() {
            "organizations" | "orgs" | "org" => Some(Tab::Organizations),
            "users" | "user" => Some(Tab::Users),
            "overages" | "overage" => Some(Tab::Overages),
            "events" | "event" => Some(Tab::Events),
            _ => None,
        }
    }

    /// Whether the tab's data is scoped by the trailing time window.
    /// Overages follow their own monthly billing grain.
    pub fn is_windowed(&self) -> bool {
        !matches!(self, Tab::Overages)
    }
}

impl std::fmt::Display for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The authoritative dashboard state. Mutated only by `reduce`.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub tab: Tab,
    /// Free-text filter, applied client-side and (on some tabs) as a scope.
    pub filter_text: String,
    /// Entity pinned by a drill-down; scopes the users view.
    pub resolved_entity: Option<String>,
    pub sort: Option<SortSpec>,
    pub window_days: u32,
    /// Id of the in-flight derivation. Completions carrying any other id
    /// are stale and must be dropped.
    pub pending_fetch: Option<Uuid>,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            tab: Tab::default(),
            filter_text: String::new(),
            resolved_entity: None,
            sort: None,
            window_days: DEFAULT_WINDOW_DAYS,
            pending_fetch: None,
        }
    }
}

/// Everything a derivation cycle needs, captured at the moment the fetch
/// was issued. The id on the enclosing effect ties the eventual completion
/// back to this snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPlan {
    pub tab: Tab,
    pub filter_text: String,
    pub resolved_entity: Option<String>,
    pub sort: Option<SortSpec>,
    pub window_days: u32,
}

impl FetchPlan {
    fn of(state: &ViewState) -> FetchPlan {
        FetchPlan {
            tab: state.tab,
            filter_text: state.filter_text.clone(),
            resolved_entity: state.resolved_entity.clone(),
            sort: state.sort.clone(),
            window_days: state.window_days,
        }
    }

    /// Entity scope for the users view: a drilled-down entity wins, else
    /// non-blank filter text serves as the scope.
    pub fn users_scope(&self) -> Option<&str> {
        match self.resolved_entity.as_deref() {
            Some(entity) if !entity.trim().is_empty() => Some(entity),
            _ => {
                let text = self.filter_text.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
        }
    }

    /// Entity scope for the events view: non-blank filter text only.
    pub fn events_scope(&self) -> Option<&str> {
        let text = self.filter_text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Events that drive the state machine.
#[derive(Debug, Clone)]
pub enum Event {
    /// User switched to a tab.
    TabSelected(Tab),
    /// Filter text changed (an empty string clears it).
    FilterEdited(String),
    /// Drill into one organization's per-user detail.
    DrillDown(String),
    /// A sort column was chosen; same column flips direction.
    SortToggled { column: String, kind: ValueKind },
    /// Clear filter text and any drilled-down entity.
    FiltersCleared,
    /// New trailing window in days.
    WindowSelected(u32),
    /// Re-derive the current view without changing anything.
    RefreshRequested,
    /// A derivation finished with a ready-to-render snapshot.
    FetchOk { id: Uuid, view: Box<ViewSnapshot> },
    /// A derivation failed.
    FetchFail { id: Uuid, message: String },
    /// Application exit requested. Handled by the view loop itself.
    Shutdown,
}

impl Event {
    /// Short name for logging. Payloads are deliberately omitted: a
    /// `FetchOk` carries a full snapshot.
    pub fn name(&self) -> &'static str {
        match self {
            Event::TabSelected(_) => "TabSelected",
            Event::FilterEdited(_) => "FilterEdited",
            Event::DrillDown(_) => "DrillDown",
            Event::SortToggled { .. } => "SortToggled",
            Event::FiltersCleared => "FiltersCleared",
            Event::WindowSelected(_) => "WindowSelected",
            Event::RefreshRequested => "RefreshRequested",
            Event::FetchOk { .. } => "FetchOk",
            Event::FetchFail { .. } => "FetchFail",
            Event::Shutdown => "Shutdown",
        }
    }
}

/// Side effects requested by `reduce`, executed by the view loop.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Run a derivation cycle (fetch, join, project) for this plan.
    Fetch { id: Uuid, plan: FetchPlan },
    /// Hand a finished snapshot to the render sink.
    Render(Box<ViewSnapshot>),
}

/// Pure transition function: maps (state, event) to (new state, effects).
pub fn reduce(state: &ViewState, event: Event) -> (ViewState, Vec<Effect>) {
    let is_stale = |id: Uuid| state.pending_fetch != Some(id);

    match event {
        // ---------------------------------------------------------------
        // Navigation and view parameters
        // ---------------------------------------------------------------
        Event::TabSelected(tab) => {
            let mut next = state.clone();
            next.tab = tab;
            derive(next)
        }

        Event::FilterEdited(text) => {
            let mut next = state.clone();
            next.filter_text = text;
            derive(next)
        }

        Event::DrillDown(entity) => {
            let mut next = state.clone();
            next.filter_text = entity.clone();
            next.resolved_entity = Some(entity);
            next.tab = Tab::Users;
            derive(next)
        }

        Event::SortToggled { column, kind } => {
            let mut next = state.clone();
            next.sort = Some(SortSpec::toggled(state.sort.as_ref(), &column, kind));
            derive(next)
        }

        Event::FiltersCleared => {
            let mut next = state.clone();
            next.filter_text.clear();
            next.resolved_entity = None;
            derive(next)
        }

        Event::WindowSelected(_) if !state.tab.is_windowed() => {
            // The overages table is monthly; a window change is a no-op
            // there and must not trigger a refetch.
            (state.clone(), vec![])
        }

        Event::WindowSelected(days) => {
            let mut next = state.clone();
            next.window_days = days;
            derive(next)
        }

        Event::RefreshRequested => derive(state.clone()),

        // ---------------------------------------------------------------
        // Derivation completions
        // ---------------------------------------------------------------
        Event::FetchOk { id, .. } if is_stale(id) => (state.clone(), vec![]),

        Event::FetchOk { id: _, view } => {
            let mut next = state.clone();
            next.pending_fetch = None;
            (next, vec![Effect::Render(view)])
        }

        Event::FetchFail { id, .. } if is_stale(id) => (state.clone(), vec![]),

        Event::FetchFail { id: _, message } => {
            let mut next = state.clone();
            next.pending_fetch = None;
            let snapshot = ViewSnapshot::error(&FetchPlan::of(&next), message);
            (next, vec![Effect::Render(Box::new(snapshot))])
        }

        // The loop breaks on Shutdown before calling reduce; this arm only
        // matters for direct callers (tests).
        Event::Shutdown => (state.clone(), vec![]),
    }
}

/// Every user-driven transition funnels through here so that each one
/// issues exactly one derivation. A fresh id supersedes any in-flight
/// fetch, which makes the latest transition win.
///
/// The users tab without an entity scope has nothing to derive: it renders
/// a prompt directly and must not issue a query.
fn derive(mut next: ViewState) -> (ViewState, Vec<Effect>) {
    let plan = FetchPlan::of(&next);
    if next.tab == Tab::Users && plan.users_scope().is_none() {
        next.pending_fetch = None;
        let snapshot = ViewSnapshot::prompt(&plan);
        return (next, vec![Effect::Render(Box::new(snapshot))]);
    }

    let id = Uuid::new_v4();
    next.pending_fetch = Some(id);
    (next, vec![Effect::Fetch { id, plan }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::SortDirection;
    use crate::views::ViewBody;

    fn fetch_id(effects: &[Effect]) -> Uuid {
        match effects {
            [Effect::Fetch { id, .. }] => *id,
            other => panic!("expected a single fetch effect, got {:?}", other),
        }
    }

    fn fetch_plan(effects: &[Effect]) -> &FetchPlan {
        match effects {
            [Effect::Fetch { plan, .. }] => plan,
            other => panic!("expected a single fetch effect, got {:?}", other),
        }
    }

    #[test]
    fn default_state_starts_on_organizations() {
        let state = ViewState::default();
        assert_eq!(state.tab, Tab::Organizations);
        assert_eq!(state.window_days, DEFAULT_WINDOW_DAYS);
        assert!(state.filter_text.is_empty());
        assert!(state.resolved_entity.is_none());
        assert!(state.sort.is_none());
        assert!(state.pending_fetch.is_none());
    }

    #[test]
    fn tab_selection_issues_one_fetch_for_that_tab() {
        let (next, effects) = reduce(&ViewState::default(), Event::TabSelected(Tab::Overages));
        assert_eq!(next.tab, Tab::Overages);
        let plan = fetch_plan(&effects);
        assert_eq!(plan.tab, Tab::Overages);
        assert_eq!(next.pending_fetch, Some(fetch_id(&effects)));
    }

    #[test]
    fn users_tab_without_scope_renders_prompt_without_fetching() {
        let (next, effects) = reduce(&ViewState::default(), Event::TabSelected(Tab::Users));
        assert_eq!(next.tab, Tab::Users);
        assert!(next.pending_fetch.is_none());
        match effects.as_slice() {
            [Effect::Render(view)] => {
                assert!(matches!(view.body, ViewBody::Prompt { .. }));
            }
            other => panic!("expected a render effect, got {:?}", other),
        }
    }

    #[test]
    fn users_tab_with_filter_text_uses_it_as_scope() {
        let state = ViewState {
            filter_text: "acme.example.com".to_string(),
            ..ViewState::default()
        };
        let (_, effects) = reduce(&state, Event::TabSelected(Tab::Users));
        let plan = fetch_plan(&effects);
        assert_eq!(plan.users_scope(), Some("acme.example.com"));
    }

    #[test]
    fn drill_down_pins_entity_and_switches_to_users() {
        let (next, effects) = reduce(
            &ViewState::default(),
            Event::DrillDown("acme.example.com".to_string()),
        );
        assert_eq!(next.tab, Tab::Users);
        assert_eq!(next.filter_text, "acme.example.com");
        assert_eq!(next.resolved_entity.as_deref(), Some("acme.example.com"));
        let plan = fetch_plan(&effects);
        assert_eq!(plan.users_scope(), Some("acme.example.com"));
    }

    #[test]
    fn drilled_entity_outranks_filter_text_as_scope() {
        let state = ViewState {
            tab: Tab::Users,
            filter_text: "smith".to_string(),
            resolved_entity: Some("acme.example.com".to_string()),
            ..ViewState::default()
        };
        let (_, effects) = reduce(&state, Event::RefreshRequested);
        let plan = fetch_plan(&effects);
        assert_eq!(plan.users_scope(), Some("acme.example.com"));
        assert_eq!(plan.filter_text, "smith");
    }

    #[test]
    fn filter_edit_keeps_tab_sort_and_entity() {
        let state = ViewState {
            tab: Tab::Users,
            resolved_entity: Some("acme.example.com".to_string()),
            sort: Some(SortSpec {
                column: "total_credits".to_string(),
                kind: ValueKind::Numeric,
                direction: SortDirection::Descending,
            }),
            ..ViewState::default()
        };
        let (next, effects) = reduce(&state, Event::FilterEdited("smith".to_string()));
        assert_eq!(next.tab, Tab::Users);
        assert_eq!(next.filter_text, "smith");
        assert_eq!(next.resolved_entity.as_deref(), Some("acme.example.com"));
        assert_eq!(next.sort, state.sort);
        assert!(matches!(effects.as_slice(), [Effect::Fetch { .. }]));
    }

    #[test]
    fn sort_toggle_on_same_column_flips_direction() {
        let (after_first, _) = reduce(
            &ViewState::default(),
            Event::SortToggled {
                column: "event_count".to_string(),
                kind: ValueKind::Numeric,
            },
        );
        assert_eq!(
            after_first.sort.as_ref().map(|s| s.direction),
            Some(SortDirection::Descending)
        );

        let (after_second, _) = reduce(
            &after_first,
            Event::SortToggled {
                column: "event_count".to_string(),
                kind: ValueKind::Numeric,
            },
        );
        assert_eq!(
            after_second.sort.as_ref().map(|s| s.direction),
            Some(SortDirection::Ascending)
        );
    }

    #[test]
    fn sort_toggle_on_new_column_starts_descending() {
        let state = ViewState {
            sort: Some(SortSpec {
                column: "event_count".to_string(),
                kind: ValueKind::Numeric,
                direction: SortDirection::Ascending,
            }),
            ..ViewState::default()
        };
        let (next, _) = reduce(
            &state,
            Event::SortToggled {
                column: "unique_users".to_string(),
                kind: ValueKind::Numeric,
            },
        );
        let sort = next.sort.unwrap();
        assert_eq!(sort.column, "unique_users");
        assert_eq!(sort.direction, SortDirection::Descending);
    }

    #[test]
    fn clearing_filters_drops_text_and_entity_but_keeps_sort_and_window() {
        let state = ViewState {
            tab: Tab::Users,
            filter_text: "smith".to_string(),
            resolved_entity: Some("acme.example.com".to_string()),
            sort: Some(SortSpec {
                column: "total_credits".to_string(),
                kind: ValueKind::Numeric,
                direction: SortDirection::Ascending,
            }),
            window_days: 90,
            ..ViewState::default()
        };
        let (next, effects) = reduce(&state, Event::FiltersCleared);
        assert!(next.filter_text.is_empty());
        assert!(next.resolved_entity.is_none());
        assert_eq!(next.sort, state.sort);
        assert_eq!(next.window_days, 90);
        // Users tab lost its scope, so clearing falls back to the prompt.
        assert!(matches!(effects.as_slice(), [Effect::Render(_)]));
    }

    #[test]
    fn window_change_refetches_on_windowed_tabs() {
        let (next, effects) = reduce(&ViewState::default(), Event::WindowSelected(90));
        assert_eq!(next.window_days, 90);
        assert_eq!(fetch_plan(&effects).window_days, 90);
    }

    #[test]
    fn window_change_is_ignored_on_overages() {
        let state = ViewState {
            tab: Tab::Overages,
            ..ViewState::default()
        };
        let (next, effects) = reduce(&state, Event::WindowSelected(7));
        assert_eq!(next, state);
        assert!(effects.is_empty());
    }

    #[test]
    fn refresh_rederives_without_changing_parameters() {
        let state = ViewState {
            filter_text: "acme".to_string(),
            window_days: 7,
            ..ViewState::default()
        };
        let (next, effects) = reduce(&state, Event::RefreshRequested);
        let plan = fetch_plan(&effects);
        assert_eq!(plan.filter_text, "acme");
        assert_eq!(plan.window_days, 7);
        assert_eq!(next.filter_text, state.filter_text);
    }

    #[test]
    fn each_transition_supersedes_the_previous_fetch() {
        let (state, first_effects) = reduce(&ViewState::default(), Event::WindowSelected(7));
        let first_id = fetch_id(&first_effects);

        let (state, second_effects) = reduce(&state, Event::FilterEdited("acme".to_string()));
        let second_id = fetch_id(&second_effects);

        assert_ne!(first_id, second_id);
        assert_eq!(state.pending_fetch, Some(second_id));

        // The superseded completion is dropped on the floor.
        let stale = Event::FetchFail {
            id: first_id,
            message: "too late".to_string(),
        };
        let (after, effects) = reduce(&state, stale);
        assert_eq!(after, state);
        assert!(effects.is_empty());
    }

    #[test]
    fn matching_fetch_ok_renders_and_clears_pending() {
        let (state, effects) = reduce(&ViewState::default(), Event::RefreshRequested);
        let id = fetch_id(&effects);
        let plan = fetch_plan(&effects).clone();

        let view = Box::new(ViewSnapshot::prompt(&plan));
        let (next, effects) = reduce(&state, Event::FetchOk { id, view });
        assert!(next.pending_fetch.is_none());
        assert!(matches!(effects.as_slice(), [Effect::Render(_)]));
    }

    #[test]
    fn stale_fetch_ok_is_discarded() {
        let (state, effects) = reduce(&ViewState::default(), Event::RefreshRequested);
        let plan = fetch_plan(&effects).clone();

        let stale = Event::FetchOk {
            id: Uuid::new_v4(),
            view: Box::new(ViewSnapshot::prompt(&plan)),
        };
        let (next, effects) = reduce(&state, stale);
        assert_eq!(next, state);
        assert!(effects.is_empty());
    }

    #[test]
    fn fetch_fail_renders_an_error_snapshot_for_the_current_tab() {
        let state = ViewState {
            tab: Tab::Overages,
            ..ViewState::default()
        };
        let (state, effects) = reduce(&state, Event::RefreshRequested);
        let id = fetch_id(&effects);

        let (next, effects) = reduce(
            &state,
            Event::FetchFail {
                id,
                message: "gateway unreachable".to_string(),
            },
        );
        assert!(next.pending_fetch.is_none());
        match effects.as_slice() {
            [Effect::Render(view)] => {
                assert_eq!(view.tab, Tab::Overages);
                match &view.body {
                    ViewBody::Error { message } => assert_eq!(message, "gateway unreachable"),
                    other => panic!("expected an error body, got {:?}", other),
                }
            }
            other => panic!("expected a render effect, got {:?}", other),
        }
    }

    #[test]
    fn tab_keywords_parse_with_aliases() {
        assert_eq!(Tab::parse("orgs"), Some(Tab::Organizations));
        assert_eq!(Tab::parse("Users"), Some(Tab::Users));
        assert_eq!(Tab::parse("overages"), Some(Tab::Overages));
        assert_eq!(Tab::parse("event"), Some(Tab::Events));
        assert_eq!(Tab::parse("billing"), None);
    }

    #[test]
    fn only_overages_is_unwindowed() {
        let unwindowed: Vec<&Tab> = Tab::all().iter().filter(|t| !t.is_windowed()).collect();
        assert_eq!(unwindowed, vec![&Tab::Overages]);
    }
}
