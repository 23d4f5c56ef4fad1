//! Effect runner for the dashboard.
//!
//! This module handles executing effects produced by the state machine.
//! Fetch effects become tokio tasks that run a full derivation cycle
//! against the analytical store and report back as events.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::query::AnalyticsStore;
use crate::state_machine::{Effect, Event};
use crate::views::derive_view;

/// Trait for running effects asynchronously.
/// Completion events are sent back via the provided channel.
pub trait EffectRunner: Send + Sync + 'static {
    fn spawn(&self, effect: Effect, tx: mpsc::Sender<Event>);
}

/// Real effect runner backed by an analytical store.
pub struct QueryEffectRunner {
    store: Arc<dyn AnalyticsStore>,
}

impl QueryEffectRunner {
    pub fn new(store: Arc<dyn AnalyticsStore>) -> Arc<Self> {
        Arc::new(QueryEffectRunner { store })
    }
}

impl EffectRunner for QueryEffectRunner {
    fn spawn(&self, effect: Effect, tx: mpsc::Sender<Event>) {
        match effect {
            Effect::Fetch { id, plan } => {
                let store = Arc::clone(&self.store);
                tokio::spawn(async move {
                    log::debug!(
                        "Fetch {}: {} window={}d filter={:?}",
                        id,
                        plan.tab,
                        plan.window_days,
                        plan.filter_text
                    );
                    let event = match derive_view(store.as_ref(), &plan).await {
                        Ok(view) => Event::FetchOk {
                            id,
                            view: Box::new(view),
                        },
                        Err(e) => {
                            log::warn!("Fetch {} failed: {}", id, e);
                            Event::FetchFail {
                                id,
                                message: e.to_string(),
                            }
                        }
                    };
                    // Send failures mean the loop is gone; nothing to do.
                    let _ = tx.send(event).await;
                });
            }
            Effect::Render(_) => {
                // The view loop hands renders to the sink directly and
                // never forwards them here.
                unreachable!("Render effects are executed by the view loop")
            }
        }
    }
}

/// Stub runner for tests: records effects instead of executing them.
pub struct StubEffectRunner {
    effects: std::sync::Mutex<Vec<Effect>>,
}

impl StubEffectRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(StubEffectRunner {
            effects: std::sync::Mutex::new(Vec::new()),
        })
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<Effect> {
        std::mem::take(&mut *self.effects.lock().unwrap())
    }
}

impl EffectRunner for StubEffectRunner {
    fn spawn(&self, effect: Effect, _tx: mpsc::Sender<Event>) {
        self.effects.lock().unwrap().push(effect);
    }
}
