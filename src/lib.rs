pub mod console;
pub mod effects;
pub mod projection;
pub mod query;
pub mod render;
pub mod settings;
pub mod state_machine;
pub mod views;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use console::start_input_thread;
use effects::{EffectRunner, QueryEffectRunner};
use query::HttpAnalyticsStore;
use render::{RenderSink, TextRenderer};
use settings::{apply_env_overrides, load_settings};
use state_machine::{reduce, Effect, Event, ViewState};

/// View loop manager - holds the event sender for dispatching events.
pub struct DashboardHandle {
    tx: mpsc::Sender<Event>,
}

impl DashboardHandle {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        DashboardHandle { tx }
    }

    /// Send an event to the state machine.
    pub async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.tx.send(event).await
    }
}

fn dispatch_effects(
    effects: Vec<Effect>,
    effect_runner: &Arc<dyn EffectRunner>,
    sink: &Arc<dyn RenderSink>,
    tx: &mpsc::Sender<Event>,
) {
    for effect in effects {
        match effect {
            Effect::Render(view) => sink.present(&view),
            other => effect_runner.spawn(other, tx.clone()),
        }
    }
}

/// Run the main view loop until shutdown, returning the final state.
pub async fn run_view_loop(
    initial: ViewState,
    mut rx: mpsc::Receiver<Event>,
    tx: mpsc::Sender<Event>,
    effect_runner: Arc<dyn EffectRunner>,
    sink: Arc<dyn RenderSink>,
) -> ViewState {
    let mut state = initial;
    log::info!("View loop started on {}", state.tab);

    // Derive the default view before any input arrives, like the original
    // dashboard loading its data on page load.
    let (next, effects) = reduce(&state, Event::RefreshRequested);
    state = next;
    dispatch_effects(effects, &effect_runner, &sink, &tx);

    while let Some(event) = rx.recv().await {
        log::debug!("Received event: {}", event.name());

        // Handle Shutdown at the edge
        if matches!(event, Event::Shutdown) {
            log::info!("Shutdown requested, leaving view loop");
            break;
        }

        let previous_tab = state.tab;
        let (next, effects) = reduce(&state, event);
        if next.tab != previous_tab {
            log::info!("Tab: {} -> {}", previous_tab, next.tab);
        }
        state = next;

        dispatch_effects(effects, &effect_runner, &sink, &tx);
    }

    log::info!("View loop ended");
    state
}

// ============================================================================
// Application entry point
// ============================================================================

pub fn run() {
    let mut settings = load_settings();
    apply_env_overrides(&mut settings);
    log::info!(
        "Gateway: {} (timeout {}s, window {}d)",
        settings.base_url,
        settings.timeout_secs,
        settings.window_days
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime");

    runtime.block_on(async {
        let (tx, rx) = mpsc::channel::<Event>(32);

        let store = Arc::new(HttpAnalyticsStore::new(
            &settings.base_url,
            Duration::from_secs(settings.timeout_secs),
        ));
        let effect_runner: Arc<dyn EffectRunner> = QueryEffectRunner::new(store);
        let sink: Arc<dyn RenderSink> = Arc::new(TextRenderer::new());

        match start_input_thread(tx.clone()) {
            Ok(_) => println!("searchlight: type 'help' for commands"),
            Err(e) => log::error!("Console input unavailable: {}", e),
        }

        let initial = ViewState {
            window_days: settings.window_days,
            ..ViewState::default()
        };
        run_view_loop(initial, rx, tx, effect_runner, sink).await;
    });
}
