//! Workspace-scan progress reported by the server through custom
//! notifications, rendered on a status indicator.
//!
//! Two states: idle, or one active session. Out-of-order events (an
//! increment or end with nothing active) are ignored rather than treated
//! as errors; a start while active replaces the running session.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use serde_json::Value;

use crate::router::NotificationRouter;

pub const START_PROGRESS: &str = "fsharp/startProgress";
pub const INCREMENT_PROGRESS: &str = "fsharp/incrementProgress";
pub const END_PROGRESS: &str = "fsharp/endProgress";

/// Displayed percentage stays below this until the session ends.
const MAX_RUNNING_PERCENT: u64 = 99;

/// A single status-bar slot. Dropping it releases the slot.
pub trait StatusItem: Send {
    fn set_text(&mut self, text: &str);
    fn show(&mut self);
    fn hide(&mut self);
}

/// Factory for status indicators.
pub trait StatusBar: Send {
    fn create_item(&mut self) -> Box<dyn StatusItem>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartProgress {
    pub title: String,
    #[serde(rename = "nFiles")]
    pub n_files: u64,
}

struct Session {
    title: String,
    total: u64,
    completed: u64,
    item: Box<dyn StatusItem>,
}

impl Session {
    /// `floor(completed / (total + 1) * 100)`, held under 100 while running.
    fn percent(&self) -> u64 {
        (self.completed.saturating_mul(100) / self.total.saturating_add(1)).min(MAX_RUNNING_PERCENT)
    }
}

enum State {
    Idle,
    InProgress(Session),
}

pub struct ProgressListener<B> {
    bar: B,
    state: State,
}

impl<B: StatusBar> ProgressListener<B> {
    pub fn new(bar: B) -> Self {
        Self {
            bar,
            state: State::Idle,
        }
    }

    pub fn start(&mut self, title: &str, total: u64) {
        if matches!(self.state, State::InProgress(_)) {
            tracing::debug!("Progress restarted before end; replacing session");
            self.end();
        }

        let mut item = self.bar.create_item();
        item.set_text(&format!("{title} (0%)..."));
        item.show();

        tracing::debug!(%title, total, "Progress started");
        self.state = State::InProgress(Session {
            title: title.to_string(),
            total,
            completed: 0,
            item,
        });
    }

    pub fn increment(&mut self, label: &str) {
        let State::InProgress(session) = &mut self.state else {
            tracing::trace!(%label, "Ignoring progress increment with no active session");
            return;
        };

        session.completed = session.completed.saturating_add(1);
        let text = format!("{} ({}%)... [{label}]", session.title, session.percent());
        session.item.set_text(&text);
        session.item.show();
    }

    pub fn end(&mut self) {
        match mem::replace(&mut self.state, State::Idle) {
            State::InProgress(mut session) => {
                tracing::debug!(
                    title = %session.title,
                    completed = session.completed,
                    "Progress ended"
                );
                session.item.hide();
                // Dropping the session releases the indicator.
            }
            State::Idle => tracing::trace!("Ignoring progress end with no active session"),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, State::InProgress(_))
    }

    /// Current percentage, `None` when idle.
    #[must_use]
    pub fn percent(&self) -> Option<u64> {
        match &self.state {
            State::InProgress(session) => Some(session.percent()),
            State::Idle => None,
        }
    }

    pub fn bar(&self) -> &B {
        &self.bar
    }

    /// Route the three progress notifications into `listener`.
    pub fn bind(listener: &Arc<Mutex<Self>>, router: &NotificationRouter)
    where
        B: 'static,
    {
        let start = Arc::clone(listener);
        router.register(START_PROGRESS, move |params| {
            match params.map(StartProgress::deserialize) {
                Some(Ok(StartProgress { title, n_files })) => {
                    lock(&start).start(&title, n_files);
                }
                Some(Err(e)) => tracing::debug!("Malformed {START_PROGRESS} params: {e}"),
                None => tracing::debug!("{START_PROGRESS} without params"),
            }
        });

        let increment = Arc::clone(listener);
        router.register(INCREMENT_PROGRESS, move |params| {
            match params.and_then(increment_label) {
                Some(label) => lock(&increment).increment(label),
                None => tracing::debug!("Malformed {INCREMENT_PROGRESS} params: {params:?}"),
            }
        });

        let end = Arc::clone(listener);
        router.register(END_PROGRESS, move |_| lock(&end).end());
    }
}

/// The increment payload is a bare string, or a one-element array of it.
fn increment_label(params: &Value) -> Option<&str> {
    match params {
        Value::String(s) => Some(s),
        Value::Array(items) => items.first().and_then(Value::as_str),
        _ => None,
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
