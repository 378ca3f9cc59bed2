//! Method-name registration table for inbound server notifications.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

pub type NotificationHandler = Box<dyn FnMut(Option<&Value>) + Send>;

/// Demultiplexes notifications by method name.
///
/// Handlers run synchronously on the transport's reader task, in
/// registration order. Clones share one table, so handlers registered on
/// any clone (before or after the server starts) see later notifications.
/// A handler must not register further handlers while running.
#[derive(Clone, Default)]
pub struct NotificationRouter {
    handlers: Arc<Mutex<HashMap<String, Vec<NotificationHandler>>>>,
}

impl NotificationRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, method: impl Into<String>, handler: F)
    where
        F: FnMut(Option<&Value>) + Send + 'static,
    {
        let method = method.into();
        tracing::trace!(%method, "Registering notification handler");
        self.table()
            .entry(method)
            .or_default()
            .push(Box::new(handler));
    }

    /// Invoke every handler registered for `method`.
    ///
    /// Returns how many handlers ran; zero means the notification was
    /// unclaimed.
    pub fn dispatch(&self, method: &str, params: Option<&Value>) -> usize {
        let mut table = self.table();
        let Some(handlers) = table.get_mut(method) else {
            return 0;
        };
        for handler in handlers.iter_mut() {
            handler(params);
        }
        handlers.len()
    }

    #[must_use]
    pub fn has_handlers(&self, method: &str) -> bool {
        self.table().get(method).is_some_and(|h| !h.is_empty())
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Vec<NotificationHandler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for NotificationRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table();
        let mut methods: Vec<&String> = table.keys().collect();
        methods.sort();
        f.debug_struct("NotificationRouter")
            .field("methods", &methods)
            .finish()
    }
}
