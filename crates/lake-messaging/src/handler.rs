use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::error::{MessagingError, MessagingResult};
use crate::messenger::RouteConfig;

/// Delivers rendered payloads to one destination.
pub trait MessageHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Send one payload to `destination`.
    fn send(&self, destination: &str, payload: &str) -> MessagingResult<()>;
}

/// Builds a handler for a route.
pub type HandlerFactory =
    Arc<dyn Fn(&RouteConfig) -> MessagingResult<Arc<dyn MessageHandler>> + Send + Sync>;

// ---------------------------------------------------------------------------
// Built-in handlers
// ---------------------------------------------------------------------------

/// Emits payloads as `tracing` events on the `lake::messages` target.
#[derive(Debug, Default)]
pub struct LogHandler;

impl MessageHandler for LogHandler {
    fn name(&self) -> &str {
        "log"
    }

    fn send(&self, destination: &str, payload: &str) -> MessagingResult<()> {
        info!(target: "lake::messages", destination, payload, "change event");
        Ok(())
    }
}

/// Appends one payload per line to a file.
#[derive(Debug)]
pub struct FileHandler {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl MessageHandler for FileHandler {
    fn name(&self) -> &str {
        "file"
    }

    fn send(&self, _destination: &str, payload: &str) -> MessagingResult<()> {
        let _held = self.lock.lock().map_err(|_| MessagingError::Delivery {
            handler: "file".into(),
            reason: "handler lock poisoned".into(),
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{payload}")?;
        Ok(())
    }
}

/// Keeps every payload in memory. Useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryHandler {
    messages: Mutex<Vec<(String, String)>>,
}

impl MemoryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(destination, payload)` pairs in delivery order.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut m) = self.messages.lock() {
            m.clear();
        }
    }
}

impl MessageHandler for MemoryHandler {
    fn name(&self) -> &str {
        "memory"
    }

    fn send(&self, destination: &str, payload: &str) -> MessagingResult<()> {
        self.messages
            .lock()
            .map_err(|_| MessagingError::Delivery {
                handler: "memory".into(),
                reason: "handler lock poisoned".into(),
            })?
            .push((destination.to_string(), payload.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HandlerRegistry
// ---------------------------------------------------------------------------

/// Handler factories keyed by the name routes refer to.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    factories: BTreeMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handlers:
    /// - `log`: [`LogHandler`]
    /// - `file`: [`FileHandler`] appending to the route's `destination`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("log", |_route: &RouteConfig| {
            Ok(Arc::new(LogHandler) as Arc<dyn MessageHandler>)
        });
        registry.register("file", |route: &RouteConfig| {
            if route.destination.is_empty() {
                return Err(MessagingError::InvalidRoute {
                    handler: "file".into(),
                    reason: "destination must be a file path".into(),
                });
            }
            Ok(Arc::new(FileHandler::new(&route.destination)) as Arc<dyn MessageHandler>)
        });
        registry
    }

    /// Register a factory under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&RouteConfig) -> MessagingResult<Arc<dyn MessageHandler>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Register one shared handler instance under `name`.
    pub fn register_instance(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) {
        self.register(name, move |_route: &RouteConfig| Ok(Arc::clone(&handler)));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered handler names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build the handler for a route.
    pub fn build(&self, route: &RouteConfig) -> MessagingResult<Arc<dyn MessageHandler>> {
        let factory = self
            .factories
            .get(&route.handler)
            .ok_or_else(|| MessagingError::UnknownHandler(route.handler.clone()))?;
        factory(route)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
