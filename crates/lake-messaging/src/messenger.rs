use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::MessagingResult;
use crate::event::ChangeEvent;
use crate::formatter::EventFormatter;
use crate::handler::{HandlerRegistry, MessageHandler};

/// One `messaging.routes` entry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Registry name of the handler.
    pub handler: String,
    /// Inactive routes receive nothing.
    pub active: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub protocol: Option<String>,
    pub destination: String,
    pub formatter: EventFormatter,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            handler: "log".into(),
            active: true,
            host: None,
            port: None,
            username: None,
            password: None,
            protocol: None,
            destination: String::new(),
            formatter: EventFormatter::default(),
        }
    }
}

impl std::fmt::Debug for RouteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteConfig")
            .field("handler", &self.handler)
            .field("active", &self.active)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("protocol", &self.protocol)
            .field("destination", &self.destination)
            .field("formatter", &self.formatter)
            .finish()
    }
}

/// Anything that accepts committed change events.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &ChangeEvent);
}

struct Route {
    destination: String,
    formatter: EventFormatter,
    handler: Arc<dyn MessageHandler>,
}

/// Fans change events out to every active route.
pub struct Messenger {
    routes: Vec<Route>,
}

impl Messenger {
    /// A messenger with no routes.
    pub fn disabled() -> Self {
        Self { routes: Vec::new() }
    }

    /// Build routes from configuration. Inactive routes are skipped; an
    /// unknown handler name is an error.
    pub fn from_config(
        routes: &[RouteConfig],
        registry: &HandlerRegistry,
    ) -> MessagingResult<Self> {
        let mut built = Vec::new();
        for route in routes {
            if !route.active {
                debug!(
                    handler = %route.handler,
                    destination = %route.destination,
                    "skipping inactive route"
                );
                continue;
            }
            built.push(Route {
                destination: route.destination.clone(),
                formatter: route.formatter,
                handler: registry.build(route)?,
            });
        }
        Ok(Self { routes: built })
    }

    /// Number of active routes.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Deliver an event to every route. Returns how many sends succeeded.
    pub fn send(&self, event: &ChangeEvent) -> usize {
        let mut delivered = 0;
        for route in &self.routes {
            let result = route
                .formatter
                .format(event)
                .and_then(|payload| route.handler.send(&route.destination, &payload));
            match result {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    handler = route.handler.name(),
                    destination = %route.destination,
                    uri = %event.uri,
                    error = %e,
                    "change event delivery failed"
                ),
            }
        }
        delivered
    }
}

impl EventSink for Messenger {
    fn publish(&self, event: &ChangeEvent) {
        self.send(event);
    }
}

impl std::fmt::Debug for Messenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messenger")
            .field("route_count", &self.routes.len())
            .finish()
    }
}
