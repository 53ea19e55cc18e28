use std::str::FromStr;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use lake_types::ntriples::to_ntriples;

use crate::error::{MessagingError, MessagingResult};
use crate::event::ChangeEvent;

/// Payload layouts a route can ask for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EventFormatter {
    /// Who changed which resource, when, and how.
    #[default]
    Resource,
    /// The resource payload plus the added and removed triples.
    Delta,
}

impl EventFormatter {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resource => "ResourceFormatter",
            Self::Delta => "DeltaFormatter",
        }
    }

    /// Structured payload for an event.
    pub fn payload(&self, event: &ChangeEvent) -> Value {
        let mut body = json!({
            "id": event.uri,
            "ev_type": event.kind.to_string(),
            "time": event.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            "type": event.types,
            "actor": event.actor,
        });
        if *self == Self::Delta {
            body["data"] = json!({
                "added": to_ntriples(&event.added),
                "removed": to_ntriples(&event.removed),
            });
        }
        body
    }

    /// Payload rendered as a JSON string.
    pub fn format(&self, event: &ChangeEvent) -> MessagingResult<String> {
        Ok(serde_json::to_string(&self.payload(event))?)
    }
}

impl FromStr for EventFormatter {
    type Err = MessagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ResourceFormatter" => Ok(Self::Resource),
            "DeltaFormatter" => Ok(Self::Delta),
            other => Err(MessagingError::UnknownFormatter(other.to_string())),
        }
    }
}

impl TryFrom<String> for EventFormatter {
    type Error = MessagingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EventFormatter> for String {
    fn from(formatter: EventFormatter) -> Self {
        formatter.name().to_string()
    }
}
