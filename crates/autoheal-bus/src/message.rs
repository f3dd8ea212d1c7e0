//! ---
//! ah_section: "02-messaging-ipc-data-model"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Event envelope and topic vocabulary for the healing bus."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Topic names shared by every publisher and subscriber.
pub mod topics {
    /// Completed deployments from simulator workers.
    pub const DEPLOYMENTS: &str = "deployments";
    /// Fleet scale-up / scale-down announcements.
    pub const SCALING: &str = "scaling";
    pub const ISSUE_DETECTED: &str = "issue.detected";
    pub const SYSTEM_UP: &str = "system.up";
    pub const SYSTEM_DOWN: &str = "system.down";
    pub const HEALING_COMPLETED: &str = "healing_completed";
    pub const ACTION_CHOSEN: &str = "rl.action_chosen";
    pub const LEARNED: &str = "rl.learned";

    /// `deploy.<status>` for regular deployments.
    pub fn deploy_status(status: &str) -> String {
        format!("deploy.{status}")
    }

    /// `heal.<status>` for deployments performed by a healing action.
    pub fn heal_status(status: &str) -> String {
        format!("heal.{status}")
    }
}

/// Immutable envelope delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    /// Unique identifier for deduplication and tracing.
    pub id: Uuid,
    pub topic: String,
    /// JSON object supplied by the publisher.
    pub payload: JsonValue,
    pub timestamp: DateTime<Utc>,
}

impl BusMessage {
    /// Wrap a payload for `topic`, stamping id and creation time.
    pub fn new(topic: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// String field of the payload, if present.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(JsonValue::as_str)
    }

    /// Numeric field of the payload, if present.
    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(JsonValue::as_f64)
    }
}
