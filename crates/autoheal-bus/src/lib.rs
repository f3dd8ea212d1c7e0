//! ---
//! ah_section: "02-messaging-ipc-data-model"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Event envelope and topic vocabulary for the healing bus."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
//! In-process topic bus connecting the detector, uptime tracker, healing
//! policies and the deployment fleet.

pub mod bus;
pub mod message;
pub mod metrics;
pub mod subscriber;

pub use bus::{BusStats, EventBus, SharedBus};
pub use message::{topics, BusMessage};
pub use metrics::BusMetrics;
pub use subscriber::{
    ChannelSubscriber, FnSubscriber, LoggingSubscriber, RecordingSubscriber, Subscriber,
};
