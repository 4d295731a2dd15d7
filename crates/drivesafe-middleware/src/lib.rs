//! `drivesafe-middleware` – Event Routing
//!
//! Carries telemetry, state changes and driver notices between the session
//! task and whoever is watching (the CLI, a dashboard, tests) without caring
//! about their meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.

pub mod bus;

pub use bus::{EventBus, Topic, TopicReceiver};
