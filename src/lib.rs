//! # EvHub - charge controller and charger orchestration
//!
//! The decision core of a home energy hub that keeps an EV charger from
//! pushing the household over its power peak.
//!
//! ## Architecture
//!
//! - `controller`: classifies the charger into a `ChargeControllerStatus`
//! - `orchestrator`: turns status changes into charger commands and runs the
//!   current ramp loop
//! - `hub`: owns the event bus and wires the components together
//! - `events`: typed publish/subscribe bus and the shared done flag
//! - `ports`: capability traits for sensors, oracles and the charger
//! - `sensors`: in-memory sensor store backing the read-only ports
//! - `schedule`: non-hour schedule in the hub's timezone
//! - `session`: charging session records and history
//! - `states`: status enums and the native state buckets
//! - `config`: YAML configuration with validation
//! - `logging`: structured logging and tracing

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod hub;
pub mod logging;
pub mod orchestrator;
pub mod ports;
pub mod schedule;
pub mod sensors;
pub mod session;
pub mod states;

// Re-export commonly used types
pub use config::Config;
pub use controller::ChargeController;
pub use error::{EvHubError, Result};
pub use events::{EventBus, HubEvent};
pub use hub::{Hub, HubPorts};
pub use orchestrator::SessionOrchestrator;
pub use states::{ChargeControllerStatus, ChargerNativeStateMap, ChargerType};
