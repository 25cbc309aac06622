#![warn(missing_docs)]

//! MQTT telemetry for the deskarm rig.
//!
//! The physical arm publishes one angle per topic as a plain decimal string.
//! This crate subscribes to those topics and writes each value straight into
//! the shared [`AngleState`](deskarm_kinematics::AngleState). Values are
//! latest-wins; nothing is queued.
//!
//! # Example
//!
//! ```ignore
//! use deskarm_kinematics::AngleState;
//! use deskarm_telemetry::{TelemetryBridge, TelemetryConfig};
//! use tokio::sync::watch;
//!
//! let angles = AngleState::shared();
//! let bridge = TelemetryBridge::connect(TelemetryConfig::default(), angles.clone()).await?;
//!
//! let (stop_tx, stop_rx) = watch::channel(false);
//! tokio::spawn(async move { bridge.run(stop_rx).await });
//! // ... tick the simulation, reading `angles` ...
//! stop_tx.send(true)?;
//! ```

pub mod error;
pub mod mqtt;

pub use error::{Result, TelemetryError};
pub use mqtt::{default_topics, route_publish, TelemetryBridge, TelemetryConfig};
