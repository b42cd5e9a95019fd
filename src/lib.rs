//! # Piston Bus Simulator
//!
//! A multi-device piston controller simulation library providing a compact
//! binary wire protocol, per-device state machines, and a scenario-driven
//! fleet simulator over a pluggable pub/sub transport.
//!
//! ## Features
//!
//! - **Binary frame codec**: fixed header + 16-byte device id + typed
//!   payload + CRC16 checksum, bit-exact with the field firmware
//! - **Device state machines**: piston arrays, status transitions,
//!   environmental drift, and confirmation frames for every command
//! - **Scenario driver**: random activity, sequential waves, stress bursts,
//!   telemetry streams, and error reports with first-class bounds
//! - **Transport seam**: devices speak through a narrow publish/subscribe
//!   capability; an in-process loopback broker ships for tests and demos
//!
//! ## Quick Start
//!
//! ```no_run
//! use pistonbus::{LoopbackTransport, Scenario, Simulator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = Arc::new(LoopbackTransport::new());
//!     let mut sim = Simulator::new(transport);
//!
//!     let id = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
//!     sim.add_device(id, "Factory Floor Unit 1", 8);
//!
//!     sim.start_all().await.unwrap();
//!     sim.run_scenario(Scenario::SequentialWave).await;
//!     sim.stop_all().await;
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`checksum`] - CRC16 integrity code
//! - [`protocol`] - frame codec and payload schemas
//! - [`device`] - single-device state machine
//! - [`scenario`] - named scenario definitions and bounds
//! - [`simulator`] - fleet driver and statistics
//! - [`transport`] - pub/sub capability and loopback implementation

#![deny(warnings)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod checksum;
pub mod device;
pub mod protocol;
pub mod scenario;
pub mod simulator;
pub mod transport;

// Re-export main public types for convenience
pub use device::{Device, DeviceStats, Piston};
pub use protocol::{DeviceStatus, Frame, FrameError, FramePayload, SensorKind};
pub use scenario::Scenario;
pub use simulator::Simulator;
pub use transport::{LoopbackTransport, Transport, TransportError};
