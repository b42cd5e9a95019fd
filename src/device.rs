//! Single-device state machine.
//!
//! A [`Device`] owns its pistons, status, environmental readings, and message
//! counters. All mutation funnels through `&mut self`, so callers that share
//! a device between the inbound pump and scenario logic wrap it in a
//! per-device mutex; the device itself never spawns work or shares state.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{
    DeviceStatus, Frame, FramePayload, SensorKind, READING_UNAVAILABLE,
};
use crate::transport::{data_topic, Publisher};

const TEMPERATURE_RANGE: (f32, f32) = (15.0, 35.0);
const HUMIDITY_RANGE: (f32, f32) = (20.0, 80.0);
const BATTERY_DRAIN_RANGE: (f32, f32) = (0.1, 0.3);
const SIGNAL_JITTER: i16 = 5;
const MAX_SEND_FAILURES: u8 = 3;

/// A binary-state actuator, numbered 1-based within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piston {
    pub number: u8,
    pub active: bool,
}

impl Piston {
    fn new(number: u8) -> Self {
        Self {
            number,
            active: false,
        }
    }
}

/// Read-only per-device snapshot for observability.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStats {
    pub name: String,
    pub device_id: String,
    pub status: &'static str,
    pub connected: bool,
    pub active_pistons: String,
    pub battery_percent: f32,
    pub signal_percent: u8,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub errors: u64,
}

struct Link {
    publisher: Arc<dyn Publisher>,
    topic: String,
}

/// One simulated piston controller.
pub struct Device {
    identity: Uuid,
    name: String,
    pistons: Vec<Piston>,

    status: DeviceStatus,
    battery_level: f32,
    signal_strength: u8,
    temperature: f32,
    humidity: f32,
    pressure: f32,

    connected: bool,
    link: Option<Link>,

    messages_sent: u64,
    messages_received: u64,
    errors: u64,
    consecutive_send_failures: u8,

    rng: StdRng,
}

impl Device {
    pub fn new(identity: Uuid, name: &str, piston_count: u8) -> Self {
        let mut rng = StdRng::from_entropy();
        let signal_strength = rng.gen_range(70..=100);

        Self {
            identity,
            name: name.to_string(),
            pistons: (1..=piston_count).map(Piston::new).collect(),
            status: DeviceStatus::Offline,
            battery_level: 100.0,
            signal_strength,
            temperature: 25.0,
            humidity: 50.0,
            pressure: 1013.25,
            connected: false,
            link: None,
            messages_sent: 0,
            messages_received: 0,
            errors: 0,
            consecutive_send_failures: 0,
            rng,
        }
    }

    pub fn identity(&self) -> Uuid {
        self.identity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn pistons(&self) -> &[Piston] {
        &self.pistons
    }

    pub fn piston_count(&self) -> u8 {
        self.pistons.len() as u8
    }

    pub fn battery_level(&self) -> f32 {
        self.battery_level
    }

    pub fn signal_strength(&self) -> u8 {
        self.signal_strength
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn humidity(&self) -> f32 {
        self.humidity
    }

    pub fn pressure(&self) -> f32 {
        self.pressure
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Attach the device to its transport publish handle, bring it online,
    /// and emit the initial status frame.
    pub fn bind(&mut self, publisher: Arc<dyn Publisher>) {
        self.link = Some(Link {
            publisher,
            topic: data_topic(&self.identity),
        });
        self.connected = true;
        self.status = DeviceStatus::Online;
        info!(device = %self.name, "connected to transport");
        self.emit_status();
    }

    /// Force the device offline, emitting a final status frame while the
    /// link is still alive, then drop the link.
    pub fn unbind(&mut self) {
        self.status = DeviceStatus::Offline;
        self.emit_status();
        self.connected = false;
        self.link = None;
        info!(device = %self.name, "disconnected from transport");
    }

    /// Handle one raw inbound frame from the command topic.
    ///
    /// Successful decodes count toward `messages_received`; any decode error
    /// counts toward `errors`. Either way the failure is local to this frame.
    pub fn handle_inbound(&mut self, bytes: &[u8]) {
        match Frame::decode(bytes) {
            Ok(frame) => {
                self.messages_received += 1;
                match frame.payload {
                    FramePayload::PistonState {
                        piston_number,
                        active,
                        ..
                    } => {
                        self.apply_piston_command(piston_number, active);
                    }
                    FramePayload::Unknown { kind, ref payload } => {
                        debug!(
                            device = %self.name,
                            kind,
                            len = payload.len(),
                            "ignoring frame of unknown kind"
                        );
                    }
                    other => {
                        debug!(device = %self.name, ?other, "ignoring non-command frame");
                    }
                }
            }
            Err(e) => {
                self.errors += 1;
                warn!(device = %self.name, error = %e, "dropping undecodable frame");
            }
        }
    }

    /// Apply a piston actuation command and emit the confirmation frame.
    ///
    /// An out-of-range piston number is logged and ignored: no piston
    /// changes and no confirmation is sent. In range, the flag update and
    /// the confirmation are emitted under the same exclusive borrow, so no
    /// caller can observe the changed piston without a confirmation queued.
    pub fn apply_piston_command(&mut self, piston_number: u8, activate: bool) {
        if piston_number == 0 || piston_number > self.piston_count() {
            warn!(
                device = %self.name,
                piston_number,
                piston_count = self.piston_count(),
                "invalid piston number in command"
            );
            return;
        }

        self.pistons[usize::from(piston_number) - 1].active = activate;
        info!(
            device = %self.name,
            piston = piston_number,
            state = if activate { "ACTIVE" } else { "INACTIVE" },
            "piston command applied"
        );
        self.emit_piston_state(piston_number, activate);
    }

    /// Toggle a piston and emit the resulting state. Returns the new state,
    /// or `None` if the number is out of range.
    pub fn toggle_piston(&mut self, piston_number: u8) -> Option<bool> {
        if piston_number == 0 || piston_number > self.piston_count() {
            warn!(device = %self.name, piston_number, "invalid piston number in toggle");
            return None;
        }

        let piston = &mut self.pistons[usize::from(piston_number) - 1];
        piston.active = !piston.active;
        let active = piston.active;
        self.emit_piston_state(piston_number, active);
        Some(active)
    }

    /// One environmental drift step. Called on a fixed cadence by the
    /// driver; the device never schedules this itself.
    pub fn tick(&mut self) {
        self.temperature = (self.temperature + self.rng.gen_range(-0.5..=0.5))
            .clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1);

        self.humidity = (self.humidity + self.rng.gen_range(-2.0..=2.0))
            .clamp(HUMIDITY_RANGE.0, HUMIDITY_RANGE.1);

        if self.battery_level > 0.0 {
            let drain = self
                .rng
                .gen_range(BATTERY_DRAIN_RANGE.0..=BATTERY_DRAIN_RANGE.1);
            self.battery_level = (self.battery_level - drain).max(0.0);
        }

        let jitter = self.rng.gen_range(-SIGNAL_JITTER..=SIGNAL_JITTER);
        self.signal_strength = (i16::from(self.signal_strength) + jitter).clamp(0, 100) as u8;
    }

    pub fn emit_piston_state(&mut self, piston_number: u8, active: bool) {
        self.publish(FramePayload::PistonState {
            piston_number,
            active,
            timestamp_ms: now_ms(),
        });
    }

    pub fn emit_status(&mut self) {
        let battery = if self.battery_level <= 100.0 {
            self.battery_level as u8
        } else {
            READING_UNAVAILABLE
        };
        let signal = if self.signal_strength <= 100 {
            self.signal_strength
        } else {
            READING_UNAVAILABLE
        };

        self.publish(FramePayload::StatusUpdate {
            status: self.status,
            battery_percent: battery,
            signal_percent: signal,
        });
    }

    pub fn emit_telemetry(&mut self, sensor: SensorKind, value: f32) {
        self.publish(FramePayload::Telemetry {
            sensor,
            value,
            timestamp_ms: now_ms(),
        });
    }

    pub fn emit_error(&mut self, code: u32, message: &str) {
        self.publish(FramePayload::Error {
            code,
            message: message.to_string(),
        });
    }

    fn publish(&mut self, payload: FramePayload) {
        let Some(link) = &self.link else {
            self.errors += 1;
            warn!(device = %self.name, "emit with no transport binding");
            return;
        };

        let bytes = Frame::new(self.identity, payload).encode();
        match link.publisher.publish(&link.topic, &bytes) {
            Ok(()) => {
                self.messages_sent += 1;
                self.consecutive_send_failures = 0;
            }
            Err(e) => {
                self.errors += 1;
                self.consecutive_send_failures = self.consecutive_send_failures.saturating_add(1);
                warn!(device = %self.name, error = %e, "publish failed");
                if self.consecutive_send_failures >= MAX_SEND_FAILURES
                    && self.status == DeviceStatus::Online
                {
                    warn!(device = %self.name, "repeated send failures, marking device errored");
                    self.status = DeviceStatus::Error;
                }
            }
        }
    }

    /// Read-only snapshot of the device for observability. No write path.
    pub fn stats(&self) -> DeviceStats {
        let active = self.pistons.iter().filter(|p| p.active).count();
        DeviceStats {
            name: self.name.clone(),
            device_id: self.identity.to_string(),
            status: self.status.name(),
            connected: self.connected,
            active_pistons: format!("{}/{}", active, self.pistons.len()),
            battery_percent: self.battery_level,
            signal_percent: self.signal_strength,
            messages_sent: self.messages_sent,
            messages_received: self.messages_received,
            errors: self.errors,
        }
    }
}

/// Wall-clock milliseconds since the Unix epoch, for frame timestamps.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
