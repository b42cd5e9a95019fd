//! Binary frame codec for the piston control protocol.
//!
//! Every message on the bus is one frame:
//!
//! ```text
//! [kind: 1 byte] [device id: 16 bytes] [payload: variable] [CRC16: 2 bytes LE]
//! ```
//!
//! The device id is the UUID's canonical big-endian byte form. Multi-byte
//! payload integers are little-endian. The checksum covers every byte before
//! the trailing two and is verified before any payload interpretation, so
//! garbled data never reaches the type-specific parsers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checksum::crc16;

/// Smallest possible frame: kind + device id + empty payload + checksum.
pub const MIN_FRAME_LEN: usize = 19;

pub const DEVICE_ID_LEN: usize = 16;
pub const CHECKSUM_LEN: usize = 2;

/// Sentinel byte meaning "reading not available" in StatusUpdate fields.
pub const READING_UNAVAILABLE: u8 = 255;

const PISTON_STATE_PAYLOAD_LEN: usize = 10;
const STATUS_UPDATE_PAYLOAD_LEN: usize = 3;
const TELEMETRY_PAYLOAD_LEN: usize = 13;
const ERROR_PAYLOAD_MIN_LEN: usize = 4;

/// The 1-byte discriminator selecting a frame's payload schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    PistonState,
    StatusUpdate,
    Telemetry,
    Error,
}

impl FrameKind {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x01 => Some(FrameKind::PistonState),
            0x02 => Some(FrameKind::StatusUpdate),
            0x03 => Some(FrameKind::Telemetry),
            0x04 => Some(FrameKind::Error),
            _ => None,
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            FrameKind::PistonState => 0x01,
            FrameKind::StatusUpdate => 0x02,
            FrameKind::Telemetry => 0x03,
            FrameKind::Error => 0x04,
        }
    }
}

/// Device status codes carried in StatusUpdate frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    Offline,
    Online,
    Error,
}

impl DeviceStatus {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(DeviceStatus::Offline),
            1 => Some(DeviceStatus::Online),
            2 => Some(DeviceStatus::Error),
            _ => None,
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            DeviceStatus::Offline => 0,
            DeviceStatus::Online => 1,
            DeviceStatus::Error => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DeviceStatus::Offline => "OFFLINE",
            DeviceStatus::Online => "ONLINE",
            DeviceStatus::Error => "ERROR",
        }
    }
}

/// Sensor codes carried in Telemetry frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorKind {
    Temperature,
    Pressure,
    Humidity,
    Voltage,
}

impl SensorKind {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(SensorKind::Temperature),
            1 => Some(SensorKind::Pressure),
            2 => Some(SensorKind::Humidity),
            3 => Some(SensorKind::Voltage),
            _ => None,
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            SensorKind::Temperature => 0,
            SensorKind::Pressure => 1,
            SensorKind::Humidity => 2,
            SensorKind::Voltage => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Pressure => "pressure",
            SensorKind::Humidity => "humidity",
            SensorKind::Voltage => "voltage",
        }
    }
}

/// Decoded payload of a frame, one variant per wire kind.
///
/// `Unknown` is a successful decode of a checksum-valid frame whose kind byte
/// is not recognized; the raw kind and payload are preserved for logging or
/// forwarding. A corrupt frame (checksum failure) is a [`FrameError`], never
/// an `Unknown`.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    PistonState {
        piston_number: u8,
        active: bool,
        timestamp_ms: u64,
    },
    StatusUpdate {
        status: DeviceStatus,
        battery_percent: u8,
        signal_percent: u8,
    },
    Telemetry {
        sensor: SensorKind,
        value: f32,
        timestamp_ms: u64,
    },
    Error {
        code: u32,
        message: String,
    },
    Unknown {
        kind: u8,
        payload: Vec<u8>,
    },
}

impl FramePayload {
    fn kind_byte(&self) -> u8 {
        match self {
            FramePayload::PistonState { .. } => FrameKind::PistonState.raw(),
            FramePayload::StatusUpdate { .. } => FrameKind::StatusUpdate.raw(),
            FramePayload::Telemetry { .. } => FrameKind::Telemetry.raw(),
            FramePayload::Error { .. } => FrameKind::Error.raw(),
            FramePayload::Unknown { kind, .. } => *kind,
        }
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            FramePayload::PistonState {
                piston_number,
                active,
                timestamp_ms,
            } => {
                buf.push(*piston_number);
                buf.push(u8::from(*active));
                buf.extend_from_slice(&timestamp_ms.to_le_bytes());
            }
            FramePayload::StatusUpdate {
                status,
                battery_percent,
                signal_percent,
            } => {
                buf.push(status.raw());
                buf.push(*battery_percent);
                buf.push(*signal_percent);
            }
            FramePayload::Telemetry {
                sensor,
                value,
                timestamp_ms,
            } => {
                buf.push(sensor.raw());
                buf.extend_from_slice(&value.to_le_bytes());
                buf.extend_from_slice(&timestamp_ms.to_le_bytes());
            }
            FramePayload::Error { code, message } => {
                buf.extend_from_slice(&code.to_le_bytes());
                buf.extend_from_slice(message.as_bytes());
            }
            FramePayload::Unknown { payload, .. } => {
                buf.extend_from_slice(payload);
            }
        }
    }
}

/// One complete protocol message: device identity plus typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub device_id: Uuid,
    pub payload: FramePayload,
}

impl Frame {
    pub fn new(device_id: Uuid, payload: FramePayload) -> Self {
        Self { device_id, payload }
    }

    /// Serialize the frame and append its checksum.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MIN_FRAME_LEN + 16);
        buf.push(self.payload.kind_byte());
        buf.extend_from_slice(self.device_id.as_bytes());
        self.payload.encode_into(&mut buf);

        let checksum = crc16(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Parse and checksum-verify a raw frame.
    ///
    /// The checksum is validated before the payload is touched. An
    /// unrecognized kind byte on an otherwise intact frame decodes into
    /// [`FramePayload::Unknown`] rather than failing.
    pub fn decode(bytes: &[u8]) -> Result<Frame, FrameError> {
        if bytes.len() < MIN_FRAME_LEN {
            return Err(FrameError::TooShort { actual: bytes.len() });
        }

        let (prefix, checksum_bytes) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        let received = u16::from_le_bytes([checksum_bytes[0], checksum_bytes[1]]);
        let expected = crc16(prefix);
        if received != expected {
            return Err(FrameError::ChecksumMismatch { received, expected });
        }

        let raw_kind = prefix[0];
        let mut device_id_bytes = [0u8; DEVICE_ID_LEN];
        device_id_bytes.copy_from_slice(&prefix[1..1 + DEVICE_ID_LEN]);
        let device_id = Uuid::from_bytes(device_id_bytes);
        let payload = &prefix[1 + DEVICE_ID_LEN..];

        let decoded = match FrameKind::from_raw(raw_kind) {
            Some(FrameKind::PistonState) => decode_piston_state(payload)?,
            Some(FrameKind::StatusUpdate) => decode_status_update(payload)?,
            Some(FrameKind::Telemetry) => decode_telemetry(payload)?,
            Some(FrameKind::Error) => decode_error(payload)?,
            None => FramePayload::Unknown {
                kind: raw_kind,
                payload: payload.to_vec(),
            },
        };

        Ok(Frame::new(device_id, decoded))
    }
}

fn decode_piston_state(payload: &[u8]) -> Result<FramePayload, FrameError> {
    if payload.len() < PISTON_STATE_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooShort {
            kind: FrameKind::PistonState,
            expected: PISTON_STATE_PAYLOAD_LEN,
            actual: payload.len(),
        });
    }

    let mut ts = [0u8; 8];
    ts.copy_from_slice(&payload[2..10]);
    Ok(FramePayload::PistonState {
        piston_number: payload[0],
        active: payload[1] == 1,
        timestamp_ms: u64::from_le_bytes(ts),
    })
}

fn decode_status_update(payload: &[u8]) -> Result<FramePayload, FrameError> {
    if payload.len() < STATUS_UPDATE_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooShort {
            kind: FrameKind::StatusUpdate,
            expected: STATUS_UPDATE_PAYLOAD_LEN,
            actual: payload.len(),
        });
    }

    let status = DeviceStatus::from_raw(payload[0]).ok_or(FrameError::InvalidFieldValue {
        field: "status_code",
        value: payload[0],
    })?;
    Ok(FramePayload::StatusUpdate {
        status,
        battery_percent: payload[1],
        signal_percent: payload[2],
    })
}

fn decode_telemetry(payload: &[u8]) -> Result<FramePayload, FrameError> {
    if payload.len() < TELEMETRY_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooShort {
            kind: FrameKind::Telemetry,
            expected: TELEMETRY_PAYLOAD_LEN,
            actual: payload.len(),
        });
    }

    let sensor = SensorKind::from_raw(payload[0]).ok_or(FrameError::InvalidFieldValue {
        field: "sensor_code",
        value: payload[0],
    })?;
    let mut value_bytes = [0u8; 4];
    value_bytes.copy_from_slice(&payload[1..5]);
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&payload[5..13]);
    Ok(FramePayload::Telemetry {
        sensor,
        value: f32::from_le_bytes(value_bytes),
        timestamp_ms: u64::from_le_bytes(ts),
    })
}

fn decode_error(payload: &[u8]) -> Result<FramePayload, FrameError> {
    if payload.len() < ERROR_PAYLOAD_MIN_LEN {
        return Err(FrameError::PayloadTooShort {
            kind: FrameKind::Error,
            expected: ERROR_PAYLOAD_MIN_LEN,
            actual: payload.len(),
        });
    }

    let mut code_bytes = [0u8; 4];
    code_bytes.copy_from_slice(&payload[..4]);
    Ok(FramePayload::Error {
        code: u32::from_le_bytes(code_bytes),
        message: String::from_utf8_lossy(&payload[4..]).into_owned(),
    })
}

/// Frame decode failures. All are local to the offending frame; none affect
/// other frames, other devices, or the transport binding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame too short: {actual} bytes, minimum {MIN_FRAME_LEN}")]
    TooShort { actual: usize },

    #[error("checksum mismatch: received {received:#06x}, expected {expected:#06x}")]
    ChecksumMismatch { received: u16, expected: u16 },

    #[error("{kind:?} payload too short: {actual} bytes, need {expected}")]
    PayloadTooShort {
        kind: FrameKind,
        expected: usize,
        actual: usize,
    },

    #[error("unrecognized {field} byte {value:#04x}")]
    InvalidFieldValue { field: &'static str, value: u8 },
}
