use std::sync::{Arc, Mutex};

use pistonbus::device::Device;
use pistonbus::protocol::{DeviceStatus, Frame, FramePayload, SensorKind};
use pistonbus::transport::{data_topic, Publisher, TransportError};
use uuid::Uuid;

/// Publisher that records every frame for inspection.
#[derive(Default)]
struct CapturePublisher {
    frames: Mutex<Vec<(String, Vec<u8>)>>,
}

impl CapturePublisher {
    fn decoded(&self) -> Vec<Frame> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|(_, bytes)| Frame::decode(bytes).expect("captured frame should decode"))
            .collect()
    }

    fn topics(&self) -> Vec<String> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    fn clear(&self) {
        self.frames.lock().unwrap().clear();
    }
}

impl Publisher for CapturePublisher {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        self.frames
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }
}

/// Publisher that always fails, to exercise the error counter.
struct FailingPublisher;

impl Publisher for FailingPublisher {
    fn publish(&self, topic: &str, _payload: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::ChannelClosed(topic.to_string()))
    }
}

fn bound_device(piston_count: u8) -> (Device, Arc<CapturePublisher>) {
    let capture = Arc::new(CapturePublisher::default());
    let mut device = Device::new(Uuid::new_v4(), "Test Unit", piston_count);
    device.bind(Arc::clone(&capture) as Arc<dyn Publisher>);
    (device, capture)
}

#[test]
fn test_new_device_defaults() {
    let device = Device::new(Uuid::new_v4(), "Fresh Unit", 8);

    assert_eq!(device.status(), DeviceStatus::Offline);
    assert!(!device.is_connected());
    assert_eq!(device.piston_count(), 8);
    assert!(device.pistons().iter().all(|p| !p.active));
    assert_eq!(
        device.pistons().iter().map(|p| p.number).collect::<Vec<_>>(),
        (1..=8).collect::<Vec<_>>()
    );
    assert!((device.battery_level() - 100.0).abs() < f32::EPSILON);
    assert!((70..=100).contains(&device.signal_strength()));
    assert!((device.temperature() - 25.0).abs() < f32::EPSILON);
    assert!((device.humidity() - 50.0).abs() < f32::EPSILON);
    assert!((device.pressure() - 1013.25).abs() < f32::EPSILON);
    assert_eq!(device.messages_sent(), 0);
    assert_eq!(device.messages_received(), 0);
    assert_eq!(device.errors(), 0);
}

#[test]
fn test_bind_goes_online_and_emits_status() {
    let (device, capture) = bound_device(4);

    assert_eq!(device.status(), DeviceStatus::Online);
    assert!(device.is_connected());
    assert_eq!(device.messages_sent(), 1);

    let frames = capture.decoded();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].device_id, device.identity());
    match frames[0].payload {
        FramePayload::StatusUpdate { status, .. } => assert_eq!(status, DeviceStatus::Online),
        ref other => panic!("expected StatusUpdate, got {other:?}"),
    }

    assert_eq!(capture.topics(), vec![data_topic(&device.identity())]);
}

#[test]
fn test_unbind_emits_final_offline_status() {
    let (mut device, capture) = bound_device(4);
    capture.clear();

    device.unbind();

    assert_eq!(device.status(), DeviceStatus::Offline);
    assert!(!device.is_connected());

    let frames = capture.decoded();
    assert_eq!(frames.len(), 1);
    match frames[0].payload {
        FramePayload::StatusUpdate { status, .. } => assert_eq!(status, DeviceStatus::Offline),
        ref other => panic!("expected StatusUpdate, got {other:?}"),
    }
}

#[test]
fn test_apply_piston_command_sets_state_and_confirms() {
    let (mut device, capture) = bound_device(8);
    capture.clear();

    device.apply_piston_command(3, true);

    assert!(device.pistons()[2].active);
    assert_eq!(device.messages_sent(), 2); // initial status + confirmation

    let frames = capture.decoded();
    assert_eq!(frames.len(), 1);
    match frames[0].payload {
        FramePayload::PistonState {
            piston_number,
            active,
            timestamp_ms,
        } => {
            assert_eq!(piston_number, 3);
            assert!(active);
            assert!(timestamp_ms > 0);
        }
        ref other => panic!("expected PistonState, got {other:?}"),
    }

    device.apply_piston_command(3, false);
    assert!(!device.pistons()[2].active);
}

#[test]
fn test_out_of_range_piston_command_is_ignored() {
    let (mut device, capture) = bound_device(8);
    capture.clear();
    let before = device.messages_sent();

    device.apply_piston_command(0, true);
    device.apply_piston_command(9, true);

    assert!(device.pistons().iter().all(|p| !p.active));
    assert_eq!(device.messages_sent(), before);
    assert!(capture.decoded().is_empty());
}

#[test]
fn test_toggle_piston() {
    let (mut device, _capture) = bound_device(2);

    assert_eq!(device.toggle_piston(1), Some(true));
    assert_eq!(device.toggle_piston(1), Some(false));
    assert_eq!(device.toggle_piston(0), None);
    assert_eq!(device.toggle_piston(3), None);
}

#[test]
fn test_inbound_command_applies_and_confirms() {
    let (mut device, capture) = bound_device(8);
    capture.clear();

    let command = Frame::new(
        device.identity(),
        FramePayload::PistonState {
            piston_number: 5,
            active: true,
            timestamp_ms: 1000,
        },
    )
    .encode();
    device.handle_inbound(&command);

    assert_eq!(device.messages_received(), 1);
    assert_eq!(device.errors(), 0);
    assert!(device.pistons()[4].active);

    let frames = capture.decoded();
    assert_eq!(frames.len(), 1);
    assert!(matches!(
        frames[0].payload,
        FramePayload::PistonState {
            piston_number: 5,
            active: true,
            ..
        }
    ));
}

#[test]
fn test_inbound_corrupt_frame_counts_error() {
    let (mut device, capture) = bound_device(8);
    capture.clear();

    let mut corrupted = Frame::new(
        device.identity(),
        FramePayload::PistonState {
            piston_number: 1,
            active: true,
            timestamp_ms: 0,
        },
    )
    .encode();
    corrupted[18] ^= 0x40;
    device.handle_inbound(&corrupted);

    assert_eq!(device.messages_received(), 0);
    assert_eq!(device.errors(), 1);
    assert!(device.pistons().iter().all(|p| !p.active));
    assert!(capture.decoded().is_empty());
}

#[test]
fn test_inbound_runt_frame_counts_error() {
    let (mut device, _capture) = bound_device(8);

    device.handle_inbound(&[0x01, 0x02, 0x03]);

    assert_eq!(device.messages_received(), 0);
    assert_eq!(device.errors(), 1);
}

#[test]
fn test_inbound_unknown_kind_is_not_an_error() {
    let (mut device, capture) = bound_device(8);
    capture.clear();

    let unknown = Frame::new(
        device.identity(),
        FramePayload::Unknown {
            kind: 0x55,
            payload: vec![1, 2, 3],
        },
    )
    .encode();
    device.handle_inbound(&unknown);

    assert_eq!(device.messages_received(), 1);
    assert_eq!(device.errors(), 0);
    assert!(capture.decoded().is_empty());
}

#[test]
fn test_inbound_non_command_kinds_are_ignored() {
    let (mut device, capture) = bound_device(8);
    capture.clear();

    let telemetry = Frame::new(
        device.identity(),
        FramePayload::Telemetry {
            sensor: SensorKind::Voltage,
            value: 12.1,
            timestamp_ms: 5,
        },
    )
    .encode();
    device.handle_inbound(&telemetry);

    assert_eq!(device.messages_received(), 1);
    assert!(device.pistons().iter().all(|p| !p.active));
    assert!(capture.decoded().is_empty());
}

#[test]
fn test_tick_battery_never_increases_or_goes_negative() {
    let (mut device, _capture) = bound_device(4);

    let mut previous = device.battery_level();
    for _ in 0..2000 {
        device.tick();
        let level = device.battery_level();
        assert!(level <= previous, "battery rose from {previous} to {level}");
        assert!(level >= 0.0);
        previous = level;
    }
    // 2000 ticks at >= 0.1 drain is enough to hit the floor.
    assert!((device.battery_level() - 0.0).abs() < f32::EPSILON);
}

#[test]
fn test_tick_keeps_environment_in_bounds() {
    let (mut device, _capture) = bound_device(4);

    for _ in 0..500 {
        device.tick();
        assert!((15.0..=35.0).contains(&device.temperature()));
        assert!((20.0..=80.0).contains(&device.humidity()));
        assert!(device.signal_strength() <= 100);
    }
}

#[test]
fn test_emit_telemetry_and_error_frames() {
    let (mut device, capture) = bound_device(4);
    capture.clear();

    device.emit_telemetry(SensorKind::Temperature, 21.5);
    device.emit_error(404, "Piston actuator not responding");

    let frames = capture.decoded();
    assert_eq!(frames.len(), 2);
    assert!(matches!(
        frames[0].payload,
        FramePayload::Telemetry {
            sensor: SensorKind::Temperature,
            ..
        }
    ));
    match &frames[1].payload {
        FramePayload::Error { code, message } => {
            assert_eq!(*code, 404);
            assert_eq!(message, "Piston actuator not responding");
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[test]
fn test_emit_without_binding_counts_error() {
    let mut device = Device::new(Uuid::new_v4(), "Unbound Unit", 4);

    device.emit_status();

    assert_eq!(device.messages_sent(), 0);
    assert_eq!(device.errors(), 1);
}

#[test]
fn test_publish_failure_counts_error() {
    let mut device = Device::new(Uuid::new_v4(), "Flaky Unit", 4);
    device.bind(Arc::new(FailingPublisher));

    // bind's initial status already failed once
    assert_eq!(device.messages_sent(), 0);
    assert_eq!(device.errors(), 1);

    device.emit_telemetry(SensorKind::Humidity, 55.0);
    assert_eq!(device.errors(), 2);
}

#[test]
fn test_repeated_send_failures_mark_device_errored() {
    let mut device = Device::new(Uuid::new_v4(), "Flaky Unit", 4);
    device.bind(Arc::new(FailingPublisher));
    assert_eq!(device.status(), DeviceStatus::Online);

    device.emit_status();
    device.emit_status();

    assert_eq!(device.errors(), 3);
    assert_eq!(device.status(), DeviceStatus::Error);
}

#[test]
fn test_stats_snapshot() {
    let (mut device, _capture) = bound_device(8);
    device.apply_piston_command(2, true);
    device.apply_piston_command(6, true);

    let stats = device.stats();
    assert_eq!(stats.name, "Test Unit");
    assert_eq!(stats.device_id, device.identity().to_string());
    assert_eq!(stats.status, "ONLINE");
    assert!(stats.connected);
    assert_eq!(stats.active_pistons, "2/8");
    assert_eq!(stats.messages_sent, 3); // status + two confirmations
    assert_eq!(stats.messages_received, 0);
    assert_eq!(stats.errors, 0);
}
