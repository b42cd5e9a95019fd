//! Simulation driver: owns the device fleet and its transport bindings,
//! drives timed scenarios, and aggregates statistics.
//!
//! Each device lives behind its own `tokio::sync::Mutex`; the inbound pump
//! task and scenario logic both go through that lock, so all mutation of one
//! device's state is serialized while different devices run concurrently.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::device::{Device, DeviceStats};
use crate::protocol::SensorKind;
use crate::scenario::{Scenario, ERROR_CONDITIONS};
use crate::transport::{Transport, TransportError};

const START_STAGGER: Duration = Duration::from_millis(500);
const STOP_STAGGER: Duration = Duration::from_millis(300);
const WAVE_STEP: Duration = Duration::from_millis(500);
const WAVE_PAUSE: Duration = Duration::from_secs(1);
const STRESS_SWEEP: Duration = Duration::from_millis(100);
const TELEMETRY_STEP: Duration = Duration::from_secs(1);
const TELEMETRY_SWEEP_PAUSE: Duration = Duration::from_secs(3);
const ERROR_REPORT_PAUSE: Duration = Duration::from_secs(2);

struct DeviceEntry {
    device: Arc<Mutex<Device>>,
    pump: Option<JoinHandle<()>>,
}

/// Manages a collection of simulated devices over an injected transport.
pub struct Simulator {
    transport: Arc<dyn Transport>,
    devices: Vec<DeviceEntry>,
    running: bool,
}

impl Simulator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            devices: Vec::new(),
            running: false,
        }
    }

    /// Create a device and add it to the fleet without connecting it.
    pub fn add_device(
        &mut self,
        identity: Uuid,
        name: &str,
        piston_count: u8,
    ) -> Arc<Mutex<Device>> {
        let device = Arc::new(Mutex::new(Device::new(identity, name, piston_count)));
        self.devices.push(DeviceEntry {
            device: Arc::clone(&device),
            pump: None,
        });
        info!(device = name, %identity, piston_count, "added device");
        device
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Bind every device to the transport in sequence. Each device comes
    /// online and emits its initial status frame as part of the transition.
    pub async fn start_all(&mut self) -> Result<(), TransportError> {
        info!(devices = self.devices.len(), "starting all devices");

        for entry in &mut self.devices {
            let identity = { entry.device.lock().await.identity() };
            let channel = self.transport.bind(identity)?;

            {
                let mut device = entry.device.lock().await;
                device.bind(Arc::clone(&channel.publisher));
            }

            let device = Arc::clone(&entry.device);
            let mut inbound = channel.inbound;
            entry.pump = Some(tokio::spawn(async move {
                while let Some(envelope) = inbound.recv().await {
                    device.lock().await.handle_inbound(&envelope.payload);
                }
            }));

            sleep(START_STAGGER).await;
        }

        self.running = true;
        Ok(())
    }

    /// Unbind every device in sequence. The command subscription is torn
    /// down first so the pump drains naturally, then the device goes offline
    /// and emits its final status frame.
    pub async fn stop_all(&mut self) {
        info!(devices = self.devices.len(), "stopping all devices");
        self.running = false;

        for entry in &mut self.devices {
            let identity = { entry.device.lock().await.identity() };
            self.transport.unbind(identity);

            if let Some(pump) = entry.pump.take() {
                let _ = pump.await;
            }

            entry.device.lock().await.unbind();
            sleep(STOP_STAGGER).await;
        }
    }

    /// One environmental drift step across the whole fleet.
    pub async fn tick_all(&self) {
        for entry in &self.devices {
            entry.device.lock().await.tick();
        }
    }

    /// Execute a named scenario to completion. Scenarios are cooperative:
    /// only one runs per driver at a time, bounded by their own duration or
    /// iteration counts.
    pub async fn run_scenario(&mut self, scenario: Scenario) {
        if self.devices.is_empty() {
            warn!(scenario = scenario.name(), "no devices in fleet, skipping");
            return;
        }

        info!(scenario = scenario.name(), "running scenario");
        match scenario {
            Scenario::RandomActivity { duration } => self.scenario_random_activity(duration).await,
            Scenario::SequentialWave => self.scenario_sequential_wave().await,
            Scenario::StressTest { duration } => self.scenario_stress_test(duration).await,
            Scenario::TelemetryStream { duration } => self.scenario_telemetry_stream(duration).await,
            Scenario::ErrorSimulation => self.scenario_error_simulation().await,
        }
        info!(scenario = scenario.name(), "scenario complete");
    }

    async fn scenario_random_activity(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let mut rng = StdRng::from_entropy();

        while self.running && Instant::now() < deadline {
            let entry = &self.devices[rng.gen_range(0..self.devices.len())];
            {
                let mut device = entry.device.lock().await;
                let count = device.piston_count();
                if count > 0 {
                    device.toggle_piston(rng.gen_range(1..=count));
                }
            }
            sleep(Duration::from_secs_f64(rng.gen_range(1.0..=3.0))).await;
        }
    }

    async fn scenario_sequential_wave(&self) {
        for entry in &self.devices {
            let (name, count) = {
                let device = entry.device.lock().await;
                (device.name().to_string(), device.piston_count())
            };
            info!(device = %name, "starting wave");

            for number in 1..=count {
                entry.device.lock().await.apply_piston_command(number, true);
                sleep(WAVE_STEP).await;
            }

            sleep(WAVE_PAUSE).await;

            for number in 1..=count {
                entry.device.lock().await.apply_piston_command(number, false);
                sleep(WAVE_STEP).await;
            }

            info!(device = %name, "wave complete");
        }
    }

    async fn scenario_stress_test(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let mut rng = StdRng::from_entropy();

        while self.running && Instant::now() < deadline {
            for entry in &self.devices {
                let mut device = entry.device.lock().await;
                let count = device.piston_count();
                if count > 0 {
                    device.toggle_piston(rng.gen_range(1..=count));
                }
            }
            sleep(STRESS_SWEEP).await;
        }
    }

    async fn scenario_telemetry_stream(&self, duration: Duration) {
        let deadline = Instant::now() + duration;

        while self.running && Instant::now() < deadline {
            for entry in &self.devices {
                {
                    let mut device = entry.device.lock().await;
                    device.tick();
                    let temperature = device.temperature();
                    device.emit_telemetry(SensorKind::Temperature, temperature);
                }
                sleep(TELEMETRY_STEP).await;

                {
                    let mut device = entry.device.lock().await;
                    let humidity = device.humidity();
                    device.emit_telemetry(SensorKind::Humidity, humidity);
                }
                sleep(TELEMETRY_STEP).await;

                entry.device.lock().await.emit_status();
            }
            sleep(TELEMETRY_SWEEP_PAUSE).await;
        }
    }

    async fn scenario_error_simulation(&self) {
        let mut rng = StdRng::from_entropy();

        for entry in &self.devices {
            let (code, message) = ERROR_CONDITIONS[rng.gen_range(0..ERROR_CONDITIONS.len())];
            entry.device.lock().await.emit_error(code, message);
            sleep(ERROR_REPORT_PAUSE).await;
        }
    }

    /// Read-only snapshot of every device in the fleet.
    pub async fn stats(&self) -> Vec<DeviceStats> {
        let mut all = Vec::with_capacity(self.devices.len());
        for entry in &self.devices {
            all.push(entry.device.lock().await.stats());
        }
        all
    }
}
