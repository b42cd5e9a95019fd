//! Named simulation scenarios with first-class bounds.
//!
//! Every scenario is a bounded-duration or bounded-iteration behavior; the
//! driver runs one to completion before returning control. Durations are
//! enum fields so callers can tighten or stretch a run without touching the
//! scenario logic.

use std::time::Duration;

pub const DEFAULT_RANDOM_ACTIVITY_SECS: u64 = 30;
pub const DEFAULT_STRESS_TEST_SECS: u64 = 20;
pub const DEFAULT_TELEMETRY_STREAM_SECS: u64 = 30;

/// Fixed table of error reports used by [`Scenario::ErrorSimulation`].
pub const ERROR_CONDITIONS: [(u32, &str); 4] = [
    (503, "Sensor malfunction detected"),
    (404, "Piston actuator not responding"),
    (500, "System overheating warning"),
    (101, "Low battery warning"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Random single-piston toggles at random intervals.
    RandomActivity { duration: Duration },
    /// Activate then deactivate every piston on every device, in order.
    SequentialWave,
    /// High-frequency piston toggles across all devices.
    StressTest { duration: Duration },
    /// Alternating temperature/humidity telemetry plus status per device.
    TelemetryStream { duration: Duration },
    /// One error report per device from [`ERROR_CONDITIONS`].
    ErrorSimulation,
}

impl Scenario {
    /// Look up a scenario by its CLI name, with default bounds.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "random-activity" => Some(Scenario::RandomActivity {
                duration: Duration::from_secs(DEFAULT_RANDOM_ACTIVITY_SECS),
            }),
            "sequential-wave" => Some(Scenario::SequentialWave),
            "stress-test" => Some(Scenario::StressTest {
                duration: Duration::from_secs(DEFAULT_STRESS_TEST_SECS),
            }),
            "telemetry-stream" => Some(Scenario::TelemetryStream {
                duration: Duration::from_secs(DEFAULT_TELEMETRY_STREAM_SECS),
            }),
            "error-simulation" => Some(Scenario::ErrorSimulation),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::RandomActivity { .. } => "random-activity",
            Scenario::SequentialWave => "sequential-wave",
            Scenario::StressTest { .. } => "stress-test",
            Scenario::TelemetryStream { .. } => "telemetry-stream",
            Scenario::ErrorSimulation => "error-simulation",
        }
    }

    /// All CLI names, for argument validation.
    pub fn names() -> [&'static str; 5] {
        [
            "random-activity",
            "sequential-wave",
            "stress-test",
            "telemetry-stream",
            "error-simulation",
        ]
    }
}
