use std::sync::Arc;
use std::time::Duration;

use clap::{App, Arg};
use colored::Colorize;
use tracing::{info, warn};
use uuid::Uuid;

use pistonbus::device::DeviceStats;
use pistonbus::transport::{data_topic, LoopbackTransport};
use pistonbus::{Frame, Scenario, Simulator};

const DEFAULT_PISTONS: &str = "8";

// Stock fleet matching the backend's seeded device registry.
const DEFAULT_FLEET: [(&str, &str, u8); 3] = [
    ("550e8400-e29b-41d4-a716-446655440000", "Factory Floor Unit 1", 8),
    ("660e8400-e29b-41d4-a716-446655440001", "Factory Floor Unit 2", 8),
    ("770e8400-e29b-41d4-a716-446655440002", "Warehouse Unit 1", 6),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let scenario_names = Scenario::names();
    let matches = App::new("pistonbus")
        .version("0.1.0")
        .author("Field Systems Engineering Team")
        .about("🔧 Piston Bus Simulator - multi-device binary protocol fleet simulation")
        .arg(
            Arg::with_name("scenario")
                .help("Scenarios to run, in order")
                .possible_values(&scenario_names)
                .multiple(true)
                .index(1),
        )
        .arg(
            Arg::with_name("devices")
                .short("d")
                .long("devices")
                .value_name("COUNT")
                .help("Simulate COUNT generated devices instead of the stock fleet")
                .takes_value(true)
                .validator(|v| {
                    v.parse::<u8>()
                        .map(|_| ())
                        .map_err(|_| "device count must be 0-255".to_string())
                }),
        )
        .arg(
            Arg::with_name("pistons")
                .short("p")
                .long("pistons")
                .value_name("COUNT")
                .help("Pistons per generated device")
                .takes_value(true)
                .default_value(DEFAULT_PISTONS)
                .validator(|v| {
                    v.parse::<u8>()
                        .map(|_| ())
                        .map_err(|_| "piston count must be 0-255".to_string())
                }),
        )
        .arg(
            Arg::with_name("duration")
                .long("duration")
                .value_name("SECONDS")
                .help("Override the duration of bounded scenarios")
                .takes_value(true)
                .validator(|v| {
                    v.parse::<u64>()
                        .map(|_| ())
                        .map_err(|_| "duration must be a number of seconds".to_string())
                }),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Statistics output format")
                .takes_value(true)
                .possible_values(&["table", "json"])
                .default_value("table"),
        )
        .get_matches();

    println!("{}", "🔧 Piston Bus Simulator - Binary Protocol".bold());
    println!("{}", "==========================================".bold());

    let transport = Arc::new(LoopbackTransport::new());
    let mut sim = Simulator::new(Arc::<LoopbackTransport>::clone(&transport));

    match matches.value_of("devices") {
        Some(count) => {
            let count: u8 = count.parse()?;
            let pistons: u8 = matches.value_of("pistons").unwrap_or(DEFAULT_PISTONS).parse()?;
            for index in 1..=count {
                let identity = Uuid::new_v4();
                let name = format!("Field Unit {index}");
                spawn_monitor(&transport, identity, name.clone());
                sim.add_device(identity, &name, pistons);
            }
        }
        None => {
            for (id, name, pistons) in DEFAULT_FLEET {
                let identity: Uuid = id.parse()?;
                spawn_monitor(&transport, identity, name.to_string());
                sim.add_device(identity, name, pistons);
            }
        }
    }

    let duration_override = matches
        .value_of("duration")
        .map(str::parse::<u64>)
        .transpose()?;

    let scenarios: Vec<Scenario> = matches
        .values_of("scenario")
        .map(|names| {
            names
                .filter_map(Scenario::from_name)
                .map(|s| with_duration(s, duration_override))
                .collect()
        })
        .unwrap_or_else(|| vec![Scenario::SequentialWave]);

    sim.start_all().await?;

    for scenario in scenarios {
        println!("\n🎬 {}", format!("Running scenario: {}", scenario.name()).bold());
        sim.run_scenario(scenario).await;
    }

    let stats = sim.stats().await;
    match matches.value_of("format") {
        Some("json") => println!("{}", serde_json::to_string_pretty(&stats)?),
        _ => print_stats(&stats),
    }

    sim.stop_all().await;
    println!("\n{}", "✅ Simulation ended".green());

    Ok(())
}

fn with_duration(scenario: Scenario, secs: Option<u64>) -> Scenario {
    let Some(secs) = secs else {
        return scenario;
    };
    let duration = Duration::from_secs(secs);
    match scenario {
        Scenario::RandomActivity { .. } => Scenario::RandomActivity { duration },
        Scenario::StressTest { .. } => Scenario::StressTest { duration },
        Scenario::TelemetryStream { .. } => Scenario::TelemetryStream { duration },
        other => other,
    }
}

/// Observe a device's data topic and log every decoded frame, standing in
/// for the backend that would normally consume the bus.
fn spawn_monitor(transport: &LoopbackTransport, device_id: Uuid, name: String) {
    let mut rx = transport.subscribe(&data_topic(&device_id));
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            match Frame::decode(&envelope.payload) {
                Ok(frame) => {
                    info!(device = %name, payload = ?frame.payload, "📡 frame");
                }
                Err(e) => {
                    warn!(device = %name, error = %e, "undecodable frame on data topic");
                }
            }
        }
    });
}

fn print_stats(stats: &[DeviceStats]) {
    println!("\n{}", "=".repeat(80));
    println!("{}", "📊 DEVICE STATISTICS".bold());
    println!("{}", "=".repeat(80));

    for entry in stats {
        let status = match entry.status {
            "ONLINE" => entry.status.green(),
            "ERROR" => entry.status.red(),
            _ => entry.status.yellow(),
        };
        println!("\n🔧 {}", entry.name.cyan().bold());
        println!("   ID: {}", entry.device_id);
        println!("   Status: {} | Connected: {}", status, entry.connected);
        println!("   Active Pistons: {}", entry.active_pistons);
        println!(
            "   Battery: {:.1}% | Signal: {}%",
            entry.battery_percent, entry.signal_percent
        );
        println!(
            "   Messages: Sent={}, Received={}, Errors={}",
            entry.messages_sent, entry.messages_received, entry.errors
        );
    }

    println!("\n{}\n", "=".repeat(80));
}
