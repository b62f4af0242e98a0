//! Basic example: scan for nearby BLE devices through the gateway
//!
//! Run with: cargo run --example scan_devices -- [SERVICE_UUID...]

use ble_gateway::{platform_gateway, GatewayConfig, Payload, Result};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ble_gateway=debug".parse().unwrap()),
        )
        .init();

    let filters: Vec<String> = std::env::args().skip(1).collect();

    let gateway = platform_gateway(GatewayConfig::default())?;
    let mut events = gateway.subscribe();

    for (key, name) in gateway.constants() {
        println!("{key:>16} => {name}");
    }

    gateway.notify_current_state();
    gateway.start_scan_with_strings(Some(&filters[..]));

    println!("Scanning for 10 seconds...\n");
    gateway.stop_scan_after(Duration::from_secs(10)).await;

    while let Ok(event) = events.try_recv() {
        match event.payload {
            Payload::Device(device) => {
                println!("Discovered: \"{}\" @{}", device.display_name(), device.address)
            }
            Payload::State(status) => println!("Bluetooth {status}"),
            Payload::Error { error } => println!("{} failed: {}", event.name, error),
            Payload::None => println!("{}", event.name),
        }
    }

    Ok(())
}
