pub mod config;
pub mod keyboard;
pub mod machine;
pub mod transport;

use crate::config::BlimpConfig;
use crate::keyboard::ListenerHandle;
use crate::machine::{run_machine_loop, KeyBindings, KeyMachine, MachineSettings};
use crate::transport::BlimpTransport;
use color_eyre::{eyre::eyre, Result};
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;
    print_intro();

    if let Err(e) = BlimpConfig::ensure_default_config().await {
        warn!("Could not write default configuration: {}", e);
    }
    let config = BlimpConfig::load_or_default().await;
    info!(
        "Targeting {}:{} every {}ms",
        config.target_host, config.target_port, config.publish_interval_ms
    );

    let transport = BlimpTransport::bind(&config.target_host, config.target_port)
        .await
        .map_err(|e| eyre!("Failed to set up UDP transport: {}", e))?;

    let (event_sender, event_receiver) = mpsc::channel(1000);

    let _listener_handle = ListenerHandle::spawn(event_sender)
        .map_err(|e| eyre!("Failed to spawn key listener: {}", e))?;

    let settings = MachineSettings {
        publish_interval_ms: config.publish_interval_ms,
    };
    let machine = KeyMachine::create(
        event_receiver,
        Some(settings),
        KeyBindings::default_bindings(),
        transport,
    )
    .map_err(|e| eyre!("Failed to create key machine: {}", e))?;

    // Blocks until escape stops the key listener
    run_machine_loop(machine)
        .await
        .map_err(|e| eyre!("Publish loop failed: {}", e))?;

    info!("Blimp controller stopped");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn print_intro() {
    println!(
        r#"_____________________________________________________
Welcome to the Blimpduino keyboard controller, press:
    "W" or "S" to move forward or backwards
    "A" or "D" to turn left or right
    "Q" or "E" to go up or down
    "M" or "N" for manual or reverse-kinematics mode
    Numbers 0, 1, 2, 3 and 9 for flight modes:
           Mode 0 => manual
           Mode 1 => manual control with altitude hold
           Mode 2 => yaw stabilization
           Mode 3 => yaw stabilization with altitude hold
           Mode 9 => stop motors
    "Esc" to exit

Connect your PC to the "JJRobots_XX" network (password "87654321")
before launching, or point the config at another target.
"#
    );
}
