//! Operator CLI for the gesture-switch system.
//!
//! Speaks the same bus protocol as the daemon: user toggles go out on the
//! `LED{n}` command topics, truth comes back on `LED{n}/status`. The CLI
//! connects straight to the broker, so it works whether or not gestured
//! is running.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};

use gesture_common::{protocol, DeviceId, SwitchAction};

/// How long `status` waits for devices to answer the state query.
const STATUS_WINDOW: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "gesturectl", version, about = "CLI for the gesture-switch bus")]
struct Cli {
    /// Broker host.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Broker port.
    #[arg(long, default_value_t = 1883)]
    port: u16,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Switch a device on
    On { device: u8 },
    /// Switch a device off
    Off { device: u8 },
    /// Query all devices and print their reported state
    Status,
    /// Stream state changes until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (client, event_loop) = connect(&cli.host, cli.port);

    match cli.cmd {
        Cmd::On { device } => toggle(client, event_loop, device, SwitchAction::On).await,
        Cmd::Off { device } => toggle(client, event_loop, device, SwitchAction::Off).await,
        Cmd::Status => status(client, event_loop).await,
        Cmd::Watch => watch(client, event_loop).await,
    }
}

fn connect(host: &str, port: u16) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(format!("gesturectl-{}", std::process::id()), host, port);
    options.set_keep_alive(Duration::from_secs(30));
    AsyncClient::new(options, 16)
}

fn device_arg(device: u8) -> Result<DeviceId> {
    DeviceId::new(device).ok_or_else(|| {
        anyhow!(
            "device id {device} out of range ({}..={})",
            DeviceId::MIN,
            DeviceId::MAX
        )
    })
}

/// Publishes one user toggle and waits for the broker to ack it.
async fn toggle(
    client: AsyncClient,
    mut event_loop: EventLoop,
    device: u8,
    action: SwitchAction,
) -> Result<()> {
    let device = device_arg(device)?;
    let topic = protocol::command_topic(device);
    client
        .publish(topic.as_str(), QoS::AtLeastOnce, false, action.as_payload().as_bytes())
        .await
        .context("queueing publish")?;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let event = tokio::time::timeout_at(deadline, event_loop.poll())
            .await
            .context("timed out waiting for broker ack")?
            .context("broker connection failed")?;
        if let Event::Incoming(Packet::PubAck(_)) = event {
            println!("{topic} {}", paint(action.as_payload()));
            return Ok(());
        }
    }
}

/// Asks every device for its state and prints what answered in time.
async fn status(client: AsyncClient, mut event_loop: EventLoop) -> Result<()> {
    let mut reported: HashMap<DeviceId, String> = HashMap::new();
    let deadline = tokio::time::Instant::now() + STATUS_WINDOW;
    let mut queried = false;

    loop {
        let event = match tokio::time::timeout_at(deadline, event_loop.poll()).await {
            Ok(event) => event.context("broker connection failed")?,
            Err(_) => break, // window closed, print what we have
        };
        match event {
            Event::Incoming(Packet::ConnAck(_)) => {
                for device in DeviceId::all() {
                    client
                        .subscribe(protocol::status_topic(device), QoS::AtLeastOnce)
                        .await?;
                }
                if !queried {
                    queried = true;
                    for device in DeviceId::all() {
                        client
                            .publish(
                                protocol::get_topic(device).as_str(),
                                QoS::AtLeastOnce,
                                false,
                                Vec::new(),
                            )
                            .await?;
                    }
                }
            }
            Event::Incoming(Packet::Publish(publish)) => {
                if let Some(protocol::InboundTopic::Status(device)) =
                    protocol::parse_topic(&publish.topic)
                {
                    let payload = String::from_utf8_lossy(&publish.payload).into_owned();
                    reported.insert(device, payload);
                }
                if reported.len() == DeviceId::all().count() {
                    break;
                }
            }
            _ => {}
        }
    }

    if !queried {
        bail!("could not reach the broker");
    }
    for device in DeviceId::all() {
        match reported.get(&device) {
            Some(payload) => println!("device {device}  {}", paint(payload)),
            None => println!("device {device}  {}", "UNKNOWN".dimmed()),
        }
    }
    Ok(())
}

/// Streams status reports until ctrl-c.
async fn watch(client: AsyncClient, mut event_loop: EventLoop) -> Result<()> {
    loop {
        let event = tokio::select! {
            event = event_loop.poll() => event.context("broker connection failed")?,
            _ = tokio::signal::ctrl_c() => return Ok(()),
        };
        match event {
            Event::Incoming(Packet::ConnAck(_)) => {
                for device in DeviceId::all() {
                    client
                        .subscribe(protocol::status_topic(device), QoS::AtLeastOnce)
                        .await?;
                }
            }
            Event::Incoming(Packet::Publish(publish)) => {
                if let Some(protocol::InboundTopic::Status(device)) =
                    protocol::parse_topic(&publish.topic)
                {
                    let payload = String::from_utf8_lossy(&publish.payload).into_owned();
                    println!("device {device}  {}", paint(&payload));
                }
            }
            _ => {}
        }
    }
}

fn paint(payload: &str) -> String {
    match payload {
        "ON" => payload.green().to_string(),
        "OFF" => payload.red().to_string(),
        other => other.yellow().to_string(),
    }
}
