//! MQTT bus adapter.
//!
//! Wraps a rumqttc async client behind the [`CommandBus`] trait and feeds
//! inbound deliveries into the sync controller's mailbox. Transport
//! concerns (framing, reconnect pacing) stay inside rumqttc; this adapter
//! only owns the protocol-level obligations:
//!
//! - resubscribe to every device topic on each ConnAck, so confirmations
//!   are not silently lost across a reconnect
//! - publish the one-shot `LED{n}/get` initial-state queries on the first
//!   connect
//! - stamp every inbound publish with the monotonic report sequence

use std::sync::atomic::{AtomicU64, Ordering};

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use gesture_common::{protocol, BusConfig, DeviceId, GestureError};

use crate::dispatcher::CommandBus;
use crate::sync::SyncHandle;

/// Outstanding-request capacity handed to rumqttc.
const REQUEST_CAPACITY: usize = 64;

/// Pause before polling again after a transport error, so a dead broker
/// does not spin the loop hot.
const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

/// Cloneable publisher handle. `try_publish` hands the message to the
/// transport without awaiting network I/O, so the capture path never
/// blocks on the broker.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
}

impl CommandBus for MqttBus {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), GestureError> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|e| GestureError::BusPublish(e.to_string()))
    }
}

/// Connects to the broker and spawns the delivery task. The returned
/// handle publishes; the task owns the event loop for the life of the
/// process.
pub fn connect(config: &BusConfig, sync: SyncHandle) -> (MqttBus, JoinHandle<()>) {
    let mut options = MqttOptions::new(
        config.client_id.clone(),
        config.host.clone(),
        config.port,
    );
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
    info!(host = %config.host, port = config.port, "connecting to bus");

    let bus = MqttBus { client: client.clone() };
    let task = tokio::spawn(drive(client, event_loop, sync));
    (bus, task)
}

/// Event-loop task: subscriptions, initial-state probe, inbound delivery.
async fn drive(client: AsyncClient, mut event_loop: EventLoop, sync: SyncHandle) {
    // Stamped onto inbound reports; starts at 1 so version 0 always means
    // "never reported".
    let sequence = AtomicU64::new(0);
    let mut probed = false;

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("bus connected");
                if let Err(e) = subscribe_all(&client).await {
                    warn!(error = %e, "subscription failed, retrying on next connect");
                    continue;
                }
                // The initial-state probe runs once; after a reconnect the
                // devices' retained behavior and intent expiry cover us.
                if !probed {
                    probed = true;
                    query_initial_state(&client).await;
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let version = sequence.fetch_add(1, Ordering::Relaxed) + 1;
                sync.inbound(publish.topic, publish.payload.to_vec(), version);
            }
            Ok(event) => debug!(?event, "bus event"),
            Err(e) => {
                warn!(error = %e, "bus connection error");
                tokio::time::sleep(RECONNECT_PAUSE).await;
            }
        }
    }
}

/// Subscribes to the command and status channels of every device. Runs on
/// every ConnAck: a broker that lost our session must resubscribe before
/// confirmations can be trusted again.
async fn subscribe_all(client: &AsyncClient) -> Result<(), GestureError> {
    for device in DeviceId::all() {
        for topic in [protocol::command_topic(device), protocol::status_topic(device)] {
            client
                .subscribe(topic, QoS::AtLeastOnce)
                .await
                .map_err(|e| GestureError::BusPublish(e.to_string()))?;
        }
    }
    Ok(())
}

/// Asks each device for a fresh status report. A device that never
/// answers simply stays `Unknown`; there is no retry here.
async fn query_initial_state(client: &AsyncClient) {
    for device in DeviceId::all() {
        let topic = protocol::get_topic(device);
        if let Err(e) = client
            .publish(topic.as_str(), QoS::AtLeastOnce, false, Vec::new())
            .await
        {
            warn!(%topic, error = %e, "initial-state query failed");
        }
    }
}
