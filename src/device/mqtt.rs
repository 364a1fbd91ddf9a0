//! MQTT command channel publishing device shadow updates

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, QoS};
use skillbridge_shared::codec::{self, ShadowUpdate};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::traits::CommandChannel;

/// Broker connection settings
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Outgoing request queue depth
    pub capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 1883,
            client_id: "skillbridge".into(),
            keep_alive: Duration::from_secs(30),
            capacity: 10,
        }
    }
}

/// Shadow update topic for a thing
pub fn shadow_topic(thing_name: &str) -> String {
    format!("$aws/things/{}/shadow/update", thing_name)
}

/// Publishes desired state at QoS 1 without waiting for the device
pub struct MqttCommandChannel {
    client: AsyncClient,
    /// endpoint id -> thing name
    things: HashMap<String, String>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttCommandChannel {
    /// Create the client and spawn the task driving its event loop
    pub fn connect(config: &MqttConfig, things: HashMap<String, String>) -> Self {
        let mut opts = MqttOptions::new(&config.client_id, &config.host, config.port);
        opts.set_keep_alive(config.keep_alive);

        let (client, event_loop) = AsyncClient::new(opts, config.capacity);
        info!(
            "MQTT command channel for {}:{} ({} things)",
            config.host,
            config.port,
            things.len()
        );

        let event_task = tokio::spawn(drive_event_loop(event_loop));

        Self {
            client,
            things,
            event_task: Mutex::new(Some(event_task)),
        }
    }

    /// Disconnect after queued publishes are flushed, waiting at most `grace`
    pub async fn shutdown(&self, grace: Duration) {
        let Some(mut task) = self.event_task.lock().await.take() else {
            return;
        };

        if let Err(e) = self.client.disconnect().await {
            warn!("[MQTT] Disconnect request failed: {}", e);
            task.abort();
            return;
        }

        if tokio::time::timeout(grace, &mut task).await.is_err() {
            warn!(
                "[MQTT] Queued publishes not flushed within {}ms",
                grace.as_millis()
            );
            task.abort();
        }
    }

    fn topic_for(&self, endpoint_id: &str) -> Result<String> {
        self.things
            .get(endpoint_id)
            .map(|thing| shadow_topic(thing))
            .ok_or_else(|| anyhow!("No thing bound to endpoint {}", endpoint_id))
    }
}

impl Drop for MqttCommandChannel {
    fn drop(&mut self) {
        if let Some(task) = self.event_task.get_mut().take() {
            task.abort();
        }
    }
}

async fn drive_event_loop(mut event_loop: EventLoop) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
                debug!("[MQTT] Publish sent (pkid={})", pkid);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                info!("[MQTT] Disconnected");
                break;
            }
            Ok(Event::Incoming(packet)) => {
                debug!("[MQTT] Incoming: {:?}", packet);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("[MQTT] Connection error: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[async_trait]
impl CommandChannel for MqttCommandChannel {
    async fn publish_desired(&self, endpoint_id: &str, update: &ShadowUpdate) -> Result<()> {
        let topic = self.topic_for(endpoint_id)?;
        let payload = codec::encode_shadow_update(update)?;

        debug!(
            "[MQTT] {} <- power={}",
            topic,
            update.desired_power()
        );

        self.client
            .publish_bytes(topic.as_str(), QoS::AtLeastOnce, false, payload)
            .await
            .with_context(|| format!("publishing to {}", topic))
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn things() -> HashMap<String, String> {
        HashMap::from([("sample-bulb-01".to_string(), "my-esp32".to_string())])
    }

    #[test]
    fn test_shadow_topic() {
        assert_eq!(shadow_topic("my-esp32"), "$aws/things/my-esp32/shadow/update");
    }

    #[tokio::test]
    async fn test_topic_resolution() {
        let channel = MqttCommandChannel::connect(&MqttConfig::default(), things());
        assert_eq!(
            channel.topic_for("sample-bulb-01").unwrap(),
            "$aws/things/my-esp32/shadow/update"
        );
        assert!(channel.topic_for("unknown").is_err());
    }

    #[tokio::test]
    async fn test_publish_unbound_endpoint_fails() {
        let channel = MqttCommandChannel::connect(&MqttConfig::default(), things());
        let result = channel
            .publish_desired("unknown", &ShadowUpdate::power(true))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_publish_is_queued_without_broker() {
        // Publishing only hands the request to the client queue
        let channel = MqttCommandChannel::connect(&MqttConfig::default(), things());
        channel
            .publish_desired("sample-bulb-01", &ShadowUpdate::power(true))
            .await
            .expect("publish should be queued");

        channel.shutdown(Duration::from_millis(50)).await;
        // Second shutdown is a no-op
        channel.shutdown(Duration::from_millis(50)).await;
    }
}
