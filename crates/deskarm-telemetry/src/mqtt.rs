//! MQTT client feeding joint angles into the shared angle store.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use deskarm_kinematics::{AngleState, JointName};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};

use crate::error::{Result, TelemetryError};

/// Topic → joint name map the stock arm publishes on.
pub fn default_topics() -> BTreeMap<String, String> {
    [
        ("robot/base/position", "base"),
        ("robot/shoulder/position", "shoulder"),
        ("robot/elbow/position", "elbow"),
        ("robot/wrist0/position", "wrist"),
        ("robot/wrist1/position", "wrist2"),
        ("robot/wrist2/position", "wrist3"),
        ("robot/gripper/position", "hand"),
    ]
    .into_iter()
    .map(|(t, j)| (t.to_string(), j.to_string()))
    .collect()
}

/// Broker connection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Username, if the broker wants one.
    pub username: Option<String>,
    /// Password, sent only together with a username.
    pub password: Option<String>,
    /// Client id prefix. A random suffix is appended per connection.
    pub client_id_prefix: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// How long to wait for ConnAck, in seconds.
    pub connect_timeout_secs: u64,
    /// Pause after an event-loop error before polling again, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Topic → joint name.
    pub topics: BTreeMap<String, String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: Some("robot_gui".to_string()),
            password: Some("robot_gui".to_string()),
            client_id_prefix: "robot_gui".to_string(),
            keep_alive_secs: 30,
            connect_timeout_secs: 10,
            reconnect_delay_ms: 1000,
            topics: default_topics(),
        }
    }
}

impl TelemetryConfig {
    /// Reject settings the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(TelemetryError::InvalidConfig("empty host".to_string()));
        }
        if self.keep_alive_secs == 0 {
            return Err(TelemetryError::InvalidConfig(
                "keep_alive_secs must be at least 1".to_string(),
            ));
        }
        if self.topics.is_empty() {
            return Err(TelemetryError::InvalidConfig("no topics".to_string()));
        }
        for (topic, joint) in &self.topics {
            JointName::from_str(joint).map_err(|_| {
                TelemetryError::InvalidConfig(format!("topic {topic} maps to unknown joint {joint}"))
            })?;
        }
        Ok(())
    }

    /// Connection timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    fn mqtt_options(&self) -> MqttOptions {
        let client_id = format!("{}-{}", self.client_id_prefix, uuid::Uuid::new_v4());
        let mut mqtt_options = MqttOptions::new(client_id, self.host.clone(), self.port);
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            mqtt_options.set_credentials(user.clone(), pass.clone());
        }
        mqtt_options.set_keep_alive(Duration::from_secs(self.keep_alive_secs));
        mqtt_options.set_clean_session(true);
        mqtt_options
    }
}

/// Feed one publish into the angle store.
///
/// Topics outside `topics` are ignored. Payloads must be UTF-8 decimal text;
/// anything else is dropped without touching the store.
pub fn route_publish(
    topics: &BTreeMap<String, String>,
    angles: &AngleState,
    topic: &str,
    payload: &[u8],
) -> Option<JointName> {
    let Some(joint) = topics.get(topic) else {
        tracing::trace!(topic, "ignoring unmapped topic");
        return None;
    };
    let Ok(text) = std::str::from_utf8(payload) else {
        tracing::debug!(topic, "discarding non-UTF-8 payload");
        return None;
    };
    angles.receive(joint, text)
}

/// MQTT subscriber writing angle telemetry into an [`AngleState`].
pub struct TelemetryBridge {
    config: TelemetryConfig,
    client: AsyncClient,
    event_loop: Mutex<EventLoop>,
    angles: Arc<AngleState>,
}

impl TelemetryBridge {
    /// Create the client without touching the network.
    pub fn new(config: TelemetryConfig, angles: Arc<AngleState>) -> Result<Self> {
        config.validate()?;
        let (client, event_loop) = AsyncClient::new(config.mqtt_options(), 100);
        Ok(Self {
            config,
            client,
            event_loop: Mutex::new(event_loop),
            angles,
        })
    }

    /// Connect to the broker and subscribe to every mapped topic.
    pub async fn connect(config: TelemetryConfig, angles: Arc<AngleState>) -> Result<Self> {
        let bridge = Self::new(config, angles)?;
        bridge.wait_for_connection().await?;
        bridge.subscribe().await?;
        tracing::info!(
            host = %bridge.config.host,
            port = bridge.config.port,
            topics = bridge.config.topics.len(),
            "telemetry connected"
        );
        Ok(bridge)
    }

    async fn wait_for_connection(&self) -> Result<()> {
        let mut event_loop = self.event_loop.lock().await;
        let start = std::time::Instant::now();

        loop {
            if start.elapsed() > self.config.timeout() {
                return Err(TelemetryError::Timeout("connection timeout".into()));
            }

            match tokio::time::timeout(Duration::from_millis(500), event_loop.poll()).await {
                Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => {
                    return Ok(());
                }
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => {
                    return Err(TelemetryError::ConnectionFailed(e.to_string()));
                }
                Err(_) => {
                    // Timeout, keep trying
                    continue;
                }
            }
        }
    }

    async fn subscribe(&self) -> Result<()> {
        for topic in self.config.topics.keys() {
            self.client
                .subscribe(topic.as_str(), QoS::AtMostOnce)
                .await
                .map_err(|e| TelemetryError::MqttError(e.to_string()))?;
        }
        Ok(())
    }

    /// Process at most one incoming MQTT event.
    ///
    /// Returns the joint that was updated, if any.
    pub async fn poll(&self) -> Result<Option<JointName>> {
        let mut event_loop = self.event_loop.lock().await;

        match tokio::time::timeout(Duration::from_millis(100), event_loop.poll()).await {
            Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => Ok(route_publish(
                &self.config.topics,
                &self.angles,
                &publish.topic,
                &publish.payload,
            )),
            Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => {
                // Clean session: the broker forgot our subscriptions
                tracing::info!("telemetry reconnected");
                drop(event_loop);
                self.subscribe().await?;
                Ok(None)
            }
            Ok(Ok(_)) => Ok(None),
            Ok(Err(e)) => Err(TelemetryError::MqttError(e.to_string())),
            // Timeout, no message
            Err(_) => Ok(None),
        }
    }

    /// Poll until `shutdown` turns true or its sender goes away.
    ///
    /// Event-loop errors are logged and followed by a fixed pause; the next
    /// poll reconnects.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                polled = self.poll() => {
                    if let Err(e) = polled {
                        tracing::warn!("telemetry error, retrying in {delay:?}: {e}");
                        // Back off, but stay responsive to shutdown
                        tokio::select! {
                            changed = shutdown.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
        // Queue the disconnect; the event loop may already be gone
        self.client
            .try_disconnect()
            .map_err(|e| TelemetryError::MqttError(e.to_string()))?;
        tracing::info!("telemetry stopped");
        Ok(())
    }

    /// Active configuration.
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// The store this bridge writes into.
    pub fn angles(&self) -> &Arc<AngleState> {
        &self.angles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_topics_cover_every_joint() {
        let topics = default_topics();
        assert_eq!(topics.len(), JointName::ALL.len());
        for joint in JointName::ALL {
            assert!(topics.values().any(|j| j == joint.as_str()), "{joint} unmapped");
        }
        assert_eq!(topics["robot/wrist0/position"], "wrist");
        assert_eq!(topics["robot/gripper/position"], "hand");
    }

    #[test]
    fn test_route_publish() {
        let topics = default_topics();
        let angles = AngleState::new();
        let joint = route_publish(&topics, &angles, "robot/wrist1/position", b" 12.5 ");
        assert_eq!(joint, Some(JointName::Wrist2));
        assert_eq!(angles.get(JointName::Wrist2), 12.5);
    }

    #[test]
    fn test_route_publish_rejects_garbage() {
        let topics = default_topics();
        let angles = AngleState::new();
        angles.set(JointName::Elbow, 10.0);

        assert_eq!(route_publish(&topics, &angles, "robot/elbow/position", b"abc"), None);
        assert_eq!(route_publish(&topics, &angles, "robot/elbow/position", &[0xff, 0xfe]), None);
        assert_eq!(route_publish(&topics, &angles, "robot/tail/position", b"5"), None);
        assert_eq!(angles.get(JointName::Elbow), 10.0);
    }

    #[test]
    fn test_validate() {
        TelemetryConfig::default().validate().unwrap();

        let mut config = TelemetryConfig::default();
        config.topics.insert("robot/tail/position".into(), "tail".into());
        assert!(matches!(config.validate(), Err(TelemetryError::InvalidConfig(_))));

        let config = TelemetryConfig {
            keep_alive_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: TelemetryConfig = toml::from_str("host = \"broker.local\"\nport = 8883").unwrap();
        assert_eq!(config.host, "broker.local");
        assert_eq!(config.port, 8883);
        assert_eq!(config.topics, default_topics());
    }

    #[test]
    fn test_run_returns_on_shutdown() {
        let bridge = TelemetryBridge::new(TelemetryConfig::default(), AngleState::shared()).unwrap();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        tokio_test::block_on(bridge.run(rx)).unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_backoff() {
        let config = TelemetryConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            reconnect_delay_ms: 60_000,
            ..Default::default()
        };
        let bridge = TelemetryBridge::new(config, AngleState::shared()).unwrap();
        let (tx, rx) = watch::channel(false);
        let stop = async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            tx.send(true).unwrap();
        };
        let (result, ()) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(bridge.run(rx), stop)
        })
        .await
        .expect("run should stop while backing off");
        result.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let config = TelemetryConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            connect_timeout_secs: 2,
            ..Default::default()
        };
        let err = TelemetryBridge::connect(config, AngleState::shared()).await;
        assert!(matches!(
            err,
            Err(TelemetryError::ConnectionFailed(_)) | Err(TelemetryError::Timeout(_))
        ));
    }
}
