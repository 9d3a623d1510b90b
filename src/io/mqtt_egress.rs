//! MQTT relay for cycle reports
//!
//! Publishes each report to the topics downstream dashboards subscribe to:
//! - `<status_topic>` - one message per slot `{slot, status: 0|1, confidence, timestamp}` (QoS 1)
//! - `<illegal_topic>` - `{timestamp, count, cars}` when any vehicle is illegal (QoS 1)
//! - `<illegal_topic>/alert` - one message per newly confirmed vehicle (QoS 1)
//!
//! Every payload also carries `site` and `session`.

use crate::domain::report::{IllegalCar, ReportEnvelope};
use crate::infra::config::Config;
use crate::io::sink::ReportSink;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
pub struct SlotStatusPayload<'a> {
    pub site: &'a str,
    pub session: &'a str,
    pub slot: &'a str,
    pub status: u8,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct IllegalPayload<'a> {
    pub site: &'a str,
    pub session: &'a str,
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    pub cars: &'a [IllegalCar],
}

#[derive(Debug, Serialize)]
pub struct AlertPayload<'a> {
    pub site: &'a str,
    pub session: &'a str,
    pub timestamp: DateTime<Utc>,
    pub id: u64,
    pub x: i32,
    pub y: i32,
    pub duration: u32,
}

/// Topic and payload pairs for one report, in publish order
pub fn relay_messages(
    envelope: &ReportEnvelope,
    status_topic: &str,
    illegal_topic: &str,
) -> Vec<(String, String)> {
    let mut messages = Vec::with_capacity(envelope.report.slots.len() + 1);

    for slot in &envelope.report.slots {
        let payload = SlotStatusPayload {
            site: &envelope.site,
            session: &envelope.session,
            slot: &slot.label,
            status: slot.status.as_flag(),
            confidence: slot.confidence,
            timestamp: envelope.timestamp,
        };
        if let Ok(json) = serde_json::to_string(&payload) {
            messages.push((status_topic.to_string(), json));
        }
    }

    if envelope.report.illegal_count > 0 {
        let payload = IllegalPayload {
            site: &envelope.site,
            session: &envelope.session,
            timestamp: envelope.timestamp,
            count: envelope.report.illegal_count,
            cars: &envelope.report.illegal_cars,
        };
        if let Ok(json) = serde_json::to_string(&payload) {
            messages.push((illegal_topic.to_string(), json));
        }
    }

    let alert_topic = format!("{illegal_topic}/alert");
    for alert in &envelope.alerts {
        let payload = AlertPayload {
            site: &envelope.site,
            session: &envelope.session,
            timestamp: envelope.timestamp,
            id: alert.id.0,
            x: alert.position.x,
            y: alert.position.y,
            duration: alert.dwell_timer,
        };
        if let Ok(json) = serde_json::to_string(&payload) {
            messages.push((alert_topic.clone(), json));
        }
    }

    messages
}

/// Publishes cycle reports to the relay topics
pub struct MqttRelaySink {
    client: AsyncClient,
    status_topic: String,
    illegal_topic: String,
}

impl MqttRelaySink {
    /// Connect to the configured broker
    ///
    /// The eventloop runs on its own task for the life of the process.
    pub fn new(config: &Config) -> Self {
        let client_id = format!("parking-relay-{}", std::process::id());
        let mut mqttoptions = MqttOptions::new(client_id, config.mqtt_host(), config.mqtt_port());
        mqttoptions.set_keep_alive(Duration::from_secs(30));
        mqttoptions.set_clean_session(true);

        if let (Some(username), Some(password)) = (config.mqtt_username(), config.mqtt_password()) {
            mqttoptions.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(mqttoptions, 100);

        tokio::spawn(async move {
            let mut eventloop = eventloop;
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("mqtt_relay_connected");
                    }
                    Ok(Event::Incoming(Packet::PubAck(_))) => {
                        debug!("mqtt_relay_puback");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "mqtt_relay_error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        info!(
            status = %config.sink_status_topic(),
            illegal = %config.sink_illegal_topic(),
            "mqtt_relay_started"
        );

        Self {
            client,
            status_topic: config.sink_status_topic().to_string(),
            illegal_topic: config.sink_illegal_topic().to_string(),
        }
    }
}

#[async_trait]
impl ReportSink for MqttRelaySink {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    async fn deliver(&self, envelope: &ReportEnvelope) -> anyhow::Result<()> {
        for (topic, json) in relay_messages(envelope, &self.status_topic, &self.illegal_topic) {
            self.client.publish(topic, QoS::AtLeastOnce, false, json.into_bytes()).await?;
        }
        Ok(())
    }
}
