//! MQTT client for receiving detector box batches

use crate::domain::types::DetectionBatch;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Parse one detector payload
///
/// Accepts the batch object (`{"frame": n, "boxes": [...]}`) or a bare list
/// of boxes, which older detector builds publish.
pub fn parse_detection_payload(payload: &[u8]) -> Result<DetectionBatch, serde_json::Error> {
    match serde_json::from_slice::<DetectionBatch>(payload) {
        Ok(batch) => Ok(batch),
        Err(e) => match serde_json::from_slice::<Vec<[f64; 4]>>(payload) {
            Ok(boxes) => Ok(DetectionBatch { frame: None, boxes }),
            Err(_) => Err(e),
        },
    }
}

/// Forward a batch without blocking the eventloop
///
/// Returns false when the batch was dropped.
pub(crate) fn forward_batch(
    batch_tx: &mpsc::Sender<DetectionBatch>,
    batch: DetectionBatch,
    metrics: &Metrics,
    last_drop_warn: &mut Instant,
) -> bool {
    match batch_tx.try_send(batch) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            metrics.record_frame_dropped();
            if last_drop_warn.elapsed() > Duration::from_secs(1) {
                warn!(dropped_total = %metrics.frames_dropped(), "detection_batch_dropped: channel full");
                *last_drop_warn = Instant::now();
            }
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!("detection_batch_channel_closed");
            false
        }
    }
}

/// Start the MQTT client and send parsed batches to the channel
///
/// Batches are sent via try_send so the eventloop never blocks on a slow
/// cycle. Dropped batches are counted in metrics and logged (rate-limited).
pub async fn start_mqtt_client(
    config: &Config,
    batch_tx: mpsc::Sender<DetectionBatch>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let client_id = format!("parking-monitor-{}", config.site_id());
    let mut mqttoptions = MqttOptions::new(client_id, config.mqtt_host(), config.mqtt_port());
    mqttoptions.set_keep_alive(Duration::from_secs(30));
    // Detector payloads carry every box in the frame
    mqttoptions.set_max_packet_size(1024 * 1024, 1024 * 1024);

    if let (Some(username), Some(password)) = (config.mqtt_username(), config.mqtt_password()) {
        mqttoptions.set_credentials(username, password);
    }

    let (client, mut eventloop) = AsyncClient::new(mqttoptions, 100);
    client.subscribe(config.mqtt_topic(), QoS::AtMostOnce).await?;

    info!(
        topic = %config.mqtt_topic(),
        host = %config.mqtt_host(),
        port = %config.mqtt_port(),
        "mqtt_ingest_subscribed"
    );

    // Rate-limit drop warnings to 1 per second
    let mut last_drop_warn = Instant::now() - Duration::from_secs(2);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("mqtt_ingest_shutdown");
                    return Ok(());
                }
            }
            result = eventloop.poll() => {
                match result {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        metrics.record_frame_received();
                        match parse_detection_payload(&publish.payload) {
                            Ok(batch) => {
                                debug!(
                                    topic = %publish.topic,
                                    frame = ?batch.frame,
                                    boxes = %batch.boxes.len(),
                                    "detection_batch_received"
                                );
                                forward_batch(&batch_tx, batch, &metrics, &mut last_drop_warn);
                            }
                            Err(e) => {
                                metrics.record_frame_malformed();
                                debug!(topic = %publish.topic, error = %e, "detection_batch_malformed");
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("mqtt_ingest_connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "mqtt_ingest_error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }
}
