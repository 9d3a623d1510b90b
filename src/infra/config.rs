//! Configuration loading from TOML files
//!
//! The binaries pick the file with `--config <path>` (default `config/dev.toml`).
//! Every section is optional; missing keys fall back to the defaults below.

use crate::services::dwell::{DEFAULT_ILLEGAL_TIME_LIMIT, DEFAULT_MOVEMENT_THRESHOLD};
use crate::services::tracker::DEFAULT_MATCH_RADIUS;
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Where detection batches come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    Mqtt,
    File,
}

impl InputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputMode::Mqtt => "mqtt",
            InputMode::File => "file",
        }
    }
}

/// Where cycle reports are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkMode {
    Http,
    Mqtt,
    File,
    None,
}

impl SinkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkMode::Http => "http",
            SinkMode::Mqtt => "mqtt",
            SinkMode::File => "file",
            SinkMode::None => "none",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SiteConfig {
    /// Unique site identifier (e.g., "lot-a")
    #[serde(default = "default_site_id")]
    pub id: String,
}

fn default_site_id() -> String {
    "parking".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_input_mode")]
    pub mode: InputMode,
    /// JSONL detections file (file mode)
    #[serde(default)]
    pub file: Option<String>,
    /// Run a cycle on every Nth received frame
    #[serde(default = "default_sample_every")]
    pub sample_every: u64,
    /// Bounded ingest channel capacity
    #[serde(default = "default_input_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            mode: default_input_mode(),
            file: None,
            sample_every: default_sample_every(),
            channel_capacity: default_input_channel_capacity(),
        }
    }
}

fn default_input_mode() -> InputMode {
    InputMode::Mqtt
}

fn default_sample_every() -> u64 {
    1
}

fn default_input_channel_capacity() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    /// Topic the detector publishes batches on
    #[serde(default = "default_detections_topic")]
    pub topic: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            topic: default_detections_topic(),
            username: None,
            password: None,
        }
    }
}

fn default_detections_topic() -> String {
    "parking/detections".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RegionsConfig {
    /// JSON list of slot point lists
    #[serde(default)]
    pub slots_file: Option<String>,
    /// Inline monitor zone vertices
    #[serde(default)]
    pub monitor_zone: Option<Vec<[i32; 2]>>,
    /// JSON file with monitor zone vertices (used when no inline zone is given)
    #[serde(default)]
    pub monitor_zone_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_match_radius")]
    pub match_radius: f64,
    #[serde(default = "default_movement_threshold")]
    pub movement_threshold: f64,
    /// Dwell limit in cycles
    #[serde(default = "default_illegal_time_limit")]
    pub illegal_time_limit: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            match_radius: default_match_radius(),
            movement_threshold: default_movement_threshold(),
            illegal_time_limit: default_illegal_time_limit(),
        }
    }
}

fn default_match_radius() -> f64 {
    DEFAULT_MATCH_RADIUS
}

fn default_movement_threshold() -> f64 {
    DEFAULT_MOVEMENT_THRESHOLD
}

fn default_illegal_time_limit() -> u32 {
    DEFAULT_ILLEGAL_TIME_LIMIT
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    #[serde(default = "default_sink_mode")]
    pub mode: SinkMode,
    #[serde(default = "default_sink_http_url")]
    pub http_url: String,
    /// Per-delivery timeout
    #[serde(default = "default_sink_timeout_ms")]
    pub timeout_ms: u64,
    /// JSONL report file (file mode)
    #[serde(default = "default_sink_file")]
    pub file: String,
    /// Per-slot status topic (mqtt mode)
    #[serde(default = "default_status_topic")]
    pub status_topic: String,
    /// Illegal vehicle topic (mqtt mode)
    #[serde(default = "default_illegal_topic")]
    pub illegal_topic: String,
    /// Reports queued for the sink worker before new ones are dropped
    #[serde(default = "default_sink_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            mode: default_sink_mode(),
            http_url: default_sink_http_url(),
            timeout_ms: default_sink_timeout_ms(),
            file: default_sink_file(),
            status_topic: default_status_topic(),
            illegal_topic: default_illegal_topic(),
            queue_capacity: default_sink_queue_capacity(),
        }
    }
}

fn default_sink_mode() -> SinkMode {
    SinkMode::Http
}

fn default_sink_http_url() -> String {
    "http://localhost:5001/yolo".to_string()
}

fn default_sink_timeout_ms() -> u64 {
    500
}

fn default_sink_file() -> String {
    "reports.jsonl".to_string()
}

fn default_status_topic() -> String {
    "parking/status".to_string()
}

fn default_illegal_topic() -> String {
    "parking/illegal".to_string()
}

fn default_sink_queue_capacity() -> usize {
    16
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
    /// Prometheus metrics HTTP port (0 to disable)
    #[serde(default)]
    pub prometheus_port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval(), prometheus_port: 0 }
    }
}

fn default_metrics_interval() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub regions: RegionsConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    input_mode: InputMode,
    input_file: Option<String>,
    sample_every: u64,
    input_channel_capacity: usize,
    mqtt_host: String,
    mqtt_port: u16,
    mqtt_topic: String,
    mqtt_username: Option<String>,
    mqtt_password: Option<String>,
    slots_file: Option<String>,
    monitor_zone: Option<Vec<[i32; 2]>>,
    monitor_zone_file: Option<String>,
    match_radius: f64,
    movement_threshold: f64,
    illegal_time_limit: u32,
    sink_mode: SinkMode,
    sink_http_url: String,
    sink_timeout_ms: u64,
    sink_file: String,
    sink_status_topic: String,
    sink_illegal_topic: String,
    sink_queue_capacity: usize,
    metrics_interval_secs: u64,
    prometheus_port: u16,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            site_id: toml_config.site.id,
            input_mode: toml_config.input.mode,
            input_file: toml_config.input.file,
            // 0 would never fire a cycle
            sample_every: toml_config.input.sample_every.max(1),
            input_channel_capacity: toml_config.input.channel_capacity.max(1),
            mqtt_host: toml_config.mqtt.host,
            mqtt_port: toml_config.mqtt.port,
            mqtt_topic: toml_config.mqtt.topic,
            mqtt_username: toml_config.mqtt.username,
            mqtt_password: toml_config.mqtt.password,
            slots_file: toml_config.regions.slots_file,
            monitor_zone: toml_config.regions.monitor_zone,
            monitor_zone_file: toml_config.regions.monitor_zone_file,
            match_radius: toml_config.tracking.match_radius,
            movement_threshold: toml_config.tracking.movement_threshold,
            illegal_time_limit: toml_config.tracking.illegal_time_limit,
            sink_mode: toml_config.sink.mode,
            sink_http_url: toml_config.sink.http_url,
            sink_timeout_ms: toml_config.sink.timeout_ms,
            sink_file: toml_config.sink.file,
            sink_status_topic: toml_config.sink.status_topic,
            sink_illegal_topic: toml_config.sink.illegal_topic,
            sink_queue_capacity: toml_config.sink.queue_capacity.max(1),
            metrics_interval_secs: toml_config.metrics.interval_secs.max(1),
            prometheus_port: toml_config.metrics.prometheus_port,
            config_file,
        }
    }

    /// Load configuration from an explicit path, falling back to defaults
    pub fn load_from_path(config_path: &str) -> Self {
        match Self::from_file(config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    pub fn input_file(&self) -> Option<&str> {
        self.input_file.as_deref()
    }

    pub fn sample_every(&self) -> u64 {
        self.sample_every
    }

    pub fn input_channel_capacity(&self) -> usize {
        self.input_channel_capacity
    }

    pub fn mqtt_host(&self) -> &str {
        &self.mqtt_host
    }

    pub fn mqtt_port(&self) -> u16 {
        self.mqtt_port
    }

    pub fn mqtt_topic(&self) -> &str {
        &self.mqtt_topic
    }

    pub fn mqtt_username(&self) -> Option<&str> {
        self.mqtt_username.as_deref()
    }

    pub fn mqtt_password(&self) -> Option<&str> {
        self.mqtt_password.as_deref()
    }

    pub fn slots_file(&self) -> Option<&str> {
        self.slots_file.as_deref()
    }

    pub fn monitor_zone(&self) -> Option<&[[i32; 2]]> {
        self.monitor_zone.as_deref()
    }

    pub fn monitor_zone_file(&self) -> Option<&str> {
        self.monitor_zone_file.as_deref()
    }

    pub fn match_radius(&self) -> f64 {
        self.match_radius
    }

    pub fn movement_threshold(&self) -> f64 {
        self.movement_threshold
    }

    pub fn illegal_time_limit(&self) -> u32 {
        self.illegal_time_limit
    }

    pub fn sink_mode(&self) -> SinkMode {
        self.sink_mode
    }

    pub fn sink_http_url(&self) -> &str {
        &self.sink_http_url
    }

    pub fn sink_timeout_ms(&self) -> u64 {
        self.sink_timeout_ms
    }

    pub fn sink_file(&self) -> &str {
        &self.sink_file
    }

    pub fn sink_status_topic(&self) -> &str {
        &self.sink_status_topic
    }

    pub fn sink_illegal_topic(&self) -> &str {
        &self.sink_illegal_topic
    }

    pub fn sink_queue_capacity(&self) -> usize {
        self.sink_queue_capacity
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn prometheus_port(&self) -> u16 {
        self.prometheus_port
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method to point regions at explicit sources (CLI overrides, tests)
    pub fn with_regions(
        mut self,
        slots_file: Option<String>,
        monitor_zone: Option<Vec<[i32; 2]>>,
    ) -> Self {
        if slots_file.is_some() {
            self.slots_file = slots_file;
        }
        if monitor_zone.is_some() {
            self.monitor_zone = monitor_zone;
        }
        self
    }
}
