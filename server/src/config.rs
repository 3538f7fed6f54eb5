use proxcast_shared::config::ProximityConfig;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// How often the relay loop drains pending disconnects
    pub tick_rate_hz: u32,
    pub liveness_interval: Duration,
    /// Silence after which a participant is kicked
    pub client_timeout: Duration,
    pub max_connections: usize,
    pub max_message_bytes: usize,
    pub max_parse_errors: u32,
    /// Buffered frames kept for late joiners
    pub buffer_capacity: usize,
    /// Per-connection outbound queue; frames are dropped when it is full
    pub outbound_capacity: usize,
    pub proximity: ProximityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9002".to_string(),
            tick_rate_hz: 30,
            liveness_interval: Duration::from_secs(1),
            client_timeout: Duration::from_secs(10),
            max_connections: 256,
            max_message_bytes: 4096,
            max_parse_errors: 5,
            buffer_capacity: 64,
            outbound_capacity: 128,
            proximity: ProximityConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `PROXCAST_*` environment variables.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = Self::default();

        if let Some(addr) = lookup("PROXCAST_LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "PROXCAST_CLIENT_TIMEOUT_MS")? {
            config.client_timeout = Duration::from_millis(ms);
        }
        if let Some(distance) = parse_var::<f64>(&lookup, "PROXCAST_PROXIMITY_DISTANCE")? {
            config.proximity.proximity_distance = distance;
        }
        if let Some(frequency) = parse_var::<u32>(&lookup, "PROXCAST_UPDATE_FREQUENCY")? {
            config.proximity.update_frequency = frequency;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tick_rate_hz == 0 {
            return Err("tick_rate_hz must be > 0".to_string());
        }
        if self.liveness_interval.is_zero() {
            return Err("liveness_interval must be > 0".to_string());
        }
        if self.client_timeout < self.liveness_interval {
            return Err("client_timeout must be >= liveness_interval".to_string());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be > 0".to_string());
        }
        if self.outbound_capacity == 0 {
            return Err("outbound_capacity must be > 0".to_string());
        }
        self.proximity.validate()
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, String> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(None),
    }
}
