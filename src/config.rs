use std::time::Duration;

pub const DEFAULT_RATES_URL: &str = "https://api.frankfurter.app/latest?from=USD";

#[derive(Debug, Clone)]
pub struct Config {
    pub rates_url: String,
    pub rates_ttl_secs: u64,
    pub rates_timeout_secs: u64,
    pub bind_addr: String,
    /// How long a client may take to send its request head
    pub request_timeout_secs: u64,
    /// Delay between evaporation steps
    pub evap_step_ms: u64,
    pub export_path: String,
    pub dashboard_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rates_url: DEFAULT_RATES_URL.to_string(),
            rates_ttl_secs: 3600,
            rates_timeout_secs: 10,
            bind_addr: "127.0.0.1:8501".to_string(),
            request_timeout_secs: 5,
            evap_step_ms: 100,
            export_path: "zeros_history.csv".to_string(),
            dashboard_path: "out/dashboard.html".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            rates_url: std::env::var("RATES_URL").unwrap_or(d.rates_url),
            rates_ttl_secs: std::env::var("RATES_TTL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.rates_ttl_secs),
            rates_timeout_secs: std::env::var("RATES_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.rates_timeout_secs),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(d.bind_addr),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.request_timeout_secs),
            evap_step_ms: std::env::var("EVAP_STEP_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.evap_step_ms),
            export_path: std::env::var("EXPORT_PATH").unwrap_or(d.export_path),
            dashboard_path: std::env::var("DASHBOARD_PATH").unwrap_or(d.dashboard_path),
        }
    }

    pub fn rates_ttl(&self) -> Duration {
        Duration::from_secs(self.rates_ttl_secs)
    }

    pub fn rates_timeout(&self) -> Duration {
        Duration::from_secs(self.rates_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn evap_step(&self) -> Duration {
        Duration::from_millis(self.evap_step_ms)
    }
}
