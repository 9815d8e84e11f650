use std::time::Duration;

use clap::Args;

pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:8000";

/// Where the simulation service lives and how long the transport waits for it.
#[derive(Args, Clone, Debug)]
pub struct ServiceSettings {
    #[arg(
        long = "service-url",
        env = "PLANSIM_SERVICE_URL",
        default_value = DEFAULT_SERVICE_URL,
        help = "Base URL of the simulation service"
    )]
    pub base_url: String,
    #[arg(
        long = "service-timeout-secs",
        env = "PLANSIM_SERVICE_TIMEOUT_SECS",
        default_value_t = 60,
        help = "Per-request timeout for simulation service calls"
    )]
    pub timeout_secs: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVICE_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

impl ServiceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
