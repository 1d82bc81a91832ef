use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub gate_controller_url: String,
    pub gate_controller_timeout: Duration,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("API_PORT", "8000"),
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379"),
            gate_controller_url: try_load("GATE_CONTROLLER_URL", "http://127.0.0.1:3001"),
            gate_controller_timeout: Duration::from_secs(try_load(
                "GATE_CONTROLLER_TIMEOUT_SECS",
                "5",
            )),
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
