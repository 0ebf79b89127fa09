use std::{net, time};

use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub backend: Backend,
    #[serde(default)]
    pub realtime: Realtime,
    pub http: Http,
}

#[derive(Clone, Deserialize)]
pub struct Backend {
    /// Base URL of the ticket API, `/tickets` is appended to it.
    pub url: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: time::Duration,
}

#[derive(Clone, Deserialize)]
pub struct Realtime {
    /// Postgres connection string. In-process store is used when absent.
    pub url: Option<String>,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: time::Duration,
}

impl Default for Realtime {
    fn default() -> Self {
        Self {
            url: None,
            timeout: default_timeout(),
        }
    }
}

#[derive(Deserialize)]
pub struct Http {
    pub server: Server,
    pub cors: Cors,
}

#[derive(Deserialize)]
pub struct Server {
    pub addr: net::SocketAddr,
}

#[derive(Deserialize)]
pub struct Cors {
    pub allowed_origins: Vec<String>,
}

fn default_timeout() -> time::Duration {
    time::Duration::from_secs(5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_durations_and_defaults() {
        let config = toml::from_str::<Config>(
            r#"
            [backend]
            url = "http://localhost:8000/api"
            timeout = "1500ms"

            [http.server]
            addr = "127.0.0.1:3000"

            [http.cors]
            allowed_origins = []
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.timeout, time::Duration::from_millis(1500));
        assert_eq!(config.realtime.url, None);
        assert_eq!(config.realtime.timeout, time::Duration::from_secs(5));
    }
}
