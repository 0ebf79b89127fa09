pub mod api;
pub mod backend;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod desk;
pub mod http;
pub mod realtime;
pub mod reconciler;
pub mod view;

use std::time::Duration;

pub use self::{
    config::Config,
    desk::{Desk, Intent},
};

#[derive(Clone, Copy, Debug)]
pub struct Timeouts {
    pub backend: Duration,
    pub realtime: Duration,
}

impl From<&Config> for Timeouts {
    fn from(config: &Config) -> Self {
        Self {
            backend: config.backend.timeout,
            realtime: config.realtime.timeout,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            backend: Duration::from_secs(5),
            realtime: Duration::from_secs(5),
        }
    }
}
