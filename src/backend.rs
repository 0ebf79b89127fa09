use async_trait::async_trait;
use derive_more::{Display, From};
use reqwest::StatusCode;
use serde_json::json;

use crate::{
    api::{
        ticket::{self, EscalationLevel, Priority},
        Ticket,
    },
    config,
};

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn list_tickets(&self) -> Result<Vec<Ticket>, Error>;

    async fn update_priority(
        &self,
        id: ticket::Id,
        priority: Priority,
    ) -> Result<(), Error>;

    async fn update_escalation(
        &self,
        id: ticket::Id,
        level: EscalationLevel,
    ) -> Result<(), Error>;
}

#[derive(Debug, Display, derive_more::Error, From)]
pub enum Error {
    #[display("backend request failed: {_0}")]
    #[from]
    Http(reqwest::Error),
    #[display("backend responded with {_0}")]
    Status(#[error(not(source))] StatusCode),
    #[display("backend request timed out")]
    Timeout,
}

pub struct Client {
    inner: reqwest::Client,
    base_url: String,
}

impl Client {
    pub fn new(config: config::Backend) -> Result<Self, Error> {
        let inner = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            inner,
            base_url: config.url.trim_end_matches('/').to_owned(),
        })
    }

    async fn put(
        &self,
        url: String,
        body: serde_json::Value,
    ) -> Result<(), Error> {
        let res = self.inner.put(url).json(&body).send().await.map_err(timeout)?;
        if !res.status().is_success() {
            return Err(Error::Status(res.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl TicketStore for Client {
    async fn list_tickets(&self) -> Result<Vec<Ticket>, Error> {
        let res = self
            .inner
            .get(format!("{}/tickets", self.base_url))
            .send()
            .await
            .map_err(timeout)?;
        if !res.status().is_success() {
            return Err(Error::Status(res.status()));
        }
        res.json::<Vec<Ticket>>().await.map_err(timeout)
    }

    async fn update_priority(
        &self,
        id: ticket::Id,
        priority: Priority,
    ) -> Result<(), Error> {
        let url = format!("{}/tickets/{id}/priority", self.base_url);
        self.put(url, json!({ "priority": priority })).await
    }

    async fn update_escalation(
        &self,
        id: ticket::Id,
        level: EscalationLevel,
    ) -> Result<(), Error> {
        let url = format!("{}/tickets/{id}/escLevel", self.base_url);
        self.put(url, json!({ "escLevel": level })).await
    }
}

fn timeout(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::Http(e)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn status_error_has_no_source() {
        let e = Error::Status(StatusCode::BAD_GATEWAY);

        assert!(e.source().is_none());
        assert_eq!(e.to_string(), "backend responded with 502 Bad Gateway");
    }
}
