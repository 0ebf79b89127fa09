//! Expects `assignments` and `users` to notify `ticket_assignments` with
//! `{"op", "ticketId", "technicianId"}` and `user_accounts` on every change.

pub mod assignment;
pub mod user;

use std::{
    future::Future,
    sync::{Arc, Weak},
    time::Duration,
};

use async_trait::async_trait;
use futures::{stream, StreamExt as _};
use serde::Deserialize;
use tokio::{sync::mpsc, task, time};
use tokio_postgres::{AsyncMessage, NoTls, Notification};

use crate::{
    api::{technician, ticket, AssignmentRecord},
    config,
    realtime::{AssignmentStore, Error, Hub, Subscription},
};

const ASSIGNMENTS_CHANNEL: &str = "ticket_assignments";
const ACCOUNTS_CHANNEL: &str = "user_accounts";

pub struct Client(tokio_postgres::Client);

pub struct Store {
    client: Arc<Client>,
    hub: Arc<Hub>,
    timeout: Duration,
}

impl Store {
    /// When the connection is lost every subscription ends.
    pub async fn connect(config: config::Realtime) -> Result<Self, Error> {
        let url = config.url.as_deref().unwrap_or_default();
        let (client, mut connection) = tokio_postgres::connect(url, NoTls)
            .await
            .map_err(Error::Db)?;
        let client = Arc::new(Client(client));
        let hub = Hub::new();

        // Notifications are handled on their own task: handlers query
        // through the same connection, which must keep being polled.
        let (tx, rx) = mpsc::unbounded_channel();
        let mut messages =
            stream::poll_fn(move |cx| connection.poll_message(cx));
        task::spawn(async move {
            while let Some(message) = messages.next().await {
                match message {
                    Ok(AsyncMessage::Notification(n)) => {
                        if tx.send(n).is_err() {
                            break;
                        }
                    }
                    Ok(AsyncMessage::Notice(notice)) => {
                        tracing::debug!("database notice: {notice}");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(
                            "real-time store connection failed: {e}"
                        );
                        break;
                    }
                }
            }
        });
        task::spawn(handle_notifications(
            rx,
            Arc::downgrade(&client),
            hub.clone(),
        ));

        client
            .0
            .batch_execute(&format!(
                "LISTEN {ASSIGNMENTS_CHANNEL}; LISTEN {ACCOUNTS_CHANNEL}",
            ))
            .await?;

        Ok(Self {
            client,
            hub,
            timeout: config.timeout,
        })
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, tokio_postgres::Error>>,
    {
        time::timeout(self.timeout, fut)
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(Error::Db)
    }
}

#[async_trait]
impl AssignmentStore for Store {
    async fn subscribe_assignment(
        &self,
        ticket: ticket::Id,
    ) -> Result<Subscription<Option<AssignmentRecord>>, Error> {
        let (sub, unknown) = self.hub.subscribe_assignment(ticket);
        if unknown {
            // LISTEN is already active, so loading after attaching cannot
            // miss a change.
            let record =
                self.timed(self.client.get_assignment(ticket)).await?;
            self.hub.load_assignment(ticket, record);
        }
        Ok(sub)
    }

    async fn subscribe_roster(
        &self,
    ) -> Result<Subscription<Vec<technician::Account>>, Error> {
        let (sub, unknown) = self.hub.subscribe_roster()?;
        if unknown {
            let accounts = self.timed(self.client.get_accounts()).await?;
            self.hub.publish_roster(accounts);
        }
        Ok(sub)
    }

    async fn write_assignment(
        &self,
        record: &AssignmentRecord,
    ) -> Result<(), Error> {
        self.timed(self.client.write_assignment(record)).await
    }
}

async fn handle_notifications(
    mut rx: mpsc::UnboundedReceiver<Notification>,
    client: Weak<Client>,
    hub: Arc<Hub>,
) {
    while let Some(n) = rx.recv().await {
        let res = match n.channel() {
            ASSIGNMENTS_CHANNEL => on_assignment_change(&hub, n.payload()),
            ACCOUNTS_CHANNEL => reload_roster(&client, &hub).await,
            _ => Ok(()),
        };
        if let Err(e) = res {
            tracing::error!("failed to handle notification: {e}");
        }
    }
    hub.close();
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignmentChange {
    op: String,
    ticket_id: ticket::Id,
    technician_id: Option<technician::Id>,
}

fn on_assignment_change(hub: &Hub, payload: &str) -> Result<(), Error> {
    let change = serde_json::from_str::<AssignmentChange>(payload)?;
    let record = match (change.op.as_str(), change.technician_id) {
        ("DELETE", _) | (_, None) => None,
        (_, Some(technician_id)) => Some(AssignmentRecord {
            ticket_id: change.ticket_id,
            technician_id,
        }),
    };
    tracing::debug!(
        ticket = %change.ticket_id,
        op = %change.op,
        "assignment changed"
    );
    hub.publish_assignment(change.ticket_id, record);
    Ok(())
}

async fn reload_roster(
    client: &Weak<Client>,
    hub: &Hub,
) -> Result<(), Error> {
    let client = client.upgrade().ok_or(Error::Closed)?;
    let accounts = client.get_accounts().await?;
    hub.publish_roster(accounts);
    Ok(())
}
