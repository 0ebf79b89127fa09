pub mod memory;

use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{Arc, Weak},
};

use async_trait::async_trait;
use derive_more::{Display, From};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::api::{technician, ticket, AssignmentRecord};

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn subscribe_assignment(
        &self,
        ticket: ticket::Id,
    ) -> Result<Subscription<Option<AssignmentRecord>>, Error>;

    /// Every delivery is the full roster.
    async fn subscribe_roster(
        &self,
    ) -> Result<Subscription<Vec<technician::Account>>, Error>;

    async fn write_assignment(
        &self,
        record: &AssignmentRecord,
    ) -> Result<(), Error>;
}

#[derive(Debug, Display, derive_more::Error, From)]
pub enum Error {
    #[display("real-time store query failed: {_0}")]
    #[from]
    Db(tokio_postgres::Error),
    #[display("malformed real-time store payload: {_0}")]
    #[from]
    Payload(serde_json::Error),
    #[display("real-time store connection is closed")]
    Closed,
    #[display("real-time store request timed out")]
    Timeout,
}

pub struct Subscription<T> {
    // Must be dropped before `release` so that the hub sees the receiver gone.
    rx: watch::Receiver<Option<T>>,
    release: Option<Release>,
}

impl<T: Clone> Subscription<T> {
    /// Current value first, then every change. [`None`] once the store is
    /// closed.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            self.rx.changed().await.ok()?;
            let value = self.rx.borrow_and_update().clone();
            if value.is_some() {
                return value;
            }
        }
    }
}

struct Release {
    hub: Weak<Hub>,
    ticket: ticket::Id,
}

impl Drop for Release {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.release(self.ticket);
        }
    }
}

/// Values stay unknown (`None`) until a store loads them.
pub(crate) struct Hub {
    assignments: Mutex<HashMap<ticket::Id, Slot<Option<AssignmentRecord>>>>,
    roster: Mutex<Option<Slot<Vec<technician::Account>>>>,
}

type Slot<T> = watch::Sender<Option<T>>;

impl Hub {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            assignments: Mutex::new(HashMap::new()),
            roster: Mutex::new(Some(watch::Sender::new(None))),
        })
    }

    /// `true` if the value must be loaded with [`Hub::load_assignment`].
    pub(crate) fn subscribe_assignment(
        self: &Arc<Self>,
        ticket: ticket::Id,
    ) -> (Subscription<Option<AssignmentRecord>>, bool) {
        let mut assignments = self.assignments.lock();
        let slot = assignments
            .entry(ticket)
            .or_insert_with(|| watch::Sender::new(None));
        let mut rx = slot.subscribe();
        let unknown = slot.borrow().is_none();
        if !unknown {
            rx.mark_changed();
        }
        tracing::debug!(%ticket, "assignment subscription attached");

        let sub = Subscription {
            rx,
            release: Some(Release {
                hub: Arc::downgrade(self),
                ticket,
            }),
        };
        (sub, unknown)
    }

    pub(crate) fn load_assignment(
        &self,
        ticket: ticket::Id,
        record: Option<AssignmentRecord>,
    ) {
        if let Some(slot) = self.assignments.lock().get(&ticket) {
            slot.send_if_modified(|value| {
                if value.is_some() {
                    return false;
                }
                *value = Some(record);
                true
            });
        }
    }

    pub(crate) fn publish_assignment(
        &self,
        ticket: ticket::Id,
        record: Option<AssignmentRecord>,
    ) {
        if let Some(slot) = self.assignments.lock().get(&ticket) {
            slot.send_replace(Some(record));
        }
    }

    pub(crate) fn subscribe_roster(
        &self,
    ) -> Result<(Subscription<Vec<technician::Account>>, bool), Error> {
        let roster = self.roster.lock();
        let slot = roster.as_ref().ok_or(Error::Closed)?;
        let mut rx = slot.subscribe();
        let unknown = slot.borrow().is_none();
        if !unknown {
            rx.mark_changed();
        }
        Ok((Subscription { rx, release: None }, unknown))
    }

    pub(crate) fn publish_roster(&self, accounts: Vec<technician::Account>) {
        if let Some(slot) = self.roster.lock().as_ref() {
            slot.send_replace(Some(accounts));
        }
    }

    pub(crate) fn close(&self) {
        self.assignments.lock().clear();
        self.roster.lock().take();
    }

    pub(crate) fn subscriber_count(&self, ticket: ticket::Id) -> usize {
        self.assignments
            .lock()
            .get(&ticket)
            .map_or(0, watch::Sender::receiver_count)
    }

    fn release(&self, ticket: ticket::Id) {
        let mut assignments = self.assignments.lock();
        if let Entry::Occupied(slot) = assignments.entry(ticket) {
            if slot.get().receiver_count() == 0 {
                slot.remove();
                tracing::debug!(%ticket, "assignment key released");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ticket: u64, technician: &str) -> AssignmentRecord {
        AssignmentRecord {
            ticket_id: ticket.into(),
            technician_id: technician.into(),
        }
    }

    #[tokio::test]
    async fn delivers_loaded_value_first() {
        let hub = Hub::new();
        let (mut sub, unknown) = hub.subscribe_assignment(1.into());
        assert!(unknown);

        hub.load_assignment(1.into(), None);
        assert_eq!(sub.next().await, Some(None));

        hub.publish_assignment(1.into(), Some(record(1, "t1")));
        assert_eq!(sub.next().await, Some(Some(record(1, "t1"))));
    }

    #[tokio::test]
    async fn load_does_not_override_notification() {
        let hub = Hub::new();
        let (mut sub, _) = hub.subscribe_assignment(1.into());

        hub.publish_assignment(1.into(), Some(record(1, "t1")));
        hub.load_assignment(1.into(), None);

        assert_eq!(sub.next().await, Some(Some(record(1, "t1"))));
    }

    #[tokio::test]
    async fn late_subscriber_gets_current_value() {
        let hub = Hub::new();
        let (_first, _) = hub.subscribe_assignment(1.into());
        hub.load_assignment(1.into(), Some(record(1, "t1")));

        let (mut second, unknown) = hub.subscribe_assignment(1.into());
        assert!(!unknown);
        assert_eq!(second.next().await, Some(Some(record(1, "t1"))));
    }

    #[test]
    fn forgets_key_after_last_release() {
        let hub = Hub::new();
        let (first, _) = hub.subscribe_assignment(1.into());
        let (second, _) = hub.subscribe_assignment(1.into());
        assert_eq!(hub.subscriber_count(1.into()), 2);

        drop(first);
        assert_eq!(hub.subscriber_count(1.into()), 1);
        drop(second);
        assert_eq!(hub.subscriber_count(1.into()), 0);
        assert!(hub.assignments.lock().is_empty());
    }

    #[test]
    fn payload_error_keeps_its_cause() {
        use std::error::Error as _;

        let cause = serde_json::from_str::<u8>("x").unwrap_err();
        let e = Error::from(cause);

        assert!(e.source().is_some());
        assert!(Error::Closed.source().is_none());
        assert!(e.to_string().starts_with("malformed real-time store payload"));
    }

    #[tokio::test]
    async fn close_ends_subscriptions() {
        let hub = Hub::new();
        let (mut sub, _) = hub.subscribe_assignment(1.into());
        let (mut roster, _) = hub.subscribe_roster().unwrap();

        hub.close();

        assert_eq!(sub.next().await, None);
        assert_eq!(roster.next().await, None);
        assert!(hub.subscribe_roster().is_err());
    }
}
