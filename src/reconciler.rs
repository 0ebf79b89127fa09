use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use derive_more::{Display, Error, From};
use itertools::Itertools as _;
use parking_lot::Mutex;
use tokio::{
    task::{self, JoinHandle},
    time,
};

use crate::{
    api::{technician, ticket, Ticket},
    backend::{self, TicketStore},
    realtime::{self, AssignmentStore},
    view::{Failure, FailureKind, Update, View},
    Timeouts,
};

pub struct Reconciler {
    tickets: Arc<dyn TicketStore>,
    assignments: Arc<dyn AssignmentStore>,
    view: View,
    timeouts: Timeouts,
    watchers: Mutex<HashMap<ticket::Id, Watcher>>,
}

#[derive(Debug, Display, Error, From)]
pub enum RefreshError {
    #[display("ticket backend is unavailable: {_0}")]
    BackendUnavailable(backend::Error),
}

/// Aborted on drop, which releases its subscription.
pub(crate) struct Watcher(JoinHandle<()>);

impl Watcher {
    fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Reconciler {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        assignments: Arc<dyn AssignmentStore>,
        view: View,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            tickets,
            assignments,
            view,
            timeouts,
            watchers: Mutex::new(HashMap::new()),
        }
    }

    /// Pending status arrives afterwards, as subscriptions resolve.
    pub async fn refresh(&self) -> Result<usize, RefreshError> {
        let fetch = self.tickets.list_tickets();
        let res = time::timeout(self.timeouts.backend, fetch)
            .await
            .unwrap_or(Err(backend::Error::Timeout));
        let tickets = match res {
            Ok(tickets) => tickets,
            Err(e) => {
                tracing::error!("failed to fetch tickets: {e}");
                self.view.apply(Update::Failed(Failure::new(
                    FailureKind::BackendUnavailable,
                    &e,
                )));
                return Err(e.into());
            }
        };
        let tickets = tickets
            .into_iter()
            .unique_by(|t| t.id)
            .collect::<Vec<Ticket>>();
        let ids = tickets.iter().map(|t| t.id).collect::<HashSet<_>>();
        tracing::info!(count = tickets.len(), "fetched tickets");

        self.view.apply(Update::Fetched(tickets));

        let mut watchers = self.watchers.lock();
        watchers.retain(|id, watcher| {
            let keep = ids.contains(id) && !watcher.is_finished();
            if !keep {
                tracing::debug!(ticket = %id, "releasing existence watcher");
            }
            keep
        });
        for &id in &ids {
            watchers.entry(id).or_insert_with(|| self.watch_existence(id));
        }
        Ok(ids.len())
    }

    fn watch_existence(&self, ticket: ticket::Id) -> Watcher {
        let assignments = self.assignments.clone();
        let view = self.view.clone();
        let timeout = self.timeouts.realtime;
        Watcher(task::spawn(async move {
            let subscribe = assignments.subscribe_assignment(ticket);
            let res = time::timeout(timeout, subscribe)
                .await
                .unwrap_or(Err(realtime::Error::Timeout));
            let mut sub = match res {
                Ok(sub) => sub,
                Err(e) => {
                    return store_unavailable(&view, &e);
                }
            };
            while let Some(record) = sub.next().await {
                tracing::debug!(
                    %ticket,
                    assigned = record.is_some(),
                    "assignment existence delivered"
                );
                view.apply(Update::Existence {
                    ticket,
                    assigned: record.is_some(),
                });
            }
            store_unavailable(&view, &realtime::Error::Closed);
        }))
    }

    pub(crate) fn watch_roster(&self) -> Watcher {
        let assignments = self.assignments.clone();
        let view = self.view.clone();
        let timeout = self.timeouts.realtime;
        Watcher(task::spawn(async move {
            let subscribe = assignments.subscribe_roster();
            let res = time::timeout(timeout, subscribe)
                .await
                .unwrap_or(Err(realtime::Error::Timeout));
            let mut sub = match res {
                Ok(sub) => sub,
                Err(e) => {
                    return store_unavailable(&view, &e);
                }
            };
            while let Some(accounts) = sub.next().await {
                view.apply(Update::Roster(technicians(accounts)));
            }
            store_unavailable(&view, &realtime::Error::Closed);
        }))
    }

    pub fn watched(&self) -> usize {
        self.watchers.lock().len()
    }
}

pub fn technicians(
    accounts: Vec<technician::Account>,
) -> Vec<technician::Account> {
    accounts.into_iter().filter(|a| a.is_technician()).collect()
}

fn store_unavailable(view: &View, e: &realtime::Error) {
    tracing::error!("real-time store subscription failed: {e}");
    view.apply(Update::Failed(Failure::new(
        FailureKind::RealtimeStoreUnavailable,
        e,
    )));
}
