use std::{collections::HashMap, sync::Arc};

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::watch;

use crate::api::{
    technician,
    ticket::{self, EscalationLevel, Priority},
    Ticket,
};

#[derive(Clone, Debug, Default)]
pub struct ViewState {
    tickets: Vec<Ticket>,
    // Unresolved tickets are absent.
    assigned: HashMap<ticket::Id, bool>,
    technicians: Vec<technician::Account>,
    selection: Option<Selection>,
    failure: Option<Failure>,
    notice: Option<Notice>,
}

#[derive(Clone, Debug)]
pub enum Update {
    Fetched(Vec<Ticket>),
    Existence { ticket: ticket::Id, assigned: bool },
    Roster(Vec<technician::Account>),
    Failed(Failure),
    Notified(Notice),
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub ticket: ticket::Id,
    pub draft: Draft,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub priority: Option<Priority>,
    pub esc_level: Option<EscalationLevel>,
    pub technician: Option<technician::Id>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, error: impl ToString) -> Self {
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize,
)]
pub enum FailureKind {
    BackendUnavailable,
    RealtimeStoreUnavailable,
    PartialAssignmentFailure,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub ticket: ticket::Id,
    pub outcome: Outcome,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Outcome {
    Assigned,
    PartiallyAssigned,
}

#[derive(Clone, Debug, Display, Error, Eq, PartialEq)]
pub enum SelectionError {
    #[display("no ticket is selected")]
    NothingSelected,
    #[display("ticket {_0} is not pending")]
    TicketNotPending(#[error(not(source))] ticket::Id),
    #[display("technician {_0} is not in the roster")]
    UnknownTechnician(#[error(not(source))] technician::Id),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub pending_tickets: Vec<Ticket>,
    pub technicians: Vec<technician::Account>,
    pub selection: Option<Selection>,
    pub failure: Option<Failure>,
    pub notice: Option<Notice>,
}

impl ViewState {
    pub fn pending(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets
            .iter()
            .filter(|t| self.assigned.get(&t.id) == Some(&false))
    }

    pub fn is_pending(&self, id: ticket::Id) -> bool {
        self.assigned.get(&id) == Some(&false)
            && self.tickets.iter().any(|t| t.id == id)
    }

    pub fn ticket(&self, id: ticket::Id) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.id == id)
    }

    pub fn technicians(&self) -> &[technician::Account] {
        &self.technicians
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pending_tickets: self.pending().cloned().collect(),
            technicians: self.technicians.clone(),
            selection: self.selection.clone(),
            failure: self.failure.clone(),
            notice: self.notice.clone(),
        }
    }

    /// Merges an update. Returns whether anything changed.
    pub fn apply(&mut self, update: Update) -> bool {
        let changed = match update {
            Update::Fetched(tickets) => {
                self.assigned
                    .retain(|id, _| tickets.iter().any(|t| t.id == *id));
                self.tickets = tickets;
                self.recover(FailureKind::BackendUnavailable);
                true
            }
            Update::Existence { ticket, assigned } => {
                if self.ticket(ticket).is_none() {
                    // Late delivery for a ticket dropped by a refresh.
                    return false;
                }
                let recovered =
                    self.recover(FailureKind::RealtimeStoreUnavailable);
                self.assigned.insert(ticket, assigned) != Some(assigned)
                    || recovered
            }
            Update::Roster(technicians) => {
                let recovered =
                    self.recover(FailureKind::RealtimeStoreUnavailable);
                let changed = self.technicians != technicians;
                self.technicians = technicians;
                changed || recovered
            }
            Update::Failed(failure) => {
                self.failure = Some(failure);
                true
            }
            Update::Notified(notice) => {
                if notice.outcome == Outcome::Assigned {
                    self.failure = None;
                }
                self.notice = Some(notice);
                true
            }
        };
        let stale = self
            .selection
            .as_ref()
            .map(|s| s.ticket)
            .filter(|&id| !self.is_pending(id));
        if let Some(ticket) = stale {
            tracing::debug!(%ticket, "selected ticket is no longer pending");
            self.selection = None;
            return true;
        }
        changed
    }

    fn recover(&mut self, kind: FailureKind) -> bool {
        if self.failure.as_ref().map(|f| f.kind) != Some(kind) {
            return false;
        }
        self.failure = None;
        true
    }

    /// Toggles the selection. Drafts never carry over.
    pub fn select(&mut self, id: ticket::Id) -> Result<(), SelectionError> {
        if self.selection.as_ref().map(|s| s.ticket) == Some(id) {
            self.selection = None;
            return Ok(());
        }
        if !self.is_pending(id) {
            return Err(SelectionError::TicketNotPending(id));
        }
        self.selection = Some(Selection {
            ticket: id,
            draft: Draft::default(),
        });
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.selection = None;
    }

    pub fn set_draft_priority(
        &mut self,
        priority: Priority,
    ) -> Result<(), SelectionError> {
        self.draft_mut()?.priority = Some(priority);
        Ok(())
    }

    pub fn set_draft_escalation(
        &mut self,
        level: EscalationLevel,
    ) -> Result<(), SelectionError> {
        self.draft_mut()?.esc_level = Some(level);
        Ok(())
    }

    pub fn set_draft_technician(
        &mut self,
        id: technician::Id,
    ) -> Result<(), SelectionError> {
        if !self.technicians.iter().any(|t| t.id == id) {
            return Err(SelectionError::UnknownTechnician(id));
        }
        self.draft_mut()?.technician = Some(id);
        Ok(())
    }

    fn draft_mut(&mut self) -> Result<&mut Draft, SelectionError> {
        self.selection
            .as_mut()
            .map(|s| &mut s.draft)
            .ok_or(SelectionError::NothingSelected)
    }
}

/// Shared [`ViewState`]. Mutations are applied one at a time.
#[derive(Clone)]
pub struct View(Arc<watch::Sender<ViewState>>);

impl View {
    pub fn new() -> Self {
        Self(Arc::new(watch::Sender::new(ViewState::default())))
    }

    pub fn apply(&self, update: Update) {
        self.0.send_if_modified(|state| state.apply(update));
    }

    pub fn modify<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> R {
        let mut out = None;
        self.0.send_modify(|state| out = Some(f(state)));
        match out {
            Some(out) => out,
            None => unreachable!("`send_modify` runs the closure"),
        }
    }

    pub fn state(&self) -> ViewState {
        self.0.borrow().clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.0.borrow().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.0.subscribe()
    }

    pub async fn wait_for(
        &self,
        pred: impl FnMut(&ViewState) -> bool,
    ) -> ViewState {
        let mut rx = self.subscribe();
        let state = match rx.wait_for(pred).await {
            Ok(state) => state.clone(),
            // The sender lives as long as `self`.
            Err(_) => unreachable!("view sender dropped while borrowed"),
        };
        state
    }
}

impl Default for View {
    fn default() -> Self {
        Self::new()
    }
}
