use std::sync::Arc;

use derive_more::{Display, Error, From};
use serde::Deserialize;

use crate::{
    api::{
        technician,
        ticket::{self, EscalationLevel, Priority},
    },
    backend::TicketStore,
    coordinator::{AssignError, Coordinator},
    realtime::AssignmentStore,
    reconciler::{Reconciler, RefreshError, Watcher},
    view::{Notice, SelectionError, View},
    Timeouts,
};

pub struct Desk {
    view: View,
    reconciler: Arc<Reconciler>,
    coordinator: Coordinator,
    _roster: Watcher,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(content = "data", rename_all = "camelCase", tag = "op")]
pub enum Intent {
    SelectTicket {
        id: ticket::Id,
    },
    Deselect,
    SetDraftPriority {
        priority: Priority,
    },
    SetDraftEscalation {
        #[serde(rename = "escLevel")]
        esc_level: EscalationLevel,
    },
    SetDraftTechnician {
        id: technician::Id,
    },
    ConfirmAssignment,
    Refresh,
}

#[derive(Debug, Display, Error, From)]
pub enum IntentError {
    Selection(SelectionError),
    Assign(AssignError),
    Refresh(RefreshError),
}

impl Desk {
    /// A failed first fetch is only recorded in the view.
    pub async fn start(
        tickets: Arc<dyn TicketStore>,
        assignments: Arc<dyn AssignmentStore>,
        timeouts: Timeouts,
    ) -> Self {
        let view = View::new();
        let reconciler = Arc::new(Reconciler::new(
            tickets.clone(),
            assignments.clone(),
            view.clone(),
            timeouts,
        ));
        let coordinator = Coordinator::new(
            tickets,
            assignments,
            reconciler.clone(),
            view.clone(),
            timeouts,
        );
        let roster = reconciler.watch_roster();

        let desk = Self {
            view,
            reconciler,
            coordinator,
            _roster: roster,
        };
        // Already recorded in the view.
        let _ = desk.refresh().await;
        desk
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub async fn refresh(&self) -> Result<usize, RefreshError> {
        self.reconciler.refresh().await
    }

    pub async fn handle(
        &self,
        intent: Intent,
    ) -> Result<Option<Notice>, IntentError> {
        tracing::debug!(?intent, "handling intent");
        match intent {
            Intent::SelectTicket { id } => {
                self.view.modify(|s| s.select(id))?;
            }
            Intent::Deselect => self.view.modify(|s| s.deselect()),
            Intent::SetDraftPriority { priority } => {
                self.view.modify(|s| s.set_draft_priority(priority))?;
            }
            Intent::SetDraftEscalation { esc_level } => {
                self.view.modify(|s| s.set_draft_escalation(esc_level))?;
            }
            Intent::SetDraftTechnician { id } => {
                self.view.modify(|s| s.set_draft_technician(id))?;
            }
            Intent::ConfirmAssignment => {
                return Ok(self.coordinator.confirm().await?);
            }
            Intent::Refresh => {
                self.refresh().await?;
            }
        }
        Ok(None)
    }
}
