use std::{future::Future, sync::Arc};

use derive_more::{Display, Error};
use itertools::Itertools as _;
use time::OffsetDateTime;
use tokio::time::timeout;

use crate::{
    api::{ticket, AssignmentRecord},
    backend::{self, TicketStore},
    realtime::{self, AssignmentStore},
    reconciler::Reconciler,
    view::{Failure, FailureKind, Notice, Outcome, Update, View},
    Timeouts,
};

pub struct Coordinator {
    tickets: Arc<dyn TicketStore>,
    assignments: Arc<dyn AssignmentStore>,
    reconciler: Arc<Reconciler>,
    view: View,
    timeouts: Timeouts,
}

#[derive(Debug, Display, Error)]
pub enum AssignError {
    #[display("assignment was not saved: {_0}")]
    RealtimeStoreUnavailable(realtime::Error),
    #[display("{_0}")]
    PartialAssignmentFailure(PartialFailure),
}

#[derive(Debug, Display, Error)]
#[display(
    "assignment of ticket {} saved, details may not have applied ({})",
    record.ticket_id,
    failed.iter().map(|(field, _)| field).join(", ")
)]
pub struct PartialFailure {
    pub record: AssignmentRecord,
    pub failed: Vec<(Field, backend::Error)>,
}

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Field {
    #[display("priority")]
    Priority,
    #[display("escalation level")]
    EscalationLevel,
}

impl Coordinator {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        assignments: Arc<dyn AssignmentStore>,
        reconciler: Arc<Reconciler>,
        view: View,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            tickets,
            assignments,
            reconciler,
            view,
            timeouts,
        }
    }

    /// Nothing is rolled back: a failed detail update leaves the ticket
    /// assigned with stale details.
    pub async fn confirm(&self) -> Result<Option<Notice>, AssignError> {
        let Some(selection) = self.view.state().selection().cloned() else {
            tracing::debug!("nothing selected, assignment dropped");
            return Ok(None);
        };
        let Some(technician_id) = selection.draft.technician else {
            tracing::debug!(
                ticket = %selection.ticket,
                "no technician chosen, assignment dropped"
            );
            return Ok(None);
        };
        let id = selection.ticket;
        let record = AssignmentRecord {
            ticket_id: id,
            technician_id,
        };

        let written = timeout(
            self.timeouts.realtime,
            self.assignments.write_assignment(&record),
        )
        .await
        .unwrap_or(Err(realtime::Error::Timeout));
        if let Err(e) = written {
            tracing::error!(ticket = %id, "failed to write assignment: {e}");
            self.view.apply(Update::Failed(Failure::new(
                FailureKind::RealtimeStoreUnavailable,
                &e,
            )));
            return Err(AssignError::RealtimeStoreUnavailable(e));
        }

        let mut failed = Vec::new();
        if let Some(priority) = selection.draft.priority {
            let res = self
                .timed(self.tickets.update_priority(id, priority))
                .await;
            if let Err(e) = res {
                failed.push((Field::Priority, e));
            }
        }
        if let Some(level) = selection.draft.esc_level {
            let res = self
                .timed(self.tickets.update_escalation(id, level))
                .await;
            if let Err(e) = res {
                failed.push((Field::EscalationLevel, e));
            }
        }

        let result = if failed.is_empty() {
            tracing::info!(
                ticket = %id,
                technician = %record.technician_id,
                "ticket assigned"
            );
            Ok(Some(self.acknowledge(
                id,
                Outcome::Assigned,
                format!(
                    "Technician {} successfully assigned to ticket {id}",
                    record.technician_id,
                ),
            )))
        } else {
            let e = PartialFailure { record, failed };
            for (field, cause) in &e.failed {
                tracing::warn!(
                    ticket = %id,
                    "failed to update {field}: {cause}"
                );
            }
            self.acknowledge(id, Outcome::PartiallyAssigned, e.to_string());
            self.view.apply(Update::Failed(Failure::new(
                FailureKind::PartialAssignmentFailure,
                &e,
            )));
            Err(AssignError::PartialAssignmentFailure(e))
        };

        self.view.modify(|state| state.deselect());

        // The view already holds the failure if this one fails.
        let _ = self.reconciler.refresh().await;

        result
    }

    fn acknowledge(
        &self,
        ticket: ticket::Id,
        outcome: Outcome,
        message: String,
    ) -> Notice {
        let notice = Notice {
            ticket,
            outcome,
            message,
            at: OffsetDateTime::now_utc(),
        };
        self.view.apply(Update::Notified(notice.clone()));
        notice
    }

    async fn timed<F>(&self, fut: F) -> Result<(), backend::Error>
    where
        F: Future<Output = Result<(), backend::Error>>,
    {
        timeout(self.timeouts.backend, fut)
            .await
            .unwrap_or(Err(backend::Error::Timeout))
    }
}
