use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::api::{technician, ticket, AssignmentRecord};

use super::{AssignmentStore, Error, Hub, Subscription};

pub struct Store {
    hub: Arc<Hub>,
    data: Mutex<Data>,
}

#[derive(Default)]
struct Data {
    assignments: HashMap<ticket::Id, AssignmentRecord>,
    accounts: Vec<technician::Account>,
}

impl Store {
    pub fn new() -> Self {
        let hub = Hub::new();
        hub.publish_roster(Vec::new());
        Self {
            hub,
            data: Mutex::new(Data::default()),
        }
    }

    pub fn assignment(&self, ticket: ticket::Id) -> Option<AssignmentRecord> {
        self.data.lock().assignments.get(&ticket).cloned()
    }

    pub fn put_assignment(&self, record: AssignmentRecord) {
        let mut data = self.data.lock();
        self.hub.publish_assignment(record.ticket_id, Some(record.clone()));
        data.assignments.insert(record.ticket_id, record);
    }

    pub fn remove_assignment(&self, ticket: ticket::Id) {
        let mut data = self.data.lock();
        if data.assignments.remove(&ticket).is_some() {
            self.hub.publish_assignment(ticket, None);
        }
    }

    pub fn put_account(&self, account: technician::Account) {
        let mut data = self.data.lock();
        match data.accounts.iter_mut().find(|a| a.id == account.id) {
            Some(existing) => *existing = account,
            None => data.accounts.push(account),
        }
        self.hub.publish_roster(data.accounts.clone());
    }

    pub fn remove_account(&self, id: &technician::Id) {
        let mut data = self.data.lock();
        data.accounts.retain(|a| &a.id != id);
        self.hub.publish_roster(data.accounts.clone());
    }

    pub fn subscriber_count(&self, ticket: ticket::Id) -> usize {
        self.hub.subscriber_count(ticket)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssignmentStore for Store {
    async fn subscribe_assignment(
        &self,
        ticket: ticket::Id,
    ) -> Result<Subscription<Option<AssignmentRecord>>, Error> {
        let data = self.data.lock();
        let (sub, unknown) = self.hub.subscribe_assignment(ticket);
        if unknown {
            self.hub
                .load_assignment(ticket, data.assignments.get(&ticket).cloned());
        }
        Ok(sub)
    }

    async fn subscribe_roster(
        &self,
    ) -> Result<Subscription<Vec<technician::Account>>, Error> {
        self.hub.subscribe_roster().map(|(sub, _)| sub)
    }

    async fn write_assignment(
        &self,
        record: &AssignmentRecord,
    ) -> Result<(), Error> {
        self.put_assignment(record.clone());
        Ok(())
    }
}
