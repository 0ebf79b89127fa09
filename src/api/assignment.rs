use serde::{Deserialize, Serialize};

use super::{technician, ticket};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub ticket_id: ticket::Id,
    pub technician_id: technician::Id,
}
