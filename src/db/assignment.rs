use std::error::Error as StdError;

use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Error,
};

use crate::api::{ticket, AssignmentRecord};

use super::Client;

impl FromSql<'_> for ticket::Id {
    accepts!(INT8);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        let repr = i64::from_sql(ty, raw)?;
        Ok(Self::from(u64::try_from(repr)?))
    }
}

impl ToSql for ticket::Id {
    accepts!(INT8);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        let repr = i64::try_from(self.get())?;
        repr.to_sql(ty, out)
    }
}

impl Client {
    pub async fn get_assignment(
        &self,
        ticket: ticket::Id,
    ) -> Result<Option<AssignmentRecord>, Error> {
        const SQL: &str = "SELECT ticket_id, technician_id \
                           FROM assignments \
                           WHERE ticket_id = $1 \
                           LIMIT 1";
        Ok(self.0.query_opt(SQL, &[&ticket]).await?.map(|row| {
            AssignmentRecord {
                ticket_id: row.get("ticket_id"),
                technician_id: row.get("technician_id"),
            }
        }))
    }

    pub async fn write_assignment(
        &self,
        record: &AssignmentRecord,
    ) -> Result<(), Error> {
        const SQL: &str = "\
            INSERT INTO assignments (ticket_id, technician_id) \
            VALUES ($1, $2) \
            ON CONFLICT (ticket_id) DO UPDATE \
            SET technician_id = EXCLUDED.technician_id";

        self.0
            .execute(SQL, &[&record.ticket_id, &record.technician_id])
            .await
            .map(drop)
    }
}
