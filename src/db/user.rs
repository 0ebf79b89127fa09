use std::error::Error as StdError;

use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Error,
};

use crate::api::technician;

use super::Client;

impl FromSql<'_> for technician::Id {
    accepts!(TEXT, VARCHAR);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        String::from_sql(ty, raw).map(Self::from)
    }
}

impl ToSql for technician::Id {
    accepts!(TEXT, VARCHAR);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.as_str().to_sql(ty, out)
    }
}

impl FromSql<'_> for technician::Role {
    accepts!(TEXT, VARCHAR);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        String::from_sql(ty, raw).map(Self::from)
    }
}

impl Client {
    pub async fn get_accounts(
        &self,
    ) -> Result<Vec<technician::Account>, Error> {
        const SQL: &str = "SELECT id, name, type \
                           FROM users \
                           ORDER BY id";
        Ok(self
            .0
            .query(SQL, &[])
            .await?
            .into_iter()
            .map(|row| technician::Account {
                id: row.get("id"),
                name: row.get("name"),
                role: row.get("type"),
            })
            .collect())
    }
}
