use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Account {
    pub id: Id,
    pub name: String,
    #[serde(rename = "type")]
    pub role: Role,
}

impl Account {
    pub fn is_technician(&self) -> bool {
        self.role == Role::Technician
    }
}

#[derive(
    Clone, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize,
)]
pub struct Id(String);

impl Id {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Technician,
    Other(String),
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        if value == "tech" {
            Self::Technician
        } else {
            Self::Other(value)
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Technician => "tech".into(),
            Role::Other(other) => other,
        }
    }
}
