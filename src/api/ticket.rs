use std::{fmt, str::FromStr};

use derive_more::{Display, Error};
use enum_utils::TryFromRepr;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Id,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub issue: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "unset_as_none")]
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "unset_as_none")]
    pub esc_level: Option<EscalationLevel>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Comment {
    #[serde(rename = "comment", alias = "text")]
    pub text: String,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct Id(u64);

impl Id {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for Id {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
pub enum Priority {
    Low,
    Moderate,
    High,
}

impl FromStr for Priority {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Self::Low),
            "Moderate" => Ok(Self::Moderate),
            "High" => Ok(Self::High),
            _ => Err(InvalidValue::new("priority", s)),
        }
    }
}

/// Travels as a string, numbers are accepted when decoding.
#[derive(
    Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd,
    TryFromRepr,
)]
#[repr(u8)]
pub enum EscalationLevel {
    #[display("1")]
    One = 1,
    #[display("2")]
    Two = 2,
    #[display("3")]
    Three = 3,
}

impl FromStr for EscalationLevel {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(|repr| Self::try_from(repr).ok())
            .ok_or_else(|| InvalidValue::new("escalation level", s))
    }
}

impl Serialize for EscalationLevel {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EscalationLevel {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        Raw::deserialize(de)?.to_string().parse().map_err(de::Error::custom)
    }
}

#[derive(Clone, Debug, Display, Error, PartialEq)]
#[display("invalid {what}: `{value}`")]
pub struct InvalidValue {
    what: &'static str,
    value: String,
}

impl InvalidValue {
    fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_owned(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Raw {
    Number(u64),
    Text(String),
}

impl fmt::Display for Raw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// `null`, `""` and unknown values all decode as unset.
fn unset_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = match Option::<Raw>::deserialize(de)? {
        None => return Ok(None),
        Some(Raw::Text(s)) if s.trim().is_empty() => return Ok(None),
        Some(raw) => raw.to_string(),
    };
    match raw.parse() {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!("ignoring ticket field: {e}");
            Ok(None)
        }
    }
}
