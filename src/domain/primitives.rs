//! Domain primitives: TimeMs, entity ids, actor types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// The calendar year of this timestamp (UTC), used for deal numbering.
    pub fn year(&self) -> i32 {
        use chrono::{Datelike, TimeZone, Utc};
        Utc.timestamp_millis_opt(self.0)
            .single()
            .map(|dt| dt.year())
            .unwrap_or(1970)
    }
}

impl std::ops::Sub for TimeMs {
    type Output = i64;

    fn sub(self, rhs: TimeMs) -> i64 {
        self.0 - rhs.0
    }
}

/// Opaque UUID-backed deal identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DealId(pub String);

impl DealId {
    pub fn new(id: String) -> Self {
        DealId(id)
    }

    pub fn generate() -> Self {
        DealId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque UUID-backed payment identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub String);

impl PaymentId {
    pub fn new(id: String) -> Self {
        PaymentId(id)
    }

    pub fn generate() -> Self {
        PaymentId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a person: client, trader, or employee.
///
/// The auth layer mints these; the core treats them as opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersonId(pub String);

impl PersonId {
    pub fn new(id: String) -> Self {
        PersonId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who performed an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorType {
    Client,
    Trader,
    Employee,
    Admin,
    System,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::Client => "CLIENT",
            ActorType::Trader => "TRADER",
            ActorType::Employee => "EMPLOYEE",
            ActorType::Admin => "ADMIN",
            ActorType::System => "SYSTEM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CLIENT" => Some(ActorType::Client),
            "TRADER" => Some(ActorType::Trader),
            "EMPLOYEE" => Some(ActorType::Employee),
            "ADMIN" => Some(ActorType::Admin),
            "SYSTEM" => Some(ActorType::System),
            _ => None,
        }
    }
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resolved request actor: id plus role, supplied by upstream auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: PersonId,
    pub actor_type: ActorType,
}

impl Actor {
    pub fn new(id: impl Into<String>, actor_type: ActorType) -> Self {
        Actor {
            id: PersonId::new(id.into()),
            actor_type,
        }
    }

    pub fn system() -> Self {
        Actor {
            id: PersonId::new(String::new()),
            actor_type: ActorType::System,
        }
    }
}
