use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    Created,
    Running,
    Stopped,
    Error,
    #[serde(other)]
    Unknown,
}

impl StrategyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyStatus::Created => "created",
            StrategyStatus::Running => "running",
            StrategyStatus::Stopped => "stopped",
            StrategyStatus::Error => "error",
            StrategyStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A configured strategy bound to an account; started and stopped on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecord {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub coin: String,
    #[serde(default)]
    pub interval: String,
    #[serde(default)]
    pub account_alias: String,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub subscription_type: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    pub status: StrategyStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyRecordCreate {
    pub name: String,
    pub coin: String,
    pub interval: String,
    pub account_alias: String,
}

/// Partial update; only populated fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyRecordUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_alias: Option<String>,
}

impl StrategyRecordUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.coin.is_none()
            && self.interval.is_none()
            && self.account_alias.is_none()
    }
}
