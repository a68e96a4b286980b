use serde::{Deserialize, Serialize};

use super::SubscriptionStats;

/// Health snapshot returned by `/system/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    #[serde(default)]
    pub ws_ready: bool,
    #[serde(default)]
    pub active_subscriptions: u64,
    #[serde(default)]
    pub subscription_stats: SubscriptionStats,
}

/// Strategy event written by the backend (fills, signals, errors).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    #[serde(default)]
    pub account_alias: String,
    #[serde(default)]
    pub strategy_name: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub event_content: String,
}
