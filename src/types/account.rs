use serde::{Deserialize, Serialize};

/// Exchange account as listed by the backend. The secret key is write-only
/// and never comes back over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub alias: String,
    #[serde(default)]
    pub account_address: String,
    #[serde(default)]
    pub api_wallet_address: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRequest {
    pub alias: String,
    pub api_wallet_address: String,
    pub secret_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub id: i64,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_config_type")]
    pub config_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRequest {
    pub key: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_type: Option<String>,
}

fn default_true() -> bool {
    true
}

pub(crate) fn default_config_type() -> String {
    "string".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_request_never_sends_null_flag() {
        let request = AccountRequest {
            alias: "a1".to_string(),
            api_wallet_address: "0xabc".to_string(),
            secret_key: "0xsecret".to_string(),
            is_active: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("is_active").is_none());
    }

    #[test]
    fn test_config_entry_defaults() {
        let entry: ConfigEntry = serde_json::from_value(json!({
            "id": 1,
            "key": "max_leverage",
            "value": "5"
        }))
        .unwrap();
        assert_eq!(entry.config_type, "string");
        assert_eq!(entry.description, None);
    }
}
