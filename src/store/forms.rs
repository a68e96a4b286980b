use serde_json::{Map, Value};

use crate::api::{ApiError, ApiResult};
use crate::types::{
    AccountRequest, ConfigRequest, StrategyRecordCreate, StrategyRecordUpdate, SubscriptionRequest,
};

/// Form fields plus the inline error rendered next to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState<T> {
    pub fields: T,
    pub error: Option<String>,
}

impl<T: Default> FormState<T> {
    pub fn reset(&mut self) {
        self.fields = T::default();
        self.error = None;
    }
}

fn required(value: &str, label: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{} is required", label)));
    }
    Ok(trimmed.to_string())
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountForm {
    pub alias: String,
    pub api_wallet_address: String,
    pub secret_key: String,
    pub is_active: bool,
}

impl Default for AccountForm {
    fn default() -> Self {
        Self {
            alias: String::new(),
            api_wallet_address: String::new(),
            secret_key: String::new(),
            is_active: true,
        }
    }
}

impl AccountForm {
    pub fn to_request(&self) -> ApiResult<AccountRequest> {
        Ok(AccountRequest {
            alias: required(&self.alias, "Alias")?,
            api_wallet_address: required(&self.api_wallet_address, "API wallet address")?,
            secret_key: required(&self.secret_key, "Secret key")?,
            is_active: Some(self.is_active),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigForm {
    pub key: String,
    pub value: String,
    pub description: String,
    pub config_type: String,
}

impl ConfigForm {
    pub fn to_request(&self) -> ApiResult<ConfigRequest> {
        Ok(ConfigRequest {
            key: required(&self.key, "Key")?,
            // Empty values are legitimate config contents.
            value: self.value.clone(),
            description: optional(&self.description),
            config_type: optional(&self.config_type),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyForm {
    pub name: String,
    pub coin: String,
    pub interval: String,
    pub account_alias: String,
}

impl StrategyForm {
    pub fn to_create(&self) -> ApiResult<StrategyRecordCreate> {
        Ok(StrategyRecordCreate {
            name: required(&self.name, "Name")?,
            coin: required(&self.coin, "Coin")?,
            interval: required(&self.interval, "Interval")?,
            account_alias: required(&self.account_alias, "Account alias")?,
        })
    }

    /// Blank fields are left unchanged on the backend.
    pub fn to_update(&self) -> ApiResult<StrategyRecordUpdate> {
        let update = StrategyRecordUpdate {
            name: optional(&self.name),
            coin: optional(&self.coin),
            interval: optional(&self.interval),
            account_alias: optional(&self.account_alias),
        };
        if update.is_empty() {
            return Err(ApiError::Validation("Nothing to update".to_string()));
        }
        Ok(update)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionForm {
    pub kind: String,
    /// Raw JSON object text as typed by the user.
    pub params: String,
}

impl SubscriptionForm {
    pub fn to_request(&self) -> ApiResult<SubscriptionRequest> {
        let kind = required(&self.kind, "Type")?;
        let mut params = match optional(&self.params) {
            None => Map::new(),
            Some(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(ApiError::Validation("Params must be a JSON object".to_string()))
                }
                Err(e) => {
                    return Err(ApiError::Validation(format!("Params are not valid JSON: {}", e)))
                }
            },
        };
        params
            .entry("type".to_string())
            .or_insert_with(|| Value::String(kind.clone()));
        Ok(SubscriptionRequest { kind, params })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Forms {
    pub account: FormState<AccountForm>,
    pub config: FormState<ConfigForm>,
    pub strategy: FormState<StrategyForm>,
    pub strategy_edit: FormState<StrategyForm>,
    pub subscription: FormState<SubscriptionForm>,
}
