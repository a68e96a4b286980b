use tracing::debug;

use super::{encode, ItemAction, LoadKey, ResourceStore, StrategyForm};
use crate::api::ApiRequest;
use crate::types::StrategyRecord;

impl ResourceStore {
    pub async fn load_records(&self) -> bool {
        self.refresh(
            LoadKey::Records,
            ApiRequest::get("/strategy-records/"),
            |data, records: Vec<StrategyRecord>| data.records = records,
        )
        .await
    }

    /// Fetches one record. Failures go to the notification queue.
    pub async fn fetch_strategy_record(&self, id: i64) -> Option<StrategyRecord> {
        let result = self
            .fetch::<StrategyRecord>(ApiRequest::get("/strategy-records").segment(id))
            .await;
        self.dispatcher.settle(result)
    }

    pub async fn create_strategy_record(&self) -> bool {
        let fields = self.forms.read().strategy.fields.clone();
        let request = fields.to_create().and_then(|payload| {
            Ok(ApiRequest::post("/strategy-records/").json(encode(&payload)?))
        });

        let created = self
            .submit_form(
                LoadKey::CreateStrategy,
                |forms| &mut forms.strategy,
                request,
                format!("Strategy '{}' created", fields.name.trim()),
            )
            .await;
        if created {
            self.load_records().await;
        }
        created
    }

    /// Loads a record into the edit form.
    pub fn edit_strategy_record(&self, id: i64) -> bool {
        let record = self.data.read().records.iter().find(|r| r.id == id).cloned();
        let Some(record) = record else {
            debug!("Strategy record {} is not loaded", id);
            self.notifications
                .warning(format!("Strategy record {} not found", id));
            return false;
        };

        let mut forms = self.forms.write();
        forms.strategy_edit.fields = StrategyForm {
            name: record.name,
            coin: record.coin,
            interval: record.interval,
            account_alias: record.account_alias,
        };
        forms.strategy_edit.error = None;
        true
    }

    /// Sends the non-blank fields of the edit form.
    pub async fn update_strategy_record(&self, id: i64) -> bool {
        let fields = self.forms.read().strategy_edit.fields.clone();
        let request = fields.to_update().and_then(|payload| {
            Ok(ApiRequest::put("/strategy-records")
                .segment(id)
                .json(encode(&payload)?))
        });

        let updated = self
            .submit_form(
                LoadKey::UpdateStrategy,
                |forms| &mut forms.strategy_edit,
                request,
                format!("Strategy record {} updated", id),
            )
            .await;
        if updated {
            self.load_records().await;
        }
        updated
    }

    pub async fn start_strategy_record(&self, id: i64) -> bool {
        let started = self
            .mutate_item(
                ItemAction::StartingStrategy,
                &id.to_string(),
                ApiRequest::post("/strategy-records").segment(id).segment("start"),
                format!("Strategy record {} started", id),
            )
            .await;
        if started {
            self.load_records().await;
        }
        started
    }

    pub async fn stop_strategy_record(&self, id: i64) -> bool {
        if !self.confirmed(&format!("Stop strategy record {}?", id)) {
            return false;
        }
        let stopped = self
            .mutate_item(
                ItemAction::StoppingStrategy,
                &id.to_string(),
                ApiRequest::post("/strategy-records").segment(id).segment("stop"),
                format!("Strategy record {} stopped", id),
            )
            .await;
        if stopped {
            self.load_records().await;
        }
        stopped
    }

    pub async fn delete_strategy_record(&self, id: i64) -> bool {
        if !self.confirmed(&format!("Delete strategy record {}?", id)) {
            return false;
        }
        let deleted = self
            .mutate_item(
                ItemAction::DeletingStrategy,
                &id.to_string(),
                ApiRequest::delete("/strategy-records").segment(id),
                format!("Strategy record {} deleted", id),
            )
            .await;
        if deleted {
            self.load_records().await;
        }
        deleted
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::*;
    use crate::api::{RequestBody, TransportError};
    use crate::notifications::NotificationKind;
    use serde_json::json;
    use tokio::sync::Notify;

    fn record(id: i64, name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "coin": "ETH",
            "interval": "1m",
            "account_alias": "main",
            "is_running": false,
            "status": "created"
        })
    }

    #[tokio::test]
    async fn test_start_flag_tracks_request_on_success() {
        let transport = ScriptedTransport::new();
        let gate = Arc::new(Notify::new());
        transport.reply_gated(json!({"code": 0, "message": "started"}), gate.clone());
        transport.reply(json!({"code": 0, "data": [record(7, "grid")]}));
        let store = store_with(transport.clone());

        let task = tokio::spawn({
            let store = store.clone();
            async move { store.start_strategy_record(7).await }
        });
        wait_until(|| transport.calls().len() == 1).await;
        assert!(store.loading().is_item_loading(ItemAction::StartingStrategy, 7));

        gate.notify_one();
        assert!(task.await.unwrap());
        assert!(!store.loading().is_item_loading(ItemAction::StartingStrategy, 7));
        assert_eq!(
            transport.calls(),
            vec!["POST /strategy-records/7/start", "GET /strategy-records/"]
        );
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_start_flag_clears_on_error() {
        let transport = ScriptedTransport::new();
        let gate = Arc::new(Notify::new());
        transport.reply_gated(
            json!({"code": -1, "message": "Account main is disabled"}),
            gate.clone(),
        );
        let store = store_with(transport.clone());

        let task = tokio::spawn({
            let store = store.clone();
            async move { store.start_strategy_record(7).await }
        });
        wait_until(|| transport.calls().len() == 1).await;
        assert!(store.loading().is_item_loading(ItemAction::StartingStrategy, 7));

        gate.notify_one();
        assert!(!task.await.unwrap());
        assert!(store.loading().snapshot().is_idle());
        assert_eq!(
            messages(&store),
            vec![(NotificationKind::Error, "Account main is disabled".to_string())]
        );
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_busy_record_rejects_second_start() {
        let transport = ScriptedTransport::new();
        let gate = Arc::new(Notify::new());
        transport.reply_gated(json!({"code": 0}), gate.clone());
        transport.reply(json!({"code": 0}));
        transport.reply(json!({"code": 0, "data": [record(8, "b")]}));
        let store = store_with(transport.clone());

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.start_strategy_record(7).await }
        });
        wait_until(|| transport.calls().len() == 1).await;

        assert!(!store.start_strategy_record(7).await);
        assert_eq!(
            messages(&store),
            vec![(NotificationKind::Warning, "Already starting strategy 7".to_string())]
        );

        assert!(store.start_strategy_record(8).await);
        assert_eq!(
            transport.calls(),
            vec![
                "POST /strategy-records/7/start",
                "POST /strategy-records/8/start",
                "GET /strategy-records/",
            ]
        );
        assert!(store.loading().is_item_loading(ItemAction::StartingStrategy, 7));

        gate.notify_one();
        // No scripted reply is left for the refresh after 7 starts.
        assert!(first.await.unwrap());
        assert!(store.loading().snapshot().is_idle());
    }

    #[tokio::test]
    async fn test_create_backend_error_stays_on_form() {
        let transport = ScriptedTransport::new();
        transport.reply(json!({"code": -1, "message": "Account 'ghost' not found"}));
        let store = store_with(transport.clone());

        store.edit_forms(|forms| {
            forms.strategy.fields = StrategyForm {
                name: "grid".to_string(),
                coin: "ETH".to_string(),
                interval: "1m".to_string(),
                account_alias: "ghost".to_string(),
            };
        });
        assert!(!store.create_strategy_record().await);

        let forms = store.forms();
        assert_eq!(forms.strategy.error.as_deref(), Some("Account 'ghost' not found"));
        assert_eq!(forms.strategy.fields.name, "grid");
        assert!(store.notifications().is_empty());
        assert!(!store.loading().is_loading(LoadKey::CreateStrategy));
    }

    #[tokio::test]
    async fn test_edit_then_update_sends_changed_fields() {
        let transport = ScriptedTransport::new();
        transport.reply(json!({"code": 0, "data": [record(3, "grid")]}));
        transport.reply(json!({"code": 0, "data": record(3, "grid-v2")}));
        transport.reply(json!({"code": 0, "data": [record(3, "grid-v2")]}));
        let store = store_with(transport.clone());

        assert!(store.load_records().await);
        assert!(store.edit_strategy_record(3));
        assert_eq!(store.forms().strategy_edit.fields.name, "grid");

        store.edit_forms(|forms| {
            forms.strategy_edit.fields.name = "grid-v2".to_string();
            forms.strategy_edit.fields.coin.clear();
        });
        assert!(store.update_strategy_record(3).await);

        let put = &transport.requests()[1];
        assert_eq!(put.path(), "/strategy-records/3");
        assert_eq!(
            put.body,
            RequestBody::Json(json!({
                "name": "grid-v2",
                "interval": "1m",
                "account_alias": "main"
            }))
        );
        assert_eq!(store.records()[0].name, "grid-v2");
        assert_eq!(store.forms().strategy_edit, FormState::default());
    }

    #[test]
    fn test_edit_unknown_record_warns() {
        let store = store_with(ScriptedTransport::new());
        assert!(!store.edit_strategy_record(42));
        assert_eq!(
            messages(&store),
            vec![(NotificationKind::Warning, "Strategy record 42 not found".to_string())]
        );
    }

    #[tokio::test]
    async fn test_fetch_record_reports_through_fallback() {
        let transport = ScriptedTransport::new();
        transport.reply(json!({"code": 0, "data": record(5, "dca")}));
        transport.fail(TransportError::Network("connection refused".to_string()));
        let store = store_with(transport.clone());

        let found = store.fetch_strategy_record(5).await.unwrap();
        assert_eq!(found.name, "dca");

        assert!(store.fetch_strategy_record(6).await.is_none());
        let (kind, message) = messages(&store).pop().unwrap();
        assert_eq!(kind, NotificationKind::Error);
        assert!(message.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_stop_declined_sends_nothing() {
        let mut transport = crate::api::MockTransport::new();
        transport.expect_send().never();
        let (store, _confirm) = declining_store(Arc::new(transport));

        assert!(!store.stop_strategy_record(1).await);
        assert_eq!(store.loading().snapshot().raised(), 0);
    }
}
