//! Client-side copy of the backend's resources.
//!
//! Every operation follows the same shape: raise a loading flag, call the
//! backend, decode the envelope, then either replace the affected collection
//! by re-fetching it or surface the error (inline on the form that caused it,
//! or as a notification). Flags are held by guards, so they drop back to idle
//! on every exit path.

pub mod accounts;
pub mod configs;
pub mod forms;
pub mod loading;
pub mod strategies;
pub mod subscriptions;
pub mod system;

pub use forms::*;
pub use loading::*;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::{decode, decode_as, ApiError, ApiRequest, ApiResult, Dispatcher, Transport};
use crate::notifications::NotificationQueue;
use crate::types::{
    Account, ConfigEntry, LogEntry, StrategyRecord, Subscription, SubscriptionStats,
    SubscriptionTemplate, SystemStatus,
};

/// Asks the operator before a destructive request is issued.
#[cfg_attr(test, mockall::automock)]
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Confirms everything; used for non-interactive runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysConfirm;

impl Confirm for AlwaysConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collections {
    pub subscriptions: Vec<Subscription>,
    pub active_subscriptions: Vec<Subscription>,
    pub templates: BTreeMap<String, SubscriptionTemplate>,
    pub stats: Option<SubscriptionStats>,
    pub records: Vec<StrategyRecord>,
    pub accounts: Vec<Account>,
    pub configs: Vec<ConfigEntry>,
    pub logs: Vec<LogEntry>,
    pub status: Option<SystemStatus>,
}

/// Tags refreshes so an older response never overwrites a newer one.
#[derive(Debug, Default)]
struct RefreshSequencer {
    /// (last issued, last applied) per key.
    tickets: Mutex<HashMap<LoadKey, (u64, u64)>>,
}

impl RefreshSequencer {
    fn issue(&self, key: LoadKey) -> u64 {
        let mut tickets = self.tickets.lock();
        let entry = tickets.entry(key).or_default();
        entry.0 += 1;
        entry.0
    }

    fn accept(&self, key: LoadKey, ticket: u64) -> bool {
        let mut tickets = self.tickets.lock();
        let entry = tickets.entry(key).or_default();
        if ticket > entry.1 {
            entry.1 = ticket;
            true
        } else {
            false
        }
    }
}

#[derive(Clone)]
pub struct ResourceStore {
    transport: Arc<dyn Transport>,
    notifications: NotificationQueue,
    dispatcher: Dispatcher,
    confirm: Arc<dyn Confirm>,
    loading: LoadingState,
    data: Arc<RwLock<Collections>>,
    forms: Arc<RwLock<Forms>>,
    sequencer: Arc<RefreshSequencer>,
}

impl ResourceStore {
    pub fn new(
        transport: Arc<dyn Transport>,
        notifications: NotificationQueue,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::new(notifications.clone()));
        Self {
            transport,
            notifications,
            dispatcher,
            confirm,
            loading: LoadingState::new(),
            data: Arc::new(RwLock::new(Collections::default())),
            forms: Arc::new(RwLock::new(Forms::default())),
            sequencer: Arc::new(RefreshSequencer::default()),
        }
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    pub fn loading(&self) -> &LoadingState {
        &self.loading
    }

    pub fn collections(&self) -> Collections {
        self.data.read().clone()
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.data.read().subscriptions.clone()
    }

    pub fn active_subscriptions(&self) -> Vec<Subscription> {
        self.data.read().active_subscriptions.clone()
    }

    pub fn templates(&self) -> BTreeMap<String, SubscriptionTemplate> {
        self.data.read().templates.clone()
    }

    pub fn records(&self) -> Vec<StrategyRecord> {
        self.data.read().records.clone()
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.data.read().accounts.clone()
    }

    pub fn configs(&self) -> Vec<ConfigEntry> {
        self.data.read().configs.clone()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.data.read().logs.clone()
    }

    pub fn status(&self) -> Option<SystemStatus> {
        self.data.read().status.clone()
    }

    pub fn forms(&self) -> Forms {
        self.forms.read().clone()
    }

    pub fn edit_forms(&self, edit: impl FnOnce(&mut Forms)) {
        edit(&mut *self.forms.write());
    }

    async fn call(&self, request: ApiRequest) -> ApiResult<Value> {
        decode(self.transport.send(request).await)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        decode_as(self.transport.send(request).await)
    }

    fn confirmed(&self, prompt: &str) -> bool {
        let accepted = self.confirm.confirm(prompt);
        if !accepted {
            debug!("Declined: {}", prompt);
        }
        accepted
    }

    /// Surfaces an error as a notification; the queue logs it.
    fn report(&self, err: &ApiError) {
        self.notifications.error(err.reason());
    }

    /// Local rejection of a row operation; nothing is sent.
    fn reject(&self, err: ApiError) -> bool {
        debug!("Rejected locally: {}", err);
        self.report(&err);
        false
    }

    /// Re-fetches one collection and replaces it wholesale.
    async fn refresh<T, F>(&self, key: LoadKey, request: ApiRequest, apply: F) -> bool
    where
        T: DeserializeOwned,
        F: FnOnce(&mut Collections, T) + Send,
    {
        let _guard = self.loading.begin(key);
        let ticket = self.sequencer.issue(key);
        let result = self.fetch::<T>(request).await;

        self.dispatcher.dispatch(
            result,
            |value| {
                if self.sequencer.accept(key, ticket) {
                    apply(&mut *self.data.write(), value);
                } else {
                    debug!("Discarding stale {} response (ticket {})", key, ticket);
                }
                true
            },
            |err| {
                self.report(&err);
                false
            },
        )
    }

    /// Submits a form. Validation and backend errors land on the form itself;
    /// success resets it to blanks.
    async fn submit_form<T: Default>(
        &self,
        key: LoadKey,
        form: fn(&mut Forms) -> &mut FormState<T>,
        request: ApiResult<ApiRequest>,
        success: String,
    ) -> bool {
        let request = match request {
            Ok(request) => request,
            Err(err) => {
                debug!("{} rejected locally: {}", key, err);
                form(&mut *self.forms.write()).error = Some(err.reason().to_string());
                return false;
            }
        };
        form(&mut *self.forms.write()).error = None;

        let _guard = self.loading.begin(key);
        let result = self.call(request).await;

        self.dispatcher.dispatch(
            result,
            |_| {
                form(&mut *self.forms.write()).reset();
                self.notifications.success(success);
                true
            },
            |err| {
                warn!("{} failed: {}", key, err);
                form(&mut *self.forms.write()).error = Some(err.reason().to_string());
                false
            },
        )
    }

    /// Runs a global (non form) mutation under `key`.
    async fn mutate(&self, key: LoadKey, request: ApiRequest, success: String) -> bool {
        let _guard = self.loading.begin(key);
        let result = self.call(request).await;
        self.settle_mutation(result, success)
    }

    /// Runs a per-row mutation. A second call for a row that is already busy
    /// is rejected without touching the network.
    async fn mutate_item(
        &self,
        action: ItemAction,
        id: &str,
        request: ApiRequest,
        success: String,
    ) -> bool {
        let Some(_guard) = self.loading.try_begin_item(action, id) else {
            self.notifications
                .warning(format!("Already {} {}", action.label(), id));
            return false;
        };
        let result = self.call(request).await;
        self.settle_mutation(result, success)
    }

    fn settle_mutation(&self, result: ApiResult<Value>, success: String) -> bool {
        self.dispatcher.dispatch(
            result,
            |_| {
                self.notifications.success(success);
                true
            },
            |err| {
                self.report(&err);
                false
            },
        )
    }
}

/// Checks a value that becomes a single path segment. A blank or dot segment
/// would address the parent collection instead of the item.
fn path_key(value: &str, label: &str) -> ApiResult<String> {
    match value.trim() {
        "" | "." | ".." => Err(ApiError::Validation(format!("{} is required", label))),
        _ => Ok(value.to_string()),
    }
}

fn encode<T: Serialize>(payload: &T) -> ApiResult<Value> {
    serde_json::to_value(payload)
        .map_err(|e| ApiError::Validation(format!("Invalid request payload: {}", e)))
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    use super::*;
    use crate::api::TransportError;
    use crate::notifications::NotificationKind;

    struct Step {
        response: Result<Value, TransportError>,
        gate: Option<Arc<Notify>>,
    }

    /// Replies in call order; a gated step parks until its `Notify` fires.
    #[derive(Default)]
    pub struct ScriptedTransport {
        steps: Mutex<VecDeque<Step>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn reply(&self, body: Value) {
            self.steps.lock().push_back(Step {
                response: Ok(body),
                gate: None,
            });
        }

        pub fn reply_gated(&self, body: Value, gate: Arc<Notify>) {
            self.steps.lock().push_back(Step {
                response: Ok(body),
                gate: Some(gate),
            });
        }

        pub fn fail(&self, err: TransportError) {
            self.steps.lock().push_back(Step {
                response: Err(err),
                gate: None,
            });
        }

        pub fn calls(&self) -> Vec<String> {
            self.requests
                .lock()
                .iter()
                .map(|r| format!("{} {}", r.effective_method(), r.path()))
                .collect()
        }

        pub fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: ApiRequest) -> Result<Value, TransportError> {
            self.requests.lock().push(request);
            let step = self.steps.lock().pop_front();
            let Some(step) = step else {
                return Err(TransportError::Network("no scripted response".to_string()));
            };
            if let Some(gate) = step.gate {
                gate.notified().await;
            }
            step.response
        }
    }

    pub fn quiet_queue() -> NotificationQueue {
        NotificationQueue::with_limits(100, Duration::ZERO)
    }

    pub fn store_with(transport: Arc<dyn Transport>) -> ResourceStore {
        ResourceStore::new(transport, quiet_queue(), Arc::new(AlwaysConfirm))
    }

    pub fn declining_store(transport: Arc<dyn Transport>) -> (ResourceStore, Arc<MockConfirm>) {
        let mut confirm = MockConfirm::new();
        confirm.expect_confirm().times(1).returning(|_| false);
        let confirm = Arc::new(confirm);
        (
            ResourceStore::new(transport, quiet_queue(), confirm.clone()),
            confirm,
        )
    }

    /// Yields to spawned tasks until `cond` holds.
    pub async fn wait_until(cond: impl Fn() -> bool) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition never became true");
    }

    pub fn messages(store: &ResourceStore) -> Vec<(NotificationKind, String)> {
        store
            .notifications()
            .list()
            .into_iter()
            .map(|n| (n.kind, n.message))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::api::TransportError;
    use serde_json::json;

    #[test]
    fn test_path_key_refuses_collection_addresses() {
        for bad in ["", "  ", ".", ".."] {
            assert_eq!(
                path_key(bad, "Config key"),
                Err(ApiError::Validation("Config key is required".to_string()))
            );
        }
        assert_eq!(path_key("a.b", "Config key"), Ok("a.b".to_string()));
        assert_eq!(path_key("...", "Config key"), Ok("...".to_string()));
    }

    #[test]
    fn test_sequencer_rejects_older_tickets() {
        let sequencer = RefreshSequencer::default();
        let first = sequencer.issue(LoadKey::Accounts);
        let second = sequencer.issue(LoadKey::Accounts);
        let other = sequencer.issue(LoadKey::Configs);

        assert!(sequencer.accept(LoadKey::Accounts, second));
        assert!(!sequencer.accept(LoadKey::Accounts, first));
        assert!(sequencer.accept(LoadKey::Configs, other));
    }

    #[tokio::test]
    async fn test_load_failure_keeps_previous_collection() {
        let transport = ScriptedTransport::new();
        transport.reply(json!({"code": 0, "data": [{"id": 1, "alias": "a1"}]}));
        transport.fail(TransportError::Status {
            status: 500,
            status_text: "Internal Server Error".to_string(),
        });
        let store = store_with(transport.clone());

        assert!(store.load_accounts().await);
        assert!(!store.load_accounts().await);

        assert_eq!(store.accounts().len(), 1);
        assert_eq!(
            store.notifications().list().last().unwrap().message,
            "HTTP 500: Internal Server Error"
        );
        assert!(!store.loading().is_loading(LoadKey::Accounts));
    }

    #[tokio::test]
    async fn test_stale_refresh_is_discarded() {
        let transport = ScriptedTransport::new();
        let gate = Arc::new(tokio::sync::Notify::new());
        transport.reply_gated(
            json!({"code": 0, "data": [{"id": 1, "alias": "old"}]}),
            gate.clone(),
        );
        transport.reply(json!({"code": 0, "data": [{"id": 2, "alias": "new"}]}));
        let store = store_with(transport.clone());

        let slow = tokio::spawn({
            let store = store.clone();
            async move { store.load_accounts().await }
        });
        wait_until(|| transport.calls().len() == 1).await;

        assert!(store.load_accounts().await);
        gate.notify_one();
        assert!(slow.await.unwrap());

        let aliases: Vec<String> = store.accounts().into_iter().map(|a| a.alias).collect();
        assert_eq!(aliases, vec!["new"]);
        assert!(store.loading().snapshot().is_idle());
    }

    #[tokio::test]
    async fn test_unparseable_collection_is_an_error() {
        let transport = ScriptedTransport::new();
        transport.reply(json!({"code": 0, "data": {"unexpected": true}}));
        let store = store_with(transport.clone());

        assert!(!store.load_configs().await);
        assert!(store.configs().is_empty());
        let (kind, message) = messages(&store).pop().unwrap();
        assert_eq!(kind, crate::notifications::NotificationKind::Error);
        assert!(message.starts_with("Unexpected response payload"));
    }
}
