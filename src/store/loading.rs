use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Collection-wide operations tracked by a single flag each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LoadKey {
    Subscriptions,
    ActiveSubscriptions,
    Records,
    Accounts,
    Configs,
    Logs,
    Templates,
    Stats,
    Status,
    CreateSubscription,
    CreateStrategy,
    UpdateStrategy,
    SaveAccount,
    SaveConfig,
    ClearSubscriptions,
}

impl LoadKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadKey::Subscriptions => "subscriptions",
            LoadKey::ActiveSubscriptions => "activeSubscriptions",
            LoadKey::Records => "records",
            LoadKey::Accounts => "accounts",
            LoadKey::Configs => "configs",
            LoadKey::Logs => "logs",
            LoadKey::Templates => "templates",
            LoadKey::Stats => "stats",
            LoadKey::Status => "status",
            LoadKey::CreateSubscription => "createSubscription",
            LoadKey::CreateStrategy => "createStrategy",
            LoadKey::UpdateStrategy => "updateStrategy",
            LoadKey::SaveAccount => "saveAccount",
            LoadKey::SaveConfig => "saveConfig",
            LoadKey::ClearSubscriptions => "clearSubscriptions",
        }
    }
}

impl fmt::Display for LoadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row-level operations, tracked per item id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemAction {
    StartingStrategy,
    StoppingStrategy,
    DeletingStrategy,
    RetryingSubscription,
    DeletingSubscription,
    DeletingAccount,
    DeletingConfig,
}

impl ItemAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemAction::StartingStrategy => "startingStrategy",
            ItemAction::StoppingStrategy => "stoppingStrategy",
            ItemAction::DeletingStrategy => "deletingStrategy",
            ItemAction::RetryingSubscription => "retryingSubscription",
            ItemAction::DeletingSubscription => "deletingSubscription",
            ItemAction::DeletingAccount => "deletingAccount",
            ItemAction::DeletingConfig => "deletingConfig",
        }
    }

    /// Human wording for messages, e.g. "starting strategy".
    pub fn label(&self) -> &'static str {
        match self {
            ItemAction::StartingStrategy => "starting strategy",
            ItemAction::StoppingStrategy => "stopping strategy",
            ItemAction::DeletingStrategy => "deleting strategy",
            ItemAction::RetryingSubscription => "retrying subscription",
            ItemAction::DeletingSubscription => "deleting subscription",
            ItemAction::DeletingAccount => "deleting account",
            ItemAction::DeletingConfig => "deleting config",
        }
    }
}

impl fmt::Display for ItemAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadingFlags {
    /// In-flight count per key; absent means idle.
    global: HashMap<LoadKey, usize>,
    items: HashMap<ItemAction, HashSet<String>>,
    /// Flags raised since creation, global and per-item.
    raised: u64,
}

impl LoadingFlags {
    pub fn is_loading(&self, key: LoadKey) -> bool {
        self.global.get(&key).is_some_and(|n| *n > 0)
    }

    pub fn is_item_loading(&self, action: ItemAction, id: &str) -> bool {
        self.items.get(&action).is_some_and(|ids| ids.contains(id))
    }

    pub fn raised(&self) -> u64 {
        self.raised
    }

    pub fn is_idle(&self) -> bool {
        self.global.is_empty() && self.items.values().all(HashSet::is_empty)
    }

    /// Keys currently in flight, sorted for stable rendering.
    pub fn active_keys(&self) -> Vec<LoadKey> {
        let mut keys: Vec<LoadKey> = self.global.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn active_items(&self, action: ItemAction) -> Vec<String> {
        let mut ids: Vec<String> = self
            .items
            .get(&action)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

/// Shared loading flags. Flags are only set through guards, which clear
/// them on drop, so no exit path can leave one dangling.
#[derive(Debug, Default, Clone)]
pub struct LoadingState {
    flags: Arc<RwLock<LoadingFlags>>,
}

impl LoadingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self, key: LoadKey) -> bool {
        self.flags.read().is_loading(key)
    }

    pub fn is_item_loading(&self, action: ItemAction, id: impl ToString) -> bool {
        self.flags.read().is_item_loading(action, &id.to_string())
    }

    pub fn snapshot(&self) -> LoadingFlags {
        self.flags.read().clone()
    }

    pub fn begin(&self, key: LoadKey) -> LoadingGuard {
        {
            let mut flags = self.flags.write();
            *flags.global.entry(key).or_insert(0) += 1;
            flags.raised += 1;
        }
        LoadingGuard {
            state: self.clone(),
            key,
        }
    }

    /// Marks `id` busy for `action`, or returns `None` if it already is.
    pub fn try_begin_item(&self, action: ItemAction, id: impl ToString) -> Option<ItemGuard> {
        let id = id.to_string();
        let inserted = {
            let mut flags = self.flags.write();
            let inserted = flags.items.entry(action).or_default().insert(id.clone());
            if inserted {
                flags.raised += 1;
            }
            inserted
        };

        inserted.then(|| ItemGuard {
            state: self.clone(),
            action,
            id,
        })
    }

    fn finish(&self, key: LoadKey) {
        let mut flags = self.flags.write();
        if let Some(count) = flags.global.get_mut(&key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                flags.global.remove(&key);
            }
        }
    }

    fn finish_item(&self, action: ItemAction, id: &str) {
        let mut flags = self.flags.write();
        if let Some(ids) = flags.items.get_mut(&action) {
            ids.remove(id);
            if ids.is_empty() {
                flags.items.remove(&action);
            }
        }
    }
}

#[must_use = "the flag is cleared as soon as the guard is dropped"]
pub struct LoadingGuard {
    state: LoadingState,
    key: LoadKey,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.state.finish(self.key);
    }
}

#[must_use = "the flag is cleared as soon as the guard is dropped"]
pub struct ItemGuard {
    state: LoadingState,
    action: ItemAction,
    id: String,
}

impl ItemGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for ItemGuard {
    fn drop(&mut self) {
        self.state.finish_item(self.action, &self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_clears_flag() {
        let loading = LoadingState::new();
        assert!(!loading.is_loading(LoadKey::Accounts));
        {
            let _guard = loading.begin(LoadKey::Accounts);
            assert!(loading.is_loading(LoadKey::Accounts));
            assert!(!loading.is_loading(LoadKey::Configs));
        }
        assert!(!loading.is_loading(LoadKey::Accounts));
        assert!(loading.snapshot().is_idle());
    }

    #[test]
    fn test_overlapping_loads_keep_flag_until_last_finishes() {
        let loading = LoadingState::new();
        let first = loading.begin(LoadKey::Records);
        let second = loading.begin(LoadKey::Records);

        drop(first);
        assert!(loading.is_loading(LoadKey::Records));
        drop(second);
        assert!(!loading.is_loading(LoadKey::Records));
    }

    #[test]
    fn test_item_flags_are_independent_per_id() {
        let loading = LoadingState::new();
        let seven = loading.try_begin_item(ItemAction::StartingStrategy, 7).unwrap();
        let eight = loading.try_begin_item(ItemAction::StartingStrategy, 8).unwrap();

        assert!(loading.is_item_loading(ItemAction::StartingStrategy, 7));
        assert!(loading.is_item_loading(ItemAction::StartingStrategy, 8));
        assert!(!loading.is_item_loading(ItemAction::StoppingStrategy, 7));

        drop(seven);
        assert!(!loading.is_item_loading(ItemAction::StartingStrategy, 7));
        assert!(loading.is_item_loading(ItemAction::StartingStrategy, 8));
        assert_eq!(eight.id(), "8");
    }

    #[test]
    fn test_same_item_cannot_be_begun_twice() {
        let loading = LoadingState::new();
        let guard = loading.try_begin_item(ItemAction::DeletingAccount, "a1");
        assert!(guard.is_some());
        assert!(loading.try_begin_item(ItemAction::DeletingAccount, "a1").is_none());

        drop(guard);
        assert!(loading.try_begin_item(ItemAction::DeletingAccount, "a1").is_some());
        // The refused attempt raised nothing.
        assert_eq!(loading.snapshot().raised(), 2);
    }

    #[test]
    fn test_raised_counts_every_flag() {
        let loading = LoadingState::new();
        assert_eq!(loading.snapshot().raised(), 0);

        drop(loading.begin(LoadKey::Configs));
        drop(loading.try_begin_item(ItemAction::DeletingConfig, "k"));
        let snapshot = loading.snapshot();
        assert!(snapshot.is_idle());
        assert_eq!(snapshot.raised(), 2);
    }

    #[test]
    fn test_snapshot_lists_active_work() {
        let loading = LoadingState::new();
        let _a = loading.begin(LoadKey::Configs);
        let _b = loading.begin(LoadKey::Accounts);
        let _c = loading.try_begin_item(ItemAction::DeletingConfig, "fee_rate");

        let snapshot = loading.snapshot();
        assert_eq!(snapshot.active_keys(), vec![LoadKey::Accounts, LoadKey::Configs]);
        assert_eq!(snapshot.active_items(ItemAction::DeletingConfig), vec!["fee_rate"]);
        assert!(!snapshot.is_idle());
    }
}
