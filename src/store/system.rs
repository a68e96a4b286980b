use tracing::info;

use super::{LoadKey, ResourceStore};
use crate::api::ApiRequest;
use crate::types::{LogEntry, SystemStatus};

impl ResourceStore {
    pub async fn load_status(&self) -> bool {
        self.refresh(
            LoadKey::Status,
            ApiRequest::get("/system/status"),
            |data, status: SystemStatus| data.status = Some(status),
        )
        .await
    }

    pub async fn load_logs(&self) -> bool {
        self.refresh(
            LoadKey::Logs,
            ApiRequest::get("/logs/"),
            |data, logs: Vec<LogEntry>| data.logs = logs,
        )
        .await
    }

    /// Reloads every collection concurrently. Returns true only if all of
    /// them succeeded; each failure is reported on its own.
    pub async fn refresh_all(&self) -> bool {
        let results = tokio::join!(
            self.load_status(),
            self.load_subscriptions(),
            self.load_templates(),
            self.load_subscription_stats(),
            self.load_records(),
            self.load_accounts(),
            self.load_configs(),
            self.load_logs(),
        );
        let all = [
            results.0, results.1, results.2, results.3, results.4, results.5, results.6, results.7,
        ];
        let ok = all.iter().filter(|loaded| **loaded).count();
        info!("Refreshed {}/{} collections", ok, all.len());
        ok == all.len()
    }
}
