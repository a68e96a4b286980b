use super::{encode, path_key, ItemAction, LoadKey, ResourceStore};
use crate::api::ApiRequest;
use crate::types::ConfigEntry;

impl ResourceStore {
    pub async fn load_configs(&self) -> bool {
        self.refresh(
            LoadKey::Configs,
            ApiRequest::get("/configs/"),
            |data, configs: Vec<ConfigEntry>| data.configs = configs,
        )
        .await
    }

    pub async fn fetch_config(&self, key: &str) -> Option<ConfigEntry> {
        let result = match path_key(key, "Config key") {
            Ok(key) => {
                self.fetch::<ConfigEntry>(ApiRequest::get("/configs").segment(key))
                    .await
            }
            Err(err) => Err(err),
        };
        self.dispatcher.settle(result)
    }

    /// Upserts by key.
    pub async fn save_config(&self) -> bool {
        let fields = self.forms.read().config.fields.clone();
        let request = fields
            .to_request()
            .and_then(|payload| Ok(ApiRequest::post("/configs/").json(encode(&payload)?)));

        let saved = self
            .submit_form(
                LoadKey::SaveConfig,
                |forms| &mut forms.config,
                request,
                format!("Config '{}' saved", fields.key.trim()),
            )
            .await;
        if saved {
            self.load_configs().await;
        }
        saved
    }

    pub async fn delete_config(&self, key: &str) -> bool {
        let key = match path_key(key, "Config key") {
            Ok(key) => key,
            Err(err) => return self.reject(err),
        };
        if !self.confirmed(&format!("Delete config '{}'?", key)) {
            return false;
        }
        let deleted = self
            .mutate_item(
                ItemAction::DeletingConfig,
                &key,
                ApiRequest::delete("/configs").segment(&key),
                format!("Config '{}' deleted", key),
            )
            .await;
        if deleted {
            self.load_configs().await;
        }
        deleted
    }
}
