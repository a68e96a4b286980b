use super::{encode, path_key, ItemAction, LoadKey, ResourceStore};
use crate::api::ApiRequest;
use crate::types::Account;

impl ResourceStore {
    pub async fn load_accounts(&self) -> bool {
        self.refresh(
            LoadKey::Accounts,
            ApiRequest::get("/accounts/"),
            |data, accounts: Vec<Account>| data.accounts = accounts,
        )
        .await
    }

    /// Creates the account, or updates it when the alias already exists.
    pub async fn save_account(&self) -> bool {
        let fields = self.forms.read().account.fields.clone();
        let request = fields
            .to_request()
            .and_then(|payload| Ok(ApiRequest::post("/accounts/").json(encode(&payload)?)));

        let saved = self
            .submit_form(
                LoadKey::SaveAccount,
                |forms| &mut forms.account,
                request,
                format!("Account '{}' saved", fields.alias.trim()),
            )
            .await;
        if saved {
            self.load_accounts().await;
        }
        saved
    }

    pub async fn delete_account(&self, alias: &str) -> bool {
        let alias = match path_key(alias, "Account alias") {
            Ok(alias) => alias,
            Err(err) => return self.reject(err),
        };
        if !self.confirmed(&format!("Delete account '{}'?", alias)) {
            return false;
        }
        let deleted = self
            .mutate_item(
                ItemAction::DeletingAccount,
                &alias,
                ApiRequest::delete("/accounts").segment(&alias),
                format!("Account '{}' deleted", alias),
            )
            .await;
        if deleted {
            self.load_accounts().await;
        }
        deleted
    }
}
