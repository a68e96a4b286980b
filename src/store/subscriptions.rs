use std::collections::BTreeMap;

use super::{encode, path_key, ItemAction, LoadKey, ResourceStore};
use crate::api::{ApiRequest, RequestOptions};
use crate::types::{Subscription, SubscriptionStats, SubscriptionTemplate};

impl ResourceStore {
    pub async fn load_subscriptions(&self) -> bool {
        self.refresh(
            LoadKey::Subscriptions,
            ApiRequest::get("/subscriptions/"),
            |data, subscriptions: Vec<Subscription>| data.subscriptions = subscriptions,
        )
        .await
    }

    /// Loads only the subscriptions the backend reports as active.
    pub async fn load_active_subscriptions(&self) -> bool {
        self.refresh(
            LoadKey::ActiveSubscriptions,
            ApiRequest::get("/subscriptions/active"),
            |data, active: Vec<Subscription>| data.active_subscriptions = active,
        )
        .await
    }

    /// Fetches one subscription. Failures go to the notification queue.
    pub async fn fetch_subscription(&self, id: &str) -> Option<Subscription> {
        let result = match path_key(id, "Subscription id") {
            Ok(id) => {
                self.fetch::<Subscription>(ApiRequest::get("/subscriptions").segment(id))
                    .await
            }
            Err(err) => Err(err),
        };
        self.dispatcher.settle(result)
    }

    pub async fn load_templates(&self) -> bool {
        self.refresh(
            LoadKey::Templates,
            ApiRequest::get("/subscriptions/templates"),
            |data, templates: BTreeMap<String, SubscriptionTemplate>| data.templates = templates,
        )
        .await
    }

    pub async fn load_subscription_stats(&self) -> bool {
        self.refresh(
            LoadKey::Stats,
            ApiRequest::get("/subscriptions/stats"),
            |data, stats: SubscriptionStats| data.stats = Some(stats),
        )
        .await
    }

    /// Creates a subscription from the subscription form.
    pub async fn create_subscription(&self) -> bool {
        let fields = self.forms.read().subscription.fields.clone();
        let request = fields
            .to_request()
            .and_then(|payload| Ok(ApiRequest::post("/subscriptions/").json(encode(&payload)?)));

        let created = self
            .submit_form(
                LoadKey::CreateSubscription,
                |forms| &mut forms.subscription,
                request,
                format!("Subscription '{}' created", fields.kind.trim()),
            )
            .await;
        if created {
            self.load_subscriptions().await;
        }
        created
    }

    /// Instantiates a named template. Empty account fields are not sent.
    pub async fn create_from_template(
        &self,
        template: &str,
        account_alias: Option<&str>,
        account_address: Option<&str>,
    ) -> bool {
        let template = match path_key(template, "Template name") {
            Ok(template) => template,
            Err(err) => return self.reject(err),
        };
        let mut options = RequestOptions::default();
        let query = [
            ("account_alias", account_alias),
            ("account_address", account_address),
        ];
        for (name, value) in query {
            if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
                options = options.query(name, value);
            }
        }

        let request = ApiRequest::post("/subscriptions/templates")
            .segment(&template)
            .with_options(options);
        let created = self
            .mutate(
                LoadKey::CreateSubscription,
                request,
                format!("Subscription created from template '{}'", template),
            )
            .await;
        if created {
            self.load_subscriptions().await;
        }
        created
    }

    pub async fn retry_subscription(&self, id: &str) -> bool {
        let id = match path_key(id, "Subscription id") {
            Ok(id) => id,
            Err(err) => return self.reject(err),
        };
        let request = ApiRequest::post("/subscriptions").segment(&id).segment("retry");
        let retried = self
            .mutate_item(
                ItemAction::RetryingSubscription,
                &id,
                request,
                format!("Subscription {} retried", id),
            )
            .await;
        if retried {
            self.load_subscriptions().await;
        }
        retried
    }

    pub async fn delete_subscription(&self, id: &str) -> bool {
        let id = match path_key(id, "Subscription id") {
            Ok(id) => id,
            Err(err) => return self.reject(err),
        };
        if !self.confirmed(&format!("Delete subscription {}?", id)) {
            return false;
        }
        let deleted = self
            .mutate_item(
                ItemAction::DeletingSubscription,
                &id,
                ApiRequest::delete("/subscriptions").segment(&id),
                format!("Subscription {} deleted", id),
            )
            .await;
        if deleted {
            self.load_subscriptions().await;
        }
        deleted
    }

    pub async fn clear_subscriptions(&self) -> bool {
        if !self.confirmed("Delete ALL subscriptions?") {
            return false;
        }
        let cleared = self
            .mutate(
                LoadKey::ClearSubscriptions,
                ApiRequest::delete("/subscriptions/"),
                "All subscriptions cleared".to_string(),
            )
            .await;
        if cleared {
            self.load_subscriptions().await;
        }
        cleared
    }
}
