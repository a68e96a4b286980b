use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use strategy_console::api::HttpClient;
use strategy_console::config::ConsoleConfig;
use strategy_console::notifications::{NotificationKind, NotificationQueue};
use strategy_console::store::{AlwaysConfirm, Confirm, ResourceStore, StrategyForm};
use strategy_console::types::Subscription;

#[derive(Parser)]
#[command(name = "strategy-console")]
#[command(version = "0.1.0")]
#[command(about = "Administrative console for the trading-strategy backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file path (defaults to ./console.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL, overrides every other source
    #[arg(long)]
    base_url: Option<String>,

    /// Skip confirmation prompts
    #[arg(short, long)]
    yes: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show backend status
    Status,
    /// Reload every collection
    Refresh,
    /// Market data subscriptions
    #[command(subcommand)]
    Subscriptions(SubscriptionCommand),
    /// Strategy records
    #[command(subcommand)]
    Records(RecordCommand),
    /// Trading accounts
    #[command(subcommand)]
    Accounts(AccountCommand),
    /// Key/value settings stored on the backend
    #[command(subcommand)]
    Configs(ConfigCommand),
    /// Strategy event log
    Logs,
}

#[derive(Subcommand)]
enum SubscriptionCommand {
    List,
    /// Only subscriptions the backend reports as active
    Active,
    Show { id: String },
    Templates,
    Create {
        #[arg(long = "type")]
        kind: String,
        /// JSON object of subscription parameters
        #[arg(long, default_value = "{}")]
        params: String,
    },
    FromTemplate {
        name: String,
        #[arg(long)]
        account_alias: Option<String>,
        #[arg(long)]
        account_address: Option<String>,
    },
    Retry { id: String },
    Delete { id: String },
    /// Delete every subscription
    Clear,
}

#[derive(Args)]
struct RecordFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    coin: Option<String>,
    #[arg(long)]
    interval: Option<String>,
    #[arg(long)]
    account_alias: Option<String>,
}

impl RecordFields {
    fn into_form(self) -> StrategyForm {
        StrategyForm {
            name: self.name.unwrap_or_default(),
            coin: self.coin.unwrap_or_default(),
            interval: self.interval.unwrap_or_default(),
            account_alias: self.account_alias.unwrap_or_default(),
        }
    }
}

#[derive(Subcommand)]
enum RecordCommand {
    List,
    Show { id: i64 },
    Create {
        #[command(flatten)]
        fields: RecordFields,
    },
    /// Change the given fields; omitted fields stay as they are
    Update {
        id: i64,
        #[command(flatten)]
        fields: RecordFields,
    },
    Start { id: i64 },
    Stop { id: i64 },
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum AccountCommand {
    List,
    /// Create an account or update the one with the same alias
    Save {
        #[arg(long)]
        alias: String,
        #[arg(long)]
        api_wallet_address: String,
        #[arg(long)]
        secret_key: String,
        #[arg(long)]
        inactive: bool,
    },
    Delete { alias: String },
}

#[derive(Subcommand)]
enum ConfigCommand {
    List,
    Show { key: String },
    Save {
        #[arg(long)]
        key: String,
        #[arg(long, default_value = "")]
        value: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        config_type: Option<String>,
    },
    Delete { key: String },
}

/// Reads a y/N answer from stdin.
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{} [y/N] ", prompt);
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("Failed to install log subscriber: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs)?;

    let mut settings = ConsoleConfig::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url.clone() {
        settings.base_url = base_url;
        settings.validate()?;
    }
    debug!("Settings: {:?}", settings);

    let transport = HttpClient::new(&settings.base_url, settings.request_timeout())?;
    info!("Backend: {}", transport.base_url());

    let notifications = NotificationQueue::with_limits(
        settings.max_notifications,
        settings.notification_duration(),
    );
    let confirm: Arc<dyn Confirm> = if cli.yes || !settings.confirm_destructive {
        Arc::new(AlwaysConfirm)
    } else {
        Arc::new(StdinConfirm)
    };
    let store = ResourceStore::new(Arc::new(transport), notifications, confirm);

    let ok = run(&store, cli.command).await;
    print_notifications(&store);

    if ok {
        Ok(())
    } else {
        Err(anyhow!("Command failed"))
    }
}

async fn run(store: &ResourceStore, command: Commands) -> bool {
    match command {
        Commands::Status => {
            let ok = store.load_status().await;
            print_status(store);
            ok
        }
        Commands::Refresh => {
            let ok = store.refresh_all().await;
            print_status(store);
            print_subscriptions(store);
            print_records(store);
            print_accounts(store);
            print_configs(store);
            ok
        }
        Commands::Subscriptions(command) => {
            let ok = match command {
                SubscriptionCommand::List => store.load_subscriptions().await,
                SubscriptionCommand::Active => {
                    let ok = store.load_active_subscriptions().await;
                    print_subscription_table(&store.active_subscriptions());
                    return ok;
                }
                SubscriptionCommand::Show { id } => {
                    return match store.fetch_subscription(&id).await {
                        Some(subscription) => {
                            print_json(&subscription);
                            true
                        }
                        None => false,
                    };
                }
                SubscriptionCommand::Templates => {
                    let ok = store.load_templates().await;
                    print_templates(store);
                    return ok;
                }
                SubscriptionCommand::Create { kind, params } => {
                    store.edit_forms(|forms| {
                        forms.subscription.fields.kind = kind;
                        forms.subscription.fields.params = params;
                    });
                    let ok = store.create_subscription().await;
                    print_form_error(store.forms().subscription.error);
                    ok
                }
                SubscriptionCommand::FromTemplate { name, account_alias, account_address } => {
                    store
                        .create_from_template(
                            &name,
                            account_alias.as_deref(),
                            account_address.as_deref(),
                        )
                        .await
                }
                SubscriptionCommand::Retry { id } => store.retry_subscription(&id).await,
                SubscriptionCommand::Delete { id } => store.delete_subscription(&id).await,
                SubscriptionCommand::Clear => store.clear_subscriptions().await,
            };
            print_subscriptions(store);
            ok
        }
        Commands::Records(command) => {
            let ok = match command {
                RecordCommand::List => store.load_records().await,
                RecordCommand::Show { id } => {
                    return match store.fetch_strategy_record(id).await {
                        Some(record) => {
                            print_json(&record);
                            true
                        }
                        None => false,
                    };
                }
                RecordCommand::Create { fields } => {
                    store.edit_forms(|forms| forms.strategy.fields = fields.into_form());
                    let ok = store.create_strategy_record().await;
                    print_form_error(store.forms().strategy.error);
                    ok
                }
                RecordCommand::Update { id, fields } => {
                    store.edit_forms(|forms| forms.strategy_edit.fields = fields.into_form());
                    let ok = store.update_strategy_record(id).await;
                    print_form_error(store.forms().strategy_edit.error);
                    ok
                }
                RecordCommand::Start { id } => store.start_strategy_record(id).await,
                RecordCommand::Stop { id } => store.stop_strategy_record(id).await,
                RecordCommand::Delete { id } => store.delete_strategy_record(id).await,
            };
            print_records(store);
            ok
        }
        Commands::Accounts(command) => {
            let ok = match command {
                AccountCommand::List => store.load_accounts().await,
                AccountCommand::Save { alias, api_wallet_address, secret_key, inactive } => {
                    store.edit_forms(|forms| {
                        let fields = &mut forms.account.fields;
                        fields.alias = alias;
                        fields.api_wallet_address = api_wallet_address;
                        fields.secret_key = secret_key;
                        fields.is_active = !inactive;
                    });
                    let ok = store.save_account().await;
                    print_form_error(store.forms().account.error);
                    ok
                }
                AccountCommand::Delete { alias } => store.delete_account(&alias).await,
            };
            print_accounts(store);
            ok
        }
        Commands::Configs(command) => {
            let ok = match command {
                ConfigCommand::List => store.load_configs().await,
                ConfigCommand::Show { key } => {
                    return match store.fetch_config(&key).await {
                        Some(entry) => {
                            print_json(&entry);
                            true
                        }
                        None => false,
                    };
                }
                ConfigCommand::Save { key, value, description, config_type } => {
                    store.edit_forms(|forms| {
                        let fields = &mut forms.config.fields;
                        fields.key = key;
                        fields.value = value;
                        fields.description = description.unwrap_or_default();
                        fields.config_type = config_type.unwrap_or_default();
                    });
                    let ok = store.save_config().await;
                    print_form_error(store.forms().config.error);
                    ok
                }
                ConfigCommand::Delete { key } => store.delete_config(&key).await,
            };
            print_configs(store);
            ok
        }
        Commands::Logs => {
            let ok = store.load_logs().await;
            print_logs(store);
            ok
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => println!("<unprintable: {}>", e),
    }
}

fn print_form_error(error: Option<String>) {
    if let Some(error) = error {
        println!("Form error: {}", error);
    }
}

fn print_status(store: &ResourceStore) {
    let Some(status) = store.status() else {
        return;
    };
    let stats = status.subscription_stats;
    println!("\n=== System Status ===");
    println!("WebSocket ready: {}", if status.ws_ready { "yes" } else { "no" });
    println!("Active subscriptions: {}", status.active_subscriptions);
    println!(
        "Subscriptions: {} total, {} active, {} inactive, {} error",
        stats.total, stats.active, stats.inactive, stats.error
    );
}

fn print_subscriptions(store: &ResourceStore) {
    print_subscription_table(&store.subscriptions());
}

fn print_subscription_table(subscriptions: &[Subscription]) {
    println!("\n{:<38} {:<16} {:<10} {:<10} {}", "ID", "Type", "Coin", "Status", "Error");
    println!("{}", "-".repeat(90));
    for sub in subscriptions {
        println!(
            "{:<38} {:<16} {:<10} {:<10} {}",
            sub.id,
            sub.kind,
            sub.coin().unwrap_or("-"),
            sub.status,
            sub.error_message.as_deref().unwrap_or("")
        );
    }
    println!("{} subscription(s)", subscriptions.len());
}

fn print_templates(store: &ResourceStore) {
    println!("\n{:<20} {:<16} {}", "Template", "Type", "Description");
    println!("{}", "-".repeat(70));
    for (name, template) in store.templates() {
        println!("{:<20} {:<16} {}", name, template.kind, template.description);
    }
}

fn print_records(store: &ResourceStore) {
    let records = store.records();
    println!(
        "\n{:>5} {:<20} {:<8} {:<6} {:<14} {:<8} {}",
        "ID", "Name", "Coin", "Tf", "Account", "Status", "Running"
    );
    println!("{}", "-".repeat(75));
    for record in &records {
        println!(
            "{:>5} {:<20} {:<8} {:<6} {:<14} {:<8} {}",
            record.id,
            record.name,
            record.coin,
            record.interval,
            record.account_alias,
            record.status,
            if record.is_running { "yes" } else { "no" }
        );
    }
    println!("{} record(s)", records.len());
}

fn print_accounts(store: &ResourceStore) {
    let accounts = store.accounts();
    println!("\n{:<16} {:<44} {:<44} {}", "Alias", "Account", "API wallet", "Active");
    println!("{}", "-".repeat(112));
    for account in &accounts {
        println!(
            "{:<16} {:<44} {:<44} {}",
            account.alias,
            account.account_address,
            account.api_wallet_address,
            if account.is_active { "yes" } else { "no" }
        );
    }
    println!("{} account(s)", accounts.len());
}

fn print_configs(store: &ResourceStore) {
    let configs = store.configs();
    println!("\n{:<24} {:<10} {:<30} {}", "Key", "Type", "Value", "Description");
    println!("{}", "-".repeat(90));
    for entry in &configs {
        println!(
            "{:<24} {:<10} {:<30} {}",
            entry.key,
            entry.config_type,
            entry.value,
            entry.description.as_deref().unwrap_or("")
        );
    }
    println!("{} config(s)", configs.len());
}

fn print_logs(store: &ResourceStore) {
    let logs = store.logs();
    println!("\n{:>6} {:<14} {:<20} {:<12} {}", "ID", "Account", "Strategy", "Event", "Content");
    println!("{}", "-".repeat(90));
    for entry in &logs {
        println!(
            "{:>6} {:<14} {:<20} {:<12} {}",
            entry.id,
            entry.account_alias,
            entry.strategy_name,
            entry.event_type,
            entry.event_content
        );
    }
}

fn print_notifications(store: &ResourceStore) {
    let notifications = store.notifications().drain();
    if notifications.is_empty() {
        return;
    }
    println!();
    for notification in notifications {
        let tag = match notification.kind {
            NotificationKind::Success => "OK",
            NotificationKind::Info => "INFO",
            NotificationKind::Warning => "WARN",
            NotificationKind::Error => "ERROR",
        };
        println!("[{}] {}", tag, notification.message);
    }
}
