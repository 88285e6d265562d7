mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tabtrack_core::config::socket_path;

use commands::{daemon, data, remote, report, settings, sync};

#[derive(Parser)]
#[command(name = "tabtrack")]
#[command(about = "Browser activity tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the native-messaging host (started by the browser)
    Host,
    /// Show the host and current session
    Status,
    /// End the current session
    Stop {
        /// Shut the host down instead
        #[arg(long)]
        host: bool,
    },
    /// Daily report from local data
    Report {
        /// Day to report on (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<String>,
        /// Summarize the last N days instead of one day
        #[arg(long, conflicts_with = "date")]
        days: Option<u32>,
    },
    /// Show how a URL would be classified
    Classify {
        url: String,
    },
    /// View or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Manage per-domain category overrides
    Override {
        #[command(subcommand)]
        action: OverrideAction,
    },
    /// Delete data older than the retention window
    Cleanup {
        /// Retention in days, defaults to `retention_days` from config.toml
        #[arg(long)]
        days: Option<u32>,
    },
    /// Backend sync queue
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
    /// Query the backend
    Remote {
        #[command(subcommand)]
        action: RemoteAction,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Show all settings
    Show,
    /// Set a setting (e.g., `breakInterval 1800000`)
    Set {
        /// Setting key in camelCase
        key: String,
        /// Value to set
        value: String,
    },
    /// Turn focus mode on or off
    ToggleFocus,
}

#[derive(Subcommand, Debug)]
enum OverrideAction {
    /// List overrides
    List,
    /// Classify a domain as a fixed category
    Add {
        domain: String,
        /// highly_productive, productive, unproductive, neutral or break
        category: String,
    },
    /// Remove an override
    Remove {
        domain: String,
    },
}

#[derive(Subcommand, Debug)]
enum SyncAction {
    /// Push queued sessions to the backend now
    Retry,
}

#[derive(Subcommand, Debug)]
enum RemoteAction {
    /// List activities
    Activities {
        /// Only this category
        #[arg(short, long)]
        category: Option<String>,
        /// Look back this many days
        #[arg(short, long)]
        days: Option<u32>,
        /// Query another user id
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Most recent activities
    Recent {
        #[arg(short, long)]
        limit: Option<u32>,
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Productivity metrics for a period
    Metrics {
        /// Period in days
        #[arg(short, long)]
        days: Option<u32>,
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Score, grade and insights for the last 24 hours
    Score {
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Log time on a domain through the legacy endpoint
    Log {
        domain: String,
        /// Duration in seconds
        seconds: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // the host logs to a file; its stdout belongs to the browser
    if !matches!(cli.command, Commands::Host) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_secs()
            .init();
    }

    match cli.command {
        Commands::Host => daemon::run_host().await,
        Commands::Status => daemon::show_status(&socket_path()?).await,
        Commands::Stop { host } => daemon::stop(&socket_path()?, host).await,
        Commands::Report { date, days } => match days {
            Some(days) => report::handle_range_report(days),
            None => report::handle_report_command(date.as_deref()),
        },
        Commands::Classify { url } => settings::handle_classify(&url),
        Commands::Settings { action } => match action {
            SettingsAction::Show => settings::handle_settings_show(),
            SettingsAction::Set { key, value } => settings::handle_settings_set(&key, &value),
            SettingsAction::ToggleFocus => settings::handle_toggle_focus(),
        },
        Commands::Override { action } => match action {
            OverrideAction::List => settings::handle_override_list(),
            OverrideAction::Add { domain, category } => {
                settings::handle_override_add(&domain, &category)
            }
            OverrideAction::Remove { domain } => settings::handle_override_remove(&domain),
        },
        Commands::Cleanup { days } => data::handle_cleanup(days),
        Commands::Sync { action } => match action {
            SyncAction::Retry => sync::handle_sync_retry().await,
        },
        Commands::Remote { action } => match action {
            RemoteAction::Activities {
                category,
                days,
                user,
            } => remote::handle_activities(user, category, days).await,
            RemoteAction::Recent { limit, user } => remote::handle_recent(user, limit).await,
            RemoteAction::Metrics { days, user } => remote::handle_metrics(user, days).await,
            RemoteAction::Score { user } => remote::handle_score(user).await,
            RemoteAction::Log { domain, seconds } => remote::handle_log(domain, seconds).await,
        },
    }
}
