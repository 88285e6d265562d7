/// Backend query command handlers
use anyhow::Result;
use tabled::{Table, Tabled};
use tabtrack_core::{aggregation::format_duration, Config};
use tabtrack_integrations::{ActivityRecord, BackendClient, LegacyLog};
use tabtrack_storage::Category;

use super::helpers::{backend_client, open_database, truncate_str, RULE};

#[derive(Tabled)]
struct ActivityRow {
    #[tabled(rename = "When")]
    when: String,
    #[tabled(rename = "Domain")]
    domain: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Focus")]
    focus: u8,
}

impl From<ActivityRecord> for ActivityRow {
    fn from(record: ActivityRecord) -> Self {
        Self {
            when: record
                .created_at
                .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string()),
            domain: truncate_str(&record.domain, 30),
            category: record.category.to_string(),
            time: format_duration(record.time_spent),
            focus: record.focus_score,
        }
    }
}

/// Client plus the user the queries are about
struct Remote {
    client: BackendClient,
    user_id: String,
}

impl Remote {
    fn connect(user: Option<String>) -> Result<Self> {
        let config = Config::load()?;
        let user_id = match user {
            Some(user_id) => user_id,
            None => open_database()?.get_or_create_user_id()?,
        };
        log::debug!("Querying {} as {user_id}", config.backend_url);
        Ok(Self {
            client: backend_client(&config)?,
            user_id,
        })
    }
}

fn print_activities(records: Vec<ActivityRecord>) {
    if records.is_empty() {
        println!("No activities found.");
        return;
    }
    let rows: Vec<ActivityRow> = records.into_iter().map(ActivityRow::from).collect();
    println!("{}", Table::new(rows));
}

pub async fn handle_activities(
    user: Option<String>,
    category: Option<String>,
    days: Option<u32>,
) -> Result<()> {
    let category = category
        .map(|c| c.parse::<Category>())
        .transpose()
        .map_err(|e| anyhow::anyhow!("Unknown category '{}'", e.0))?;
    let remote = Remote::connect(user)?;
    let records = remote
        .client
        .fetch_activities(&remote.user_id, category, days)
        .await?;
    print_activities(records);
    Ok(())
}

pub async fn handle_recent(user: Option<String>, limit: Option<u32>) -> Result<()> {
    let remote = Remote::connect(user)?;
    let records = remote.client.fetch_recent(&remote.user_id, limit).await?;
    print_activities(records);
    Ok(())
}

pub async fn handle_metrics(user: Option<String>, days: Option<u32>) -> Result<()> {
    let remote = Remote::connect(user)?;
    let metrics = remote
        .client
        .fetch_productivity(&remote.user_id, days)
        .await?;

    println!("Productivity Metrics");
    println!("{RULE}");
    println!("Total time:        {}", format_duration(metrics.total_time));
    println!("Productive time:   {}", format_duration(metrics.productive_time));
    println!("Unproductive time: {}", format_duration(metrics.unproductive_time));
    println!("Sessions:          {}", metrics.sessions_count);
    println!("Score:             {}%", metrics.productivity_score);
    Ok(())
}

pub async fn handle_score(user: Option<String>) -> Result<()> {
    let remote = Remote::connect(user)?;
    let report = remote.client.fetch_score(&remote.user_id).await?;

    println!(
        "Score: {} ({} - {})",
        report.score, report.grade.grade, report.grade.description
    );
    for insight in &report.insights {
        println!("  - {}", insight.message);
    }
    Ok(())
}

pub async fn handle_log(domain: String, seconds: i64) -> Result<()> {
    let config = Config::load()?;
    let client = backend_client(&config)?;
    let record = client
        .log_legacy(&LegacyLog {
            domain,
            duration: seconds,
        })
        .await?;
    println!(
        "Logged {} on {} as {}",
        format_duration(record.time_spent),
        record.domain,
        record.category
    );
    Ok(())
}
