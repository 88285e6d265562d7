/// Local report command handler
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use tabled::{Table, Tabled};
use tabtrack_core::aggregation::{format_duration, local_date};
use tabtrack_integrations::{productivity_percentage, ScoreReport};
use tabtrack_storage::DailyAggregate;

use super::helpers::{open_database, parse_date, truncate_str, RULE};

#[derive(Tabled, Debug, PartialEq, Eq)]
struct CategoryStats {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Percentage")]
    percentage: String,
}

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Domain")]
    domain: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Focus")]
    focus: u8,
}

#[derive(Tabled)]
struct DayRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Total")]
    total: String,
    #[tabled(rename = "Productive")]
    productive: String,
    #[tabled(rename = "Sessions")]
    sessions: u32,
    #[tabled(rename = "Avg focus")]
    focus: String,
}

fn local_midnight(date: NaiveDate) -> Result<DateTime<Utc>> {
    Ok(Local
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .with_context(|| format!("No local midnight on {date}"))?
        .with_timezone(&Utc))
}

/// UTC bounds of a local calendar day, midnight to the next midnight
fn local_day_bounds(date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let next = date
        .succ_opt()
        .with_context(|| format!("No day after {date}"))?;
    Ok((local_midnight(date)?, local_midnight(next)?))
}

fn category_rows(aggregate: &DailyAggregate) -> Vec<CategoryStats> {
    let mut entries: Vec<_> = aggregate.categories.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1));
    entries
        .into_iter()
        .map(|(category, ms)| CategoryStats {
            category: category.to_string(),
            time: format_duration(*ms),
            percentage: format!(
                "{}%",
                productivity_percentage(*ms, aggregate.total_time_ms)
            ),
        })
        .collect()
}

/// One row per recorded day over the last `days` days, today included
pub fn handle_range_report(days: u32) -> Result<()> {
    let to = local_date(Utc::now());
    let from = to - Duration::days(i64::from(days.max(1)) - 1);
    let db = open_database()?;
    let aggregates = db.get_daily_aggregates(from, to)?;

    if aggregates.is_empty() {
        println!("No browsing recorded from {from} to {to}");
        return Ok(());
    }

    let total: i64 = aggregates.iter().map(|a| a.total_time_ms).sum();
    let productive: i64 = aggregates.iter().map(|a| a.productive_time_ms).sum();
    let rows: Vec<DayRow> = aggregates
        .into_iter()
        .map(|a| DayRow {
            date: a.date.to_string(),
            total: format_duration(a.total_time_ms),
            productive: format_duration(a.productive_time_ms),
            sessions: a.session_count,
            focus: format!("{:.0}", a.average_focus),
        })
        .collect();

    println!("\nBrowsing Report: {from} to {to}");
    println!("{RULE}");
    println!("{}", Table::new(rows));
    println!(
        "\nTotal: {} | Productive: {} ({}%)",
        format_duration(total),
        format_duration(productive),
        productivity_percentage(productive, total)
    );
    Ok(())
}

pub fn handle_report_command(date: Option<&str>) -> Result<()> {
    let date = match date {
        Some(value) => parse_date(value)?,
        None => local_date(Utc::now()),
    };
    let db = open_database()?;

    let Some(aggregate) = db.get_daily_aggregate(date)? else {
        println!("No browsing recorded for {date}");
        return Ok(());
    };

    println!("\nBrowsing Report: {date}");
    println!("{RULE}");
    println!("Total time:      {}", format_duration(aggregate.total_time_ms));
    println!(
        "Productive time: {} ({}%)",
        format_duration(aggregate.productive_time_ms),
        productivity_percentage(aggregate.productive_time_ms, aggregate.total_time_ms)
    );
    println!("Sessions:        {}", aggregate.session_count);
    println!("Average focus:   {:.0}", aggregate.average_focus);

    println!("\n{}", Table::new(category_rows(&aggregate)));

    let (start, end) = local_day_bounds(date)?;
    let sessions = db.get_sessions(start, end)?;
    if sessions.is_empty() {
        return Ok(());
    }

    let report = ScoreReport::from_activities(&sessions);
    println!(
        "\nScore: {} ({} - {})",
        report.score, report.grade.grade, report.grade.description
    );
    for insight in &report.insights {
        println!("  - {}", insight.message);
    }

    let rows: Vec<SessionRow> = sessions
        .iter()
        .map(|s| SessionRow {
            started: s.start_time.with_timezone(&Local).format("%H:%M").to_string(),
            domain: truncate_str(&s.domain, 30),
            category: s.category.to_string(),
            duration: format_duration(s.duration_ms),
            focus: s.final_focus_score,
        })
        .collect();
    println!("\n{}", Table::new(rows));

    Ok(())
}
