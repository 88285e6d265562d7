/// Settings and domain override command handlers
use anyhow::Result;
use tabled::{Table, Tabled};
use tabtrack_core::{aggregation::format_duration, ClassificationSource, Classifier};
use tabtrack_storage::{Category, DomainOverride, Settings};

use super::helpers::{on_off, open_database, RULE};

#[derive(Tabled, Debug, PartialEq, Eq)]
struct SettingRow {
    #[tabled(rename = "Setting")]
    key: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct OverrideRow {
    #[tabled(rename = "Domain")]
    domain: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Added")]
    added: String,
}

fn setting_rows(settings: &Settings) -> Vec<SettingRow> {
    let flag = |key, value| SettingRow {
        key,
        value: on_off(value).to_string(),
    };
    let millis = |key, value: i64| SettingRow {
        key,
        value: format!("{value} ({})", format_duration(value)),
    };
    vec![
        flag("focusMode", settings.focus_mode),
        flag("breakReminders", settings.break_reminders),
        flag("deepWorkMode", settings.deep_work_mode),
        flag("pomodoroTimer", settings.pomodoro_timer),
        flag("blockDistractions", settings.block_distractions),
        flag("trackMouseMovement", settings.track_mouse_movement),
        flag("trackKeystrokes", settings.track_keystrokes),
        millis("idleThreshold", settings.idle_threshold),
        millis("breakInterval", settings.break_interval),
        millis("pomodoroLength", settings.pomodoro_length),
    ]
}

pub fn handle_settings_show() -> Result<()> {
    let db = open_database()?;
    let settings = db.get_settings()?;

    println!("Settings");
    println!("{RULE}");
    println!("{}", Table::new(setting_rows(&settings)));
    println!("\nChanges apply the next time the browser starts the host.");
    Ok(())
}

pub fn handle_settings_set(key: &str, value: &str) -> Result<()> {
    let db = open_database()?;
    let mut settings = db.get_settings()?;
    settings.set(key, value)?;
    db.save_settings(&settings)?;
    println!("Set {key} = {value}");
    Ok(())
}

pub fn handle_toggle_focus() -> Result<()> {
    let db = open_database()?;
    let mut settings = db.get_settings()?;
    settings.focus_mode = !settings.focus_mode;
    db.save_settings(&settings)?;
    println!("Focus mode {}", on_off(settings.focus_mode));
    Ok(())
}

pub fn handle_override_list() -> Result<()> {
    let db = open_database()?;
    let overrides = db.get_domain_overrides()?;

    if overrides.is_empty() {
        println!("No domain overrides. Add one with: tabtrack override add <domain> <category>");
        return Ok(());
    }

    let rows: Vec<OverrideRow> = overrides
        .into_iter()
        .map(|o| OverrideRow {
            domain: o.domain,
            category: o.category.to_string(),
            added: o.created_at.format("%Y-%m-%d").to_string(),
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

pub fn handle_override_add(domain: &str, category: &str) -> Result<()> {
    let category: Category = category.parse().map_err(|_| {
        anyhow::anyhow!(
            "Unknown category '{category}'. Use one of: {}",
            Category::ALL.map(|c| c.as_str()).join(", ")
        )
    })?;
    let domain = normalize_domain(domain);

    let db = open_database()?;
    db.upsert_domain_override(&DomainOverride::new(domain.clone(), category))?;
    println!("'{domain}' is now classified as {category}");
    Ok(())
}

pub fn handle_override_remove(domain: &str) -> Result<()> {
    let domain = normalize_domain(domain);
    let db = open_database()?;
    if db.delete_domain_override(&domain)? {
        println!("Removed override for '{domain}'");
    } else {
        println!("No override for '{domain}'");
    }
    Ok(())
}

pub fn handle_classify(url: &str) -> Result<()> {
    let db = open_database()?;
    let classifier = Classifier::from_database(&db)?;
    let result = classifier.classify_full(url);

    let source = match result.source {
        ClassificationSource::Override => "domain override".to_string(),
        ClassificationSource::BuiltInRule { weight } => format!("built-in rule (weight {weight})"),
        ClassificationSource::Heuristic => "URL heuristic".to_string(),
    };
    println!("Domain:   {}", result.domain);
    println!("Category: {}", result.category);
    println!("Source:   {source}");
    Ok(())
}

/// Overrides are keyed the way domains are extracted from URLs
fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim().to_lowercase();
    domain
        .strip_prefix("www.")
        .map_or_else(|| domain.clone(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain(" WWW.GitHub.com "), "github.com");
        assert_eq!(normalize_domain("docs.rs"), "docs.rs");
    }

    #[test]
    fn test_setting_rows_cover_every_key() {
        let rows = setting_rows(&Settings::default());
        assert_eq!(rows.len(), 10);
        let mut settings = Settings::default();
        for row in &rows {
            let value = if row.value == "on" || row.value == "off" {
                (row.value == "on").to_string()
            } else {
                row.value.split(' ').next().unwrap().to_string()
            };
            settings.set(row.key, &value).unwrap();
        }
        assert_eq!(settings, Settings::default());
    }
}
