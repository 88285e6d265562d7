pub mod db;
pub mod migrations;
pub mod models;

pub use db::{generate_id, Database};
pub use models::{
    Category, DailyAggregate, DomainOverride, ParseCategoryError, PendingSync, Session, Settings,
    SettingsError, SettingsPatch,
};
