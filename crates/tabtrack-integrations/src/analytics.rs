//! Productivity metrics, letter grades and insights.
//!
//! These are the numbers the backend analytics endpoints serve. The same math
//! runs locally over stored sessions so reports work offline.

use serde::{Deserialize, Serialize};
use tabtrack_storage::{Category, Session};

use crate::payload::ActivityRecord;

/// Something that spent time in a category on a domain
pub trait TimedActivity {
    fn category(&self) -> Category;
    fn time_spent_ms(&self) -> i64;
    fn domain(&self) -> &str;
}

impl TimedActivity for ActivityRecord {
    fn category(&self) -> Category {
        self.category
    }

    fn time_spent_ms(&self) -> i64 {
        self.time_spent
    }

    fn domain(&self) -> &str {
        &self.domain
    }
}

impl TimedActivity for Session {
    fn category(&self) -> Category {
        self.category
    }

    fn time_spent_ms(&self) -> i64 {
        self.duration_ms
    }

    fn domain(&self) -> &str {
        &self.domain
    }
}

/// Percentage of productive time, rounded; 0 when nothing was tracked
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn productivity_percentage(productive_ms: i64, total_ms: i64) -> u8 {
    if total_ms <= 0 {
        return 0;
    }
    let pct = (productive_ms as f64 / total_ms as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Totals over a period, as served by `/api/analytics/productivity`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductivityMetrics {
    pub total_time: i64,
    pub productive_time: i64,
    pub unproductive_time: i64,
    pub sessions_count: usize,
    pub productivity_score: u8,
}

impl ProductivityMetrics {
    #[must_use]
    pub fn from_activities<T: TimedActivity>(activities: &[T]) -> Self {
        let mut total_time = 0;
        let mut productive_time = 0;
        let mut unproductive_time = 0;

        for activity in activities {
            let spent = activity.time_spent_ms();
            total_time += spent;
            if activity.category().is_productive() {
                productive_time += spent;
            } else if activity.category() == Category::Unproductive {
                unproductive_time += spent;
            }
        }

        Self {
            total_time,
            productive_time,
            unproductive_time,
            sessions_count: activities.len(),
            productivity_score: productivity_percentage(productive_time, total_time),
        }
    }
}

/// Letter grade for a 0-100 productivity score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Self::APlus,
            80..=89 => Self::A,
            70..=79 => Self::B,
            60..=69 => Self::C,
            50..=59 => Self::D,
            _ => Self::F,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }

    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::APlus => "Exceptional Performance",
            Self::A => "Excellent Performance",
            Self::B => "Good Performance",
            Self::C => "Average Performance",
            Self::D => "Below Average",
            Self::F => "Needs Improvement",
        }
    }

    #[must_use]
    pub const fn color(&self) -> &'static str {
        match self {
            Self::APlus => "#00C851",
            Self::A => "#2E7D32",
            Self::B => "#FFA000",
            Self::C => "#FF6F00",
            Self::D => "#E65100",
            Self::F => "#D32F2F",
        }
    }
}

/// Grade as it appears on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeInfo {
    pub grade: String,
    pub description: String,
    pub color: String,
}

impl From<Grade> for GradeInfo {
    fn from(grade: Grade) -> Self {
        Self {
            grade: grade.label().to_string(),
            description: grade.description().to_string(),
            color: grade.color().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Info,
    Success,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub message: String,
}

impl Insight {
    fn new(kind: InsightKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Short textual hints for a score. `activities` must be ordered oldest first;
/// the last one is reported as the most recent activity.
#[must_use]
pub fn generate_insights<T: TimedActivity>(activities: &[T], score: u8) -> Vec<Insight> {
    let Some(latest) = activities.last() else {
        return vec![Insight::new(
            InsightKind::Info,
            "Start browsing to generate insights!",
        )];
    };

    let mut insights = Vec::new();
    if score > 80 {
        insights.push(Insight::new(
            InsightKind::Success,
            "Excellent productivity today!",
        ));
    } else if score < 40 {
        insights.push(Insight::new(
            InsightKind::Warning,
            "Try visiting more productive sites to improve your score",
        ));
    }

    insights.push(Insight::new(
        InsightKind::Info,
        format!(
            "Recent activity: {} ({})",
            latest.domain(),
            latest.category()
        ),
    ));
    insights
}

/// Trailing-window score, as served by `/api/analytics/score`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub score: u8,
    pub grade: GradeInfo,
    pub insights: Vec<Insight>,
}

impl ScoreReport {
    #[must_use]
    pub fn from_activities<T: TimedActivity>(activities: &[T]) -> Self {
        let score = ProductivityMetrics::from_activities(activities).productivity_score;
        Self {
            score,
            grade: Grade::from_score(score).into(),
            insights: generate_insights(activities, score),
        }
    }
}
