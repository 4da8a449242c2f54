// 🎯 Goal helpers - body progress and deadline progress for AI prompts

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationType {
    #[serde(alias = "day", alias = "jours", alias = "jour")]
    Days,
    #[serde(alias = "week", alias = "semaines", alias = "semaine")]
    Weeks,
    #[serde(alias = "month", alias = "mois")]
    Months,
}

/// A member goal. Stored upstream either as a bare string or as an object;
/// an object without a complete duration is treated as a simple goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawGoal", untagged)]
pub enum GoalData {
    Simple {
        value: String,
    },
    Timed {
        value: String,
        duration_value: u32,
        duration_type: DurationType,
        start_date: NaiveDate,
    },
}

/// Duration fields are captured loosely: form input often sends numbers as
/// strings, and unknown units must not reject the whole goal.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawGoal {
    Text(String),
    Object {
        #[serde(default)]
        value: String,
        #[serde(default, alias = "durationValue")]
        duration_value: Option<Value>,
        #[serde(default, alias = "durationType")]
        duration_type: Option<Value>,
        #[serde(default, alias = "startDate")]
        start_date: Option<Value>,
    },
}

fn parse_duration_value(raw: &Value) -> Option<u32> {
    match raw {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_duration_type(raw: &Value) -> Option<DurationType> {
    let unit = raw.as_str()?.trim().to_lowercase();
    serde_json::from_value(Value::String(unit)).ok()
}

/// `YYYY-MM-DD`, also accepting a timestamp with that prefix
fn parse_start_date(raw: &Value) -> Option<NaiveDate> {
    let text = raw.as_str()?.trim();
    text.get(..10)
        .unwrap_or(text)
        .parse()
        .ok()
}

impl From<RawGoal> for GoalData {
    fn from(raw: RawGoal) -> Self {
        match raw {
            RawGoal::Text(value) => GoalData::Simple { value },
            RawGoal::Object {
                value,
                duration_value,
                duration_type,
                start_date,
            } => {
                let timed = (
                    duration_value.as_ref().and_then(parse_duration_value),
                    duration_type.as_ref().and_then(parse_duration_type),
                    start_date.as_ref().and_then(parse_start_date),
                );
                match timed {
                    (Some(duration_value), Some(duration_type), Some(start_date)) => GoalData::Timed {
                        value,
                        duration_value,
                        duration_type,
                        start_date,
                    },
                    _ => GoalData::Simple { value },
                }
            }
        }
    }
}

impl GoalData {
    pub fn value(&self) -> &str {
        match self {
            GoalData::Simple { value } | GoalData::Timed { value, .. } => value,
        }
    }

    /// Deadline view for timed goals
    pub fn deadline(&self, today: NaiveDate) -> Option<DeadlineProgress> {
        match self {
            GoalData::Simple { .. } => None,
            GoalData::Timed {
                duration_value,
                duration_type,
                start_date,
                ..
            } => deadline_progress(*start_date, *duration_value, *duration_type, today),
        }
    }
}

// ============================================================================
// BODY PROGRESS
// ============================================================================

/// Percent of a numeric target reached, in [0,100]. For time goals a lower
/// achieved value is better, so the ratio is inverted.
pub fn body_progress(target: f64, achieved: f64, is_time: bool) -> f64 {
    if target <= 0.0 || achieved <= 0.0 || !target.is_finite() || !achieved.is_finite() {
        return 0.0;
    }
    let ratio = if is_time { target / achieved } else { achieved / target };
    (ratio * 100.0).clamp(0.0, 100.0)
}

// ============================================================================
// DEADLINE PROGRESS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineStatus {
    OnTrack,
    /// 30 days or fewer left
    Approaching,
    /// 7 days or fewer left
    Urgent,
    Expired,
}

impl DeadlineStatus {
    pub fn from_days_remaining(days: i64) -> Self {
        if days < 0 {
            DeadlineStatus::Expired
        } else if days <= 7 {
            DeadlineStatus::Urgent
        } else if days <= 30 {
            DeadlineStatus::Approaching
        } else {
            DeadlineStatus::OnTrack
        }
    }
}

impl fmt::Display for DeadlineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeadlineStatus::OnTrack => "on_track",
            DeadlineStatus::Approaching => "approaching",
            DeadlineStatus::Urgent => "urgent",
            DeadlineStatus::Expired => "expired",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeadlineProgress {
    pub end_date: NaiveDate,
    /// Elapsed share of the goal window, in [0,100]
    pub percent: f64,
    pub days_remaining: i64,
    pub status: DeadlineStatus,
}

pub fn deadline_end(start: NaiveDate, duration_value: u32, duration_type: DurationType) -> Option<NaiveDate> {
    match duration_type {
        DurationType::Days => start.checked_add_days(Days::new(duration_value as u64)),
        DurationType::Weeks => start.checked_add_days(Days::new(duration_value as u64 * 7)),
        DurationType::Months => start.checked_add_months(Months::new(duration_value)),
    }
}

/// None only when the end date overflows the calendar
pub fn deadline_progress(
    start: NaiveDate,
    duration_value: u32,
    duration_type: DurationType,
    today: NaiveDate,
) -> Option<DeadlineProgress> {
    let end = deadline_end(start, duration_value, duration_type)?;

    let total = (end - start).num_days();
    let elapsed = (today - start).num_days();
    let percent = if total <= 0 {
        100.0
    } else {
        (elapsed as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    };
    let days_remaining = (end - today).num_days();

    Some(DeadlineProgress {
        end_date: end,
        percent,
        days_remaining,
        status: DeadlineStatus::from_days_remaining(days_remaining),
    })
}
