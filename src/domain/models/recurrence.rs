//! Recurrence pattern model and next-occurrence computation.
//!
//! The JSON wire shape is stable and shared with the in-database
//! materializer; the Rust implementation validates patterns and seeds
//! the first `next_occurrence` when a template is created.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult, FieldError};

/// Upper bound on skip-date recursion while hunting for a non-skipped
/// candidate. A template whose skip set swallows this many consecutive
/// candidates is treated as exhausted.
const MAX_SKIP_HOPS: usize = 1000;

/// How often a template fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

/// A recurrence pattern as stored in the template's JSON column.
///
/// Field names follow the wire shape: `daysOfWeek`, `dayOfMonth` and
/// `monthOfYear` are camelCase on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrencePattern {
    pub frequency: Frequency,
    /// Every `interval` days/weeks/months/years. Defaults to 1.
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// ISO weekdays (1 = Monday .. 7 = Sunday); weekly only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
    /// 1..31, or -1 for the last day of the month; monthly only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<i8>,
    /// 1..12; yearly only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_of_year: Option<u8>,
    /// Cap on generated occurrences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// No occurrence is generated at or after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
}

fn default_interval() -> u32 {
    1
}

impl RecurrencePattern {
    /// Validate internal consistency. Returns per-field diagnostics.
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = Vec::new();

        if self.interval == 0 {
            errors.push(FieldError::new("interval", "must be a positive integer"));
        }
        if let Some(ref days) = self.days_of_week {
            if self.frequency != Frequency::Weekly {
                errors.push(FieldError::new(
                    "daysOfWeek",
                    "only valid with weekly frequency",
                ));
            }
            if days.is_empty() || days.iter().any(|d| !(1..=7).contains(d)) {
                errors.push(FieldError::new(
                    "daysOfWeek",
                    "must be a non-empty list of ISO weekdays 1..7",
                ));
            }
        }
        if let Some(day) = self.day_of_month {
            if self.frequency != Frequency::Monthly {
                errors.push(FieldError::new(
                    "dayOfMonth",
                    "only valid with monthly frequency",
                ));
            }
            if day != -1 && !(1..=31).contains(&day) {
                errors.push(FieldError::new("dayOfMonth", "must be 1..31 or -1"));
            }
        }
        if let Some(month) = self.month_of_year {
            if self.frequency != Frequency::Yearly {
                errors.push(FieldError::new(
                    "monthOfYear",
                    "only valid with yearly frequency",
                ));
            }
            if !(1..=12).contains(&month) {
                errors.push(FieldError::new("monthOfYear", "must be 1..12"));
            }
        }
        if self.count == Some(0) {
            errors.push(FieldError::new("count", "must be a positive integer"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::ValidationDetails(errors))
        }
    }

    /// Compute the occurrence following `base`, honoring skip dates and
    /// the `until` bound. Returns `None` when the pattern is exhausted.
    ///
    /// Skip dates are calendar-date stamps: when a candidate lands on
    /// one, the computation recurses with the candidate as the new base
    /// until a non-skipped date is found.
    pub fn next_occurrence(
        &self,
        base: DateTime<Utc>,
        skip_dates: &[NaiveDate],
    ) -> Option<DateTime<Utc>> {
        let mut candidate = self.advance(base)?;
        let mut hops = 0;
        while skip_dates.contains(&candidate.date_naive()) {
            hops += 1;
            if hops > MAX_SKIP_HOPS {
                return None;
            }
            candidate = self.advance(candidate)?;
        }
        if let Some(until) = self.until {
            if candidate > until {
                return None;
            }
        }
        Some(candidate)
    }

    /// One step of the pattern, ignoring skip dates and bounds.
    fn advance(&self, base: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let interval = self.interval.max(1);
        match self.frequency {
            Frequency::Daily => base.checked_add_days(Days::new(u64::from(interval))),
            Frequency::Weekly => match &self.days_of_week {
                Some(days) if !days.is_empty() => {
                    // Walk forward a day at a time until an allowed ISO
                    // weekday is hit.
                    let mut candidate = base.checked_add_days(Days::new(1))?;
                    for _ in 0..7 * interval.max(1) as usize + 7 {
                        let weekday = candidate.weekday().number_from_monday() as u8;
                        if days.contains(&weekday) {
                            return Some(candidate);
                        }
                        candidate = candidate.checked_add_days(Days::new(1))?;
                    }
                    None
                }
                _ => base.checked_add_days(Days::new(u64::from(interval) * 7)),
            },
            Frequency::Monthly => {
                let candidate = base.checked_add_months(Months::new(interval))?;
                match self.day_of_month {
                    Some(-1) => with_day_clamped(candidate, 31),
                    Some(day) if day > 0 => with_day_clamped(candidate, day as u32),
                    _ => Some(candidate),
                }
            }
            Frequency::Yearly => {
                let candidate = base.checked_add_months(Months::new(interval * 12))?;
                match self.month_of_year {
                    Some(month) => with_month_clamped(candidate, u32::from(month)),
                    None => Some(candidate),
                }
            }
        }
    }
}

/// Set the day-of-month, clamping to the month's length.
fn with_day_clamped(dt: DateTime<Utc>, day: u32) -> Option<DateTime<Utc>> {
    let clamped = day.min(days_in_month(dt.year(), dt.month()));
    dt.with_day(clamped)
}

/// Set the month, clamping the day to the target month's length.
fn with_month_clamped(dt: DateTime<Utc>, month: u32) -> Option<DateTime<Utc>> {
    let day = dt.day().min(days_in_month(dt.year(), month));
    dt.with_day(1)?.with_month(month)?.with_day(day)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// Outcome of one materializer attempt for one template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceRunStatus {
    Success,
    Error,
    Skipped,
}

impl RecurrenceRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

/// One row of the append-only materializer audit log.
///
/// Written by the in-database procedure; the application only reads
/// these for the monitoring surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceLogEntry {
    pub id: uuid::Uuid,
    pub parent_task_id: uuid::Uuid,
    pub generated_task_id: Option<uuid::Uuid>,
    /// The `next_occurrence` the run fired for.
    pub scheduled_for: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
    pub status: RecurrenceRunStatus,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn daily() -> RecurrencePattern {
        RecurrencePattern {
            frequency: Frequency::Daily,
            interval: 1,
            days_of_week: None,
            day_of_month: None,
            month_of_year: None,
            count: None,
            until: None,
        }
    }

    #[test]
    fn daily_adds_interval_days() {
        let base = utc(2025, 10, 15, 10, 0, 0);
        let next = daily().next_occurrence(base, &[]).unwrap();
        assert_eq!(next, utc(2025, 10, 16, 10, 0, 0));
    }

    #[test]
    fn weekly_day_set_lands_on_next_allowed_weekday() {
        // Monday with Mon/Wed/Fri selected advances to Wednesday.
        let pattern = RecurrencePattern {
            frequency: Frequency::Weekly,
            days_of_week: Some(vec![1, 3, 5]),
            ..daily()
        };
        let base = utc(2025, 10, 13, 9, 0, 0);
        assert_eq!(base.weekday().number_from_monday(), 1);
        let next = pattern.next_occurrence(base, &[]).unwrap();
        assert_eq!(next, utc(2025, 10, 15, 9, 0, 0));
        // Friday wraps around to Monday.
        let friday = utc(2025, 10, 17, 9, 0, 0);
        let wrapped = pattern.next_occurrence(friday, &[]).unwrap();
        assert_eq!(wrapped, utc(2025, 10, 20, 9, 0, 0));
    }

    #[test]
    fn weekly_without_day_set_jumps_whole_weeks() {
        let pattern = RecurrencePattern {
            frequency: Frequency::Weekly,
            interval: 2,
            ..daily()
        };
        let base = utc(2025, 10, 13, 9, 0, 0);
        let next = pattern.next_occurrence(base, &[]).unwrap();
        assert_eq!(next, utc(2025, 10, 27, 9, 0, 0));
    }

    #[test]
    fn monthly_last_day_snaps_to_month_end() {
        let pattern = RecurrencePattern {
            frequency: Frequency::Monthly,
            day_of_month: Some(-1),
            ..daily()
        };
        let base = utc(2025, 10, 31, 0, 0, 0);
        let next = pattern.next_occurrence(base, &[]).unwrap();
        assert_eq!(next, utc(2025, 11, 30, 0, 0, 0));
        let following = pattern.next_occurrence(next, &[]).unwrap();
        assert_eq!(following, utc(2025, 12, 31, 0, 0, 0));
    }

    #[test]
    fn monthly_fixed_day_clamps_short_months() {
        let pattern = RecurrencePattern {
            frequency: Frequency::Monthly,
            day_of_month: Some(31),
            ..daily()
        };
        let base = utc(2026, 1, 31, 8, 30, 0);
        let next = pattern.next_occurrence(base, &[]).unwrap();
        assert_eq!(next, utc(2026, 2, 28, 8, 30, 0));
    }

    #[test]
    fn yearly_snaps_month_of_year() {
        let pattern = RecurrencePattern {
            frequency: Frequency::Yearly,
            month_of_year: Some(2),
            ..daily()
        };
        let base = utc(2025, 2, 28, 12, 0, 0);
        let next = pattern.next_occurrence(base, &[]).unwrap();
        assert_eq!(next, utc(2026, 2, 28, 12, 0, 0));
    }

    #[test]
    fn skip_dates_recurse_until_clear() {
        let skips = vec![
            NaiveDate::from_ymd_opt(2025, 10, 16).unwrap(),
            NaiveDate::from_ymd_opt(2025, 10, 17).unwrap(),
        ];
        let base = utc(2025, 10, 15, 10, 0, 0);
        let next = daily().next_occurrence(base, &skips).unwrap();
        assert_eq!(next, utc(2025, 10, 18, 10, 0, 0));
    }

    #[test]
    fn until_bound_exhausts_pattern() {
        let pattern = RecurrencePattern {
            until: Some(utc(2025, 10, 15, 23, 59, 59)),
            ..daily()
        };
        let base = utc(2025, 10, 15, 10, 0, 0);
        assert_eq!(pattern.next_occurrence(base, &[]), None);
    }

    #[test]
    fn wire_shape_uses_camel_case_keys() {
        let json = r#"{
            "frequency": "weekly",
            "interval": 1,
            "daysOfWeek": [1, 3, 5]
        }"#;
        let pattern: RecurrencePattern = serde_json::from_str(json).unwrap();
        assert_eq!(pattern.frequency, Frequency::Weekly);
        assert_eq!(pattern.days_of_week, Some(vec![1, 3, 5]));

        let out = serde_json::to_value(&pattern).unwrap();
        assert!(out.get("daysOfWeek").is_some());
        assert!(out.get("days_of_week").is_none());
    }

    #[test]
    fn interval_defaults_to_one_when_omitted() {
        let pattern: RecurrencePattern =
            serde_json::from_str(r#"{"frequency": "daily"}"#).unwrap();
        assert_eq!(pattern.interval, 1);
    }

    #[test]
    fn validation_rejects_misplaced_fields() {
        let pattern = RecurrencePattern {
            frequency: Frequency::Daily,
            days_of_week: Some(vec![1]),
            ..daily()
        };
        let err = pattern.validate().unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let pattern = RecurrencePattern {
            frequency: Frequency::Monthly,
            day_of_month: Some(0),
            ..daily()
        };
        assert!(pattern.validate().is_err());

        let pattern = RecurrencePattern {
            frequency: Frequency::Monthly,
            day_of_month: Some(-1),
            ..daily()
        };
        assert!(pattern.validate().is_ok());
    }
}
