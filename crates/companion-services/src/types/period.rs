// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Named statistics periods.
//!
//! Calendar periods (`today`, `week`, `month`, `year`) start at local
//! midnight of the day, Monday, 1st of the month and January 1st.
//! `hour` and `minute` are rolling windows ending now.

use super::dtos::TimeRange;
use super::errors::ServiceError;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Minute,
    Hour,
    Today,
    Week,
    Month,
    Year,
    AllTime,
}

impl Period {
    /// Every period, shortest first
    pub const ALL: [Period; 7] = [
        Period::Minute,
        Period::Hour,
        Period::Today,
        Period::Week,
        Period::Month,
        Period::Year,
        Period::AllTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Minute => "minute",
            Period::Hour => "hour",
            Period::Today => "today",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
            Period::AllTime => "all_time",
        }
    }

    /// First instant covered by the period, `None` for `all_time`
    pub fn start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.with_timezone(&Local).date_naive();
        let start = match self {
            Period::AllTime => return None,
            Period::Minute => now - Duration::minutes(1),
            Period::Hour => now - Duration::hours(1),
            Period::Today => local_midnight(today),
            Period::Week => {
                let monday =
                    today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                local_midnight(monday)
            }
            Period::Month => local_midnight(today.with_day(1).unwrap_or(today)),
            Period::Year => {
                local_midnight(NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today))
            }
        };
        Some(start)
    }

    /// Everything from the period start onward
    pub fn range(&self, now: DateTime<Utc>) -> TimeRange {
        TimeRange {
            start: self.start(now),
            end: None,
        }
    }
}

/// Midnight in the local zone, falling back to UTC midnight when the local
/// instant does not exist (DST gap)
fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive: NaiveDateTime = date.and_time(chrono::NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minute" => Ok(Period::Minute),
            "hour" => Ok(Period::Hour),
            "today" | "day" => Ok(Period::Today),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            "all_time" | "alltime" => Ok(Period::AllTime),
            other => Err(ServiceError::InvalidInput(format!(
                "unknown period '{}' (expected minute, hour, today, week, month, year or all_time)",
                other
            ))),
        }
    }
}
