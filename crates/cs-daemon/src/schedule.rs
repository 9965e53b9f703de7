// schedule.rs: Weekly trigger rule in a named time zone.
//
// The rule fires once a week at a local wall-clock time. Local times that
// don't exist (spring-forward gap) fire an hour later; local times that
// occur twice (fall-back) fire on the first occurrence.

use std::fmt;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::config::ScheduleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySchedule {
    pub weekday: Weekday,
    pub hour: u32,
    pub minute: u32,
    pub timezone: Tz,
}

impl WeeklySchedule {
    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        let weekday: Weekday = config
            .weekday
            .parse()
            .map_err(|_| anyhow!("unknown weekday '{}'", config.weekday))?;
        if config.hour > 23 {
            bail!("schedule.hour must be 0-23, got {}", config.hour);
        }
        if config.minute > 59 {
            bail!("schedule.minute must be 0-59, got {}", config.minute);
        }
        let timezone: Tz = config
            .timezone
            .parse()
            .map_err(|e| anyhow!("unknown time zone '{}': {}", config.timezone, e))?;

        Ok(Self {
            weekday,
            hour: config.hour,
            minute: config.minute,
            timezone,
        })
    }

    /// First firing instant strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let today = after.with_timezone(&self.timezone).date_naive();
        // Two weeks of candidates always contain a firing after `after`.
        for offset in 0..14 {
            let date = today + Duration::days(offset);
            if date.weekday() != self.weekday {
                continue;
            }
            if let Some(at) = self.fire_time_on(date) {
                if at > after {
                    return at;
                }
            }
        }
        after + Duration::weeks(1)
    }

    /// The next `count` firing instants after `after`.
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = after;
        for _ in 0..count {
            cursor = self.next_after(cursor);
            out.push(cursor);
        }
        out
    }

    fn fire_time_on(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let local = date.and_hms_opt(self.hour, self.minute, 0)?;
        let tz = self.timezone;
        tz.from_local_datetime(&local)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
            .map(|t| t.with_timezone(&Utc))
    }
}

impl fmt::Display for WeeklySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "every {} {:02}:{:02} ({})",
            self.weekday,
            self.hour,
            self.minute,
            self.timezone.name()
        )
    }
}
