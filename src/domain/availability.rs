//! Slot availability engine.
//!
//! Candidate start times are generated at `duration`-minute strides inside
//! fixed daily working windows, then every candidate overlapping a
//! confirmed booking is dropped. The computation is pure: the same
//! bookings always produce the same slots, and nothing is cached.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc, Weekday,
};
use serde::{Deserialize, Serialize};

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Exclusive end.
    pub end: DateTime<Utc>,
}

impl TimeSlot {
    /// Creates the slot starting at `start` lasting `minutes`.
    #[must_use]
    pub fn starting_at(start: DateTime<Utc>, minutes: u32) -> Self {
        Self {
            start,
            end: start + Duration::minutes(i64::from(minutes)),
        }
    }

    /// Half-open overlap test. Touching intervals do not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// A daily working window in business-local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingWindow {
    /// Opening time.
    pub start: NaiveTime,
    /// Closing time. No slot may end after it.
    pub end: NaiveTime,
}

impl FromStr for WorkingWindow {
    type Err = String;

    /// Parses `HH:MM-HH:MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("working window must look like 09:00-12:00, got {s:?}"))?;
        let parse = |t: &str| {
            NaiveTime::parse_from_str(t.trim(), "%H:%M")
                .map_err(|e| format!("invalid time {t:?} in working window: {e}"))
        };
        let window = Self {
            start: parse(start)?,
            end: parse(end)?,
        };
        if window.end <= window.start {
            return Err(format!("working window {s:?} ends before it starts"));
        }
        Ok(window)
    }
}

impl fmt::Display for WorkingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Business working schedule: windows, working days and local offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingHours {
    windows: Vec<WorkingWindow>,
    days: Vec<Weekday>,
    offset: FixedOffset,
}

impl WorkingHours {
    /// Creates a schedule.
    #[must_use]
    pub fn new(windows: Vec<WorkingWindow>, days: Vec<Weekday>, offset: FixedOffset) -> Self {
        Self {
            windows,
            days,
            offset,
        }
    }

    /// Daily windows.
    #[must_use]
    pub fn windows(&self) -> &[WorkingWindow] {
        &self.windows
    }

    /// Working days.
    #[must_use]
    pub fn days(&self) -> &[Weekday] {
        &self.days
    }

    /// Business-local UTC offset.
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Windows open on `date` for a listing bookable on `listing_days`
    /// (empty means every working day).
    #[must_use]
    pub fn windows_on(&self, date: NaiveDate, listing_days: &[Weekday]) -> &[WorkingWindow] {
        let weekday = date.weekday();
        let open = self.days.contains(&weekday)
            && (listing_days.is_empty() || listing_days.contains(&weekday));
        if open { &self.windows } else { &[] }
    }

    /// The local calendar day as a UTC interval.
    #[must_use]
    pub fn day_bounds(&self, date: NaiveDate) -> Option<TimeSlot> {
        let start = self.local_to_utc(date, NaiveTime::MIN)?;
        Some(TimeSlot {
            start,
            end: start + Duration::days(1),
        })
    }

    /// Converts a business-local wall-clock time to UTC.
    #[must_use]
    pub fn local_to_utc(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl Default for WorkingHours {
    /// 09:00-12:00 and 14:30-17:30 every day, UTC.
    fn default() -> Self {
        let window = |sh, sm, eh, em| WorkingWindow {
            start: NaiveTime::from_hms_opt(sh, sm, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(eh, em, 0).unwrap_or(NaiveTime::MIN),
        };
        Self {
            windows: vec![window(9, 0, 12, 0), window(14, 30, 17, 30)],
            days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ],
            offset: Utc.fix(),
        }
    }
}

/// Every slot of `duration_minutes` that fits inside the day's windows,
/// in ascending order.
#[must_use]
pub fn candidate_slots(
    hours: &WorkingHours,
    date: NaiveDate,
    listing_days: &[Weekday],
    duration_minutes: u32,
) -> Vec<TimeSlot> {
    if duration_minutes == 0 {
        return Vec::new();
    }
    let stride = Duration::minutes(i64::from(duration_minutes));
    let mut slots = Vec::new();
    for window in hours.windows_on(date, listing_days) {
        let (Some(open), Some(close)) = (
            hours.local_to_utc(date, window.start),
            hours.local_to_utc(date, window.end),
        ) else {
            continue;
        };
        let mut start = open;
        while start + stride <= close {
            slots.push(TimeSlot {
                start,
                end: start + stride,
            });
            start += stride;
        }
    }
    slots
}

/// Candidate slots that overlap none of `booked`.
#[must_use]
pub fn available_slots(
    hours: &WorkingHours,
    date: NaiveDate,
    listing_days: &[Weekday],
    duration_minutes: u32,
    booked: &[TimeSlot],
) -> Vec<TimeSlot> {
    candidate_slots(hours, date, listing_days, duration_minutes)
        .into_iter()
        .filter(|candidate| !booked.iter().any(|b| candidate.overlaps(b)))
        .collect()
}
