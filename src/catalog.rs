use chrono::{NaiveTime, Weekday};
use serde::Serialize;

use crate::model::hhmm;

/// Which slot list applies to a calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn of(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sat | Weekday::Sun => DayType::Weekend,
            _ => DayType::Weekday,
        }
    }
}

/// One bookable window within a day. Static configuration, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotDefinition {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

/// Malformed slot-list configuration string.
#[derive(Debug)]
pub struct SlotSyntaxError {
    pub entry: String,
    pub reason: &'static str,
}

impl std::fmt::Display for SlotSyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bad slot entry {:?}: {}", self.entry, self.reason)
    }
}

impl std::error::Error for SlotSyntaxError {}

/// The slot lists per day-type plus the derived row axis for calendar grids.
/// Built once at startup, shared read-only.
#[derive(Debug, Clone, Serialize)]
pub struct SlotCatalog {
    pub weekday: Vec<SlotDefinition>,
    pub weekend: Vec<SlotDefinition>,
}

impl Default for SlotCatalog {
    fn default() -> Self {
        Self {
            weekday: parse_slots("15:00-16:30,16:30-17:45").unwrap(),
            weekend: parse_slots("10:30-12:00,12:00-13:30,13:30-15:00,15:00-16:30,16:30-17:45")
                .unwrap(),
        }
    }
}

impl SlotCatalog {
    pub fn new(weekday: Vec<SlotDefinition>, weekend: Vec<SlotDefinition>) -> Self {
        Self { weekday, weekend }
    }

    /// Slot list for a given day, ordered by start time.
    pub fn slots_for(&self, weekday: Weekday) -> &[SlotDefinition] {
        match DayType::of(weekday) {
            DayType::Weekday => &self.weekday,
            DayType::Weekend => &self.weekend,
        }
    }

    /// Look up the slot starting at `start` on the given day.
    pub fn find(&self, weekday: Weekday, start: NaiveTime) -> Option<&SlotDefinition> {
        self.slots_for(weekday).iter().find(|s| s.start == start)
    }

    pub fn contains(&self, weekday: Weekday, start: NaiveTime) -> bool {
        self.find(weekday, start).is_some()
    }

    /// Sorted, deduplicated union of every start time across both day-types.
    /// This is the canonical row set for any calendar rendering.
    pub fn start_times(&self) -> Vec<NaiveTime> {
        let mut times: Vec<NaiveTime> = self
            .weekday
            .iter()
            .chain(self.weekend.iter())
            .map(|s| s.start)
            .collect();
        times.sort();
        times.dedup();
        times
    }
}

/// Parse a `HH:MM-HH:MM,HH:MM-HH:MM,...` list into sorted slot definitions.
pub fn parse_slots(list: &str) -> Result<Vec<SlotDefinition>, SlotSyntaxError> {
    let mut slots = Vec::new();
    for entry in list.split(',') {
        let entry = entry.trim();
        let Some((start, end)) = entry.split_once('-') else {
            return Err(SlotSyntaxError {
                entry: entry.into(),
                reason: "expected HH:MM-HH:MM",
            });
        };
        let parse = |s: &str| NaiveTime::parse_from_str(s.trim(), "%H:%M");
        let (Ok(start), Ok(end)) = (parse(start), parse(end)) else {
            return Err(SlotSyntaxError {
                entry: entry.into(),
                reason: "times must be HH:MM",
            });
        };
        if start >= end {
            return Err(SlotSyntaxError {
                entry: entry.into(),
                reason: "start must be before end",
            });
        }
        slots.push(SlotDefinition { start, end });
    }
    slots.sort_by_key(|s| s.start);
    for pair in slots.windows(2) {
        if pair[0].start == pair[1].start {
            return Err(SlotSyntaxError {
                entry: list.into(),
                reason: "duplicate start time",
            });
        }
    }
    Ok(slots)
}
