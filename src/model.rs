use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Serde adapter for `HH:MM` wire format on slot times.
/// Chrono's default `NaiveTime` serde carries seconds; the calendar never does.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(de)?;
        NaiveTime::parse_from_str(&s, "%H:%M").map_err(serde::de::Error::custom)
    }
}

/// The calendar key: one bookable slot. Sorts by (date, time) ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
}

impl SlotKey {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.date, self.time.format("%H:%M"))
    }
}

/// A confirmed booking. Never updated in place — only created and deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Ulid,
    pub full_name: String,
    pub phone_number: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub treatment: String,
    #[serde(default)]
    pub extra_info: String,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.date, self.time)
    }
}

/// A slot the operator has taken off the market. No appointment exists at
/// this key while the block stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedSlot {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
}

impl BlockedSlot {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.date, self.time)
    }
}

/// Both collections as a client sees them, in (date, time) order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSnapshot {
    pub appointments: Vec<Appointment>,
    pub blocked_slots: Vec<BlockedSlot>,
}

/// The event types — flat, no nesting. This is the WAL record format;
/// replaying the sequence reproduces the calendar exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    AppointmentBooked {
        appointment: Appointment,
    },
    AppointmentDeleted {
        id: Ulid,
    },
    SlotBlocked {
        date: NaiveDate,
        #[serde(with = "hhmm")]
        time: NaiveTime,
    },
    SlotUnblocked {
        date: NaiveDate,
        #[serde(with = "hhmm")]
        time: NaiveTime,
    },
    /// Startup reconciliation: everything dated outside [monday, sunday] goes.
    OutsideWeekPurged {
        monday: NaiveDate,
        sunday: NaiveDate,
    },
    /// Weekly reset: both collections emptied.
    CalendarCleared,
}
