use chrono::{NaiveDate, NaiveTime};

#[derive(Debug)]
pub enum EngineError {
    /// Missing or malformed input, including a time no catalog slot starts at.
    Validation(String),
    /// Date falls outside the week window containing the current instant.
    OutOfWindow { date: NaiveDate },
    /// Effective end instant lies strictly before the current instant.
    PastTime { date: NaiveDate, time: NaiveTime },
    /// An appointment already occupies the slot.
    SlotTaken { date: NaiveDate, time: NaiveTime },
    /// The operator has taken the slot off the market.
    SlotUnavailable { date: NaiveDate, time: NaiveTime },
    /// A block already stands on the slot.
    AlreadyBlocked { date: NaiveDate, time: NaiveTime },
    /// Persistence failure; not client-correctable.
    Store(String),
}

impl EngineError {
    /// Stable machine-readable kind, carried in failure responses and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation_error",
            EngineError::OutOfWindow { .. } => "out_of_window",
            EngineError::PastTime { .. } => "past_time",
            EngineError::SlotTaken { .. } => "slot_taken",
            EngineError::SlotUnavailable { .. } => "slot_unavailable",
            EngineError::AlreadyBlocked { .. } => "already_blocked",
            EngineError::Store(_) => "store_error",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(reason) => write!(f, "invalid request: {reason}"),
            EngineError::OutOfWindow { date } => {
                write!(f, "{date} is outside the current booking week")
            }
            EngineError::PastTime { date, time } => {
                write!(f, "slot {date} {} is already in the past", time.format("%H:%M"))
            }
            EngineError::SlotTaken { date, time } => {
                write!(f, "slot {date} {} is already taken", time.format("%H:%M"))
            }
            EngineError::SlotUnavailable { date, time } => {
                write!(f, "slot {date} {} is not available", time.format("%H:%M"))
            }
            EngineError::AlreadyBlocked { date, time } => {
                write!(f, "slot {date} {} is already blocked", time.format("%H:%M"))
            }
            EngineError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
