use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::catalog::SlotCatalog;
use crate::limits::*;
use crate::model::SlotKey;

use super::EngineError;

/// Booking attempt exactly as clients send it. Absent fields deserialize
/// as empty so the validator can name each one in its report.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub treatment: String,
    #[serde(default)]
    pub extra_info: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

/// Slot reference as sent by the operator block/unblock endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRequest {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
}

/// A booking that cleared shape validation. `effective_end` is what the
/// temporal check compares against: the explicit end time when one was
/// supplied, the start time otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidBooking {
    pub full_name: String,
    pub phone_number: String,
    pub key: SlotKey,
    pub treatment: String,
    pub extra_info: String,
    pub effective_end: NaiveTime,
}

/// Shape checks for a booking attempt: required fields, length caps, date
/// and time formats, then membership in the slot catalog. First failure
/// wins. Temporal and occupancy rules are layered on by the caller.
pub fn validate_booking(
    req: &BookingRequest,
    catalog: &SlotCatalog,
) -> Result<ValidBooking, EngineError> {
    let full_name = required(&req.full_name, "fullName")?;
    let phone_number = required(&req.phone_number, "phoneNumber")?;
    let date_raw = required(&req.date, "date")?;
    let time_raw = required(&req.time, "time")?;
    let treatment = required(&req.treatment, "treatment")?;

    capped(full_name, "fullName", MAX_NAME_LEN)?;
    capped(phone_number, "phoneNumber", MAX_PHONE_LEN)?;
    capped(treatment, "treatment", MAX_TREATMENT_LEN)?;
    let extra_info = req.extra_info.as_deref().unwrap_or("").trim();
    capped(extra_info, "extraInfo", MAX_EXTRA_INFO_LEN)?;

    let date = parse_date(date_raw)?;
    let time = parse_time(time_raw, "time")?;
    let effective_end = match req.end_time.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => parse_time(raw, "endTime")?,
        _ => time,
    };

    check_in_catalog(date, time, catalog)?;

    Ok(ValidBooking {
        full_name: full_name.to_string(),
        phone_number: phone_number.to_string(),
        key: SlotKey::new(date, time),
        treatment: treatment.to_string(),
        extra_info: extra_info.to_string(),
        effective_end,
    })
}

/// Shape checks for a block request. Blocks must name a real catalog slot
/// but may sit in any week; the operator blocks ahead of time.
pub fn validate_slot_ref(
    req: &BlockRequest,
    catalog: &SlotCatalog,
) -> Result<SlotKey, EngineError> {
    let key = parse_slot_key(req)?;
    check_in_catalog(key.date, key.time, catalog)?;
    Ok(key)
}

/// Shape checks only, no catalog membership. Unblocking clears whatever
/// stands at the key, including blocks left behind by a slot-table change.
pub fn parse_slot_key(req: &BlockRequest) -> Result<SlotKey, EngineError> {
    let date = parse_date(required(&req.date, "date")?)?;
    let time = parse_time(required(&req.time, "time")?, "time")?;
    Ok(SlotKey::new(date, time))
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!("{field} is required")));
    }
    Ok(trimmed)
}

fn capped(value: &str, field: &str, max: usize) -> Result<(), EngineError> {
    if value.chars().count() > max {
        return Err(EngineError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

fn parse_date(value: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| EngineError::Validation("date must be formatted as YYYY-MM-DD".into()))
}

fn parse_time(value: &str, field: &str) -> Result<NaiveTime, EngineError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| EngineError::Validation(format!("{field} must be formatted as HH:MM")))
}

fn check_in_catalog(
    date: NaiveDate,
    time: NaiveTime,
    catalog: &SlotCatalog,
) -> Result<(), EngineError> {
    if !catalog.contains(date.weekday(), time) {
        return Err(EngineError::Validation(format!(
            "{} is not a bookable time on {date}",
            time.format("%H:%M")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn request() -> BookingRequest {
        BookingRequest {
            full_name: "Jan Jansen".into(),
            phone_number: "+31612345678".into(),
            date: "2025-06-09".into(),
            time: "15:00".into(),
            treatment: "Haircut".into(),
            extra_info: None,
            end_time: None,
        }
    }

    fn reason(result: Result<ValidBooking, EngineError>) -> String {
        match result {
            Err(EngineError::Validation(reason)) => reason,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_request_passes() {
        let booking = validate_booking(&request(), &SlotCatalog::default()).unwrap();
        assert_eq!(booking.key.date, "2025-06-09".parse().unwrap());
        assert_eq!(booking.key.time, t("15:00"));
        assert_eq!(booking.effective_end, t("15:00"));
        assert_eq!(booking.extra_info, "");
    }

    #[test]
    fn missing_fields_are_named() {
        let catalog = SlotCatalog::default();
        let blank = |patch: fn(&mut BookingRequest)| {
            let mut req = request();
            patch(&mut req);
            reason(validate_booking(&req, &catalog))
        };
        assert_eq!(blank(|r| r.full_name.clear()), "fullName is required");
        assert_eq!(blank(|r| r.phone_number = "   ".into()), "phoneNumber is required");
        assert_eq!(blank(|r| r.date.clear()), "date is required");
        assert_eq!(blank(|r| r.time.clear()), "time is required");
        assert_eq!(blank(|r| r.treatment.clear()), "treatment is required");
    }

    #[test]
    fn first_failure_wins() {
        let mut req = request();
        req.full_name.clear();
        req.date = "junk".into();
        assert_eq!(
            reason(validate_booking(&req, &SlotCatalog::default())),
            "fullName is required"
        );
    }

    #[test]
    fn overlong_field_is_rejected() {
        let mut req = request();
        req.full_name = "x".repeat(MAX_NAME_LEN + 1);
        assert_eq!(
            reason(validate_booking(&req, &SlotCatalog::default())),
            format!("fullName must be at most {MAX_NAME_LEN} characters")
        );
    }

    #[test]
    fn malformed_date_is_rejected() {
        let catalog = SlotCatalog::default();
        for bad in ["09-06-2025", "2025/06/09", "2025-13-40", "today"] {
            let mut req = request();
            req.date = bad.into();
            assert_eq!(
                reason(validate_booking(&req, &catalog)),
                "date must be formatted as YYYY-MM-DD"
            );
        }
    }

    #[test]
    fn malformed_time_is_rejected() {
        let mut req = request();
        req.time = "3 pm".into();
        assert_eq!(
            reason(validate_booking(&req, &SlotCatalog::default())),
            "time must be formatted as HH:MM"
        );
    }

    #[test]
    fn malformed_end_time_is_rejected() {
        let mut req = request();
        req.end_time = Some("later".into());
        assert_eq!(
            reason(validate_booking(&req, &SlotCatalog::default())),
            "endTime must be formatted as HH:MM"
        );
    }

    #[test]
    fn end_time_overrides_effective_end() {
        let mut req = request();
        req.end_time = Some("16:30".into());
        let booking = validate_booking(&req, &SlotCatalog::default()).unwrap();
        assert_eq!(booking.effective_end, t("16:30"));
        assert_eq!(booking.key.time, t("15:00"));
    }

    #[test]
    fn blank_end_time_falls_back_to_start() {
        let mut req = request();
        req.end_time = Some("   ".into());
        let booking = validate_booking(&req, &SlotCatalog::default()).unwrap();
        assert_eq!(booking.effective_end, t("15:00"));
    }

    #[test]
    fn weekend_time_is_rejected_on_a_weekday() {
        let mut req = request();
        req.time = "10:30".into(); // weekend-only start, 2025-06-09 is a Monday
        assert_eq!(
            reason(validate_booking(&req, &SlotCatalog::default())),
            "10:30 is not a bookable time on 2025-06-09"
        );
    }

    #[test]
    fn weekend_time_is_accepted_on_a_weekend() {
        let mut req = request();
        req.date = "2025-06-14".into(); // Saturday
        req.time = "10:30".into();
        assert!(validate_booking(&req, &SlotCatalog::default()).is_ok());
    }

    #[test]
    fn fields_are_trimmed() {
        let mut req = request();
        req.full_name = "  Jan Jansen  ".into();
        req.extra_info = Some("  please be quick  ".into());
        let booking = validate_booking(&req, &SlotCatalog::default()).unwrap();
        assert_eq!(booking.full_name, "Jan Jansen");
        assert_eq!(booking.extra_info, "please be quick");
    }

    #[test]
    fn block_ref_requires_a_catalog_slot() {
        let catalog = SlotCatalog::default();
        let req = BlockRequest {
            date: "2025-06-09".into(),
            time: "10:30".into(),
        };
        assert!(matches!(
            validate_slot_ref(&req, &catalog),
            Err(EngineError::Validation(_))
        ));

        let req = BlockRequest {
            date: "2025-06-09".into(),
            time: "15:00".into(),
        };
        assert!(validate_slot_ref(&req, &catalog).is_ok());
    }

    #[test]
    fn block_ref_rejects_malformed_input() {
        let req = BlockRequest {
            date: "junk".into(),
            time: "15:00".into(),
        };
        assert!(matches!(
            validate_slot_ref(&req, &SlotCatalog::default()),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn unblock_key_skips_the_catalog() {
        let req = BlockRequest {
            date: "2025-06-09".into(),
            time: "10:30".into(),
        };
        let key = parse_slot_key(&req).unwrap();
        assert_eq!(key.time, t("10:30"));
    }

    #[test]
    fn unblock_key_still_rejects_malformed_time() {
        let req = BlockRequest {
            date: "2025-06-09".into(),
            time: "half past ten".into(),
        };
        assert!(matches!(
            parse_slot_key(&req),
            Err(EngineError::Validation(_))
        ));
    }
}
