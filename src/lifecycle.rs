use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Days, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use tracing::{error, info};

use crate::engine::{Engine, EngineError};
use crate::week::WeekWindow;

/// Wall-clock time in the calendar's timezone. All temporal validation
/// reads this, so "this week" means the operator's week, not the host's.
pub fn local_now(tz: Tz) -> NaiveDateTime {
    Utc::now().with_timezone(&tz).naive_local()
}

/// Startup sweep: the durable store may hold records from a week the
/// process slept through. Drops everything outside the current window,
/// quietly, then compacts the log so the stale events are gone from disk
/// too.
pub async fn startup_reconcile(engine: &Engine, tz: Tz) -> Result<(), EngineError> {
    let window = WeekWindow::containing(local_now(tz));
    let purged = engine.purge_outside(&window).await?;
    if purged > 0 {
        info!("startup sweep: dropped {purged} stale records outside {window}");
    }
    engine.compact_wal().await
}

/// Background task: sleep until the next configured reset instant, clear
/// the calendar, repeat for the life of the process.
pub async fn run_weekly_reset(engine: Arc<Engine>, tz: Tz, reset_time: NaiveTime) {
    loop {
        let now = Utc::now().with_timezone(&tz);
        let next = next_reset_instant(now, reset_time);
        info!("next weekly reset at {next}");
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;

        match engine.reset_week().await {
            Ok(removed) => info!("weekly reset: cleared {removed} records"),
            Err(e) => error!("weekly reset failed: {e}"),
        }
    }
}

/// First Monday `reset_time` in `after`'s timezone strictly after `after`.
/// Firing exactly at the reset instant therefore schedules the following
/// week, never a double fire.
pub fn next_reset_instant(after: DateTime<Tz>, reset_time: NaiveTime) -> DateTime<Tz> {
    let tz = after.timezone();
    let mut date = after.date_naive();
    loop {
        if date.weekday() == Weekday::Mon {
            let instant = resolve_local(tz, date.and_time(reset_time));
            if instant > after {
                return instant;
            }
        }
        date = date + Days::new(1);
    }
}

/// Map a wall time onto the timeline. A DST gap can swallow the exact
/// wall time; the first valid half-hour after it serves the same purpose.
fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Tz> {
    let mut candidate = local;
    for _ in 0..48 {
        if let Some(instant) = tz.from_local_datetime(&candidate).earliest() {
            return instant;
        }
        candidate = candidate + chrono::Duration::minutes(30);
    }
    tz.from_utc_datetime(&local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SlotCatalog;
    use crate::engine::BookingRequest;
    use crate::notify::NotifyHub;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn amsterdam() -> Tz {
        "Europe/Amsterdam".parse().unwrap()
    }

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("slotbook_test_lifecycle");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn reset_lands_on_next_monday_midnight() {
        let after = amsterdam().with_ymd_and_hms(2025, 6, 11, 12, 0, 0).unwrap();
        let next = next_reset_instant(after, NaiveTime::MIN);
        assert_eq!(next.naive_local(), d("2025-06-16").and_time(NaiveTime::MIN));
    }

    #[test]
    fn sunday_night_rolls_into_monday() {
        let after = amsterdam().with_ymd_and_hms(2025, 6, 15, 23, 59, 0).unwrap();
        let next = next_reset_instant(after, NaiveTime::MIN);
        assert_eq!(next.naive_local(), d("2025-06-16").and_time(NaiveTime::MIN));
    }

    #[test]
    fn firing_exactly_at_reset_waits_a_week() {
        let after = amsterdam().with_ymd_and_hms(2025, 6, 16, 0, 0, 0).unwrap();
        let next = next_reset_instant(after, NaiveTime::MIN);
        assert_eq!(next.naive_local(), d("2025-06-23").and_time(NaiveTime::MIN));
    }

    #[test]
    fn afternoon_reset_can_fire_same_monday() {
        let after = amsterdam().with_ymd_and_hms(2025, 6, 16, 8, 0, 0).unwrap();
        let next = next_reset_instant(after, t("22:00"));
        assert_eq!(next.naive_local(), d("2025-06-16").and_time(t("22:00")));
    }

    #[test]
    fn timezone_decides_which_monday() {
        let instant = Utc.with_ymd_and_hms(2025, 6, 15, 21, 0, 0).unwrap();
        let tokyo: Tz = "Asia/Tokyo".parse().unwrap();

        // 21:00 UTC Sunday is still Sunday in Amsterdam but already Monday
        // morning in Tokyo, so Tokyo's next reset is a week out.
        let next_ams = next_reset_instant(instant.with_timezone(&amsterdam()), NaiveTime::MIN);
        let next_tokyo = next_reset_instant(instant.with_timezone(&tokyo), NaiveTime::MIN);
        assert_eq!(next_ams.date_naive(), d("2025-06-16"));
        assert_eq!(next_tokyo.date_naive(), d("2025-06-23"));
    }

    #[tokio::test]
    async fn startup_sweep_drops_stale_records() {
        let path = test_wal_path("startup_sweep.wal");
        let engine = Engine::new(
            path.clone(),
            SlotCatalog::default(),
            Arc::new(NotifyHub::new()),
        )
        .unwrap();

        // Booked during the week of 2025-06-09, long gone by the time the
        // sweep computes the real current window.
        let then = d("2025-06-11").and_time(t("12:00"));
        let req = BookingRequest {
            full_name: "Jan Jansen".into(),
            phone_number: "+31612345678".into(),
            date: "2025-06-11".into(),
            time: "15:00".into(),
            treatment: "Haircut".into(),
            extra_info: None,
            end_time: None,
        };
        engine.book_slot(&req, then).await.unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);

        startup_reconcile(&engine, amsterdam()).await.unwrap();

        let snapshot = engine.snapshot().await;
        assert!(snapshot.appointments.is_empty());
        assert!(snapshot.blocked_slots.is_empty());
        // Compaction rewrote the emptied calendar as an empty log.
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }
}
