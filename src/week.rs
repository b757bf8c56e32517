use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime};

/// The Monday..Sunday span containing a reference instant. Derived on every
/// use from a caller-supplied "now", never cached — after a week boundary the
/// next call sees the new window, which is what makes stale rows detectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub monday: NaiveDate,
    pub sunday: NaiveDate,
}

impl WeekWindow {
    pub fn containing(now: NaiveDateTime) -> Self {
        let monday = now.date() - Days::new(u64::from(now.weekday().num_days_from_monday()));
        Self {
            monday,
            sunday: monday + Days::new(6),
        }
    }

    /// Whole-day containment: monday <= date <= sunday.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.monday <= date && date <= self.sunday
    }
}

impl std::fmt::Display for WeekWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.monday, self.sunday)
    }
}

/// True iff the instant formed from `date` and `end` lies strictly before
/// `now`. An instant exactly at `now` is not past.
pub fn is_past(date: NaiveDate, end: NaiveTime, now: NaiveDateTime) -> bool {
    date.and_time(end) < now
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    #[test]
    fn midweek_reference() {
        let window = WeekWindow::containing(dt("2025-06-11 12:00"));
        assert_eq!(window.monday, d("2025-06-09"));
        assert_eq!(window.sunday, d("2025-06-15"));
    }

    #[test]
    fn monday_midnight_starts_its_own_week() {
        let window = WeekWindow::containing(dt("2025-06-09 00:00"));
        assert_eq!(window.monday, d("2025-06-09"));
    }

    #[test]
    fn sunday_night_still_belongs_to_the_closing_week() {
        let window = WeekWindow::containing(dt("2025-06-15 23:59"));
        assert_eq!(window.monday, d("2025-06-09"));
        assert_eq!(window.sunday, d("2025-06-15"));
    }

    #[test]
    fn contains_exactly_the_seven_days() {
        let window = WeekWindow::containing(dt("2025-06-11 12:00"));
        for day in 9..=15 {
            assert!(window.contains(d(&format!("2025-06-{day:02}"))));
        }
        // Adjacent Sunday and Monday of the neighboring weeks fall outside.
        assert!(!window.contains(d("2025-06-08")));
        assert!(!window.contains(d("2025-06-16")));
    }

    #[test]
    fn window_crossing_month_boundary() {
        // Wednesday 2025-07-02: the week starts back in June.
        let window = WeekWindow::containing(dt("2025-07-02 09:00"));
        assert_eq!(window.monday, d("2025-06-30"));
        assert_eq!(window.sunday, d("2025-07-06"));
    }

    #[test]
    fn window_crossing_year_boundary() {
        // Thursday 2026-01-01: the week starts in 2025.
        let window = WeekWindow::containing(dt("2026-01-01 12:00"));
        assert_eq!(window.monday, d("2025-12-29"));
        assert_eq!(window.sunday, d("2026-01-04"));
    }

    #[test]
    fn is_past_is_strict() {
        let now = dt("2025-06-11 15:00");
        assert!(is_past(d("2025-06-11"), t("14:59"), now));
        assert!(!is_past(d("2025-06-11"), t("15:00"), now));
        assert!(!is_past(d("2025-06-11"), t("15:01"), now));
    }

    #[test]
    fn is_past_across_days() {
        let now = dt("2025-06-11 08:00");
        assert!(is_past(d("2025-06-10"), t("23:59"), now));
        assert!(!is_past(d("2025-06-12"), t("00:00"), now));
    }

    #[test]
    fn display_formats_span() {
        let window = WeekWindow::containing(dt("2025-06-11 12:00"));
        assert_eq!(window.to_string(), "2025-06-09..2025-06-15");
    }
}
