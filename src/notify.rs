use serde::Serialize;
use tokio::sync::broadcast;

use crate::limits::NOTIFY_CHANNEL_CAPACITY;
use crate::model::{Appointment, Event};

/// What viewers receive. Exactly three kinds; only `AppointmentCreated`
/// carries a payload — the empty kinds tell viewers to re-fetch everything.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Notice {
    AppointmentCreated(Appointment),
    SlotUpdated,
    WeeklyReset,
}

impl Notice {
    /// Stable event name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Notice::AppointmentCreated(_) => "appointment_created",
            Notice::SlotUpdated => "slot_updated",
            Notice::WeeklyReset => "weekly_reset",
        }
    }

    /// Which notice a committed event fans out as. Individual deletions and
    /// the startup purge map to None: viewers pick those up on their next
    /// full fetch.
    pub fn for_event(event: &Event) -> Option<Notice> {
        match event {
            Event::AppointmentBooked { appointment } => {
                Some(Notice::AppointmentCreated(appointment.clone()))
            }
            Event::SlotBlocked { .. } | Event::SlotUnblocked { .. } => Some(Notice::SlotUpdated),
            Event::CalendarCleared => Some(Notice::WeeklyReset),
            Event::AppointmentDeleted { .. } | Event::OutsideWeekPurged { .. } => None,
        }
    }
}

/// Broadcast hub fanning calendar notices out to every connected viewer.
/// Delivery is best-effort, at-most-once: a viewer that lags past the
/// channel capacity or is disconnected simply misses events and reconciles
/// on its next full fetch.
pub struct NotifyHub {
    tx: broadcast::Sender<Notice>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFY_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    /// Send a notice. No-op if nobody is listening.
    pub fn send(&self, notice: Notice) {
        let _ = self.tx.send(notice);
    }

    pub fn viewer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ulid::Ulid;

    fn appointment() -> Appointment {
        Appointment {
            id: Ulid::new(),
            full_name: "Jan Jansen".into(),
            phone_number: "+31612345678".into(),
            date: "2025-06-09".parse().unwrap(),
            time: chrono::NaiveTime::parse_from_str("15:00", "%H:%M").unwrap(),
            treatment: "Haircut".into(),
            extra_info: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe();

        hub.send(Notice::SlotUpdated);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, Notice::SlotUpdated);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        // No subscriber — should not panic
        hub.send(Notice::WeeklyReset);
    }

    #[tokio::test]
    async fn lagged_viewer_drops_oldest() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe();

        for _ in 0..(NOTIFY_CHANNEL_CAPACITY + 1) {
            hub.send(Notice::SlotUpdated);
        }

        // The overflowed receiver reports the lag, then resumes.
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert_eq!(rx.recv().await.unwrap(), Notice::SlotUpdated);
    }

    #[test]
    fn booked_event_carries_the_full_record() {
        let apt = appointment();
        let notice = Notice::for_event(&Event::AppointmentBooked {
            appointment: apt.clone(),
        });
        assert_eq!(notice, Some(Notice::AppointmentCreated(apt)));
    }

    #[test]
    fn block_and_unblock_fan_out_without_payload() {
        let date = "2025-06-10".parse().unwrap();
        let time = chrono::NaiveTime::parse_from_str("16:30", "%H:%M").unwrap();
        assert_eq!(
            Notice::for_event(&Event::SlotBlocked { date, time }),
            Some(Notice::SlotUpdated)
        );
        assert_eq!(
            Notice::for_event(&Event::SlotUnblocked { date, time }),
            Some(Notice::SlotUpdated)
        );
    }

    #[test]
    fn deletion_and_purge_stay_silent() {
        assert_eq!(
            Notice::for_event(&Event::AppointmentDeleted { id: Ulid::new() }),
            None
        );
        assert_eq!(
            Notice::for_event(&Event::OutsideWeekPurged {
                monday: "2025-06-09".parse().unwrap(),
                sunday: "2025-06-15".parse().unwrap(),
            }),
            None
        );
    }

    #[test]
    fn reset_fans_out_as_weekly_reset() {
        assert_eq!(
            Notice::for_event(&Event::CalendarCleared),
            Some(Notice::WeeklyReset)
        );
    }

    #[test]
    fn notice_names_are_stable() {
        assert_eq!(Notice::AppointmentCreated(appointment()).name(), "appointment_created");
        assert_eq!(Notice::SlotUpdated.name(), "slot_updated");
        assert_eq!(Notice::WeeklyReset.name(), "weekly_reset");
    }
}
