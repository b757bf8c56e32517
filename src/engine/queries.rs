use crate::model::{Appointment, CalendarSnapshot};

use super::Engine;

impl Engine {
    /// Both collections in one consistent read, each sorted by (date, time).
    pub async fn snapshot(&self) -> CalendarSnapshot {
        let state = self.calendar.read().await;
        CalendarSnapshot {
            appointments: state.appointments(),
            blocked_slots: state.blocked_slots(),
        }
    }

    /// Appointments only, sorted by (date, time).
    pub async fn appointments_sorted(&self) -> Vec<Appointment> {
        self.calendar.read().await.appointments()
    }
}
