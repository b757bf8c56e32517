use chrono::{NaiveDateTime, Utc};
use ulid::Ulid;

use crate::model::{Appointment, Event};
use crate::notify::Notice;
use crate::week::{is_past, WeekWindow};

use super::validate::{parse_slot_key, validate_booking, validate_slot_ref};
use super::{BlockRequest, BookingRequest, Engine, EngineError};

impl Engine {
    /// Customer-facing booking. `now` is the wall-clock instant in the
    /// calendar's timezone; every temporal rule reads it, never the system
    /// clock, so the same request is reproducible in tests.
    ///
    /// Checks run in order and the first failure wins: field shape, week
    /// window, past end instant, standing appointment, standing block. The
    /// pre-checks are an early exit; the store's refusal to overwrite an
    /// occupied key is what actually decides a race.
    pub async fn book_slot(
        &self,
        req: &BookingRequest,
        now: NaiveDateTime,
    ) -> Result<Appointment, EngineError> {
        let booking = validate_booking(req, &self.catalog)?;
        let key = booking.key;

        let window = WeekWindow::containing(now);
        if !window.contains(key.date) {
            return Err(EngineError::OutOfWindow { date: key.date });
        }
        if is_past(key.date, booking.effective_end, now) {
            return Err(EngineError::PastTime {
                date: key.date,
                time: key.time,
            });
        }

        let mut state = self.calendar.write().await;
        if state.appointment_at(&key).is_some() {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL, "kind" => "taken")
                .increment(1);
            return Err(EngineError::SlotTaken {
                date: key.date,
                time: key.time,
            });
        }
        if state.is_blocked(&key) {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL, "kind" => "blocked")
                .increment(1);
            return Err(EngineError::SlotUnavailable {
                date: key.date,
                time: key.time,
            });
        }

        let appointment = Appointment {
            id: Ulid::new(),
            full_name: booking.full_name,
            phone_number: booking.phone_number,
            date: key.date,
            time: key.time,
            treatment: booking.treatment,
            extra_info: booking.extra_info,
            created_at: Utc::now(),
        };
        let applied = self
            .persist_and_apply(
                &mut state,
                Event::AppointmentBooked {
                    appointment: appointment.clone(),
                },
            )
            .await?;
        if !applied {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL, "kind" => "taken")
                .increment(1);
            return Err(EngineError::SlotTaken {
                date: key.date,
                time: key.time,
            });
        }
        Ok(appointment)
    }

    /// Operator takes a slot off the market. The slot must name a catalog
    /// entry but may sit in any week; blocks placed ahead survive until the
    /// reset that covers them.
    pub async fn block_slot(&self, req: &BlockRequest) -> Result<(), EngineError> {
        let key = validate_slot_ref(req, &self.catalog)?;

        let mut state = self.calendar.write().await;
        if state.appointment_at(&key).is_some() {
            return Err(EngineError::SlotTaken {
                date: key.date,
                time: key.time,
            });
        }
        if state.is_blocked(&key) {
            return Err(EngineError::AlreadyBlocked {
                date: key.date,
                time: key.time,
            });
        }

        let applied = self
            .persist_and_apply(
                &mut state,
                Event::SlotBlocked {
                    date: key.date,
                    time: key.time,
                },
            )
            .await?;
        if !applied {
            return Err(EngineError::AlreadyBlocked {
                date: key.date,
                time: key.time,
            });
        }
        Ok(())
    }

    /// Puts a blocked slot back on the market. Idempotent: clearing a slot
    /// nothing blocks still succeeds and still fans out `slot_updated`, so
    /// every viewer converges on the same picture. Returns whether a block
    /// actually stood.
    pub async fn unblock_slot(&self, req: &BlockRequest) -> Result<bool, EngineError> {
        let key = parse_slot_key(req)?;

        let mut state = self.calendar.write().await;
        if !state.is_blocked(&key) {
            drop(state);
            self.notify.send(Notice::SlotUpdated);
            return Ok(false);
        }
        self.persist_and_apply(
            &mut state,
            Event::SlotUnblocked {
                date: key.date,
                time: key.time,
            },
        )
        .await?;
        Ok(true)
    }

    /// Operator delete by id. Idempotent, and deliberately quiet: no notice
    /// goes out, viewers pick the change up on their next full fetch.
    pub async fn delete_appointment(&self, id: &Ulid) -> Result<bool, EngineError> {
        let mut state = self.calendar.write().await;
        if state.appointment_by_id(id).is_none() {
            return Ok(false);
        }
        self.persist_and_apply(&mut state, Event::AppointmentDeleted { id: *id })
            .await?;
        Ok(true)
    }

    /// Drops every record dated outside `window`, both appointments and
    /// blocks, in one logged event. Silent: stale records were never
    /// visible as bookable state, so there is nothing to announce. Returns
    /// how many records went.
    pub async fn purge_outside(&self, window: &WeekWindow) -> Result<usize, EngineError> {
        let mut state = self.calendar.write().await;
        let doomed = state.keys().filter(|key| !window.contains(key.date)).count();
        if doomed == 0 {
            return Ok(0);
        }
        self.persist_and_apply(
            &mut state,
            Event::OutsideWeekPurged {
                monday: window.monday,
                sunday: window.sunday,
            },
        )
        .await?;
        metrics::counter!(crate::observability::PURGED_RECORDS_TOTAL).increment(doomed as u64);
        Ok(doomed)
    }

    /// Monday-morning clean slate: drop everything and tell viewers to
    /// refetch. `weekly_reset` fans out even when the calendar was already
    /// empty. Compacts the log afterwards so it restarts from nothing.
    pub async fn reset_week(&self) -> Result<usize, EngineError> {
        let removed = {
            let mut state = self.calendar.write().await;
            let removed = state.appointment_count() + state.blocked_count();
            self.persist_and_apply(&mut state, Event::CalendarCleared)
                .await?;
            removed
        };
        metrics::counter!(crate::observability::WEEKLY_RESETS_TOTAL).increment(1);
        if removed > 0 {
            metrics::counter!(crate::observability::PURGED_RECORDS_TOTAL)
                .increment(removed as u64);
        }
        self.compact_wal().await?;
        Ok(removed)
    }
}
