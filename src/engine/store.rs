use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use ulid::Ulid;

use crate::model::{Appointment, BlockedSlot, Event, SlotKey};

/// The calendar held in memory: appointments and blocks keyed by slot, plus
/// an id index for operator deletes. BTreeMap iteration gives the
/// (date, time) ascending order every listing wants.
///
/// Each collection admits at most one record per key; the entry-based
/// inserts refuse occupied keys instead of overwriting. All access runs
/// under the engine's calendar lock.
#[derive(Debug, Default)]
pub struct CalendarState {
    appointments: BTreeMap<SlotKey, Appointment>,
    blocked: BTreeMap<SlotKey, BlockedSlot>,
    by_id: HashMap<Ulid, SlotKey>,
}

impl CalendarState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Lookups ──────────────────────────────────────────────

    pub fn appointment_at(&self, key: &SlotKey) -> Option<&Appointment> {
        self.appointments.get(key)
    }

    pub fn appointment_by_id(&self, id: &Ulid) -> Option<&Appointment> {
        self.by_id.get(id).and_then(|key| self.appointments.get(key))
    }

    pub fn is_blocked(&self, key: &SlotKey) -> bool {
        self.blocked.contains_key(key)
    }

    pub fn appointment_count(&self) -> usize {
        self.appointments.len()
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }

    // ── Listings (sorted by key) ─────────────────────────────

    pub fn appointments(&self) -> Vec<Appointment> {
        self.appointments.values().cloned().collect()
    }

    pub fn blocked_slots(&self) -> Vec<BlockedSlot> {
        self.blocked.values().cloned().collect()
    }

    /// Keys across both collections, appointments first.
    pub fn keys(&self) -> impl Iterator<Item = &SlotKey> {
        self.appointments.keys().chain(self.blocked.keys())
    }

    // ── Mutation primitives ──────────────────────────────────

    /// Insert an appointment unless the key is occupied. Returns false on a
    /// constraint violation; never overwrites.
    pub fn insert_appointment(&mut self, appointment: Appointment) -> bool {
        match self.appointments.entry(appointment.key()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                self.by_id.insert(appointment.id, appointment.key());
                slot.insert(appointment);
                true
            }
        }
    }

    /// Insert a block unless the key is occupied. Same contract as
    /// `insert_appointment`; the two collections are constrained independently.
    pub fn insert_block(&mut self, block: BlockedSlot) -> bool {
        match self.blocked.entry(block.key()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(block);
                true
            }
        }
    }

    /// Delete by id. No-op returning None when the id is unknown.
    pub fn remove_appointment(&mut self, id: &Ulid) -> Option<Appointment> {
        let key = self.by_id.remove(id)?;
        self.appointments.remove(&key)
    }

    /// Delete by key. No-op returning None when no block stands there.
    pub fn remove_block(&mut self, key: &SlotKey) -> Option<BlockedSlot> {
        self.blocked.remove(key)
    }

    /// Bulk delete across both collections, keeping entries the predicate
    /// wants kept. Returns how many records went.
    pub fn purge_where(&mut self, mut keep: impl FnMut(&SlotKey) -> bool) -> usize {
        let before = self.appointments.len() + self.blocked.len();
        let by_id = &mut self.by_id;
        self.appointments.retain(|key, appointment| {
            let keeping = keep(key);
            if !keeping {
                by_id.remove(&appointment.id);
            }
            keeping
        });
        self.blocked.retain(|key, _| keep(key));
        before - (self.appointments.len() + self.blocked.len())
    }

    /// Drop everything. Returns how many records went.
    pub fn clear(&mut self) -> usize {
        let removed = self.appointments.len() + self.blocked.len();
        self.appointments.clear();
        self.blocked.clear();
        self.by_id.clear();
        removed
    }

    // ── Event application ────────────────────────────────────

    /// Apply one WAL event. Returns false when the event conflicts with the
    /// current state (an occupied key on insert, an unknown id on delete);
    /// replay treats that as a damaged log entry and skips it.
    pub fn apply_event(&mut self, event: &Event) -> bool {
        match event {
            Event::AppointmentBooked { appointment } => {
                self.insert_appointment(appointment.clone())
            }
            Event::AppointmentDeleted { id } => self.remove_appointment(id).is_some(),
            Event::SlotBlocked { date, time } => self.insert_block(BlockedSlot {
                date: *date,
                time: *time,
            }),
            Event::SlotUnblocked { date, time } => {
                self.remove_block(&SlotKey::new(*date, *time)).is_some()
            }
            Event::OutsideWeekPurged { monday, sunday } => {
                let (monday, sunday) = (*monday, *sunday);
                self.purge_where(|key| monday <= key.date && key.date <= sunday);
                true
            }
            Event::CalendarCleared => {
                self.clear();
                true
            }
        }
    }

    /// Minimal event sequence that recreates the current state; the WAL
    /// compactor rewrites the log from this.
    pub fn as_events(&self) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .appointments
            .values()
            .map(|appointment| Event::AppointmentBooked {
                appointment: appointment.clone(),
            })
            .collect();
        events.extend(self.blocked.values().map(|block| Event::SlotBlocked {
            date: block.date,
            time: block.time,
        }));
        events
    }
}
