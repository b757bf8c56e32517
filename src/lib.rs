//! slotbook — weekly slot-booking consistency engine.
//!
//! Customers reserve fixed time slots in a weekly calendar, an operator can
//! block/unblock slots and delete appointments, and the whole calendar
//! auto-expires every Monday. The store's refusal to overwrite an occupied
//! (date, time) key is the one mechanism that keeps "at most one booking per
//! slot" true under concurrency; everything else is validation, lifecycle
//! and fan-out around it.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod http;
pub mod lifecycle;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod wal;
pub mod week;
