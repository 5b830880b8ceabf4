//! Coordination module - alternates transfers between the two accounts

pub mod accounts;
pub mod engine;
pub mod schedule;

pub use accounts::{Account, AccountLabel, Direction};
pub use engine::{CycleOutcome, CycleReport, PingPongEngine};
pub use schedule::DelaySchedule;
