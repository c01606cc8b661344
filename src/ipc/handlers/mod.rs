pub mod backup_exchange;
pub mod core;
pub mod exams;
pub mod progress;
pub mod questions;
pub mod session;
pub mod stats;
pub mod tags;
