//! Background processing.

mod scheduler;

pub use scheduler::{Scheduler, SchedulerConfig, start_counter_sweep};
