// Scheduler module: turns job schedules into dispatched runs

pub mod engine;

pub use engine::{JobDispatcher, LogDispatcher, ScheduledRun, Scheduler, SchedulerEngine};
