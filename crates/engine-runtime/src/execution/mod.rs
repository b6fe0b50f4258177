pub mod executor;
pub mod factory;
pub mod job;
pub mod report;
pub mod step;
