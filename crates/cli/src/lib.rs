pub mod config;
pub mod exit_codes;
pub mod job;
pub mod report;

pub use config::JobConfig;
