pub mod alerting;
pub mod browser;
pub mod config;
pub mod db;
pub mod notifications;
pub mod orchestrator;
pub mod status;
