pub mod daemon;
pub mod diagnose;
pub mod health_check;
pub mod run_once;
