#[macro_use]
extern crate tracing;

pub mod classifier;
pub mod cli;
pub mod cloud;
pub mod constants;
pub mod cost;
pub mod errors;
pub mod events;
pub mod fanout;
pub mod inventory;
pub mod io_models;
pub mod logger;
pub mod models;
pub mod operation_log;
pub mod report;
pub mod runtime;
pub mod teardown;
