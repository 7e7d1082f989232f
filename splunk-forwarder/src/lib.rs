pub mod api;
pub mod app_context;
pub mod cloudevent;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod hec;
pub mod metrics_consts;
pub mod outcome;
pub mod splitter;
