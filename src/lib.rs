pub use crate::errors::EngineError;

pub mod config;
pub mod errors;
pub mod events;
pub mod executor;
pub mod remote;
pub mod request;
pub mod runner;
pub mod selector;
pub mod suite;
pub mod summary;
pub mod task;
