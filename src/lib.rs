//! Weekpass — conversational assistant for weekly 48-hour destination
//! requests.

pub mod channels;
pub mod config;
pub mod destinations;
pub mod directory;
pub mod engine;
pub mod error;
pub mod export;
pub mod gate;
pub mod roster;
pub mod store;
