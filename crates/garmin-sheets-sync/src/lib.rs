pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod store;
pub mod sync;

pub use error::{GarminError, Result};
