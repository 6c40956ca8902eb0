pub mod config;
pub mod error;
pub mod formats;
pub mod handlers;
pub mod pipeline;
pub mod registry;
pub mod request;
pub mod storage;
pub mod ticket;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
