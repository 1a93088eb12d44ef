pub mod config;
pub mod error;
pub mod message;

pub use config::Config;
pub use error::*;
pub use message::*;
