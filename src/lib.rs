pub mod chain;
pub mod config;
pub mod error;
pub mod logging;
pub mod pool;
pub mod scan;
pub mod script;
pub mod tx;

pub use error::{Result, SwapError};
