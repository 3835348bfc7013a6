pub mod cancel;
pub mod config;
pub mod error;
pub mod types;

pub use cancel::CancelFlag;
pub use error::{Result, SimError};
