pub mod config;
pub mod error;
pub mod filter;
pub mod marker;

pub use config::*;
pub use error::*;
pub use filter::*;
pub use marker::*;
