pub mod clip;
pub mod coord;
pub mod error;
pub mod index;
pub mod projection;
pub mod simplify;

pub use coord::*;
pub use error::*;
pub use index::*;
pub use projection::*;
