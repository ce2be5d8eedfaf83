pub mod bounds;
pub mod buffer;
pub mod ids;
pub mod index_type;
pub mod math;

// Foundation crate: small, well-tested primitives only.
pub use bounds::*;
pub use buffer::*;
pub use ids::*;
pub use index_type::*;
