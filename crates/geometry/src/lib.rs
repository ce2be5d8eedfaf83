pub mod builder;
pub mod extrude;
pub mod faces;
pub mod normals;
pub mod shadow;
pub mod unique;

pub use builder::*;
pub use faces::*;
