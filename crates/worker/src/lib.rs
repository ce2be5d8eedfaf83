pub mod actor;
pub mod error;
pub mod layer_worker;
pub mod options;
pub mod packager;
pub mod pool;
pub mod source;
pub mod stats;

pub use actor::WorkerHandle;
pub use error::*;
pub use layer_worker::*;
pub use options::*;
pub use packager::*;
pub use pool::*;
pub use source::*;
pub use stats::*;
