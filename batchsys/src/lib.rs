pub mod error;
pub mod random;
pub mod replay;

pub use error::BatchSysError;
pub use random::RandomBatchSystem;
pub use replay::{LoadedTrace, ReplayBatchSystem};
