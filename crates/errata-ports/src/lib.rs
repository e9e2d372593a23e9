pub mod midi;
pub mod storage;
pub mod types;
pub mod warning;

pub use midi::*;
pub use storage::*;
pub use types::*;
pub use warning::*;
