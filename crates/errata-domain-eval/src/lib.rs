pub mod diff;
pub mod prepare;
pub mod timing;

pub use diff::*;
pub use prepare::*;
pub use timing::*;
