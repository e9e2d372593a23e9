pub mod pipeline;
pub mod render;
pub mod report;

pub use pipeline::*;
pub use render::*;
pub use report::*;
