pub mod correlate;
pub mod layout;
pub mod midi_import;
pub mod model;
pub mod note_log;
pub mod page_links;
pub mod table;

pub use correlate::*;
pub use layout::*;
pub use midi_import::*;
pub use model::*;
pub use note_log::*;
pub use page_links::*;
pub use table::*;
