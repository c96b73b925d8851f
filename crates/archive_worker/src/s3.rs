pub mod archive_sink;
pub mod object_store;

pub use archive_sink::*;
pub use object_store::*;
