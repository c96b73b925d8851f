mod emitter;
mod header;
mod segment;

pub use emitter::*;
pub use header::*;
pub use segment::*;
