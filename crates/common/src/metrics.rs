mod emf;
mod record;

pub use emf::*;
pub use record::*;
