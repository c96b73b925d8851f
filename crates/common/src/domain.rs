mod codec;
mod envelope;
mod record;

pub use codec::*;
pub use envelope::*;
pub use record::*;
