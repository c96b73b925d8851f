pub mod dynamo;
pub mod record_worker;

pub use dynamo::*;
pub use record_worker::*;
