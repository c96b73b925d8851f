mod poller;
mod sqs_client;
mod traits;

pub use poller::*;
pub use sqs_client::*;
pub use traits::*;
