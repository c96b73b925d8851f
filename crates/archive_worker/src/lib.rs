pub mod archive_worker;
pub mod s3;

pub use archive_worker::*;
pub use s3::*;
