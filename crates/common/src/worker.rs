mod worker_loop;

pub use worker_loop::*;
