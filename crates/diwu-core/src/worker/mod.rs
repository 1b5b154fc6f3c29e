//! One-shot worker processes.

pub mod process;
pub mod protocol;

pub use process::{ProcessRunner, WorkerOutcome, WorkerRunner};
pub use protocol::{parse_reply_line, Reply, WorkerRequest, REPLY_PREFIX};
