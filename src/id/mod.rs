//! Time-ordered 64-bit identifiers
//!
//! Ids are Snowflake-style: milliseconds since an epoch, a worker id that
//! distinguishes concurrently running processes, and a per-millisecond
//! sequence. One generator instance runs per process.
//!
//! ```text
//!  63  62                        22 21        12 11          0
//! +---+----------------------------+------------+-------------+
//! | 0 |  timestamp - epoch (41)    | worker (10)| sequence(12)|
//! +---+----------------------------+------------+-------------+
//! ```

mod error;
mod snowflake;
pub mod worker;

pub use error::SnowflakeError;
pub use snowflake::{
    decompose, Clock, IdParts, Snowflake, SnowflakeConfig, SystemClock, DEFAULT_EPOCH,
    MAX_SEQUENCE, MAX_WORKER_ID,
};
pub use worker::{detect_worker_id, WorkerIdSource, WorkerIdentity};
