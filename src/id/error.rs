//! Identifier generator errors

use thiserror::Error;

/// Error while minting an identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnowflakeError {
    /// The clock went backwards; the generator is halted from now on
    #[error("Clock moved backwards from {last_timestamp} to {now}; refusing to mint ids")]
    ClockMovedBackwards { last_timestamp: i64, now: i64 },

    #[error("Generator halted after a clock regression at {last_timestamp}")]
    Halted { last_timestamp: i64 },

    #[error("Clock reading {now} is before the epoch {epoch}")]
    ClockBeforeEpoch { now: i64, epoch: i64 },

    #[error("Epoch {epoch} is more than 2^41 ms before the clock reading {now}")]
    EpochOutOfRange { epoch: i64, now: i64 },

    #[error("Clock reading {now} no longer fits the 41-bit timestamp of epoch {epoch}")]
    TimestampOverflow { now: i64, epoch: i64 },

    #[error("Worker id {0} is out of range (0-1023)")]
    InvalidWorkerId(u16),
}
