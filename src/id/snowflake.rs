use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::error::SnowflakeError;
use super::worker::{detect_worker_id, WorkerIdSource, WorkerIdentity};

/// 2024-01-01T00:00:00Z in milliseconds
pub const DEFAULT_EPOCH: i64 = 1_704_067_200_000;

const TIMESTAMP_BITS: u32 = 41;
const WORKER_ID_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const WORKER_ID_SHIFT: u32 = SEQUENCE_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + WORKER_ID_BITS;

pub const MAX_WORKER_ID: u16 = (1 << WORKER_ID_BITS) - 1;
pub const MAX_SEQUENCE: i64 = (1 << SEQUENCE_BITS) - 1;
/// Largest number of milliseconds after the epoch an id can carry
pub const MAX_TIMESTAMP: i64 = (1 << TIMESTAMP_BITS) - 1;

static GLOBAL: OnceCell<Snowflake> = OnceCell::new();

/// Millisecond wall clock
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

impl<F> Clock for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now_millis(&self) -> i64 {
        self()
    }
}

/// Generator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowflakeConfig {
    /// Epoch in milliseconds since the Unix epoch
    pub epoch_millis: i64,
    /// Fixed worker id; detected from the host when absent
    pub worker_id: Option<u16>,
}

impl Default for SnowflakeConfig {
    fn default() -> Self {
        Self {
            epoch_millis: DEFAULT_EPOCH,
            worker_id: None,
        }
    }
}

#[derive(Debug)]
struct State {
    last_timestamp: i64,
    sequence: i64,
    halted: bool,
}

/// Snowflake id generator
pub struct Snowflake<C: Clock = SystemClock> {
    epoch: i64,
    worker_id: u16,
    clock: C,
    state: Mutex<State>,
}

impl Snowflake<SystemClock> {
    /// Generator with the default epoch and a worker id detected from the host
    pub fn new() -> Self {
        let identity = detect_worker_id();
        let now = SystemClock.now_millis();
        Self::build(identity.id, DEFAULT_EPOCH, SystemClock, now)
    }

    pub fn from_config(config: &SnowflakeConfig) -> Result<Self, SnowflakeError> {
        let identity = match config.worker_id {
            Some(id) => WorkerIdentity {
                id,
                source: WorkerIdSource::Configured,
            },
            None => detect_worker_id(),
        };
        Self::with_clock(identity.id, config.epoch_millis, SystemClock)
    }

    /// The process-wide generator, created on first use
    pub fn global() -> &'static Snowflake {
        GLOBAL.get_or_init(Snowflake::new)
    }

    /// Create the process-wide generator from configuration
    ///
    /// Has no effect if the generator already exists.
    pub fn init_global(config: &SnowflakeConfig) -> Result<&'static Snowflake, SnowflakeError> {
        GLOBAL.get_or_try_init(|| Snowflake::from_config(config))
    }
}

impl Default for Snowflake<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Snowflake<C> {
    /// Generator with an explicit worker id, epoch and clock
    pub fn with_clock(worker_id: u16, epoch: i64, clock: C) -> Result<Self, SnowflakeError> {
        if worker_id > MAX_WORKER_ID {
            return Err(SnowflakeError::InvalidWorkerId(worker_id));
        }
        let now = clock.now_millis();
        if now >= epoch && !fits_timestamp(now, epoch) {
            return Err(SnowflakeError::EpochOutOfRange { epoch, now });
        }
        Ok(Self::build(worker_id, epoch, clock, now))
    }

    fn build(worker_id: u16, epoch: i64, clock: C, now: i64) -> Self {
        info!(worker_id, epoch, "snowflake generator ready");
        Self {
            epoch,
            worker_id,
            clock,
            state: Mutex::new(State {
                last_timestamp: now,
                sequence: 0,
                halted: false,
            }),
        }
    }

    pub fn worker_id(&self) -> u16 {
        self.worker_id
    }

    pub fn epoch(&self) -> i64 {
        self.epoch
    }

    /// Whether a clock regression has stopped this generator
    pub fn is_halted(&self) -> bool {
        self.state.lock().halted
    }

    /// Mint the next id
    pub fn next_id(&self) -> Result<i64, SnowflakeError> {
        let mut state = self.state.lock();
        if state.halted {
            return Err(SnowflakeError::Halted {
                last_timestamp: state.last_timestamp,
            });
        }

        let mut timestamp = self.clock.now_millis();
        if timestamp < state.last_timestamp {
            state.halted = true;
            error!(
                last_timestamp = state.last_timestamp,
                now = timestamp,
                "clock moved backwards, halting id generation"
            );
            return Err(SnowflakeError::ClockMovedBackwards {
                last_timestamp: state.last_timestamp,
                now: timestamp,
            });
        }
        if timestamp < self.epoch {
            return Err(SnowflakeError::ClockBeforeEpoch {
                now: timestamp,
                epoch: self.epoch,
            });
        }

        if timestamp == state.last_timestamp {
            state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if state.sequence == 0 {
                timestamp = self.wait_next_millis(state.last_timestamp);
            }
        } else {
            state.sequence = 0;
        }
        if !fits_timestamp(timestamp, self.epoch) {
            return Err(SnowflakeError::TimestampOverflow {
                now: timestamp,
                epoch: self.epoch,
            });
        }
        state.last_timestamp = timestamp;

        Ok(((timestamp - self.epoch) << TIMESTAMP_SHIFT)
            | (i64::from(self.worker_id) << WORKER_ID_SHIFT)
            | state.sequence)
    }

    /// Spin until the clock passes `last`
    fn wait_next_millis(&self, last: i64) -> i64 {
        loop {
            let now = self.clock.now_millis();
            if now > last {
                return now;
            }
            std::hint::spin_loop();
        }
    }
}

/// Whether `now` is at or after `epoch` and within the timestamp field
fn fits_timestamp(now: i64, epoch: i64) -> bool {
    matches!(now.checked_sub(epoch), Some(elapsed) if (0..=MAX_TIMESTAMP).contains(&elapsed))
}

/// Fields of an id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParts {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub worker_id: u16,
    pub sequence: i64,
}

/// Split an id minted with `epoch` into its fields
pub fn decompose(id: i64, epoch: i64) -> IdParts {
    IdParts {
        timestamp: (id >> TIMESTAMP_SHIFT) + epoch,
        worker_id: ((id >> WORKER_ID_SHIFT) & i64::from(MAX_WORKER_ID)) as u16,
        sequence: id & MAX_SEQUENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    fn manual_clock(start: i64) -> (Arc<AtomicI64>, impl Fn() -> i64 + Send + Sync) {
        let now = Arc::new(AtomicI64::new(start));
        let handle = now.clone();
        (now, move || handle.load(Ordering::SeqCst))
    }

    #[test]
    fn test_layout() {
        let (now, clock) = manual_clock(DEFAULT_EPOCH + 1000);
        let generator = Snowflake::with_clock(5, DEFAULT_EPOCH, clock).unwrap();
        now.store(DEFAULT_EPOCH + 1001, Ordering::SeqCst);

        let id = generator.next_id().unwrap();
        assert_eq!(id, (1001 << 22) | (5 << 12));
        assert_eq!(
            decompose(id, DEFAULT_EPOCH),
            IdParts {
                timestamp: DEFAULT_EPOCH + 1001,
                worker_id: 5,
                sequence: 0
            }
        );
    }

    #[test]
    fn test_same_millisecond_increments_sequence() {
        let (_now, clock) = manual_clock(DEFAULT_EPOCH + 10);
        let generator = Snowflake::with_clock(1, DEFAULT_EPOCH, clock).unwrap();
        let a = generator.next_id().unwrap();
        let b = generator.next_id().unwrap();
        assert_eq!(b, a + 1);
        assert_eq!(decompose(a, DEFAULT_EPOCH).sequence, 1);
    }

    #[test]
    fn test_regression_halts() {
        let (now, clock) = manual_clock(DEFAULT_EPOCH + 100);
        let generator = Snowflake::with_clock(1, DEFAULT_EPOCH, clock).unwrap();
        generator.next_id().unwrap();

        now.store(DEFAULT_EPOCH + 99, Ordering::SeqCst);
        assert!(matches!(
            generator.next_id(),
            Err(SnowflakeError::ClockMovedBackwards { .. })
        ));
        assert!(generator.is_halted());

        now.store(DEFAULT_EPOCH + 200, Ordering::SeqCst);
        assert!(matches!(
            generator.next_id(),
            Err(SnowflakeError::Halted { .. })
        ));
    }

    #[test]
    fn test_worker_id_range() {
        let (_now, clock) = manual_clock(DEFAULT_EPOCH);
        assert!(matches!(
            Snowflake::with_clock(1024, DEFAULT_EPOCH, clock),
            Err(SnowflakeError::InvalidWorkerId(1024))
        ));
    }

    #[test]
    fn test_timestamp_must_fit_41_bits() {
        assert!(matches!(
            Snowflake::with_clock(1, 0, || (1i64 << 41) + 5),
            Err(SnowflakeError::EpochOutOfRange { epoch: 0, .. })
        ));
        assert!(matches!(
            Snowflake::with_clock(1, -(1i64 << 42), || DEFAULT_EPOCH),
            Err(SnowflakeError::EpochOutOfRange { .. })
        ));
        assert!(matches!(
            Snowflake::with_clock(1, 0, || i64::MAX),
            Err(SnowflakeError::EpochOutOfRange { .. })
        ));

        let (now, clock) = manual_clock(MAX_TIMESTAMP);
        let generator = Snowflake::with_clock(1, 0, clock).unwrap();
        let last = generator.next_id().unwrap();
        assert!(last > 0);
        assert_eq!(decompose(last, 0).timestamp, MAX_TIMESTAMP);

        now.store(MAX_TIMESTAMP + 1, Ordering::SeqCst);
        assert_eq!(
            generator.next_id(),
            Err(SnowflakeError::TimestampOverflow {
                now: MAX_TIMESTAMP + 1,
                epoch: 0
            })
        );
        assert!(!generator.is_halted());
    }

    #[test]
    fn test_clock_before_epoch() {
        let (_now, clock) = manual_clock(DEFAULT_EPOCH - 5);
        let generator = Snowflake::with_clock(0, DEFAULT_EPOCH, clock).unwrap();
        assert!(matches!(
            generator.next_id(),
            Err(SnowflakeError::ClockBeforeEpoch { .. })
        ));
        assert!(!generator.is_halted());
    }
}
