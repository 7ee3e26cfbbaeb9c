use crate::common::get_current_time_or_zero;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

const NODE_ID_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const MAX_NODE_ID: u64 = (1 << NODE_ID_BITS) - 1;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

// Twitter snowflake epoch: 2010-11-04T01:42:54.657Z
const CUSTOM_EPOCH: u64 = 1_288_834_974_657;

/// Generates unique, time-ordered 64-bit identifiers.
///
/// Identifiers are composed of a millisecond timestamp, a per-process node
/// id, and a per-millisecond sequence. Ids produced by a single process are
/// strictly increasing, which keeps the primary map in insertion order.
pub(crate) struct SnowflakeIdGenerator {
    node_id: u64,
    last_timestamp: AtomicU64,
    sequence: AtomicU64,
    lock: Mutex<()>,
}

impl SnowflakeIdGenerator {
    pub(crate) fn new() -> Self {
        SnowflakeIdGenerator {
            node_id: Self::create_node_id(),
            last_timestamp: AtomicU64::new(0),
            sequence: AtomicU64::new(0),
            lock: Mutex::new(()),
        }
    }

    fn create_node_id() -> u64 {
        let uuid = uuid::Uuid::new_v4();
        let mut node_id = 0u64;
        for byte in uuid.as_bytes() {
            node_id = node_id.wrapping_mul(31).wrapping_add(*byte as u64);
        }
        node_id ^= OsRng.gen::<u64>();
        node_id & MAX_NODE_ID
    }

    pub(crate) fn next_id(&self) -> u64 {
        let _guard = self.lock.lock();

        let mut current_timestamp = self.timestamp();
        let last_timestamp = self.last_timestamp.load(Ordering::Acquire);

        // Tolerate small backward clock drift by reusing the last timestamp.
        if current_timestamp < last_timestamp {
            current_timestamp = last_timestamp;
        }

        let sequence = if current_timestamp == last_timestamp {
            let next = (self.sequence.load(Ordering::Acquire) + 1) & MAX_SEQUENCE;
            if next == 0 {
                // Sequence exhausted within this millisecond.
                current_timestamp = self.wait_next_millis(current_timestamp);
            }
            next
        } else {
            0
        };

        self.last_timestamp.store(current_timestamp, Ordering::Release);
        self.sequence.store(sequence, Ordering::Release);

        ((current_timestamp - CUSTOM_EPOCH) << (NODE_ID_BITS + SEQUENCE_BITS))
            | (self.node_id << SEQUENCE_BITS)
            | sequence
    }

    fn timestamp(&self) -> u64 {
        get_current_time_or_zero() as u64
    }

    fn wait_next_millis(&self, current_timestamp: u64) -> u64 {
        let mut timestamp = self.timestamp();
        while timestamp <= current_timestamp {
            std::hint::spin_loop();
            timestamp = self.timestamp();
        }
        timestamp
    }
}
