//! Time-ordered 64-bit identifiers with a decimal-string boundary form.
//!
//! Identifiers crossing the system boundary are decimal strings; identifiers
//! used in comparisons, storage, and statement parameters are the internal
//! [`Snowflake`] numeric form. The two round-trip losslessly.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::Value;

/// Milliseconds between the Unix epoch and the identifier epoch
/// (2015-01-01T00:00:00Z).
pub const EPOCH_MS: i64 = 1_420_070_400_000;

const WORKER_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const TIMESTAMP_SHIFT: u32 = WORKER_BITS + SEQUENCE_BITS;
const WORKER_MASK: i64 = (1 << WORKER_BITS) - 1;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

/// A unique, coarsely time-ordered 64-bit identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Snowflake(i64);

impl Snowflake {
    pub fn from_raw(raw: i64) -> Self {
        Snowflake(raw)
    }

    pub fn raw(self) -> i64 {
        self.0
    }

    /// Milliseconds since [`EPOCH_MS`] at which this identifier was minted.
    pub fn timestamp_ms(self) -> i64 {
        self.0 >> TIMESTAMP_SHIFT
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Snowflake)
    }
}

/// Coercion from a boundary value: accepts the internal form as-is and a
/// decimal-string external form. Anything else is a validation error; the
/// message fragment is completed by the caller with the offending key.
impl TryFrom<&Value> for Snowflake {
    type Error = String;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Id(id) => Ok(*id),
            Value::Text(s) => s
                .parse()
                .map_err(|_| format!("\"{s}\" is not a decimal identifier")),
            other => Err(format!("a value of type {} was supplied", other.type_name())),
        }
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnowflakeVisitor;

        impl de::Visitor<'_> for SnowflakeVisitor {
            type Value = Snowflake;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a decimal string or 64-bit integer")
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<Snowflake, E> {
                s.parse().map_err(de::Error::custom)
            }

            fn visit_i64<E: de::Error>(self, n: i64) -> Result<Snowflake, E> {
                Ok(Snowflake(n))
            }

            fn visit_u64<E: de::Error>(self, n: u64) -> Result<Snowflake, E> {
                i64::try_from(n).map(Snowflake).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

#[derive(Debug, Default)]
struct GeneratorState {
    last_ms: i64,
    sequence: i64,
}

/// Source of unique identifiers for one process.
///
/// Layout: 41 bits of milliseconds since the epoch, 10 worker bits, 12
/// sequence bits. Exhausting the sequence within one millisecond advances
/// the logical timestamp, so successive calls are strictly increasing even
/// if the wall clock stalls or rewinds.
#[derive(Debug)]
pub struct SnowflakeGenerator {
    worker: i64,
    state: Mutex<GeneratorState>,
}

impl SnowflakeGenerator {
    pub fn new() -> Self {
        Self::with_worker(0)
    }

    pub fn with_worker(worker: u16) -> Self {
        Self {
            worker: i64::from(worker) & WORKER_MASK,
            state: Mutex::new(GeneratorState::default()),
        }
    }

    pub fn generate(&self) -> Snowflake {
        let now = Utc::now().timestamp_millis() - EPOCH_MS;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let mut ms = now.max(state.last_ms);
        if ms == state.last_ms {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                ms += 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_ms = ms;

        Snowflake(ms << TIMESTAMP_SHIFT | self.worker << SEQUENCE_BITS | state.sequence)
    }
}

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_form_round_trips() {
        let external = "123456789012345678";
        let id: Snowflake = external.parse().unwrap();
        assert_eq!(id.to_string(), external);
    }

    #[test]
    fn generated_ids_are_unique_and_increasing() {
        let generator = SnowflakeGenerator::new();
        let mut previous = generator.generate();
        for _ in 0..5000 {
            let next = generator.generate();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn timestamp_is_recoverable() {
        let generator = SnowflakeGenerator::new();
        let before = Utc::now().timestamp_millis() - EPOCH_MS;
        let id = generator.generate();
        let after = Utc::now().timestamp_millis() - EPOCH_MS;
        // the sequence can push the logical timestamp slightly ahead
        assert!(id.timestamp_ms() >= before);
        assert!(id.timestamp_ms() <= after + 2);
    }

    #[test]
    fn worker_bits_are_masked() {
        let generator = SnowflakeGenerator::with_worker(u16::MAX);
        let id = generator.generate();
        let worker = (id.raw() >> SEQUENCE_BITS) & WORKER_MASK;
        assert_eq!(worker, WORKER_MASK);
    }

    #[test]
    fn coercion_accepts_text_and_id() {
        let id = Snowflake::from_raw(42);
        assert_eq!(Snowflake::try_from(&Value::Id(id)).unwrap(), id);
        assert_eq!(Snowflake::try_from(&Value::from("42")).unwrap(), id);
        assert!(Snowflake::try_from(&Value::from("forty-two")).is_err());
        assert!(Snowflake::try_from(&Value::from(true)).is_err());
    }

    #[test]
    fn serde_uses_the_decimal_string_form() {
        let id = Snowflake::from_raw(123_456_789_012_345_678);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"123456789012345678\"");
        let back: Snowflake = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        let from_number: Snowflake = serde_json::from_str("42").unwrap();
        assert_eq!(from_number, Snowflake::from_raw(42));
    }
}
