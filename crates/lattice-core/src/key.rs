//! The [`CacheKey`] trait connects a cache's compile-time key type to the
//! wire codec. Implementations exist only for the key types the platform
//! actually broadcasts; a type outside this set cannot be registered for a
//! propagating cache at all, which moves the "unsupported key" failure from
//! decode time on the far side to compile time on the near side.

use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{CacheError, Result};
use crate::wire::WireKey;

/// A cache key that can cross the invalidation wire.
pub trait CacheKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// Encode this key for broadcast.
    fn to_wire(&self) -> Result<WireKey>;

    /// Decode a received wire key back into this type.
    fn from_wire(wire: &WireKey) -> Result<Self>;
}

impl CacheKey for i64 {
    fn to_wire(&self) -> Result<WireKey> {
        Ok(WireKey::Int64(*self))
    }

    fn from_wire(wire: &WireKey) -> Result<Self> {
        match wire {
            WireKey::Int64(value) => Ok(*value),
            WireKey::Text(_) => Err(CacheError::decode("expected an int64 key, got text")),
        }
    }
}

impl CacheKey for String {
    fn to_wire(&self) -> Result<WireKey> {
        Ok(WireKey::Text(self.clone()))
    }

    fn from_wire(wire: &WireKey) -> Result<Self> {
        match wire {
            WireKey::Text(value) => Ok(value.clone()),
            WireKey::Int64(_) => Err(CacheError::decode("expected a text key, got int64")),
        }
    }
}

/// `u64` rides on the int64 wire form; values above `i64::MAX` have no wire
/// representation and are rejected at publish time.
impl CacheKey for u64 {
    fn to_wire(&self) -> Result<WireKey> {
        i64::try_from(*self)
            .map(WireKey::Int64)
            .map_err(|_| CacheError::UnsupportedKeyType("u64 key exceeds the int64 wire range"))
    }

    fn from_wire(wire: &WireKey) -> Result<Self> {
        match wire {
            WireKey::Int64(value) => u64::try_from(*value)
                .map_err(|_| CacheError::decode("negative int64 key for a u64 cache")),
            WireKey::Text(_) => Err(CacheError::decode("expected an int64 key, got text")),
        }
    }
}

/// UUIDs travel in their canonical hyphenated text form.
impl CacheKey for uuid::Uuid {
    fn to_wire(&self) -> Result<WireKey> {
        Ok(WireKey::Text(self.to_string()))
    }

    fn from_wire(wire: &WireKey) -> Result<Self> {
        match wire {
            WireKey::Text(value) => value
                .parse()
                .map_err(|e| CacheError::decode(format!("bad uuid key {value:?}: {e}"))),
            WireKey::Int64(_) => Err(CacheError::decode("expected a uuid key, got int64")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i64_round_trips() {
        let wire = 42i64.to_wire().unwrap();
        assert_eq!(i64::from_wire(&wire).unwrap(), 42);
    }

    #[test]
    fn test_string_round_trips() {
        let wire = "user:7".to_string().to_wire().unwrap();
        assert_eq!(String::from_wire(&wire).unwrap(), "user:7");
    }

    #[test]
    fn test_u64_within_range_round_trips() {
        let wire = 7u64.to_wire().unwrap();
        assert_eq!(wire, WireKey::Int64(7));
        assert_eq!(u64::from_wire(&wire).unwrap(), 7);
    }

    #[test]
    fn test_u64_above_i64_max_is_unsupported() {
        let err = u64::MAX.to_wire().unwrap_err();
        assert!(matches!(err, CacheError::UnsupportedKeyType(_)));
    }

    #[test]
    fn test_uuid_round_trips_as_text() {
        let id = uuid::Uuid::new_v4();
        let wire = id.to_wire().unwrap();
        assert_eq!(wire.key_type(), crate::wire::KeyType::Text);
        assert_eq!(uuid::Uuid::from_wire(&wire).unwrap(), id);
    }

    #[test]
    fn test_cross_type_decode_fails() {
        let err = i64::from_wire(&WireKey::Text("7".into())).unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));
        let err = String::from_wire(&WireKey::Int64(7)).unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));
    }
}
