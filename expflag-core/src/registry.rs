//! Flag Registry
//!
//! Holds the declared type and default value of every flag, keyed by a
//! hash of the flag name. Registration happens once per flag at startup;
//! afterwards the registry is handed to an
//! [`ExpEnvironment`](crate::environment::ExpEnvironment) and never
//! mutated again.
//!
//! # Examples
//!
//! ```
//! use expflag_core::FlagRegistry;
//!
//! let mut registry = FlagRegistry::new();
//! let max_items = registry.register("max_items", 20i32).unwrap();
//!
//! assert_eq!(registry.default_of(max_items), Some(20));
//! assert!(registry.register("max_items", 5i32).is_err());
//! ```

use crate::error::{Result, StartupError};
use crate::value::{FlagType, FlagValue, FlagValueType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

const TARGET: &str = "expflag::registry";

/// Untyped flag identifier derived from the flag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RawFlagId(u64);

impl RawFlagId {
    /// Sentinel for "no flag".
    pub const INVALID: RawFlagId = RawFlagId(u64::MAX);

    /// First eight bytes of the SHA-256 digest of `name`, big-endian.
    ///
    /// Stable across processes and builds.
    pub fn for_name(name: &str) -> Self {
        let digest = Sha256::digest(name.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Self(u64::from_be_bytes(bytes))
    }

    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Display for RawFlagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.to_be_bytes()))
    }
}

/// Flag identifier that also records the flag's scalar kind.
///
/// Obtained from [`FlagRegistry::register`], so the kind always matches the
/// registered default.
pub struct FlagId<T> {
    raw: RawFlagId,
    _kind: PhantomData<fn() -> T>,
}

impl<T: FlagType> FlagId<T> {
    /// Rebuild a typed handle from a raw id. The kind is not checked here;
    /// lookups through a mismatched handle report a warning and yield the
    /// zero value.
    pub fn from_raw(raw: RawFlagId) -> Self {
        Self {
            raw,
            _kind: PhantomData,
        }
    }

    pub fn invalid() -> Self {
        Self::from_raw(RawFlagId::INVALID)
    }

    pub fn raw(&self) -> RawFlagId {
        self.raw
    }

    pub fn is_valid(&self) -> bool {
        self.raw.is_valid()
    }

    pub fn value_type(&self) -> FlagValueType {
        T::TYPE
    }
}

impl<T> Clone for FlagId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FlagId<T> {}

impl<T> PartialEq for FlagId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for FlagId<T> {}

impl<T> Hash for FlagId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T: FlagType> fmt::Debug for FlagId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagId")
            .field("raw", &self.raw)
            .field("kind", &T::TYPE)
            .finish()
    }
}

impl<T> From<FlagId<T>> for RawFlagId {
    fn from(id: FlagId<T>) -> Self {
        id.raw
    }
}

/// A named, typed flag value. The kind is the value's own tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flag {
    name: String,
    value: FlagValue,
}

impl Flag {
    pub fn new(name: impl Into<String>, value: FlagValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> FlagValue {
        self.value
    }

    pub fn value_type(&self) -> FlagValueType {
        self.value.value_type()
    }

    /// Copy of this flag with `raw` parsed according to this flag's kind.
    pub fn with_raw_value(&self, raw: &str) -> Flag {
        Flag {
            name: self.name.clone(),
            value: self.value_type().parse(raw),
        }
    }
}

/// Flags keyed by id, in id order.
pub type FlagMap = BTreeMap<RawFlagId, Flag>;

/// Table of registered flags and their defaults.
#[derive(Debug, Clone, Default)]
pub struct FlagRegistry {
    flags: FlagMap,
}

impl FlagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flag with its default value.
    ///
    /// Fails on an empty name, a name registered before, or a name whose
    /// hash is already taken by a different flag.
    pub fn register<T: FlagType>(&mut self, name: &str, default: T) -> Result<FlagId<T>> {
        let raw = self.register_value(name, default.wrap())?;
        Ok(FlagId::from_raw(raw))
    }

    /// Register a flag whose kind is only known at runtime.
    pub fn register_value(&mut self, name: &str, default: FlagValue) -> Result<RawFlagId> {
        let result = self.insert(name, default);
        if let Err(ref err) = result {
            expflag_log::fatal!(target: TARGET, "{}", err);
        }
        result
    }

    fn insert(&mut self, name: &str, default: FlagValue) -> Result<RawFlagId> {
        if name.is_empty() {
            return Err(StartupError::EmptyFlagName);
        }

        let id = RawFlagId::for_name(name);
        if !id.is_valid() {
            return Err(StartupError::ReservedId {
                name: name.to_string(),
            });
        }

        if let Some(existing) = self.flags.get(&id) {
            return Err(if existing.name == name {
                StartupError::DuplicateFlag {
                    name: name.to_string(),
                }
            } else {
                StartupError::HashCollision {
                    name: name.to_string(),
                    existing: existing.name.clone(),
                    id,
                }
            });
        }

        expflag_log::trace!(
            target: TARGET,
            "registered {} flag [{}] = {}",
            default.value_type(),
            name,
            default
        );
        self.flags.insert(id, Flag::new(name, default));
        Ok(id)
    }

    pub fn get(&self, id: RawFlagId) -> Option<&Flag> {
        self.flags.get(&id)
    }

    /// Find a flag by name. A hash hit with a different name is a miss.
    pub fn lookup(&self, name: &str) -> Option<(RawFlagId, &Flag)> {
        let id = RawFlagId::for_name(name);
        self.flags
            .get(&id)
            .filter(|flag| flag.name == name)
            .map(|flag| (id, flag))
    }

    /// Registered default for a typed handle, if the kinds agree.
    pub fn default_of<T: FlagType>(&self, id: FlagId<T>) -> Option<T> {
        self.get(id.raw()).and_then(|flag| flag.value.get::<T>())
    }

    pub fn contains(&self, id: RawFlagId) -> bool {
        self.flags.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RawFlagId, &Flag)> {
        self.flags.iter().map(|(id, flag)| (*id, flag))
    }

    pub fn flags(&self) -> &FlagMap {
        &self.flags
    }
}
