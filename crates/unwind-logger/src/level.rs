//! Severity scale

use crate::error::Error;

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Severity of a record.
///
/// The scale is open: the named levels are fixed points on it, any other value
/// is still a valid level and renders as its number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(i32);

impl Level {
    /// Finest-grained diagnostics
    pub const TRACE: Self = Self(10);
    /// Debugging detail
    pub const DEBUG: Self = Self(20);
    /// Normal operation
    pub const INFO: Self = Self(40);
    /// Something unexpected but recoverable
    pub const WARN: Self = Self(60);
    /// An operation failed
    pub const ERROR: Self = Self(80);
    /// The process is in trouble
    pub const CRITICAL: Self = Self(100);

    const NAMED: [(Self, &'static str); 6] = [
        (Self::TRACE, "TRACE"),
        (Self::DEBUG, "DEBUG"),
        (Self::INFO, "INFO"),
        (Self::WARN, "WARN"),
        (Self::ERROR, "ERROR"),
        (Self::CRITICAL, "CRITICAL"),
    ];

    /// Creates a level at an arbitrary point on the scale.
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Numeric position on the scale.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Name of the level, if it is one of the named points.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(level, _)| *level == self)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if let Some((level, _)) = Self::NAMED
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(trimmed))
        {
            return Ok(*level);
        }

        trimmed
            .parse::<i32>()
            .map(Self)
            .map_err(|_| Error::InvalidLevel(s.to_string()))
    }
}

impl From<i32> for Level {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LevelVisitor)
    }
}

struct LevelVisitor;

impl Visitor<'_> for LevelVisitor {
    type Value = Level;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a level name or an integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Level, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Level, E> {
        i32::try_from(v)
            .map(Level)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Level, E> {
        i32::try_from(v)
            .map(Level)
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }
}
