//! Logger configuration

use crate::level::Level;

use serde::{Deserialize, Serialize};

/// Thresholds and pool sizing for an [`UnwindLogger`](crate::UnwindLogger).
///
/// `deferred_level <= immediate_level` holds at all times: each setter moves
/// the other threshold along when needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawConfig")]
pub struct UnwindLoggerConfig {
    immediate_level: Level,
    deferred_level: Level,
    full_defer: bool,
    initial_capacity: usize,
}

impl UnwindLoggerConfig {
    /// Upper bound on buffers allocated up front. The pool still grows past it
    /// on demand.
    pub const MAX_INITIAL_CAPACITY: usize = 4096;

    /// Create a builder starting from the defaults
    #[must_use]
    pub fn builder() -> UnwindLoggerConfigBuilder {
        UnwindLoggerConfigBuilder::default()
    }

    /// Records at or above this level are written as soon as they are logged
    /// (unless `full_defer` is set)
    #[must_use]
    pub const fn immediate_level(&self) -> Level {
        self.immediate_level
    }

    /// Records at or above this level are kept for the end of the operation
    #[must_use]
    pub const fn deferred_level(&self) -> Level {
        self.deferred_level
    }

    /// Whether every record waits for the end of its operation
    #[must_use]
    pub const fn full_defer(&self) -> bool {
        self.full_defer
    }

    /// Buffers allocated up front
    #[must_use]
    pub const fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    /// Set the immediate threshold, lowering the deferred one if it would exceed it
    pub fn set_immediate_level(&mut self, level: Level) {
        self.immediate_level = level;
        if self.deferred_level > self.immediate_level {
            self.deferred_level = self.immediate_level;
        }
    }

    /// Set the deferred threshold, raising the immediate one if it would fall below it
    pub fn set_deferred_level(&mut self, level: Level) {
        self.deferred_level = level;
        if self.deferred_level > self.immediate_level {
            self.immediate_level = self.deferred_level;
        }
    }

    /// Toggle full deferral
    pub fn set_full_defer(&mut self, full_defer: bool) {
        self.full_defer = full_defer;
    }

    /// Set the number of buffers allocated up front, capped at
    /// [`Self::MAX_INITIAL_CAPACITY`]
    pub const fn set_initial_capacity(&mut self, capacity: usize) {
        self.initial_capacity = if capacity > Self::MAX_INITIAL_CAPACITY {
            Self::MAX_INITIAL_CAPACITY
        } else {
            capacity
        };
    }

    pub(crate) fn writes_immediately(&self, level: Level) -> bool {
        !self.full_defer && level >= self.immediate_level
    }

    /// Minimum level flushed when an operation ends, `None` if nothing is
    pub(crate) const fn flush_threshold(&self, failed: bool) -> Option<Level> {
        if failed {
            Some(self.deferred_level)
        } else if self.full_defer {
            Some(self.immediate_level)
        } else {
            None
        }
    }
}

impl Default for UnwindLoggerConfig {
    fn default() -> Self {
        Self {
            immediate_level: Level::WARN,
            deferred_level: Level::INFO,
            full_defer: false,
            initial_capacity: 16,
        }
    }
}

/// Builder for [`UnwindLoggerConfig`]
#[derive(Debug, Default)]
pub struct UnwindLoggerConfigBuilder {
    config: UnwindLoggerConfig,
}

impl UnwindLoggerConfigBuilder {
    /// Set the immediate threshold
    #[must_use]
    pub fn immediate_level(mut self, level: Level) -> Self {
        self.config.set_immediate_level(level);
        self
    }

    /// Set the deferred threshold
    #[must_use]
    pub fn deferred_level(mut self, level: Level) -> Self {
        self.config.set_deferred_level(level);
        self
    }

    /// Toggle full deferral
    #[must_use]
    pub const fn full_defer(mut self, full_defer: bool) -> Self {
        self.config.full_defer = full_defer;
        self
    }

    /// Set the number of buffers allocated up front
    #[must_use]
    pub const fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.set_initial_capacity(capacity);
        self
    }

    /// Build the configuration
    #[must_use]
    pub const fn build(self) -> UnwindLoggerConfig {
        self.config
    }
}

/// On-disk shape; applied through the clamping setters, immediate first
#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    immediate_level: Level,
    deferred_level: Level,
    full_defer: bool,
    initial_capacity: usize,
}

impl Default for RawConfig {
    fn default() -> Self {
        let defaults = UnwindLoggerConfig::default();

        Self {
            immediate_level: defaults.immediate_level,
            deferred_level: defaults.deferred_level,
            full_defer: defaults.full_defer,
            initial_capacity: defaults.initial_capacity,
        }
    }
}

impl From<RawConfig> for UnwindLoggerConfig {
    fn from(raw: RawConfig) -> Self {
        UnwindLoggerConfig::builder()
            .immediate_level(raw.immediate_level)
            .deferred_level(raw.deferred_level)
            .full_defer(raw.full_defer)
            .initial_capacity(raw.initial_capacity)
            .build()
    }
}
