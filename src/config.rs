//! Filepath: src/config.rs
//!
//! Arena configuration.
//!
//! An [`ArenaConfig`] fixes everything about an arena's memory for its whole
//! lifetime: how many blocks, how large each block is and the allocation
//! granularity (which is also the alignment of every pointer handed out).

use std::env;
use std::fmt as StdFmt;

/// Default number of blocks.
pub const DEFAULT_BLOCK_COUNT: usize = 5;

/// Default bytes per block.
pub const DEFAULT_BLOCK_SIZE: usize = 1_000_000;

/// Default allocation granularity (and alignment) in bytes.
pub const DEFAULT_GRANULARITY: usize = 16;

/// Environment variable overriding [`ArenaConfig::block_count`].
pub const ENV_BLOCKS: &str = "AVL_ARENA_BLOCKS";

/// Environment variable overriding [`ArenaConfig::block_size`].
pub const ENV_BLOCK_SIZE: &str = "AVL_ARENA_BLOCK_SIZE";

/// Environment variable overriding [`ArenaConfig::granularity`].
pub const ENV_GRANULARITY: &str = "AVL_ARENA_GRANULARITY";

// ============================================================================
//  ConfigError
// ============================================================================

/// Errors from validating or loading an [`ArenaConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `block_count` is zero.
    NoBlocks,

    /// Granularity is zero or not a power of two.
    InvalidGranularity {
        /// Rejected granularity.
        granularity: usize,
    },

    /// A block cannot hold even one granule.
    BlockTooSmall {
        /// Configured block size.
        block_size: usize,
        /// Configured granularity.
        granularity: usize,
    },

    /// A block is too large to describe with a `Layout`.
    BlockTooLarge {
        /// Configured block size.
        block_size: usize,
    },

    /// An environment variable did not parse as a number.
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}

impl StdFmt::Display for ConfigError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::NoBlocks => write!(f, "arena needs at least one block"),

            Self::InvalidGranularity { granularity } => {
                write!(f, "granularity {granularity} is not a power of two")
            }

            Self::BlockTooSmall {
                block_size,
                granularity,
            } => write!(
                f,
                "block size {block_size} is smaller than granularity {granularity}"
            ),

            Self::BlockTooLarge { block_size } => {
                write!(f, "block size {block_size} exceeds the address space")
            }

            Self::InvalidValue { var, value } => write!(f, "{var}={value:?} is not a number"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
//  ArenaConfig
// ============================================================================

/// Shape of an arena's memory.
///
/// # Example
///
/// ```rust
/// use avl_arena::ArenaConfig;
///
/// let config = ArenaConfig::new(2, 4096).with_granularity(64);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.usable_block_size(), 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaConfig {
    /// Number of blocks, allocated once when the arena is created.
    pub block_count: usize,

    /// Bytes per block.
    pub block_size: usize,

    /// Allocation unit and alignment. Must be a power of two.
    pub granularity: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            block_count: DEFAULT_BLOCK_COUNT,
            block_size: DEFAULT_BLOCK_SIZE,
            granularity: DEFAULT_GRANULARITY,
        }
    }
}

impl ArenaConfig {
    /// Config with `block_count` blocks of `block_size` bytes and the
    /// default granularity.
    #[must_use]
    pub const fn new(block_count: usize, block_size: usize) -> Self {
        Self {
            block_count,
            block_size,
            granularity: DEFAULT_GRANULARITY,
        }
    }

    /// Replace the granularity.
    #[must_use]
    pub const fn with_granularity(mut self, granularity: usize) -> Self {
        self.granularity = granularity;
        self
    }

    /// Bytes of each block that can be handed out: the block size rounded
    /// down to the granularity. Zero when the granularity is zero.
    #[must_use]
    pub const fn usable_block_size(&self) -> usize {
        match self.block_size.checked_rem(self.granularity) {
            Some(slack) => self.block_size - slack,
            None => 0,
        }
    }

    /// Check the config describes a usable arena.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.block_count == 0 {
            return Err(ConfigError::NoBlocks);
        }
        if !self.granularity.is_power_of_two() {
            return Err(ConfigError::InvalidGranularity {
                granularity: self.granularity,
            });
        }
        if self.block_size < self.granularity {
            return Err(ConfigError::BlockTooSmall {
                block_size: self.block_size,
                granularity: self.granularity,
            });
        }
        if self.block_size > isize::MAX as usize - self.granularity {
            return Err(ConfigError::BlockTooLarge {
                block_size: self.block_size,
            });
        }
        Ok(())
    }

    /// Defaults overridden by [`ENV_BLOCKS`], [`ENV_BLOCK_SIZE`] and
    /// [`ENV_GRANULARITY`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a variable that is set but
    /// not a number, or the validation error of the resulting config.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var: &str| env::var(var).ok())
    }

    /// Like [`ArenaConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`ArenaConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |var: &'static str, default: usize| -> Result<usize, ConfigError> {
            lookup(var).map_or(Ok(default), |value: String| {
                value
                    .trim()
                    .replace('_', "")
                    .parse::<usize>()
                    .map_err(|_| ConfigError::InvalidValue { var, value })
            })
        };

        let config = Self {
            block_count: read(ENV_BLOCKS, DEFAULT_BLOCK_COUNT)?,
            block_size: read(ENV_BLOCK_SIZE, DEFAULT_BLOCK_SIZE)?,
            granularity: read(ENV_GRANULARITY, DEFAULT_GRANULARITY)?,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var: &str| vars.get(var).cloned()
    }

    #[test]
    fn test_default_is_valid() {
        let config = ArenaConfig::default();
        assert_eq!(config.block_count, 5);
        assert_eq!(config.block_size, 1_000_000);
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.usable_block_size(), 1_000_000);
    }

    #[test]
    fn test_usable_size_rounds_down() {
        let config = ArenaConfig::new(1, 1000).with_granularity(64);
        assert_eq!(config.usable_block_size(), 960);
    }

    #[test]
    fn test_usable_size_with_zero_granularity() {
        let config = ArenaConfig::new(1, 1000).with_granularity(0);
        assert_eq!(config.usable_block_size(), 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        assert_eq!(ArenaConfig::new(0, 1024).validate(), Err(ConfigError::NoBlocks));
        assert_eq!(
            ArenaConfig::new(1, 1024).with_granularity(24).validate(),
            Err(ConfigError::InvalidGranularity { granularity: 24 })
        );
        assert_eq!(
            ArenaConfig::new(1, 8).validate(),
            Err(ConfigError::BlockTooSmall {
                block_size: 8,
                granularity: 16
            })
        );
        assert!(matches!(
            ArenaConfig::new(1, usize::MAX).validate(),
            Err(ConfigError::BlockTooLarge { .. })
        ));
    }

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let config = ArenaConfig::from_lookup(lookup_from(&[
            (ENV_BLOCKS, "2"),
            (ENV_BLOCK_SIZE, "65_536"),
        ]))
        .unwrap();

        assert_eq!(config, ArenaConfig::new(2, 65_536));
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = ArenaConfig::from_lookup(lookup_from(&[(ENV_GRANULARITY, "sixteen")]));
        assert_eq!(
            err,
            Err(ConfigError::InvalidValue {
                var: ENV_GRANULARITY,
                value: "sixteen".to_string()
            })
        );
    }

    #[test]
    fn test_from_lookup_validates() {
        let err = ArenaConfig::from_lookup(lookup_from(&[(ENV_BLOCKS, "0")]));
        assert_eq!(err, Err(ConfigError::NoBlocks));
    }
}
