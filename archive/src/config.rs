use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How thoroughly `open` checks what it finds on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationPolicy {
    /// Re-parse every epoch file and verify both indices byte for byte.
    ValidateAllEpochs,
    /// Fully validate only the most recent epoch with content; earlier
    /// epochs are trusted as long as their primary index header and size
    /// are coherent.
    ValidateMostRecentEpoch,
}

/// Bounds for the in-memory index cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How many past epochs to keep cached, most recently used first. The
    /// current epoch is always cached and does not count against this.
    pub past_epochs: usize,
    /// Age after which the background expiry drops an unused entry.
    pub expiry: Duration,
}

impl Default for CacheConfig {
    fn default() -> CacheConfig {
        CacheConfig {
            past_epochs: 2,
            expiry: Duration::from_secs(300),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub validation: ValidationPolicy,
    pub cache: CacheConfig,
}

impl Default for ArchiveConfig {
    fn default() -> ArchiveConfig {
        ArchiveConfig {
            validation: ValidationPolicy::ValidateMostRecentEpoch,
            cache: CacheConfig::default(),
        }
    }
}
