//! Configuration for the buffered stream layer.
//!
//! The buffered stream is governed by three knobs: a total byte budget for
//! its buffers and two percentages steering eviction and opportunistic
//! read-ahead. All options have sensible defaults; `validate()` rejects
//! configurations the stream cannot honor.

// =============================================================================
// Default Values
// =============================================================================

/// Default total buffer budget: 64KB.
pub const DEFAULT_BUFFER_LIMIT: usize = 64 * 1024;

/// Default opportunistic load size as a percentage of the free budget.
pub const DEFAULT_RATIO_ALLOC: u8 = 50;

/// Default eviction threshold: evict when free budget falls below this
/// percentage of the limit.
pub const DEFAULT_RATIO_DELETE: u8 = 10;

/// Smallest accepted buffer budget.
const MIN_BUFFER_LIMIT: usize = 1024;

// =============================================================================
// Stream Configuration
// =============================================================================

/// Tuning parameters for [`crate::io::BufferedStream`].
///
/// * `buffer_limit` - total byte budget for cached buffers. The budget may
///   be exceeded transiently by one in-flight opportunistic load.
/// * `ratio_alloc` - when a read misses, load this percentage of the free
///   budget instead of the exact residual, to benefit sequential access.
///   Never loads less than the immediate need.
/// * `ratio_delete` - when the free budget falls below this percentage of
///   `buffer_limit`, the least-recently-used buffer is evicted before a
///   new load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub buffer_limit: usize,
    pub ratio_alloc: u8,
    pub ratio_delete: u8,
}

impl StreamConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_limit < MIN_BUFFER_LIMIT {
            return Err(format!(
                "buffer_limit must be at least {} bytes",
                MIN_BUFFER_LIMIT
            ));
        }

        if self.ratio_alloc == 0 || self.ratio_alloc > 100 {
            return Err("ratio_alloc must be between 1 and 100".to_string());
        }

        if self.ratio_delete == 0 || self.ratio_delete > 100 {
            return Err("ratio_delete must be between 1 and 100".to_string());
        }

        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            ratio_alloc: DEFAULT_RATIO_ALLOC,
            ratio_delete: DEFAULT_RATIO_DELETE,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
