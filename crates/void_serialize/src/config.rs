//! Stream configuration

use serde::{Deserialize, Serialize};
use void_reflect::AssertMode;

/// Configuration shared by binary writers and readers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Write and expect type tags at polymorphic positions
    pub type_tags: bool,
    /// Escalation of programmer errors met while streaming
    pub assert_mode: AssertMode,
    /// Largest element count accepted for one container
    pub max_container_len: usize,
    /// Largest byte length accepted for one string
    pub max_string_len: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            type_tags: true,
            assert_mode: AssertMode::Silent,
            max_container_len: 1 << 24,
            max_string_len: 1 << 24,
        }
    }
}

impl StreamConfig {
    /// Configuration for streams whose top-level and pointer types are known to both sides
    pub fn untagged() -> Self {
        Self {
            type_tags: false,
            ..Self::default()
        }
    }
}
