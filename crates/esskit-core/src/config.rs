//! Settings for a decode/encode pass.

/// Configuration shared by envelopes and record materialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Largest flat buffer an envelope or record may declare
    pub max_flat_len: usize,
    /// zlib level used when recompressing deflate bodies (0-9)
    pub deflate_level: u32,
    /// Treat schema gaps as format errors instead of warnings
    pub strict_schema: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_flat_len: 256 * 1024 * 1024, // 256 MB
            deflate_level: 6,
            strict_schema: false,
        }
    }
}

impl CodecConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest accepted flat buffer
    pub fn max_flat_len(mut self, len: usize) -> Self {
        self.max_flat_len = len;
        self
    }

    /// Sets the zlib level, clamped to 9
    pub fn deflate_level(mut self, level: u32) -> Self {
        self.deflate_level = level.min(9);
        self
    }

    /// Sets whether schema gaps abort materialization
    pub fn strict_schema(mut self, strict: bool) -> Self {
        self.strict_schema = strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_config_builder() {
        let config = CodecConfig::new()
            .max_flat_len(1024)
            .deflate_level(12)
            .strict_schema(true);

        assert_eq!(config.max_flat_len, 1024);
        assert_eq!(config.deflate_level, 9);
        assert!(config.strict_schema);
    }

    #[test]
    fn test_defaults_are_lenient() {
        let config = CodecConfig::default();
        assert!(!config.strict_schema);
        assert_eq!(config.deflate_level, 6);
    }
}
