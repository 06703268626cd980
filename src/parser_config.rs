//! Parser options controlling strictness and resource limits.

/// Options for reading a source document.
///
/// # Example
///
/// ```
/// use pdf_minimizer::parser_config::ParserOptions;
///
/// let strict = ParserOptions::strict();
/// assert!(strict.strict);
///
/// let custom = ParserOptions {
///     max_nesting: 64,
///     ..ParserOptions::lenient()
/// };
/// assert!(!custom.strict);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Reject recoverable damage instead of working around it.
    ///
    /// In strict mode a stream whose `/Length` does not land on `endstream`
    /// is an error; leniently, the parser scans for the keyword instead.
    pub strict: bool,

    /// Maximum array/dictionary nesting depth.
    pub max_nesting: usize,

    /// Maximum number of cross-reference sections followed through `/Prev`.
    pub max_xref_chain: usize,

    /// Maximum input size in bytes (0 = unlimited).
    pub max_file_size: usize,

    /// Maximum decoded size of any single stream (0 = unlimited).
    pub max_decompressed_size: usize,

    /// Maximum decoded:encoded size ratio (0 = unlimited).
    pub max_decompression_ratio: u32,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParserOptions {
    /// Strict mode: structural damage is an error.
    pub fn strict() -> Self {
        Self {
            strict: true,
            max_nesting: 100,
            max_xref_chain: 32,
            max_file_size: 500 * 1024 * 1024,
            max_decompressed_size: 100 * 1024 * 1024,
            max_decompression_ratio: 100,
        }
    }

    /// Lenient mode: recover from damage the file layout lets us work around.
    pub fn lenient() -> Self {
        Self {
            strict: false,
            max_nesting: 256,
            max_xref_chain: 100,
            max_file_size: 1024 * 1024 * 1024,
            max_decompressed_size: 256 * 1024 * 1024,
            max_decompression_ratio: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_lenient() {
        assert_eq!(ParserOptions::default(), ParserOptions::lenient());
        assert!(!ParserOptions::default().strict);
    }

    #[test]
    fn test_strict_is_tighter() {
        let strict = ParserOptions::strict();
        let lenient = ParserOptions::lenient();
        assert!(strict.strict);
        assert!(strict.max_nesting <= lenient.max_nesting);
        assert!(strict.max_xref_chain <= lenient.max_xref_chain);
    }
}
