//! Limits that bound parsing and rendering work.
//!
//! Content streams come from untrusted files. Every recursive or
//! allocation-heavy path in the engine consults one of these limit sets
//! instead of a hard-coded constant, so callers can tighten them for
//! hostile input or relax them for damaged but trusted documents.
//!
//! # Example
//!
//! ```
//! use pdf_raster::config::{ParseLimits, RenderLimits};
//!
//! // Defaults match long-standing viewer behavior
//! let limits = ParseLimits::default();
//! assert_eq!(limits.max_form_level, 40);
//!
//! // Tighter limits for untrusted uploads
//! let strict = ParseLimits::strict();
//! assert!(strict.max_decompressed_size < limits.max_decompressed_size);
//!
//! let render = RenderLimits::default();
//! assert_eq!(render.max_recursion_depth, 64);
//! ```

/// Limits applied while parsing objects and content streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    /// Maximum number of nested form streams parsed from one page.
    ///
    /// A form that is deeper than this, or that is already being parsed
    /// further up the chain, is skipped.
    pub max_form_level: usize,

    /// Maximum nesting of arrays and dictionaries inside a content stream.
    pub max_nesting: usize,

    /// Maximum length of a literal or hex string operand, in bytes.
    ///
    /// Longer strings are truncated.
    pub max_string_length: usize,

    /// Maximum length of a keyword, number or name token.
    pub max_word_length: usize,

    /// Maximum decompressed size of a single stream, in bytes.
    ///
    /// Set to 0 to disable the check.
    pub max_decompressed_size: usize,

    /// Maximum depth when following chains of indirect references.
    pub max_reference_depth: u32,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParseLimits {
    /// Strict limits for untrusted input.
    pub fn strict() -> Self {
        Self {
            max_form_level: 16,
            max_nesting: 64,
            max_string_length: 32767,
            max_word_length: 255,
            max_decompressed_size: 32 * 1024 * 1024, // 32 MB
            max_reference_depth: 16,
        }
    }

    /// Default limits.
    pub fn lenient() -> Self {
        Self {
            max_form_level: 40,
            max_nesting: 512,
            max_string_length: 32767,
            max_word_length: 255,
            max_decompressed_size: 100 * 1024 * 1024, // 100 MB
            max_reference_depth: 32,
        }
    }

    /// Generous limits for damaged documents from trusted sources.
    ///
    /// Warning: deeply nested forms can use a lot of stack.
    pub fn very_lenient() -> Self {
        Self {
            max_form_level: 64,
            max_nesting: 1024,
            max_string_length: 65535,
            max_word_length: 255,
            max_decompressed_size: 0,
            max_reference_depth: 64,
        }
    }
}

/// Limits applied while compositing a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderLimits {
    /// Maximum nesting of render statuses (forms, groups, glyphs, masks).
    pub max_recursion_depth: usize,

    /// Largest offscreen buffer allocated for a group or soft mask, in pixels.
    ///
    /// Groups above this size are rendered directly without isolation.
    pub max_offscreen_pixels: usize,

    /// Maximum number of Type-3 glyph bitmaps kept in the glyph cache.
    pub glyph_cache_size: usize,

    /// Largest tiling-pattern cell rasterized, in pixels.
    pub max_pattern_cell_pixels: usize,

    /// Number of objects drawn between pause checks in progressive rendering.
    pub objects_per_step: usize,
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self {
            max_recursion_depth: 64,
            max_offscreen_pixels: 64 * 1024 * 1024,
            glyph_cache_size: 4096,
            max_pattern_cell_pixels: 16 * 1024 * 1024,
            objects_per_step: 100,
        }
    }
}
