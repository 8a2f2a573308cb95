//! High-level builder and grammar driver for the stubble stub-declaration
//! compiler.
//!
//! [`parse_source`] turns one stub module's source text into a named,
//! prefix-qualified [`stubble_core::Unit`]. Cross-module resolution is a
//! separate phase (see `stubble-cache`); a freshly parsed unit still
//! carries textual references.

pub mod builder;
pub mod compat;
pub mod condition;
pub mod error;
pub mod grammar;
pub mod signatures;

pub use builder::Builder;
pub use compat::{CompatRewrite, DefaultCompat};
pub use condition::Version;
pub use error::ParseError;

use stubble_core::Unit;

static DEFAULT_COMPAT: DefaultCompat = DefaultCompat;

/// Options for one parse call.
pub struct ParseOptions<'a> {
    pub version: Version,
    pub platform: String,
    /// The post-parse canonicalization rewrite. `None` disables it.
    pub compat: Option<&'a dyn CompatRewrite>,
}

impl Default for ParseOptions<'static> {
    fn default() -> Self {
        ParseOptions {
            version: builder::DEFAULT_VERSION,
            platform: builder::DEFAULT_PLATFORM.to_string(),
            compat: Some(&DEFAULT_COMPAT),
        }
    }
}

/// Parse one stub module. Exactly one unit is produced per call, or a
/// single terminal error; no partial result escapes a failed parse.
pub fn parse_source(
    src: &str,
    name: Option<&str>,
    filename: Option<&str>,
    options: &ParseOptions<'_>,
) -> Result<Unit, ParseError> {
    let builder = Builder::new(
        name,
        Some(options.version),
        Some(&options.platform),
        options.compat,
    );
    let result = grammar::Driver::new(src, builder).and_then(|driver| driver.parse(src));
    result.map_err(|e| match filename {
        Some(f) => e.with_filename(f),
        None => e,
    })
}
