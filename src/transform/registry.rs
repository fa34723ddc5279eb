//! Registry of transformer kinds
//!
//! A flat, compile-time list. The pipeline builder uses it to recognize
//! command-line flags and job-file kinds and to construct instances.

use super::builder::TransformerConfig;
use super::{FakeTransformer, FormatTransformer, NullTransformer, OverwriteTransformer};
use crate::config::FakeOptions;
use crate::etl::Transformer;
use eyre::Result;

/// Describes one transformer kind
pub struct TransformerDescriptor {
    /// Name used in job files and logs
    pub kind: &'static str,
    /// Command-line flags that take one value each
    pub flags: &'static [&'static str],
    /// Position in chains built without explicit order
    pub priority: i32,
    pub summary: &'static str,
    /// Construct one instance from a group of values
    pub build: fn(&TransformerConfig, &FakeOptions) -> Result<Box<dyn Transformer>>,
}

impl TransformerDescriptor {
    pub fn matches_flag(&self, token: &str) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case(token))
    }
}

impl std::fmt::Debug for TransformerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformerDescriptor")
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("priority", &self.priority)
            .finish()
    }
}

fn build_null(config: &TransformerConfig, _options: &FakeOptions) -> Result<Box<dyn Transformer>> {
    Ok(Box::new(NullTransformer::new(&config.values)))
}

fn build_overwrite(
    config: &TransformerConfig,
    _options: &FakeOptions,
) -> Result<Box<dyn Transformer>> {
    Ok(Box::new(OverwriteTransformer::new(&config.values)?))
}

fn build_fake(config: &TransformerConfig, options: &FakeOptions) -> Result<Box<dyn Transformer>> {
    Ok(Box::new(FakeTransformer::new(&config.values, options)?))
}

fn build_format(
    config: &TransformerConfig,
    _options: &FakeOptions,
) -> Result<Box<dyn Transformer>> {
    Ok(Box::new(FormatTransformer::new(&config.values)?))
}

/// Every known transformer kind
pub static TRANSFORMERS: &[TransformerDescriptor] = &[
    TransformerDescriptor {
        kind: "null",
        flags: &["--null"],
        priority: super::NULL_PRIORITY,
        summary: "Set columns to null (COLUMN or A,B)",
        build: build_null,
    },
    TransformerDescriptor {
        kind: "overwrite",
        flags: &["--overwrite"],
        priority: super::OVERWRITE_PRIORITY,
        summary: "Replace columns with a literal (COLUMN:VALUE)",
        build: build_overwrite,
    },
    TransformerDescriptor {
        kind: "fake",
        flags: &["--fake", "-f"],
        priority: super::FAKE_PRIORITY,
        summary: "Generate fake data (COLUMN:dataset.method)",
        build: build_fake,
    },
    TransformerDescriptor {
        kind: "format",
        flags: &["--format"],
        priority: super::FORMAT_PRIORITY,
        summary: "Render a template from other columns (COLUMN:TEMPLATE)",
        build: build_format,
    },
];

/// Look up a descriptor by kind, ignoring case
pub fn find_kind<'a>(
    registry: &'a [TransformerDescriptor],
    kind: &str,
) -> Option<&'a TransformerDescriptor> {
    registry
        .iter()
        .find(|d| d.kind.eq_ignore_ascii_case(kind.trim()))
}

/// Look up a descriptor by one of its flags, ignoring case
pub fn find_flag<'a>(
    registry: &'a [TransformerDescriptor],
    token: &str,
) -> Option<&'a TransformerDescriptor> {
    registry.iter().find(|d| d.matches_flag(token))
}
