//! Source and sink adapters
//!
//! Adapters are selected from flat descriptor lists:
//! - extractors by the first descriptor whose predicate accepts the input
//! - loaders by output file extension

mod memory;
mod ndjson;

pub use memory::{MemoryExtractor, MemoryLoader};
pub use ndjson::{NdjsonReader, NdjsonWriter};

use crate::etl::{Extractor, Loader};
use eyre::Result;
use std::path::Path;

/// Describes one extractor implementation
pub struct ExtractorDescriptor {
    pub name: &'static str,
    /// Whether this extractor understands the input string
    pub can_handle: fn(&str) -> bool,
    pub create: fn(&str) -> Result<Box<dyn Extractor>>,
}

/// Describes one loader implementation
pub struct LoaderDescriptor {
    pub name: &'static str,
    /// Lowercase extensions without the leading dot
    pub extensions: &'static [&'static str],
    pub create: fn(&str) -> Result<Box<dyn Loader>>,
}

const NDJSON_PREFIX: &str = "ndjson:";

fn has_extension(path: &str, extensions: &[&str]) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

fn ndjson_can_handle(input: &str) -> bool {
    input.starts_with(NDJSON_PREFIX) || has_extension(input, &["ndjson", "jsonl"])
}

fn ndjson_extractor(input: &str) -> Result<Box<dyn Extractor>> {
    let path = input.strip_prefix(NDJSON_PREFIX).unwrap_or(input);
    Ok(Box::new(NdjsonReader::new(path)))
}

fn ndjson_loader(output: &str) -> Result<Box<dyn Loader>> {
    Ok(Box::new(NdjsonWriter::new(output)))
}

/// Every known extractor, checked in order
pub static EXTRACTORS: &[ExtractorDescriptor] = &[ExtractorDescriptor {
    name: "ndjson",
    can_handle: ndjson_can_handle,
    create: ndjson_extractor,
}];

/// Every known loader, checked in order
pub static LOADERS: &[LoaderDescriptor] = &[LoaderDescriptor {
    name: "ndjson",
    extensions: &["ndjson", "jsonl"],
    create: ndjson_loader,
}];

/// Pick the first extractor able to read `input`
pub fn resolve_extractor(input: &str) -> Result<&'static ExtractorDescriptor> {
    EXTRACTORS
        .iter()
        .find(|d| (d.can_handle)(input))
        .ok_or_else(|| {
            eyre::eyre!(
                "Could not detect a reader for input '{}'. Supported: {}",
                input,
                EXTRACTORS
                    .iter()
                    .map(|d| d.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
}

/// Pick the loader registered for the extension of `output`
pub fn resolve_loader(output: &str) -> Result<&'static LoaderDescriptor> {
    LOADERS
        .iter()
        .find(|d| has_extension(output, d.extensions))
        .ok_or_else(|| {
            eyre::eyre!(
                "Unsupported output format: '{}'. Supported extensions: {}",
                output,
                LOADERS
                    .iter()
                    .flat_map(|d| d.extensions.iter().map(|e| format!(".{}", e)))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_extractor() {
        assert_eq!(resolve_extractor("data/users.ndjson").unwrap().name, "ndjson");
        assert_eq!(resolve_extractor("USERS.JSONL").unwrap().name, "ndjson");
        assert_eq!(resolve_extractor("ndjson:/tmp/no-extension").unwrap().name, "ndjson");

        let err = resolve_extractor("oracle:scott/tiger").err().unwrap();
        assert!(err.to_string().contains("Could not detect a reader"));
    }

    #[test]
    fn test_resolve_loader() {
        assert_eq!(resolve_loader("out.ndjson").unwrap().name, "ndjson");
        assert_eq!(resolve_loader("out.jsonl").unwrap().name, "ndjson");

        let err = resolve_loader("out.parquet").err().unwrap();
        assert!(err.to_string().contains(".ndjson, .jsonl"));
    }
}
