//! Export assembly
//!
//! Resolves adapters and transformers from an [`ExportConfig`] and hands
//! them to the [`Pipeline`].

use crate::config::{ExportConfig, TransformerSpec};
use crate::etl::{ExportOutcome, Extractor, Pipeline, TransformerChain};
use crate::schema::Schema;
use crate::storage::{resolve_extractor, resolve_loader};
use crate::transform::{PipelineBuilder, TRANSFORMERS};
use eyre::{Context, Result};
use tokio_util::sync::CancellationToken;

/// Build the transformer chain described by `config`
pub fn build_chain(config: &ExportConfig) -> Result<TransformerChain> {
    let builder = PipelineBuilder::new(TRANSFORMERS, &config.fake);
    match &config.transformers {
        TransformerSpec::None => Ok(TransformerChain::default()),
        TransformerSpec::Ordered(instructions) => {
            builder.build_from_instructions(instructions.clone())
        }
        TransformerSpec::Unordered(configs) => {
            log::debug!("Transformers given without order; sorting by priority");
            builder.build_unordered(configs.clone())
        }
    }
}

/// Validate `config` and assemble a ready-to-run pipeline
///
/// # Errors
/// Returns an error for invalid settings, unsupported input or output, or
/// transformer values that cannot be parsed
pub fn prepare(config: &ExportConfig) -> Result<Pipeline> {
    config.validate()?;

    let reader = resolve_extractor(&config.input)?;
    let writer = resolve_loader(&config.output)?;
    log::debug!(
        "Using {} reader for {} and {} writer for {}",
        reader.name,
        config.input,
        writer.name,
        config.output
    );

    let extractor = (reader.create)(&config.input)?;
    let loader = (writer.create)(&config.output)?;
    let chain = build_chain(config)?;

    Ok(Pipeline::new(extractor, chain, loader)
        .with_batch_size(config.batch_size)
        .with_limit(config.limit)
        .with_queue_capacity(config.queue_capacity))
}

/// Run the export described by `config`
pub async fn run_export(config: &ExportConfig, cancel: CancellationToken) -> Result<ExportOutcome> {
    prepare(config)?.run(cancel).await
}

/// Schemas an export would produce, without writing anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunReport {
    pub source: Schema,
    /// Columns after every transformer, virtual ones included
    pub transformed: Schema,
    pub transformers: Vec<String>,
}

impl DryRunReport {
    /// Columns the sink would receive
    pub fn sink(&self) -> Schema {
        self.transformed.without_virtual()
    }
}

/// Open the source and cascade its schema through the chain
///
/// Nothing is read past the schema and the sink is never opened. A source
/// without columns is reported as-is; the chain is not applied to it.
pub async fn describe(config: &ExportConfig) -> Result<DryRunReport> {
    config.validate()?;

    let reader = resolve_extractor(&config.input)?;
    resolve_loader(&config.output)?;

    let mut extractor = (reader.create)(&config.input)?;
    let source = extractor.open().await.wrap_err("Failed to open source")?;
    let mut chain = build_chain(config)?;
    let transformed = if source.is_empty() {
        log::warn!("Source returned no columns");
        source.clone()
    } else {
        chain.initialize(&source)?
    };

    Ok(DryRunReport {
        source,
        transformed,
        transformers: chain.names(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{Instruction, TransformerConfig};

    fn config(transformers: TransformerSpec) -> ExportConfig {
        ExportConfig {
            input: "in.ndjson".to_string(),
            output: "out.ndjson".to_string(),
            transformers,
            ..ExportConfig::default()
        }
    }

    #[test]
    fn test_build_chain_ordered() {
        let chain = build_chain(&config(TransformerSpec::Ordered(vec![
            Instruction::new("format", "A:{B}"),
            Instruction::new("null", "B"),
        ])))
        .unwrap();
        assert_eq!(chain.names(), vec!["format", "null"]);
    }

    #[test]
    fn test_build_chain_unordered_uses_priority() {
        let chain = build_chain(&config(TransformerSpec::Unordered(vec![
            TransformerConfig {
                kind: "format".to_string(),
                values: vec!["A:{B}".to_string()],
            },
            TransformerConfig {
                kind: "fake".to_string(),
                values: vec!["B:name.firstname".to_string()],
            },
            TransformerConfig {
                kind: "null".to_string(),
                values: vec!["C".to_string()],
            },
        ])))
        .unwrap();
        assert_eq!(chain.names(), vec!["null", "fake", "format"]);
    }

    #[test]
    fn test_prepare_rejects_unknown_output() {
        let mut bad = config(TransformerSpec::None);
        bad.output = "out.xlsx".to_string();
        let err = prepare(&bad).err().unwrap();
        assert!(err.to_string().contains("Unsupported output format"));
    }

    #[test]
    fn test_prepare_requires_input() {
        let mut bad = config(TransformerSpec::None);
        bad.input.clear();
        assert!(prepare(&bad).is_err());
    }
}
