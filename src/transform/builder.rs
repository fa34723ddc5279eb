//! Transformer pipeline builder
//!
//! Turns an ordered token stream (raw command-line arguments or job-file
//! entries) into a [`TransformerChain`]. Consecutive instructions of the same
//! kind share one instance; the chain keeps the order in which groups open.

use super::registry::{TransformerDescriptor, find_flag, find_kind};
use crate::config::FakeOptions;
use crate::etl::{Transformer, TransformerChain};
use eyre::{Context, Result};

/// One `(kind, value)` pair in encounter order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub kind: String,
    pub value: String,
}

impl Instruction {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

/// Values gathered for one transformer instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformerConfig {
    pub kind: String,
    pub values: Vec<String>,
}

/// Builds chains from a registry of transformer kinds
pub struct PipelineBuilder<'a> {
    registry: &'a [TransformerDescriptor],
    options: &'a FakeOptions,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(registry: &'a [TransformerDescriptor], options: &'a FakeOptions) -> Self {
        Self { registry, options }
    }

    /// Extract transformer instructions from raw tokens
    ///
    /// A recognized flag consumes the following token as its value;
    /// `--flag=value` and the attached short forms `-fvalue` and `-f=value`
    /// are also accepted. Everything else is skipped, as is a recognized
    /// flag with nothing after it.
    pub fn parse_instructions<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<Instruction> {
        let mut instructions = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            let token = tokens[i].as_ref();

            if let Some(descriptor) = find_flag(self.registry, token) {
                if let Some(value) = tokens.get(i + 1) {
                    instructions.push(Instruction::new(descriptor.kind, value.as_ref()));
                    i += 1;
                }
            } else if let Some((descriptor, value)) = self.attached_value(token) {
                instructions.push(Instruction::new(descriptor.kind, value));
            }

            i += 1;
        }

        instructions
    }

    /// Split a flag and a value given in the same token
    fn attached_value<'t>(&self, token: &'t str) -> Option<(&'a TransformerDescriptor, &'t str)> {
        if token.starts_with("--") {
            let (flag, value) = token.split_once('=')?;
            return find_flag(self.registry, flag).map(|descriptor| (descriptor, value));
        }

        self.registry.iter().find_map(|descriptor| {
            descriptor
                .flags
                .iter()
                .filter(|flag| !flag.starts_with("--"))
                .find_map(|flag| token.strip_prefix(*flag).filter(|rest| !rest.is_empty()))
                .map(|rest| (descriptor, rest.strip_prefix('=').unwrap_or(rest)))
        })
    }

    /// Build a chain from raw tokens, keeping their order
    pub fn build<S: AsRef<str>>(&self, tokens: &[S]) -> Result<TransformerChain> {
        self.build_from_instructions(self.parse_instructions(tokens))
    }

    /// Build a chain from instructions, one instance per consecutive group
    ///
    /// # Errors
    /// Returns an error for an unknown kind or a value the kind rejects
    pub fn build_from_instructions(
        &self,
        instructions: Vec<Instruction>,
    ) -> Result<TransformerChain> {
        let mut chain = TransformerChain::default();
        for config in group_consecutive(instructions) {
            let descriptor = self.descriptor(&config.kind)?;
            chain.push(self.instantiate(descriptor, &config)?);
        }
        Ok(chain)
    }

    /// Build a chain with no explicit order, sorted by kind priority
    ///
    /// # Errors
    /// Returns an error for an unknown kind or a value the kind rejects
    pub fn build_unordered(&self, configs: Vec<TransformerConfig>) -> Result<TransformerChain> {
        let mut elements = Vec::with_capacity(configs.len());
        for config in &configs {
            let descriptor = self.descriptor(&config.kind)?;
            elements.push(self.instantiate(descriptor, config)?);
        }
        Ok(TransformerChain::sorted_by_priority(elements))
    }

    fn descriptor(&self, kind: &str) -> Result<&'a TransformerDescriptor> {
        find_kind(self.registry, kind).ok_or_else(|| {
            eyre::eyre!(
                "Unknown transformer kind '{}'. Supported: {}",
                kind,
                self.registry
                    .iter()
                    .map(|d| d.kind)
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }

    fn instantiate(
        &self,
        descriptor: &TransformerDescriptor,
        config: &TransformerConfig,
    ) -> Result<Box<dyn Transformer>> {
        log::debug!(
            "Building {} transformer with {} value(s)",
            descriptor.kind,
            config.values.len()
        );
        (descriptor.build)(config, self.options)
            .with_context(|| format!("Invalid {} transformer configuration", descriptor.kind))
    }
}

/// Merge runs of instructions that share a kind
pub fn group_consecutive(instructions: Vec<Instruction>) -> Vec<TransformerConfig> {
    let mut groups: Vec<TransformerConfig> = Vec::new();

    for instruction in instructions {
        match groups.last_mut() {
            Some(group) if group.kind.eq_ignore_ascii_case(&instruction.kind) => {
                group.values.push(instruction.value);
            }
            _ => groups.push(TransformerConfig {
                kind: instruction.kind,
                values: vec![instruction.value],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Row, Schema};
    use crate::transform::TRANSFORMERS;

    /// Records the values it was built with so tests can inspect chains
    struct Recorder {
        label: String,
        priority: i32,
    }

    impl Transformer for Recorder {
        fn name(&self) -> &str {
            &self.label
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn initialize(&mut self, schema: &Schema) -> Result<Schema> {
            Ok(schema.clone())
        }

        fn transform(&mut self, row: Row) -> Result<Row> {
            Ok(row)
        }
    }

    fn recorder(kind: &str, priority: i32, config: &TransformerConfig) -> Box<dyn Transformer> {
        Box::new(Recorder {
            label: format!("{}[{}]", kind, config.values.join(",")),
            priority,
        })
    }

    fn build_a(config: &TransformerConfig, _: &FakeOptions) -> Result<Box<dyn Transformer>> {
        Ok(recorder("a", 2, config))
    }

    fn build_b(config: &TransformerConfig, _: &FakeOptions) -> Result<Box<dyn Transformer>> {
        Ok(recorder("b", 1, config))
    }

    static TEST_REGISTRY: &[TransformerDescriptor] = &[
        TransformerDescriptor {
            kind: "a",
            flags: &["--a", "-a"],
            priority: 2,
            summary: "test a",
            build: build_a,
        },
        TransformerDescriptor {
            kind: "b",
            flags: &["--b"],
            priority: 1,
            summary: "test b",
            build: build_b,
        },
    ];

    fn names(tokens: &[&str]) -> Vec<String> {
        let options = FakeOptions::default();
        PipelineBuilder::new(TEST_REGISTRY, &options)
            .build(tokens)
            .unwrap()
            .names()
    }

    #[test]
    fn test_interleaved_order_is_preserved() {
        assert_eq!(
            names(&["--a", "1", "--b", "2", "--a", "3"]),
            vec!["a[1]", "b[2]", "a[3]"]
        );
    }

    #[test]
    fn test_consecutive_flags_share_instance() {
        assert_eq!(
            names(&["--a", "1", "--a", "2", "--b", "3", "--a", "4"]),
            vec!["a[1,2]", "b[3]", "a[4]"]
        );
    }

    #[test]
    fn test_unrecognized_tokens_are_ignored() {
        assert_eq!(
            names(&["querydump", "--input", "x.ndjson", "--b", "1", "--limit", "5"]),
            vec!["b[1]"]
        );
    }

    #[test]
    fn test_equals_form_and_dangling_flag() {
        assert_eq!(names(&["--a=1", "--A", "2", "--b"]), vec!["a[1,2]"]);
    }

    #[test]
    fn test_attached_short_values() {
        assert_eq!(
            names(&["-a1", "-a=2", "--b", "3", "-a", "4", "-ab"]),
            vec!["a[1,2]", "b[3]", "a[4,b]"]
        );
    }

    #[test]
    fn test_attached_fake_value_is_recognized() {
        let options = FakeOptions::default();
        let instructions = PipelineBuilder::new(TRANSFORMERS, &options).parse_instructions(&[
            "-i",
            "in.ndjson",
            "-fEMAIL:internet.email",
            "-o",
            "out.ndjson",
        ]);
        assert_eq!(
            instructions,
            vec![Instruction::new("fake", "EMAIL:internet.email")]
        );
    }

    #[test]
    fn test_flag_value_is_not_rescanned() {
        assert_eq!(names(&["--a", "--b", "--b", "x"]), vec!["a[--b]", "b[x]"]);
    }

    #[test]
    fn test_empty_stream_builds_empty_chain() {
        assert!(names(&[]).is_empty());
    }

    #[test]
    fn test_unordered_sorts_by_priority() {
        let options = FakeOptions::default();
        let chain = PipelineBuilder::new(TEST_REGISTRY, &options)
            .build_unordered(vec![
                TransformerConfig {
                    kind: "a".to_string(),
                    values: vec!["1".to_string()],
                },
                TransformerConfig {
                    kind: "b".to_string(),
                    values: vec!["2".to_string()],
                },
            ])
            .unwrap();
        assert_eq!(chain.names(), vec!["b[2]", "a[1]"]);
    }

    #[test]
    fn test_unknown_kind_is_error() {
        let options = FakeOptions::default();
        let err = PipelineBuilder::new(TEST_REGISTRY, &options)
            .build_from_instructions(vec![Instruction::new("mask", "X")])
            .err()
            .unwrap();
        assert!(err.to_string().contains("Unknown transformer kind 'mask'"));
    }

    #[test]
    fn test_grouping_counts_instances() {
        let options = FakeOptions::default();
        let builder = PipelineBuilder::new(TRANSFORMERS, &options);
        let tokens = [
            "--fake", "A:name.firstname", "--fake", "B:name.lastname", "--null", "C", "--fake",
            "D:internet.email",
        ];
        let instructions = builder.parse_instructions(&tokens);
        assert_eq!(instructions.len(), 4);

        let groups = group_consecutive(instructions);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].values, vec!["A:name.firstname", "B:name.lastname"]);

        let chain = builder.build(&tokens).unwrap();
        assert_eq!(chain.names(), vec!["fake", "null", "fake"]);
    }

    #[test]
    fn test_null_then_fake_keeps_order() {
        let options = FakeOptions::default();
        let chain = PipelineBuilder::new(TRANSFORMERS, &options)
            .build(&["--null", "NAME", "--fake", "EMAIL:internet.email"])
            .unwrap();
        assert_eq!(chain.names(), vec!["null", "fake"]);
    }

    #[test]
    fn test_invalid_value_names_kind() {
        let options = FakeOptions::default();
        let err = PipelineBuilder::new(TRANSFORMERS, &options)
            .build(&["--fake", "EMAIL:internet.fax"])
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("Invalid fake transformer configuration"));
    }
}
