//! Fake data transformer
//!
//! Replaces column values with generated data. Target columns missing from
//! the schema are appended as virtual columns, so templates further down the
//! chain can use them without exporting them.

pub mod catalog;
mod generator;

pub use catalog::{Faker, Locale};
pub use generator::{
    MAX_TABLE_SIZE, SeedSource, ValueGenerator, check_table_size, column_key, derive_seed,
};

use crate::config::FakeOptions;
use crate::etl::Transformer;
use crate::hash::{stable_hash, stable_hash_str};
use crate::schema::{Column, Row, Schema, Value};
use eyre::Result;
use rand::rngs::StdRng;

struct Mapping {
    column: String,
    faker: &'static Faker,
}

/// Transformer that fills columns from the faker catalog
///
/// Values take the form `COLUMN:dataset.method`. How values are seeded is
/// controlled by [`FakeOptions`]; see [`SeedSource`].
///
/// # Example
/// ```
/// use querydump::config::FakeOptions;
/// use querydump::etl::Transformer;
/// use querydump::schema::{Column, LogicalType, Schema, Value};
/// use querydump::transform::FakeTransformer;
///
/// let options = FakeOptions {
///     seed_column: Some("ID".to_string()),
///     ..FakeOptions::default()
/// };
/// let mut fake = FakeTransformer::new(&["NAME:name.fullname".to_string()], &options).unwrap();
/// let schema = Schema::new(vec![
///     Column::new("ID", LogicalType::Integer),
///     Column::new("NAME", LogicalType::Text),
/// ]);
/// fake.initialize(&schema).unwrap();
///
/// let a = fake.transform(vec![Value::Int(42), Value::from("Alice")]).unwrap();
/// let b = fake.transform(vec![Value::Int(42), Value::from("Bob")]).unwrap();
/// assert_eq!(a, b);
/// ```
pub struct FakeTransformer {
    mappings: Vec<Mapping>,
    options: FakeOptions,
    locale: Locale,
    salt: u32,
    seed: SeedSource,
    targets: Vec<Target>,
    width: usize,
    row_index: u64,
}

/// One generated column and, outside per-row modes, its own stream
struct Target {
    index: usize,
    generator: ValueGenerator,
    rng: Option<StdRng>,
}

impl FakeTransformer {
    /// Parse `COLUMN:dataset.method` mappings and validate options
    ///
    /// # Errors
    /// Returns an error for a malformed mapping, an unknown faker, an
    /// unsupported locale, or table settings that cannot be honored
    pub fn new(values: &[String], options: &FakeOptions) -> Result<Self> {
        let locale: Locale = options.locale.parse()?;

        let mappings = values
            .iter()
            .map(|value| {
                let (column, path) = value.rsplit_once(':').ok_or_else(|| {
                    eyre::eyre!("Invalid fake '{}': expected COLUMN:dataset.method", value)
                })?;
                let column = column.trim();
                if column.is_empty() {
                    eyre::bail!("Invalid fake '{}': column name is empty", value);
                }
                let faker = catalog::find(path).ok_or_else(|| {
                    eyre::eyre!(
                        "Unknown faker '{}' for column '{}'. Use --fake-list to see the catalog",
                        path,
                        column
                    )
                })?;
                Ok(Mapping {
                    column: column.to_string(),
                    faker,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if options.table {
            if options.seed_column.is_none() && !options.deterministic {
                eyre::bail!(
                    "Fake table mode requires a seed column or deterministic mode"
                );
            }
            check_table_size(options.table_size)?;
        }

        Ok(Self {
            mappings,
            options: options.clone(),
            locale,
            salt: options.seed.map(|s| s as u32).unwrap_or(0),
            seed: SeedSource::Random,
            targets: Vec::new(),
            width: 0,
            row_index: 0,
        })
    }

    fn row_seed(&self, row: &Row) -> Option<u32> {
        match self.seed {
            SeedSource::Column(index) => Some(stable_hash(&row[index]) ^ self.salt),
            SeedSource::RowIndex => {
                Some(stable_hash_str(&self.row_index.to_string()) ^ self.salt)
            }
            SeedSource::Random | SeedSource::Global(_) => None,
        }
    }
}

impl Transformer for FakeTransformer {
    fn name(&self) -> &str {
        "fake"
    }

    fn priority(&self) -> i32 {
        super::FAKE_PRIORITY
    }

    fn initialize(&mut self, schema: &Schema) -> Result<Schema> {
        self.seed = SeedSource::resolve(&self.options, schema)?;
        self.row_index = 0;
        self.targets.clear();

        let mut output = schema.clone();
        for mapping in &self.mappings {
            let index = match output.index_of(&mapping.column) {
                Some(index) => {
                    let current = &output.columns()[index];
                    let replaced = Column {
                        logical_type: mapping.faker.logical_type,
                        ..current.clone()
                    };
                    output = output.replace_column(index, replaced);
                    index
                }
                None => {
                    log::debug!(
                        "Fake: adding virtual column '{}' ({})",
                        mapping.column,
                        mapping.faker.path()
                    );
                    output = output.with_column(Column::virtual_column(
                        mapping.column.clone(),
                        mapping.faker.logical_type,
                    ));
                    output.len() - 1
                }
            };

            let mut generator = ValueGenerator::new(
                mapping.faker,
                self.locale,
                column_key(&mapping.column, mapping.faker),
            );
            if self.options.table {
                generator = generator.with_table(self.options.table_size)?;
            }
            let rng = self.seed.stream(generator.column_key());
            self.targets.push(Target {
                index,
                generator,
                rng,
            });
        }

        log::debug!(
            "Fake: {} column(s), seed source {:?}, locale {}",
            self.targets.len(),
            self.seed,
            self.locale
        );
        self.width = output.len();
        Ok(output)
    }

    fn transform(&mut self, mut row: Row) -> Result<Row> {
        let row_seed = self.row_seed(&row);
        self.row_index += 1;

        if row.len() < self.width {
            row.resize(self.width, Value::Null);
        }

        for target in self.targets.iter_mut() {
            row[target.index] = match (row_seed, target.rng.as_mut()) {
                (Some(seed), _) => target.generator.generate_seeded(seed),
                (None, Some(rng)) => target.generator.generate_from(rng),
                (None, None) => eyre::bail!("Fake transformer used before initialize"),
            };
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LogicalType;
    use crate::transform::{PipelineBuilder, TRANSFORMERS};

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("ID", LogicalType::Integer),
            Column::new("NAME", LogicalType::Text),
        ])
    }

    fn run(options: &FakeOptions, values: &[&str], rows: Vec<Row>) -> Vec<Row> {
        let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        let mut fake = FakeTransformer::new(&values, options).unwrap();
        fake.initialize(&schema()).unwrap();
        rows.into_iter().map(|r| fake.transform(r).unwrap()).collect()
    }

    fn seeded_by_id() -> FakeOptions {
        FakeOptions {
            seed_column: Some("ID".to_string()),
            ..FakeOptions::default()
        }
    }

    #[test]
    fn test_seed_column_is_reproducible() {
        let rows = || {
            vec![
                vec![Value::Int(42), Value::from("Alice")],
                vec![Value::Int(42), Value::from("Bob")],
                vec![Value::Int(7), Value::from("Carol")],
            ]
        };
        let first = run(&seeded_by_id(), &["NAME:name.fullname"], rows());
        let second = run(&seeded_by_id(), &["NAME:name.fullname"], rows());

        assert_eq!(first, second);
        assert_eq!(first[0][1], first[1][1]);
        assert_ne!(first[0][1], Value::from("Alice"));
        assert_eq!(first[0][0], Value::Int(42));
    }

    #[test]
    fn test_global_seed_salts_per_row_modes() {
        let rows = || vec![vec![Value::Int(1), Value::Null]];
        let plain = run(&seeded_by_id(), &["NAME:random.uuid"], rows());
        let salted = run(
            &FakeOptions {
                seed: Some(12345),
                ..seeded_by_id()
            },
            &["NAME:random.uuid"],
            rows(),
        );
        assert_ne!(plain, salted);
    }

    #[test]
    fn test_deterministic_uses_row_index() {
        let options = FakeOptions {
            deterministic: true,
            ..FakeOptions::default()
        };
        let rows = || {
            vec![
                vec![Value::Int(1), Value::Null],
                vec![Value::Int(1), Value::Null],
            ]
        };
        let first = run(&options, &["NAME:random.uuid"], rows());
        let second = run(&options, &["NAME:random.uuid"], rows());
        assert_eq!(first, second);
        assert_ne!(first[0][1], first[1][1]);
    }

    #[test]
    fn test_global_seed_stream_is_reproducible() {
        let options = FakeOptions {
            seed: Some(99),
            ..FakeOptions::default()
        };
        let rows = || (0..5).map(|i| vec![Value::Int(i), Value::Null]).collect();
        assert_eq!(
            run(&options, &["NAME:lorem.sentence"], rows()),
            run(&options, &["NAME:lorem.sentence"], rows())
        );
    }

    #[test]
    fn test_global_seed_keeps_targets_independent() {
        let options = FakeOptions {
            seed: Some(7),
            ..FakeOptions::default()
        };
        let mut chain = PipelineBuilder::new(TRANSFORMERS, &options)
            .build(&[
                "--fake",
                "A:name.fullname",
                "--null",
                "X",
                "--fake",
                "B:name.fullname",
            ])
            .unwrap();
        assert_eq!(chain.names(), vec!["fake", "null", "fake"]);

        let source = Schema::new(vec![Column::new("X", LogicalType::Text)]);
        let output = chain.initialize(&source).unwrap();
        assert_eq!(output.len(), 3);

        let rows: Vec<Row> = (0..5)
            .map(|i| {
                chain
                    .apply(vec![Value::from(format!("row {}", i))], |_| {})
                    .unwrap()
            })
            .collect();
        assert!(rows.iter().all(|row| row[0] == Value::Null));
        assert!(rows.iter().any(|row| row[1] != row[2]));
    }

    #[test]
    fn test_unknown_target_becomes_virtual() {
        let mut fake = FakeTransformer::new(
            &["EMAIL:internet.email".to_string()],
            &FakeOptions::default(),
        )
        .unwrap();
        let output = fake.initialize(&schema()).unwrap();
        assert_eq!(output.len(), 3);
        assert!(output.columns()[2].is_virtual);
        assert!(output.extends(&schema()));

        let row = fake.transform(vec![Value::Int(1), Value::Null]).unwrap();
        assert_eq!(row.len(), 3);
        assert!(matches!(&row[2], Value::Text(s) if s.contains('@')));
    }

    #[test]
    fn test_replaced_column_takes_faker_type() {
        let mut fake = FakeTransformer::new(
            &["NAME:random.number".to_string()],
            &FakeOptions::default(),
        )
        .unwrap();
        let output = fake.initialize(&schema()).unwrap();
        assert_eq!(output.columns()[1].logical_type, LogicalType::Integer);
    }

    #[test]
    fn test_table_mode_is_reproducible() {
        let table = FakeOptions {
            table: true,
            table_size: 16,
            ..seeded_by_id()
        };
        let rows = || {
            (0..20)
                .map(|i| vec![Value::Int(i % 4), Value::Null])
                .collect()
        };
        let first = run(&table, &["NAME:name.firstname"], rows());
        assert_eq!(first, run(&table, &["NAME:name.firstname"], rows()));
        assert_eq!(first[1], first[5]);
        assert!(first.iter().all(|r| matches!(r[1], Value::Text(_))));
    }

    #[test]
    fn test_configuration_errors() {
        let values = |v: &str| vec![v.to_string()];
        let defaults = FakeOptions::default();

        assert!(FakeTransformer::new(&values("NAME"), &defaults).is_err());
        assert!(FakeTransformer::new(&values("NAME:name.nickname"), &defaults).is_err());

        let bad_locale = FakeOptions {
            locale: "de".to_string(),
            ..FakeOptions::default()
        };
        assert!(FakeTransformer::new(&values("NAME:name.fullname"), &bad_locale).is_err());

        let table_without_row_seed = FakeOptions {
            table: true,
            ..FakeOptions::default()
        };
        assert!(
            FakeTransformer::new(&values("NAME:name.fullname"), &table_without_row_seed)
                .is_err()
        );

        let odd_table = FakeOptions {
            table: true,
            table_size: 1000,
            ..seeded_by_id()
        };
        assert!(FakeTransformer::new(&values("NAME:name.fullname"), &odd_table).is_err());

        let huge_table = FakeOptions {
            table: true,
            table_size: MAX_TABLE_SIZE * 2,
            ..seeded_by_id()
        };
        let err = FakeTransformer::new(&values("NAME:name.fullname"), &huge_table)
            .err()
            .unwrap();
        assert!(err.to_string().contains("exceeds the maximum"));
    }

    #[test]
    fn test_missing_seed_column_fails_initialize() {
        let options = FakeOptions {
            seed_column: Some("NOPE".to_string()),
            ..FakeOptions::default()
        };
        let mut fake =
            FakeTransformer::new(&["NAME:name.fullname".to_string()], &options).unwrap();
        assert!(fake.initialize(&schema()).is_err());
    }
}
