use clap::{Args, Parser, builder::styling};
use eyre::Result;
use owo_colors::OwoColorize;
use querydump::{
    cli,
    config::{ExportConfig, TransformerSpec},
    etl::{CancelReason, ExportStatus},
    transform::{PipelineBuilder, TRANSFORMERS},
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// QueryDump: stream rows from a source to a file through an ordered chain of anonymizing transformers
#[derive(Parser)]
#[command(name = "querydump", version, styles = STYLES)]
struct Cli {
    /// Source to read (NDJSON file, or `ndjson:` prefixed path)
    #[arg(short, long)]
    input: Option<String>,

    /// Output file; the format follows the extension
    #[arg(short, long)]
    output: Option<String>,

    /// YAML job file; command-line values override its settings
    #[arg(short, long)]
    job: Option<PathBuf>,

    /// Rows per read and per write
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Stop after this many rows (0 = unlimited)
    #[arg(short, long)]
    limit: Option<u64>,

    /// Rows buffered between pipeline stages
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Print the output schema without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Set columns to null (COLUMN or A,B); repeatable
    #[arg(long = "null", value_name = "COLUMNS")]
    null: Vec<String>,

    /// Replace a column with a literal; repeatable
    #[arg(long, value_name = "COLUMN:VALUE")]
    overwrite: Vec<String>,

    /// Render a column from a template like "{FIRST} {LAST}"; repeatable
    #[arg(long, value_name = "COLUMN:TEMPLATE")]
    format: Vec<String>,

    /// Fill a column with generated data; repeatable
    #[arg(short, long, value_name = "COLUMN:DATASET.METHOD")]
    fake: Vec<String>,

    #[command(flatten)]
    fake_options: FakeArgs,

    /// List fake data generators and exit
    #[arg(long)]
    fake_list: bool,

    /// The dotenv file to source variables from
    #[arg(short, long, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long)]
    debug: bool,
}

#[derive(Args)]
struct FakeArgs {
    /// Locale for generated data (en, fr)
    #[arg(long = "fake-locale", value_name = "LOCALE")]
    locale: Option<String>,

    /// Seed for reproducible fake data
    #[arg(long = "fake-seed", value_name = "N")]
    seed: Option<u64>,

    /// Column whose value seeds each row's fake data
    #[arg(long = "fake-seed-column", value_name = "COLUMN")]
    seed_column: Option<String>,

    /// Seed each row's fake data from its position
    #[arg(long = "fake-deterministic")]
    deterministic: bool,

    /// Precompute fake values and look them up by seed
    #[arg(long = "fake-table")]
    table: bool,

    /// Number of precomputed values per column (power of two)
    #[arg(long = "fake-table-size", value_name = "N")]
    table_size: Option<usize>,
}

impl Cli {
    /// Layer command-line values over `config`
    fn apply(&self, config: &mut ExportConfig) {
        if let Some(input) = &self.input {
            config.input = input.clone();
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(limit) = self.limit {
            config.limit = limit;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        config.dry_run |= self.dry_run;

        let fake = &self.fake_options;
        if let Some(locale) = &fake.locale {
            config.fake.locale = locale.clone();
        }
        if let Some(seed) = fake.seed {
            config.fake.seed = Some(seed);
        }
        if let Some(column) = &fake.seed_column {
            config.fake.seed_column = Some(column.clone());
        }
        config.fake.deterministic |= fake.deterministic;
        config.fake.table |= fake.table;
        if let Some(size) = fake.table_size {
            config.fake.table_size = size;
        }
    }

    fn has_transformer_flags(&self) -> bool {
        !(self.null.is_empty()
            && self.overwrite.is_empty()
            && self.format.is_empty()
            && self.fake.is_empty())
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    if Path::new(&cli.env).exists() {
        dotenvy::from_filename(&cli.env)?;
    }

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    if cli.fake_list {
        print!("{}", cli::fake_catalog());
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = match &cli.job {
        Some(path) => {
            log::info!("Loading job file {}", path.display().bright_black());
            ExportConfig::from_job_file(path)?
        }
        None => ExportConfig::default(),
    };
    cli.apply(&mut config);

    // Clap groups repeated flags per kind, so the relative order of
    // transformer flags is recovered from the raw arguments
    if cli.has_transformer_flags() {
        if !config.transformers.is_empty() {
            log::warn!("Command-line transformers replace those in the job file");
        }
        let args: Vec<String> = std::env::args().skip(1).collect();
        let instructions =
            PipelineBuilder::new(TRANSFORMERS, &config.fake).parse_instructions(&args[..]);
        cli::check_instruction_counts(
            &instructions,
            &[
                ("null", cli.null.len()),
                ("overwrite", cli.overwrite.len()),
                ("format", cli.format.len()),
                ("fake", cli.fake.len()),
            ],
        )?;
        config.transformers = TransformerSpec::Ordered(instructions);
    }

    if config.dry_run {
        cli::dry_run(&config).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let cancel = CancellationToken::new();
    let signal = cli::cancel_on_ctrl_c(cancel.clone());
    let outcome = cli::export(&config, cancel).await;
    signal.abort();

    match outcome?.status {
        ExportStatus::Cancelled(CancelReason::Requested) => Ok(ExitCode::from(130)),
        _ => Ok(ExitCode::SUCCESS),
    }
}
