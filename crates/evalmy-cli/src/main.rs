//! EvalMy CLI - score LLM answers against expected answers
//!
//! The `evalmy` command sends evaluation tasks to the evalmy.ai service and
//! prints the scored results as JSON.
//!
//! ## Commands
//!
//! - `evaluate`: Score one expected/actual pair
//! - `batch`: Score a JSON array of `{expected, actual, context}` objects
//! - `dataset`: Score a JSON array of dataset records
//! - `test-case`: Score a structured test case
//!
//! Credentials come from flags or the environment (a `.env` file is loaded
//! when present).

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use evalmy_core::{
    Auth, Dataset, EvalOptions, EvaluationInput, Evaluator, EvaluatorConfig, Symbol, WireSchema,
    DEFAULT_HOST, DEFAULT_SYMBOLS,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "evalmy")]
#[command(author = "EvalMy Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Score LLM answers with the evalmy.ai service", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    service: ServiceArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Service location and credentials.
#[derive(Args, Debug)]
struct ServiceArgs {
    /// Scoring service host
    #[arg(long, global = true, env = "EVALMYAI_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// evalmy.ai API token
    #[arg(long, global = true, env = "EVALMYAI_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Expect the flat `{score, reasoning}` response layout
    #[arg(long, global = true)]
    flat_schema: bool,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// JSON file mapping symbol names to scoring descriptors
    #[arg(long, global = true)]
    scoring: Option<PathBuf>,

    #[arg(long, global = true, env = "AZURE_OPENAI_API_KEY", hide_env_values = true)]
    azure_api_key: Option<String>,

    #[arg(long, global = true, env = "AZURE_OPENAI_ENDPOINT")]
    azure_endpoint: Option<String>,

    #[arg(long, global = true, env = "AZURE_OPENAI_API_VERSION")]
    azure_api_version: Option<String>,

    #[arg(long, global = true, env = "AZURE_DEPLOYMENT_NAME")]
    azure_deployment: Option<String>,

    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, global = true, env = "OPENAI_MODEL", default_value = "gpt-4o")]
    openai_model: String,
}

/// Options shared by every evaluation command.
#[derive(Args, Debug)]
struct RunArgs {
    /// Attempts per symbol
    #[arg(short, long, default_value_t = 1)]
    retry: u32,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one expected/actual pair
    Evaluate {
        /// The reference answer
        #[arg(short, long)]
        expected: String,

        /// The answer under evaluation
        #[arg(short, long)]
        actual: String,

        /// Background for the comparison
        #[arg(short, long, default_value = "")]
        context: String,

        /// Symbol to score (repeatable; default: contradictions)
        #[arg(short, long = "symbol")]
        symbols: Vec<String>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Score every entry of a JSON array, isolating failures per entry
    Batch {
        /// JSON file holding an array of `{expected, actual, context}` objects
        input: PathBuf,

        /// Symbol to score (repeatable; default: contradictions)
        #[arg(short, long = "symbol")]
        symbols: Vec<String>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Score every row of a dataset given as JSON records
    Dataset {
        /// JSON file holding an array of records with `expected` and `actual`
        input: PathBuf,

        /// Context prepended to every row's own context
        #[arg(short, long, default_value = "")]
        context: String,

        /// Symbol to score (repeatable; default: contradictions)
        #[arg(short, long = "symbol")]
        symbols: Vec<String>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Score a structured test case
    TestCase {
        /// JSON file holding the test case
        input: PathBuf,

        /// JSON file holding an array of actual answers for items without one
        #[arg(long)]
        actual_values: Option<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    evalmy_core::init_tracing(cli.json, level);

    let mut evaluator = build_evaluator(&cli.service)?;
    if let Some(path) = &cli.service.scoring {
        apply_scoring_file(&mut evaluator, path)?;
    }

    let (result, output) = match cli.command {
        Commands::Evaluate {
            expected,
            actual,
            context,
            symbols,
            run,
        } => (
            cmd_evaluate(&evaluator, &expected, &actual, &context, &symbols, run.retry).await?,
            run.output,
        ),
        Commands::Batch {
            input,
            symbols,
            run,
        } => (
            cmd_batch(&evaluator, &input, &symbols, run.retry).await?,
            run.output,
        ),
        Commands::Dataset {
            input,
            context,
            symbols,
            run,
        } => (
            cmd_dataset(&evaluator, &input, &context, &symbols, run.retry).await?,
            run.output,
        ),
        Commands::TestCase {
            input,
            actual_values,
            run,
        } => (
            cmd_test_case(&evaluator, &input, actual_values.as_deref(), run.retry).await?,
            run.output,
        ),
    };

    write_output(&result, output.as_deref())
}

fn build_evaluator(args: &ServiceArgs) -> Result<Evaluator> {
    let token = args
        .token
        .as_deref()
        .context("No evalmy.ai token: pass --token or set EVALMYAI_TOKEN")?;
    let auth = resolve_auth(args)?;

    let mut config = EvaluatorConfig::default().with_host(&args.host);
    if args.flat_schema {
        config = config.with_wire_schema(WireSchema::Flat);
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_timeout(std::time::Duration::from_secs(secs));
    }

    info!(host = %config.host, "using scoring service");
    Evaluator::with_config(auth, token, config).context("Failed to create evaluator")
}

/// Azure credentials win when an Azure key is present, then OpenAI.
fn resolve_auth(args: &ServiceArgs) -> Result<Auth> {
    if let Some(api_key) = &args.azure_api_key {
        let endpoint = args
            .azure_endpoint
            .as_deref()
            .context("AZURE_OPENAI_ENDPOINT is required with an Azure key")?;
        let api_version = args
            .azure_api_version
            .as_deref()
            .context("AZURE_OPENAI_API_VERSION is required with an Azure key")?;
        let deployment = args
            .azure_deployment
            .as_deref()
            .context("AZURE_DEPLOYMENT_NAME is required with an Azure key")?;
        return Ok(Auth::azure(api_key, endpoint, api_version, deployment));
    }
    if let Some(api_key) = &args.openai_api_key {
        return Ok(Auth::open_ai(api_key, &args.openai_model));
    }
    bail!("No LLM credentials: set AZURE_OPENAI_API_KEY or OPENAI_API_KEY")
}

fn apply_scoring_file(evaluator: &mut Evaluator, path: &Path) -> Result<()> {
    let table: serde_json::Map<String, Value> = read_json_file(path)?;
    for (symbol, descriptor) in &table {
        evaluator
            .set_scoring(symbol, descriptor)
            .with_context(|| format!("Invalid scoring for '{}' in {:?}", symbol, path))?;
    }
    Ok(())
}

fn parse_symbols(names: &[String]) -> Result<Vec<Symbol>> {
    if names.is_empty() {
        return Ok(DEFAULT_SYMBOLS.to_vec());
    }
    Ok(Symbol::parse_list(names)?)
}

async fn cmd_evaluate(
    evaluator: &Evaluator,
    expected: &str,
    actual: &str,
    context: &str,
    symbols: &[String],
    retry: u32,
) -> Result<Value> {
    let options = EvalOptions::default()
        .with_symbols(&parse_symbols(symbols)?)
        .with_retry(retry);
    let input = EvaluationInput::new(expected, actual).with_context(context);

    let result = evaluator
        .evaluate_input(&input, &options)
        .await
        .context("Evaluation failed")?;
    Ok(serde_json::to_value(result)?)
}

async fn cmd_batch(
    evaluator: &Evaluator,
    input: &Path,
    symbols: &[String],
    retry: u32,
) -> Result<Value> {
    let entries: Vec<Value> = read_json_file(input)?;
    let options = EvalOptions::default()
        .with_symbols(&parse_symbols(symbols)?)
        .with_retry(retry);

    let batch = evaluator.evaluate_batch(&entries, &options).await;
    if batch.failed() > 0 {
        info!(failed = batch.failed(), total = batch.len(), "batch finished with failures");
    }
    Ok(serde_json::to_value(batch)?)
}

async fn cmd_dataset(
    evaluator: &Evaluator,
    input: &Path,
    context: &str,
    symbols: &[String],
    retry: u32,
) -> Result<Value> {
    let records: Vec<Value> = read_json_file(input)?;
    let data = Dataset::from_records(&records)
        .with_context(|| format!("Invalid dataset in {:?}", input))?;

    let scored = evaluator
        .evaluate_dataset(&data, &parse_symbols(symbols)?, context, retry)
        .await
        .context("Dataset evaluation failed")?;
    Ok(Value::Array(scored.to_records()))
}

async fn cmd_test_case(
    evaluator: &Evaluator,
    input: &Path,
    actual_values: Option<&Path>,
    retry: u32,
) -> Result<Value> {
    let test_case: Value = read_json_file(input)?;
    let actual: Option<Vec<String>> = actual_values.map(read_json_file).transpose()?;

    let result = evaluator
        .evaluate_test_case(&test_case, actual.as_deref(), retry)
        .await
        .context("Test case evaluation failed")?;
    Ok(Value::Object(result))
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))
}

fn write_output(value: &Value, output: Option<&Path>) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered + "\n")
                .with_context(|| format!("Failed to write {:?}", path))?;
            info!(path = %path.display(), "result written");
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
