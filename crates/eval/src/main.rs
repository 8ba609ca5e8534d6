//! Evaluation CLI for brand visibility analysis.
//!
//! Usage:
//!     eval --catalog catalog.json analyze --org "Acme Corp" --prompt "best helpdesk" --response-file answer.txt
//!     eval --catalog catalog.json analyze --org "Acme Corp" --prompt "best helpdesk" --assisted < answer.txt
//!     eval benchmark --test-file crates/eval/fixtures/cases.json
//!     eval health

mod benchmark;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use brandlens_backend_openai::{OpenAiBackend, OpenAiConfig};
use brandlens_engine::{Engine, EngineConfig};
use brandlens_explain::{explain_result, summarize_visibility};
use brandlens_extract::CompletionBackend;
use brandlens_gazetteer::Gazetteer;
use brandlens_model::{AnalysisRequest, BrandCatalogEntry};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::benchmark::{check, BenchmarkFile};

#[derive(Parser)]
#[command(name = "eval")]
#[command(about = "Evaluate brand visibility in AI-generated answers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Brand catalog (JSON array of entries)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// OpenAI-compatible API base URL
    #[arg(long, global = true, default_value = "https://api.openai.com/v1")]
    api_url: String,

    /// Completion model
    #[arg(long, global = true, default_value = "gpt-4o-mini")]
    model: String,

    /// API key for the completion backend
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one response
    Analyze {
        /// Organization brand name
        #[arg(long)]
        org: String,

        /// Extra names that identify the organization
        #[arg(long = "alias")]
        aliases: Vec<String>,

        /// The prompt that produced the response
        #[arg(long)]
        prompt: String,

        /// Response text (read from stdin when neither this nor --response-file is set)
        #[arg(long, conflicts_with = "response_file")]
        response: Option<String>,

        /// File holding the response text
        #[arg(long)]
        response_file: Option<PathBuf>,

        /// Ask the completion backend for names first
        #[arg(long)]
        assisted: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Run scenarios and compare against expected outcomes
    Benchmark {
        /// Path to the scenario file (JSON)
        #[arg(short, long)]
        test_file: PathBuf,

        /// Use assisted extraction
        #[arg(long)]
        assisted: bool,
    },

    /// Check completion backend health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("brandlens=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Analyze {
            org,
            aliases,
            prompt,
            response,
            response_file,
            assisted,
            format,
        } => {
            let response = read_response(response.as_deref(), response_file.as_deref())?;
            let request = AnalysisRequest::new(response, prompt.as_str(), org.as_str())
                .with_aliases(aliases.clone());
            let gazetteer = load_gazetteer(cli.catalog.as_deref())?;
            if gazetteer.org_entries().next().is_none() {
                tracing::warn!(org = %org, "Catalog has no org brand; matching on org name and aliases only");
            }

            if *assisted {
                let engine = Engine::assisted(backend(&cli)?, config)?;
                run_analyze(&engine, &request, &gazetteer, *format).await?;
            } else {
                let engine = Engine::deterministic(config)?;
                run_analyze(&engine, &request, &gazetteer, *format).await?;
            }
        }
        Commands::Benchmark {
            test_file,
            assisted,
        } => {
            let passed = if *assisted {
                let engine = Engine::assisted(backend(&cli)?, config)?;
                run_benchmark(&engine, test_file).await?
            } else {
                let engine = Engine::deterministic(config)?;
                run_benchmark(&engine, test_file).await?
            };
            if !passed {
                std::process::exit(1);
            }
        }
        Commands::Health => {
            run_health(&backend(&cli)?).await?;
        }
    }

    Ok(())
}

fn backend(cli: &Cli) -> Result<OpenAiBackend> {
    let backend = OpenAiBackend::new(OpenAiConfig {
        base_url: cli.api_url.clone(),
        api_key: cli.api_key.clone(),
        model: cli.model.clone(),
        ..Default::default()
    })?;
    Ok(backend)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

fn load_gazetteer(path: Option<&Path>) -> Result<Gazetteer> {
    let Some(path) = path else {
        return Ok(Gazetteer::empty());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading catalog {}", path.display()))?;
    let catalog: Vec<BrandCatalogEntry> =
        serde_json::from_str(&raw).with_context(|| format!("parsing catalog {}", path.display()))?;
    Ok(Gazetteer::build(&catalog))
}

fn read_response(inline: Option<&str>, file: Option<&Path>) -> Result<String> {
    if let Some(text) = inline {
        return Ok(text.to_string());
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("reading response {}", path.display()));
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("reading response from stdin")?;
    Ok(text)
}

async fn run_analyze<B: CompletionBackend + Sync>(
    engine: &Engine<B>,
    request: &AnalysisRequest,
    gazetteer: &Gazetteer,
    format: Format,
) -> Result<()> {
    let result = engine.analyze(request, gazetteer).await?;

    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", summarize_visibility(&result, &engine.config().score));
    println!("---");
    println!("Score: {:.1}", result.score);
    println!("Brands: {}", result.brands_mentioned.join(", "));
    for competitor in &result.competitors {
        println!(
            "   {} ({}x{})",
            competitor.name,
            competitor.occurrences,
            if competitor.in_catalog { ", catalog" } else { "" }
        );
    }
    println!("---");
    for explanation in explain_result(&result) {
        println!("{:+.1}  {}", explanation.impact, explanation.summary);
        println!("      {}", explanation.detail);
    }
    if !result.discovered.is_empty() {
        println!("---");
        println!("New names:");
        for name in &result.discovered {
            match (&name.similar_to, name.is_org_brand) {
                (Some(similar), true) => {
                    println!("   {} (your brand; variant of {}?)", name.name, similar)
                }
                (None, true) => println!("   {} (your brand, not in catalog)", name.name),
                (Some(similar), false) => println!("   {} (variant of {}?)", name.name, similar),
                (None, false) => println!("   {}", name.name),
            }
        }
    }
    println!("---");
    println!(
        "Method: {} | Confidence: {:.2}",
        result.metadata.method, result.metadata.confidence
    );

    Ok(())
}

async fn run_benchmark<B: CompletionBackend + Sync>(engine: &Engine<B>, test_file: &Path) -> Result<bool> {
    let raw = std::fs::read_to_string(test_file)
        .with_context(|| format!("reading test file {}", test_file.display()))?;
    let file: BenchmarkFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing test file {}", test_file.display()))?;
    if file.cases.is_empty() {
        bail!("{} contains no cases", test_file.display());
    }

    let gazetteer = Gazetteer::build(&file.catalog);
    tracing::debug!(
        cases = file.cases.len(),
        catalog = gazetteer.len(),
        "Loaded benchmark"
    );
    let mut failed = 0;

    for case in &file.cases {
        let outcome = engine.analyze(&case.request(), &gazetteer).await;
        let failures = check(&outcome, &case.expect);
        if failures.is_empty() {
            println!("PASS  {}", case.name);
        } else {
            failed += 1;
            println!("FAIL  {}", case.name);
            for failure in failures {
                println!("      {failure}");
            }
        }
    }

    println!("---");
    println!("{} passed, {} failed", file.cases.len() - failed, failed);
    Ok(failed == 0)
}

async fn run_health(backend: &OpenAiBackend) -> Result<()> {
    print!("Checking {} backend... ", backend.name());

    match backend.health_check().await {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(e) => {
            println!("FAILED: {}", e);
            std::process::exit(1);
        }
    }
}
