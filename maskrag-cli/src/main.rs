//! maskrag CLI - run anonymization experiments and analyze their results
//!
//! # Commands
//!
//! ```bash
//! # Run the experiment plan over SQuAD samples
//! maskrag run --dataset squad/train-v1.1.json --samples 500 --collection all
//!
//! # Keep only rows whose retrieved context contained PII
//! maskrag filter --target-rows 250
//!
//! # Print the summary table and save it as CSV
//! maskrag analyze
//!
//! # Demo: index a file's paragraphs and query them
//! maskrag retrieve notes.txt "who founded the company" --method bm25 -k 3
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use maskrag_lib::{
    anonymize::{Anonymizer, Gazetteer, GazetteerRecognizer},
    config::Config,
    dataset::{load_squad, split_paragraphs},
    embed::MiniLmEmbedder,
    experiment::{run_plan, Collection, ExperimentRunner},
    filter::{default_groups, filter_group},
    generate::OllamaGenerator,
    metrics::{render_latex, render_text, summarize, write_summary},
    retrieval::{Bm25, RetrievalMethod, Retriever},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "maskrag")]
#[command(about = "Measure the effect of PII anonymization on retrieval-augmented QA")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the experiment plan and write result files
    Run {
        /// Config file (defaults to ./maskrag.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// SQuAD v1.1 JSON file
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Number of questions to sample
        #[arg(long)]
        samples: Option<usize>,

        /// Which result collection to produce
        #[arg(long, value_enum, default_value = "all")]
        collection: CollectionArg,
    },

    /// Reduce result files to the rows where anonymization changed the context
    Filter {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum rows kept per group
        #[arg(long)]
        target_rows: Option<usize>,
    },

    /// Score every result file and print the summary table
    Analyze {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory of exact dense and BM25 results
        #[arg(long)]
        plain_dir: Option<PathBuf>,

        /// Directory of HNSW results
        #[arg(long)]
        indexed_dir: Option<PathBuf>,

        /// Summary CSV to write
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Demo: index each paragraph of a file and retrieve for a query
    Retrieve {
        /// Input file, paragraphs separated by blank lines
        input: PathBuf,

        /// Query to search for
        query: String,

        /// Retrieval backend
        #[arg(short, long, value_enum, default_value = "bm25")]
        method: MethodArg,

        /// Number of results to return
        #[arg(short, default_value = "3")]
        k: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CollectionArg {
    Plain,
    Indexed,
    All,
}

impl CollectionArg {
    fn collections(self) -> Vec<Collection> {
        match self {
            Self::Plain => vec![Collection::Plain],
            Self::Indexed => vec![Collection::Indexed],
            Self::All => vec![Collection::Plain, Collection::Indexed],
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    Exact,
    Bm25,
    Indexed,
}

impl From<MethodArg> for RetrievalMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Exact => Self::DenseExact,
            MethodArg::Bm25 => Self::SparseBm25,
            MethodArg::Indexed => Self::DenseIndexed,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            Config::load(path).with_context(|| format!("Failed to load config: {}", path.display()))
        }
        None => Config::load_default().context("Failed to load ./maskrag.toml"),
    }
}

fn recognizer(config: &Config) -> Result<GazetteerRecognizer> {
    let recognizer = match &config.anonymize.gazetteer {
        Some(path) => GazetteerRecognizer::from_json_file(path)
            .with_context(|| format!("Failed to load gazetteer: {}", path.display()))?,
        None => GazetteerRecognizer::new(&Gazetteer::default())?,
    };

    if recognizer.is_empty() {
        warn!("no gazetteer configured, anonymized corpora will equal the baseline");
    }
    Ok(recognizer)
}

async fn run(config: Config, collection: CollectionArg) -> Result<()> {
    let samples = load_squad(
        &config.dataset.path,
        config.dataset.num_samples,
        &config.dataset.triggers,
    )
    .with_context(|| format!("Failed to load dataset: {}", config.dataset.path.display()))?;
    if samples.is_empty() {
        bail!("no questions matched the trigger phrases");
    }

    let mut anonymizer = Anonymizer::new(
        recognizer(&config)?,
        config.anonymize.score_threshold,
        config.anonymize.seed,
    );

    println!("Loading embedding model {}...", config.embedding.model);
    let embedder = MiniLmEmbedder::with_model(&config.embedding.model)?;
    let generator = OllamaGenerator::new(config.generator.clone())?;
    info!(model = generator.model(), "generator ready");

    let mut runner = ExperimentRunner::new(embedder, generator, config.retrieval.clone());

    for collection in collection.collections() {
        let out_dir = match collection {
            Collection::Plain => &config.output.plain_dir,
            Collection::Indexed => &config.output.indexed_dir,
        };

        let report = run_plan(&mut runner, &mut anonymizer, &samples, collection, out_dir).await?;

        for path in &report.written {
            println!("Saved {}", path.display());
        }
        for (file, error) in &report.failed {
            println!("Skipped {file}: {error}");
        }
    }

    Ok(())
}

fn filter(config: &Config) -> Result<()> {
    for group in default_groups(&config.output.plain_dir, &config.output.indexed_dir) {
        println!("Processing group based on: {}", group.baseline.display());
        match filter_group(&group, config.filter.target_rows)? {
            Some(outcome) => {
                println!("  Found {} PII rows.", outcome.selected.len());
                for path in &outcome.written {
                    println!("  Saved: {}", path.display());
                }
                for path in &outcome.skipped {
                    println!("  Skipped: {}", path.display());
                }
            }
            None => println!("  Skipped group."),
        }
    }
    Ok(())
}

fn analyze(config: &Config) -> Result<()> {
    let summary = summarize(&config.output.plain_dir, &config.output.indexed_dir);
    if summary.is_empty() {
        println!("Error: No results generated! Check folder paths.");
        return Ok(());
    }

    let rule = "=".repeat(100);
    println!("\n{rule}\nANALYSIS RESULTS\n{rule}");
    print!("{}", render_text(&summary));

    println!("\n{rule}\nLATEX TABLE\n{rule}");
    print!("{}", render_latex(&summary));

    write_summary(&config.output.summary_path, &summary)
        .with_context(|| format!("Failed to write {}", config.output.summary_path.display()))?;
    println!("\nResults saved to '{}'.", config.output.summary_path.display());
    Ok(())
}

fn retrieve(input: &Path, query: &str, method: RetrievalMethod, k: usize) -> Result<()> {
    println!("Loading '{}'...", input.display());
    let text = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let documents = split_paragraphs(&text);
    println!("Found {} paragraphs", documents.len());

    // only dense backends need the model
    let mut embedder = if method.is_dense() {
        println!("Loading embedding model...");
        Some(MiniLmEmbedder::new()?)
    } else {
        None
    };

    let mut retriever = match embedder.as_mut() {
        Some(embedder) => Retriever::for_method(method, embedder),
        None => Retriever::new(Bm25::default()),
    };
    retriever.ingest(documents)?;

    println!("\nSearching: '{query}' (method={method}, k={k})");
    println!("\n=== Results ===\n");
    for (i, hit) in retriever.retrieve_scored(query, k)?.iter().enumerate() {
        println!("#{} (doc {}, score: {:.4})", i + 1, hit.position, hit.score);
        println!("---");
        let preview: String = hit.text.chars().take(300).collect();
        let ellipsis = if hit.text.chars().count() > 300 { "..." } else { "" };
        println!("{preview}{ellipsis}\n");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            dataset,
            samples,
            collection,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(dataset) = dataset {
                config.dataset.path = dataset;
            }
            if let Some(samples) = samples {
                config.dataset.num_samples = samples;
            }
            run(config, collection).await?;
        }

        Commands::Filter { config, target_rows } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(target_rows) = target_rows {
                config.filter.target_rows = target_rows;
            }
            filter(&config)?;
            println!("Done.");
        }

        Commands::Analyze {
            config,
            plain_dir,
            indexed_dir,
            output,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(dir) = plain_dir {
                config.output.plain_dir = dir;
            }
            if let Some(dir) = indexed_dir {
                config.output.indexed_dir = dir;
            }
            if let Some(path) = output {
                config.output.summary_path = path;
            }
            analyze(&config)?;
        }

        Commands::Retrieve {
            input,
            query,
            method,
            k,
        } => {
            retrieve(&input, &query, method.into(), k)?;
        }
    }

    Ok(())
}
