use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use citecheck_core::config_file::{self, ConfigFile};
use citecheck_core::{Config, ProgressEvent, ReferenceRecord, Verifier, verify_references};
use citecheck_ingest::{GrobidClient, discover_pdfs, ingest_document, pdf_file_name};
use citecheck_reporting::{BatchSummary, JsonlWriter, OutputRecord};

mod output;

use output::ColorMode;

/// Check the references of academic PDFs against the Crossref catalog
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log pipeline progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Overrides for the file and environment configuration.
#[derive(Args, Debug, Default, Clone)]
struct ConfigArgs {
    /// GROBID server URL
    #[arg(long)]
    grobid_url: Option<String>,

    /// Crossref API base URL
    #[arg(long)]
    crossref_url: Option<String>,

    /// Contact address sent to Crossref (polite pool)
    #[arg(long)]
    mailto: Option<String>,

    /// Candidates requested per title search
    #[arg(long)]
    rows: Option<usize>,

    /// Minimum score for FOUND_BY_TITLE_HIGH
    #[arg(long)]
    high: Option<u8>,

    /// Minimum score for FOUND_BY_TITLE_MED
    #[arg(long)]
    medium: Option<u8>,

    /// Concurrent verification workers per document
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert every PDF in a directory and verify its references
    Run {
        /// Directory holding the PDFs (not searched recursively)
        input_dir: PathBuf,

        /// JSON Lines output file
        #[arg(short, long, default_value = "outputs/results.jsonl")]
        output: PathBuf,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Verify a single reference given on the command line
    Check {
        /// Reference title
        #[arg(long, default_value = "")]
        title: String,

        /// Reference DOI
        #[arg(long, default_value = "")]
        doi: String,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Dry run: print the references found in a TEI file without querying Crossref
    Extract {
        /// TEI XML file produced by GROBID
        tei_file: PathBuf,

        /// Print one JSON record per line instead of the listing
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Summarize a results file
    Summary {
        /// JSON Lines results file
        #[arg(default_value = "outputs/results.jsonl")]
        results: PathBuf,

        /// Also write a per-document CSV summary to this path
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the platform config file
        #[arg(long)]
        save: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run {
            input_dir,
            output,
            no_progress,
            no_color,
            config,
        } => {
            let config = load_config(&config)?;
            run(&input_dir, &output, config, !no_progress, ColorMode(!no_color)).await
        }
        Command::Check { title, doi, config } => {
            let config = load_config(&config)?;
            check(title, doi, config).await
        }
        Command::Extract {
            tei_file,
            json,
            no_color,
        } => extract(&tei_file, json, ColorMode(!no_color)),
        Command::Summary {
            results,
            csv,
            no_color,
        } => summary(&results, csv.as_deref(), ColorMode(!no_color)),
        Command::Config { save, config } => {
            let config = load_config(&config)?;
            show_config(&config, save)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &ConfigArgs) -> anyhow::Result<Config> {
    resolve_config(args, &config_file::load_config(), |key| {
        std::env::var(key).ok()
    })
}

/// Layer defaults, config files, environment and CLI flags, in that order.
fn resolve_config(
    args: &ConfigArgs,
    file: &ConfigFile,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Config> {
    let mut config = Config::default();
    config.apply_file(file);

    let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
    if let Some(url) = env("GROBID_URL") {
        config.grobid_url = url;
    }
    if let Some(url) = env("CROSSREF_URL") {
        config.crossref_url = url;
    }
    if let Some(mailto) = env("CROSSREF_MAILTO") {
        config.crossref_mailto = Some(mailto);
    }

    if let Some(ref url) = args.grobid_url {
        config.grobid_url = url.clone();
    }
    if let Some(ref url) = args.crossref_url {
        config.crossref_url = url.clone();
    }
    if let Some(ref mailto) = args.mailto {
        config.crossref_mailto = Some(mailto.clone());
    }
    if let Some(rows) = args.rows {
        config.search_rows = rows;
    }
    if let Some(high) = args.high {
        config.thresholds.high = high;
    }
    if let Some(medium) = args.medium {
        config.thresholds.medium = medium;
    }
    if let Some(workers) = args.workers {
        config.num_workers = workers;
    }

    config.validate().context("invalid configuration")?;
    tracing::debug!(?config, "resolved configuration");
    Ok(config)
}

async fn run(
    input_dir: &Path,
    output_path: &Path,
    config: Config,
    show_progress: bool,
    color: ColorMode,
) -> anyhow::Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    if !input_dir.is_dir() {
        anyhow::bail!("Input directory not found: {}", input_dir.display());
    }
    let pdfs = discover_pdfs(input_dir)
        .with_context(|| format!("failed to list {}", input_dir.display()))?;

    let verifier = Arc::new(Verifier::from_config(&config)?);
    let grobid = GrobidClient::from_config(&config, reqwest::Client::new());
    let mut writer = JsonlWriter::create(output_path)
        .with_context(|| format!("cannot open {}", output_path.display()))?;

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let bar = if show_progress {
        ProgressBar::new(pdfs.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} Processing PDFs [{bar:40.cyan/dim}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    let mut written: Vec<OutputRecord> = Vec::new();

    for pdf in &pdfs {
        if cancel.is_cancelled() {
            break;
        }
        let name = pdf_file_name(pdf);
        bar.set_message(name.clone());

        let ingested = tokio::select! {
            _ = cancel.cancelled() => break,
            result = ingest_document(&grobid, pdf) => result,
        };

        let refs = match ingested {
            Ok(refs) => refs,
            Err(e) => {
                tracing::warn!(pdf = %name, error = %e, "document failed");
                let record = OutputRecord::DocumentError {
                    pdf_file: name,
                    error: e.to_string(),
                };
                writer.write(&record)?;
                written.push(record);
                bar.inc(1);
                continue;
            }
        };

        let progress_cb = {
            let bar = bar.clone();
            let name = name.clone();
            move |event: ProgressEvent| {
                if let ProgressEvent::Checking { index, total, .. } = event {
                    bar.set_message(format!("{} ({}/{})", name, index + 1, total));
                }
            }
        };

        let results = verify_references(
            refs.clone(),
            verifier.clone(),
            config.num_workers,
            progress_cb,
            cancel.clone(),
        )
        .await;

        for (ref_index, (reference, result)) in refs.into_iter().zip(results).enumerate() {
            let record = match result {
                Some(Ok(verdict)) => OutputRecord::Verdict {
                    pdf_file: name.clone(),
                    ref_index,
                    reference,
                    verdict,
                },
                Some(Err(e)) => OutputRecord::ReferenceError {
                    pdf_file: name.clone(),
                    ref_index,
                    reference,
                    error: e.to_string(),
                },
                // Cancelled before it ran
                None => continue,
            };
            writer.write(&record)?;
            written.push(record);
        }
        tracing::info!(pdf = %name, "document finished");
        bar.inc(1);
    }

    bar.finish_and_clear();

    let mut stdout = std::io::stdout();
    output::print_summary(&mut stdout, &BatchSummary::from_records(&written), color)?;
    writeln!(stdout)?;
    if cancel.is_cancelled() {
        writeln!(stdout, "Interrupted; partial results kept.")?;
    }
    writeln!(
        stdout,
        "Wrote {} records to {}",
        writer.written(),
        output_path.display()
    )?;
    Ok(())
}

async fn check(title: String, doi: String, config: Config) -> anyhow::Result<()> {
    let verifier = Verifier::from_config(&config)?;
    let reference = ReferenceRecord::new(title, "", doi, vec![]);
    let verdict = verifier
        .verify(&reference)
        .await
        .context("catalog request failed")?;
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(())
}

fn extract(tei_file: &Path, json: bool, color: ColorMode) -> anyhow::Result<()> {
    if !tei_file.exists() {
        anyhow::bail!("File not found: {}", tei_file.display());
    }
    let refs = citecheck_tei::extract_references_from_file(tei_file)
        .with_context(|| format!("failed to extract {}", tei_file.display()))?;

    let mut stdout = std::io::stdout();
    if json {
        for r in &refs {
            writeln!(stdout, "{}", serde_json::to_string(r)?)?;
        }
    } else {
        output::print_extracted(&mut stdout, &pdf_file_name(tei_file), &refs, color)?;
    }
    Ok(())
}

fn summary(results: &Path, csv: Option<&Path>, color: ColorMode) -> anyhow::Result<()> {
    let records = citecheck_reporting::read_records(results)
        .with_context(|| format!("failed to read {}", results.display()))?;
    let summary = BatchSummary::from_records(&records);

    let mut stdout = std::io::stdout();
    output::print_summary(&mut stdout, &summary, color)?;

    if let Some(path) = csv {
        citecheck_reporting::export_summary_csv(&summary, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        writeln!(stdout)?;
        writeln!(stdout, "Summary CSV written to {}", path.display())?;
    }
    Ok(())
}

fn show_config(config: &Config, save: bool) -> anyhow::Result<()> {
    let file = ConfigFile::from(config);
    print!("{}", toml::to_string_pretty(&file)?);
    if save {
        let path = config_file::save_config(&file).map_err(anyhow::Error::msg)?;
        println!();
        println!("Saved to {}", path.display());
    }
    Ok(())
}
