use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;

use content_refinery::clock::RandomIds;
use content_refinery::coverage;
use content_refinery::parser::RecoveringParser;
use content_refinery::provider::{self, OpenRouterProvider, ProviderRequest, RetryPolicy};
use content_refinery::record::VocabularyTerm;
use content_refinery::{Pipeline, PipelineInputs, PipelineOutput, Settings};

#[derive(Parser)]
#[command(name = "content_refinery", about = "Repair and enrich model-generated articles")]
struct Cli {
    /// Settings file (TOML, JSON or YAML); CONTENT_* env vars override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recover a content record from raw model output
    Parse {
        file: PathBuf,
        /// Print the recovered record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Report vocabulary coverage of an HTML file
    Coverage {
        html: PathBuf,
        /// JSON array of vocabulary terms
        #[arg(short, long)]
        terms: PathBuf,
    },
    /// Parse and post-process one raw model output
    Process {
        file: PathBuf,
        /// JSON file with keyword, terms, links and references
        #[arg(short, long)]
        inputs: Option<PathBuf>,
        /// Where to write the result (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Seed for phrasing and ids
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Post-process every .json/.txt file of a directory in parallel
    Batch {
        dir: PathBuf,
        #[arg(short, long)]
        inputs: Option<PathBuf>,
        #[arg(short, long)]
        out_dir: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Request an article from the provider, then post-process it
    Generate {
        /// System prompt file
        #[arg(long)]
        system: PathBuf,
        /// User prompt file
        #[arg(long)]
        prompt: PathBuf,
        #[arg(short, long)]
        inputs: Option<PathBuf>,
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Model id (default: provider.model setting)
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;

    let result = match cli.command {
        Commands::Parse { file, json } => {
            let raw = read(&file)?;
            let parser = RecoveringParser::new(settings.parser.clone());
            let (record, stage) = parser.parse_with_stage(&raw)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!("Stage:     {}", stage.label());
                println!("Title:     {}", record.title);
                println!("Body:      {} chars", record.html_body.chars().count());
                println!("FAQs:      {}", record.faqs.len());
                println!("Verified:  {}", record.structure_verified);
            }
            Ok(())
        }
        Commands::Coverage { html, terms } => {
            let html = read(&html)?;
            let terms: Vec<VocabularyTerm> = read_json(&terms)?;
            let report = coverage::analyze(&html, &terms);
            println!("Raw:       {}%", report.raw_score);
            println!("Weighted:  {}%", report.weighted_score);
            println!("Used:      {}/{}", report.used_terms.len(), terms.len());
            if !report.critical_missing.is_empty() {
                println!("\n--- Critical missing ---");
                for t in &report.critical_missing {
                    println!("  {} ({})", t.text, t.weight());
                }
            }
            if !report.missing_terms.is_empty() {
                println!("\n--- Missing ---");
                for t in &report.missing_terms {
                    println!("  {}", t.text);
                }
            }
            Ok(())
        }
        Commands::Process { file, inputs, out, seed } => {
            let raw = read(&file)?;
            let inputs = load_inputs(inputs.as_deref())?;
            let pipeline = Pipeline::new(settings);
            let output = run_one(&pipeline, &raw, &inputs, seed)?;
            if out.is_some() {
                print_summary(&output);
            }
            write_output(&output, out.as_deref())
        }
        Commands::Batch { dir, inputs, out_dir, seed } => {
            let inputs = load_inputs(inputs.as_deref())?;
            let files = list_inputs(&dir)?;
            if files.is_empty() {
                println!("No .json or .txt files in {}", dir.display());
                return Ok(());
            }
            fs::create_dir_all(&out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;
            println!("Processing {} files...", files.len());
            let pipeline = Pipeline::new(settings);
            let counts = process_batch(&pipeline, &files, &inputs, &out_dir, seed);
            counts.print();
            Ok(())
        }
        Commands::Generate { system, prompt, inputs, out, model } => {
            let system = read(&system)?;
            let prompt = read(&prompt)?;
            let inputs = load_inputs(inputs.as_deref())?;
            let api_key = std::env::var("OPENROUTER_API_KEY")
                .context("OPENROUTER_API_KEY environment variable must be set")?;
            let model = model.unwrap_or_else(|| settings.provider.model.clone());
            let client = OpenRouterProvider::new(api_key, model)?;
            let policy = RetryPolicy::from_settings(&settings.provider);
            let request = ProviderRequest {
                system_prompt: &system,
                user_prompt: &prompt,
                temperature: settings.provider.temperature,
            };

            let t_gen = Instant::now();
            println!(
                "Generating (timeout {:.0}s, {} attempts)...",
                policy.base_timeout.as_secs_f64(),
                policy.attempts
            );
            let raw = provider::send_with_retry(&client, &request, &policy).await?;
            println!(
                "Received {} chars in {:.1}s",
                raw.len(),
                t_gen.elapsed().as_secs_f64()
            );

            let pipeline = Pipeline::new(settings);
            let output = run_one(&pipeline, &raw, &inputs, None)?;
            if out.is_some() {
                print_summary(&output);
            }
            write_output(&output, out.as_deref())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn read(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = read(path)?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn load_inputs(path: Option<&Path>) -> anyhow::Result<PipelineInputs> {
    match path {
        Some(path) => read_json(path),
        None => Ok(PipelineInputs::default()),
    }
}

fn rngs(seed: Option<u64>) -> (StdRng, RandomIds<StdRng>) {
    match seed {
        Some(seed) => (
            StdRng::seed_from_u64(seed),
            RandomIds::new(StdRng::seed_from_u64(seed.wrapping_add(1))),
        ),
        None => (StdRng::from_entropy(), RandomIds::new(StdRng::from_entropy())),
    }
}

fn run_one(
    pipeline: &Pipeline,
    raw: &str,
    inputs: &PipelineInputs,
    seed: Option<u64>,
) -> anyhow::Result<PipelineOutput> {
    let (mut rng, mut ids) = rngs(seed);
    Ok(pipeline.run(raw, inputs, &mut rng, &mut ids)?)
}

fn print_summary(output: &PipelineOutput) {
    let record = &output.record;
    println!("Title:     {}", record.title);
    println!("Stage:     {}", output.stage.unwrap_or("-"));
    println!("Words:     {}", record.word_count);
    println!(
        "Coverage:  {}% -> {}% ({} terms added, {} failed)",
        output.term_report.before_score,
        output.coverage.raw_score,
        output.term_report.added.len(),
        output.term_report.failed.len()
    );
    println!(
        "Links:     {} -> {} ({} added, {} skipped)",
        output.link_report.before_score,
        output.link_report.after_score,
        output.link_report.added.len(),
        output.link_report.failed.len()
    );
    println!("FAQ:       {:?}", output.faq_placement);
    println!("Takeaways: {:?}", output.takeaways_placement);
    if output.cta_repaired > 0 {
        println!("CTAs:      {} buttons turned into links", output.cta_repaired);
    }
    if !record.structure_verified {
        println!("Warning:   record was recovered from a truncated payload");
    }
}

fn write_output(output: &PipelineOutput, out: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(output)?;
    match out {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
        }
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}

fn list_inputs(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e == "json" || e == "txt")
        })
        .collect();
    files.sort();
    Ok(files)
}

struct BatchCounts {
    ok: usize,
    errors: usize,
    terms: usize,
    links: usize,
}

impl BatchCounts {
    fn print(&self) {
        println!(
            "Done: {} processed ({} ok, {} errors), {} terms and {} links added.",
            self.ok + self.errors,
            self.ok,
            self.errors,
            self.terms,
            self.links,
        );
    }
}

fn process_batch(
    pipeline: &Pipeline,
    files: &[PathBuf],
    inputs: &PipelineInputs,
    out_dir: &Path,
    seed: Option<u64>,
) -> BatchCounts {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;
    use tracing::warn;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let results: Vec<anyhow::Result<(usize, usize)>> = files
        .par_iter()
        .enumerate()
        .map(|(i, file)| {
            let result = process_file(pipeline, file, inputs, out_dir, seed.map(|s| s.wrapping_add(i as u64 * 2)));
            pb.inc(1);
            result
        })
        .collect();
    pb.finish_and_clear();

    let mut counts = BatchCounts {
        ok: 0,
        errors: 0,
        terms: 0,
        links: 0,
    };
    for result in results {
        match result {
            Ok((terms, links)) => {
                counts.ok += 1;
                counts.terms += terms;
                counts.links += links;
            }
            Err(e) => {
                counts.errors += 1;
                warn!("{:#}", e);
            }
        }
    }
    counts
}

/// Each file gets its own pipeline call and output file.
fn process_file(
    pipeline: &Pipeline,
    file: &Path,
    inputs: &PipelineInputs,
    out_dir: &Path,
    seed: Option<u64>,
) -> anyhow::Result<(usize, usize)> {
    let raw = read(file)?;
    let output = run_one(pipeline, &raw, inputs, seed)
        .with_context(|| format!("failed to process {}", file.display()))?;
    let name = file.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    write_output(&output, Some(&out_dir.join(format!("{}.json", name))))?;
    Ok((output.term_report.added.len(), output.link_report.added.len()))
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
