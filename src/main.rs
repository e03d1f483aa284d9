use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use logomatch::config::{PolicyKind, StrategyKind};
use logomatch::extract::{self, DEFAULT_HASH_SIZE, FeatureExtractor};
use logomatch::features::{self, EntityTable};
use logomatch::report::GroupReport;
use logomatch::{Engine, EngineConfig, Group};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "logomatch", version, about = "Group websites that share a logo")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute perceptual hashes and dominant colors for a directory of logos
    Features {
        /// Directory of downloaded logo images
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Where to write the feature records
        #[arg(short, long, value_name = "FILE", default_value = "features.json")]
        output: PathBuf,
        /// Hash width and height in bits
        #[arg(long, default_value_t = DEFAULT_HASH_SIZE)]
        hash_size: u32,
    },

    /// Group websites by logo
    Group {
        /// Feature records (JSON array of {entity, image, features})
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
        /// Near-duplicate map from an upstream search; only its pairs are compared
        #[arg(long, value_name = "FILE")]
        near_duplicates: Option<PathBuf>,
        /// Engine configuration (default: the user config dir, if present)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        #[arg(long, value_enum)]
        strategy: Option<StrategyKind>,
        #[arg(long, value_enum)]
        policy: Option<PolicyKind>,
        /// Combined-distance acceptance threshold
        #[arg(short, long)]
        threshold: Option<f64>,
        /// Groups above this size are split into singletons
        #[arg(long)]
        max_group_size: Option<usize>,
        #[arg(long)]
        eps: Option<f64>,
        #[arg(long)]
        min_samples: Option<usize>,
        /// Score pairs on a single thread
        #[arg(long)]
        sequential: bool,
        /// Write the groups as JSON
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Write a plain-text digest of the largest groups
        #[arg(long, value_name = "FILE")]
        summary: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Features {
            path,
            output,
            hash_size,
        } => {
            println!("▶ Extracting logo features in: {}", path.display());
            let images = scan_directory(&path);
            if images.is_empty() {
                println!("No images found.");
                return Ok(());
            }

            println!("▶ Parallel hashing {} images…", images.len());
            let extractor = FeatureExtractor::new(hash_size);
            let records = benchmark("hashing all images", || extractor.extract_all(&images));

            fs::write(&output, serde_json::to_string_pretty(&records)?)
                .with_context(|| format!("Failed to write {:?}", output))?;
            println!(
                "✅ Wrote features for {}/{} images to {}",
                records.len(),
                images.len(),
                output.display()
            );
        }

        Commands::Group {
            input,
            near_duplicates,
            config,
            strategy,
            policy,
            threshold,
            max_group_size,
            eps,
            min_samples,
            sequential,
            output,
            summary,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(strategy) = strategy {
                config.strategy = strategy;
            }
            if let Some(policy) = policy {
                config.policy = policy;
            }
            if let Some(threshold) = threshold {
                config.accept_threshold = threshold;
            }
            if let Some(max_group_size) = max_group_size {
                config.max_group_size = max_group_size;
            }
            if let Some(eps) = eps {
                config.eps = eps;
            }
            if let Some(min_samples) = min_samples {
                config.min_samples = min_samples;
            }
            if sequential {
                config.parallel = false;
            }

            let mut engine = Engine::new(config).context("Invalid engine configuration")?;

            let records = features::load_records(&input)
                .with_context(|| format!("Failed to read feature records {:?}", input))?;
            let (table, images) = EntityTable::from_records(records);
            let dups = near_duplicates
                .map(|path| {
                    features::load_near_duplicates(&path)
                        .with_context(|| format!("Failed to read near-duplicate map {:?}", path))
                })
                .transpose()?;

            println!(
                "▶ Grouping {} websites ({}, {})",
                table.len(),
                engine.config().strategy.name(),
                engine.config().policy.name()
            );
            let groups = benchmark("grouping", || engine.run(&table, &images, dups.as_ref()))?;
            print_groups(&groups);

            if output.is_some() || summary.is_some() {
                let report = GroupReport::new(&groups, table.len(), &images, engine.config());
                if let Some(output) = output {
                    report
                        .write(&output)
                        .with_context(|| format!("Failed to write report {:?}", output))?;
                    println!("\n✅ Wrote groups to {}", output.display());
                }
                if let Some(summary) = summary {
                    report
                        .write_summary(&summary)
                        .with_context(|| format!("Failed to write summary {:?}", summary))?;
                    println!("✅ Wrote summary to {}", summary.display());
                }
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second init only fails when a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// `--config` if given, else the user config file if it exists, else defaults.
fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => EngineConfig::default_path().filter(|p| p.is_file()),
    };
    match path {
        Some(path) => EngineConfig::load(&path)
            .with_context(|| format!("Failed to load config {:?}", path)),
        None => Ok(EngineConfig::default()),
    }
}

fn print_groups(groups: &[Group]) {
    let shared: Vec<&Group> = groups.iter().filter(|g| g.len() > 1).collect();
    let singletons = groups.len() - shared.len();

    if shared.is_empty() {
        println!("No shared logos found.");
    } else {
        println!("Found {} shared-logo group(s):", shared.len());
        for group in shared {
            println!(" Group {} ({} websites):", group.id, group.len());
            for site in group.members.iter().take(10) {
                println!("   ▶ {}", site);
            }
            if group.len() > 10 {
                println!("   … +{} more", group.len() - 10);
            }
        }
    }
    println!("{} website(s) with a unique logo.", singletons);
}

/// Walk `dir` for images behind a spinner.
fn scan_directory(dir: &Path) -> Vec<PathBuf> {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Scanning for images…");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let images = extract::scan_directory(dir);
    spinner.finish_with_message("Scan complete");
    images
}

/// Run `f()`, print how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    println!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
