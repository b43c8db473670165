use clap::{Parser, Subcommand};
use pigeonhole::cache::{self, ThumbnailCache};
use pigeonhole::config::{self, AppConfig, SharedConfig};
use pigeonhole::imaging::{Quality, RustBackend};
use pigeonhole::{classify, listing, media, output, warm};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pigeonhole")]
#[command(about = "Sort a directory of images into class folders")]
#[command(long_about = "\
Sort a directory of images into class folders

The filesystem is the ledger. Classifying an image copies it into a class
folder next to its source directory, and removes copies from every other
class folder, so each image belongs to at most one class.

Layout:

  photos/
  ├── batch/                # Source directory (never modified)
  │   ├── a.png
  │   └── b.jpg
  ├── zhengbao/             # Class folder, created on first use
  │   └── a.png             # Copy with the source's timestamps
  └── wubao/

Thumbnails for grid display are cached under the system temp dir, keyed by
path, modification time and size, so edited images are re-rendered.

Run 'pigeonhole gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    /// Thumbnail cache directory (overrides config)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the images of a directory with their classes
    List {
        dir: PathBuf,
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write an image's raw bytes to stdout
    Show { image: PathBuf },
    /// Put an image in a class, removing it from every other class
    Classify {
        image: PathBuf,
        /// Class folder name
        #[arg(required_unless_present = "key", conflicts_with = "key")]
        class: Option<String>,
        /// Resolve the class through the configured shortcut keys
        #[arg(long)]
        key: Option<String>,
    },
    /// Remove an image from a class
    Unclassify { image: PathBuf, class: String },
    /// Render (or fetch from cache) the thumbnail of an image
    Thumbnail {
        image: PathBuf,
        /// Longest edge in pixels (default: thumbnails.size from config)
        #[arg(long)]
        size: Option<u32>,
        /// Write the JPEG here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate thumbnails for every image of a directory
    Warm {
        dir: PathBuf,
        #[arg(long)]
        size: Option<u32>,
        /// Max parallel workers (capped at the number of cores)
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Inspect or empty the thumbnail cache
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Print the effective configuration
    Config,
    /// Bind a shortcut key to a class and save config.toml
    Bind { key: String, class: String },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Delete every cached thumbnail
    Clear,
    /// Show the number and total size of cached thumbnails
    Stats,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let shared = SharedConfig::new(config::load_config(&cli.config_dir)?);
    let current = shared.snapshot();

    match cli.command {
        Command::List { dir, json } => {
            let listing = listing::list(&dir)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                output::print_listing(&listing);
            }
        }
        Command::Show { image } => {
            let raw = media::read_image(&image)?;
            eprintln!("{} ({} bytes)", raw.media_type, raw.bytes.len());
            std::io::stdout().write_all(&raw.bytes)?;
        }
        Command::Classify { image, class, key } => {
            let class = match (class, key) {
                (Some(class), _) => class,
                (None, Some(key)) => current
                    .class_for_key(&key)
                    .map(str::to_string)
                    .ok_or_else(|| format!("no class bound to key {key:?}"))?,
                (None, None) => return Err("a class or --key is required".into()),
            };
            let outcome = classify::classify(&image, &class)?;
            output::print_classify(&outcome);
        }
        Command::Unclassify { image, class } => {
            let outcome = classify::unclassify(&image, &class)?;
            output::print_unclassify(&outcome);
        }
        Command::Thumbnail { image, size, out } => {
            let cache = open_cache(cli.cache_dir.as_deref(), &current)?;
            let size = size.unwrap_or(current.thumbnails.size);
            let thumb = cache.get_or_create(&RustBackend::new(), &image, size)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, &thumb.bytes)?;
                    println!("{}", path.display());
                }
                None => std::io::stdout().write_all(&thumb.bytes)?,
            }
        }
        Command::Warm { dir, size, jobs } => {
            let cache = open_cache(cli.cache_dir.as_deref(), &current)?;
            let size = size.unwrap_or(current.thumbnails.size);
            let listing = listing::list(&dir)?;
            let mut processing = current.processing.clone();
            if jobs.is_some() {
                processing.max_processes = jobs;
            }
            init_thread_pool(&processing);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_warm_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let stats = warm::warm(&RustBackend::new(), &cache, &listing, size, Some(tx));
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            println!("Thumbnails: {}", stats);
        }
        Command::Cache(CacheCommand::Clear) => {
            let cache = open_cache(cli.cache_dir.as_deref(), &current)?;
            output::print_clear(&cache.clear()?);
        }
        Command::Cache(CacheCommand::Stats) => {
            let cache = open_cache(cli.cache_dir.as_deref(), &current)?;
            output::print_usage(&cache.stats()?);
        }
        Command::Config => {
            print!("{}", current.to_toml_string()?);
        }
        Command::Bind { key, class } => {
            let mut next = AppConfig::clone(&current);
            next.shortcuts.classes.insert(key, class);
            let next = shared.replace(next)?;
            config::save_config(&cli.config_dir, &next)?;
            info!(path = %config::config_path(&cli.config_dir).display(), "config saved");
            output::print_shortcuts(&next);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "pigeonhole=debug"
    } else {
        "pigeonhole=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Cache location: `--cache-dir`, then `thumbnails.cache_dir`, then the temp dir.
fn open_cache(
    cli_dir: Option<&Path>,
    config: &AppConfig,
) -> Result<ThumbnailCache, cache::CacheError> {
    let dir = cli_dir
        .map(Path::to_path_buf)
        .or_else(|| config.thumbnails.cache_dir.clone())
        .unwrap_or_else(cache::default_cache_dir);
    Ok(ThumbnailCache::open(dir)?.with_quality(Quality::new(config.thumbnails.quality)))
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
