use clap::{ArgAction, Parser, Subcommand};
use photfolio::imaging::RustBackend;
use photfolio::pipeline::{self, BuildOptions};
use photfolio::process::CancelToken;
use photfolio::{config, output};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "photfolio")]
#[command(version, about = "Static site generator for photo portfolios")]
#[command(long_about = "\
Static site generator for photo portfolios

Your filesystem is the data source. Photos at the top of the photo root form
the default album; every subdirectory becomes an album of its own.

Photo root:

  photos/
  ├── dusk.jpg                     # Default album (title from albums.default_title)
  ├── 010-Landscapes/              # Album \"Landscapes\" (numeric prefix dropped)
  │   ├── img1.jpg                 # Natural order: img1, img2, img10
  │   ├── img2.jpg
  │   ├── img10.png
  │   └── raw/                     # Nested directory, flattened into Landscapes
  │       └── extra.webp
  └── street_night/                # Album \"street night\"

Output:

  dist/
  ├── index.html                   # Album grid
  ├── landscapes.html              # One page per album
  ├── manifest.json                # Site model + resolved config
  └── images/landscapes/img1-thumb.jpg, img1-display.avif, ...

Run 'photfolio gen-config' to generate a documented config.toml.")]
struct Cli {
    /// Photo root directory
    #[arg(long, default_value = "photos", global = true)]
    photos: PathBuf,

    /// Output directory
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    /// Site configuration file (stock defaults when missing)
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Stylesheets copied to <output>/styles and linked from every page
    #[arg(long, default_value = "styles", global = true)]
    styles: PathBuf,

    /// Static assets (favicon, fonts) copied to <output>/assets
    #[arg(long, default_value = "assets", global = true)]
    assets: PathBuf,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: scan → variants → manifest → HTML
    Build {
        /// Ignore the fingerprint index and re-encode every variant
        #[arg(long)]
        no_cache: bool,

        /// Maximum parallel workers (never more than the CPU count)
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,

        /// Stop starting new photos after this many seconds
        #[arg(long, value_name = "SECS")]
        deadline: Option<u64>,
    },
    /// Validate the config and photo root without writing anything
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn init_tracing(verbosity: u8) -> Result<(), Box<dyn std::error::Error>> {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env().add_directive(format!("photfolio={level}").parse()?);
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Cancel `token` on the first Ctrl-C. Photos already being encoded finish.
fn spawn_interrupt_listener(token: CancelToken) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    std::thread::spawn(move || {
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Interrupted, finishing photos in progress...");
                token.cancel();
            }
        });
    });
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut options = BuildOptions::new(&cli.photos, &cli.output);
    options.config = cli.config;
    options.styles = cli.styles;
    options.assets = cli.assets;

    match cli.command {
        Command::Build {
            no_cache,
            jobs,
            deadline,
        } => {
            options.use_cache = !no_cache;
            options.jobs = jobs;
            let cancel = match deadline {
                Some(secs) => CancelToken::with_deadline(Duration::from_secs(secs)),
                None => CancelToken::new(),
            };
            spawn_interrupt_listener(cancel.clone())?;

            println!("==> Stage 1: Scanning {}", options.photos.display());
            let (site_config, plans) = pipeline::check(&options)?;
            output::print_scan_output(&plans);

            println!("==> Stage 2: Processing images");
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                let mut printer = output::ProcessPrinter::new();
                for event in rx {
                    printer.print(&event);
                }
            });
            let result = pipeline::build_with_plans(
                &options,
                &site_config,
                &plans,
                &RustBackend::new(),
                &cancel,
                Some(&tx),
            );
            drop(tx);
            printer.join().ok();
            let report = result?;

            println!("==> Stage 3: Generating HTML → {}", options.output.display());
            output::print_generate_output(&report.model);
            output::print_build_summary(&report);

            println!("==> Build complete: {}", options.output.display());
        }
        Command::Check => {
            println!("==> Checking {}", options.photos.display());
            let (_, plans) = pipeline::check(&options)?;
            output::print_scan_output(&plans);
            println!("==> Content is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
