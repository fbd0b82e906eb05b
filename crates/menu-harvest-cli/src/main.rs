//! menu-harvest: scrape restaurant menus into classified JSON records.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;

use menu_harvest::{
    AcquisitionSession, BatchReport, CancellationToken, HarvestConfig, MenuPage, ScrapeTarget,
    ScraperRouter,
};

#[derive(Parser)]
#[command(
    name = "menu-harvest",
    about = "Collect restaurant menus and prices from ordering platforms and restaurant sites",
    version
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show the browser window.
    #[arg(long, global = true)]
    headed: bool,

    /// Minimum delay between requests to the same host, in milliseconds.
    #[arg(long, global = true)]
    delay_ms: Option<u64>,

    /// Scrape at most this many restaurants.
    #[arg(long, global = true)]
    max: Option<usize>,

    /// Parallel workers, each with its own browser tab.
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape one or more restaurant URLs.
    Scrape {
        #[arg(required = true)]
        urls: Vec<String>,

        /// Restaurant name to use instead of the one found on the page (single URL only).
        #[arg(long)]
        name: Option<String>,

        /// Also print restaurants where no menu items were found.
        #[arg(long)]
        include_empty: bool,
    },

    /// Scrape a menu spread over several pages of one site.
    ///
    /// Example:
    ///   menu-harvest scrape-pages --name "Cafe Zuid" --base-url https://cafezuid.nl \
    ///     --page https://cafezuid.nl/drinks=Drinks --page https://cafezuid.nl/food=Food
    ScrapePages {
        #[arg(long)]
        name: String,

        #[arg(long)]
        base_url: String,

        /// A page as URL=LABEL; items without a header on that page get LABEL.
        #[arg(long = "page", required = true, value_parser = parse_page)]
        pages: Vec<MenuPage>,
    },

    /// List restaurants on the ordering platform for a city.
    Discover {
        city: String,

        /// Scrape the discovered restaurants instead of listing them.
        #[arg(long)]
        scrape: bool,

        #[arg(long)]
        include_empty: bool,
    },

    /// Print which driver would handle a URL.
    Route { url: String },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   menu-harvest completions bash > ~/.local/share/bash-completion/completions/menu-harvest
    ///   menu-harvest completions zsh > ~/.zfunc/_menu-harvest
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn parse_page(value: &str) -> Result<MenuPage, String> {
    match value.rsplit_once('=') {
        Some((url, label)) if !url.trim().is_empty() && !label.trim().is_empty() => {
            Ok(MenuPage::new(url.trim(), label.trim()))
        }
        _ => Err(format!("expected URL=LABEL, got `{value}`")),
    }
}

/// Config file (or defaults) with command-line overrides applied.
fn load_config(cli: &Cli) -> anyhow::Result<HarvestConfig> {
    let mut config = HarvestConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;

    if cli.headed {
        config.session.headless = false;
    }
    if let Some(delay) = cli.delay_ms {
        config.session.request_delay_ms = delay;
    }
    if let Some(max) = cli.max {
        config.session.max_restaurants = Some(max);
    }
    if let Some(workers) = cli.workers {
        config.session.workers = workers;
    }
    config.validate()?;
    Ok(config)
}

fn init_logging(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

/// Records on stdout, summary and skips on stderr.
fn print_report(report: &BatchReport, include_empty: bool, pretty: bool) -> anyhow::Result<()> {
    let records: Vec<_> = if include_empty {
        report.records.iter().collect()
    } else {
        report.records.reportable().collect()
    };
    print_json(&records, pretty)?;

    eprint!("{}", report.records.summary());
    for skipped in &report.skipped {
        eprintln!("  skipped {}: {}", skipped.url, skipped.reason);
    }
    if report.cancelled {
        eprintln!("Cancelled before every restaurant was scraped");
    }
    Ok(())
}

/// A token cancelled by Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing restaurants in progress");
            trigger.cancel();
        }
    });
    cancel
}

async fn launch(config: &HarvestConfig) -> anyhow::Result<AcquisitionSession> {
    let session = AcquisitionSession::launch(config).await?;
    Ok(session.with_progress(std::sync::Arc::new(
        |done: usize, total: usize, message: &str| {
            tracing::info!("[{done}/{total}] {message}");
        },
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match &cli.command {
        Commands::Scrape {
            urls,
            name,
            include_empty,
        } => {
            let targets: Vec<ScrapeTarget> = match (name, urls.as_slice()) {
                (Some(name), [url]) => vec![ScrapeTarget::named(url.as_str(), name.as_str())],
                (Some(_), _) => bail!("--name can only be used with a single URL"),
                (None, urls) => urls.iter().map(|u| ScrapeTarget::new(u.as_str())).collect(),
            };

            let config = load_config(&cli)?;
            let session = launch(&config).await?;
            let result = session.scrape_batch(targets, &cancel_on_ctrl_c()).await;
            session.shutdown().await?;
            print_report(&result?, *include_empty, cli.pretty)?;
        }

        Commands::ScrapePages {
            name,
            base_url,
            pages,
        } => {
            let config = load_config(&cli)?;
            let session = launch(&config).await?;
            let result = session.scrape_menu_pages(name, base_url, pages).await;
            session.shutdown().await?;
            print_json(&result?, cli.pretty)?;
        }

        Commands::Discover {
            city,
            scrape,
            include_empty,
        } => {
            let config = load_config(&cli)?;
            let session = launch(&config).await?;
            if *scrape {
                let result = session
                    .discover_and_scrape(city, cli.max, &cancel_on_ctrl_c())
                    .await;
                session.shutdown().await?;
                print_report(&result?, *include_empty, cli.pretty)?;
            } else {
                let result = session.discover(city, cli.max).await;
                session.shutdown().await?;
                print_json(&result?, cli.pretty)?;
            }
        }

        Commands::Route { url } => {
            let config = load_config(&cli)?;
            let router = ScraperRouter::from_config(&config)?;
            println!("{}", router.route(url).kind());
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "menu-harvest", &mut std::io::stdout());
        }
    }

    Ok(())
}
