use std::collections::BTreeMap;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use refdrop_core::config::{Config, FetchConfig};
use refdrop_core::css::SelectorList;
use refdrop_core::fetch::HttpSource;
use refdrop_core::hook::FieldBinding;
use refdrop_core::populate::Loader;
use refdrop_core::source::{field_label, Endpoint, ListShape, RefSource};
use refdrop_core::surface::{DomSurface, UiSurface};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "refdrop", about = "Populate form dropdowns from Bitbucket/GitHub refs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert the configured fields of an HTML page and fill them
    Apply {
        /// The HTML file to rewrite (use - for stdin)
        page: String,

        /// JSON field configuration
        #[arg(long)]
        config: String,

        /// Print {title: [option values]} as JSON instead of the rewritten page
        #[arg(long)]
        json: bool,

        /// Keep the inputs' own ids instead of generating random ones
        #[arg(long)]
        no_random_ids: bool,
    },
    /// Fetch one ref list and print a label per line
    List {
        /// GitHub repository as owner/repo (tags, then branches)
        #[arg(long, conflicts_with_all = ["bitbucket", "url"])]
        github: Option<String>,

        /// Bitbucket repository as owner/repo (branches)
        #[arg(long, conflicts_with = "url")]
        bitbucket: Option<String>,

        /// Any list endpoint
        #[arg(long, requires = "shape")]
        url: Option<String>,

        /// Response layout of --url
        #[arg(long, value_enum)]
        shape: Option<Shape>,

        /// Item field to print
        #[arg(long, default_value = "name")]
        field: String,

        /// Prefix for every printed label
        #[arg(long, default_value = "")]
        prefix: String,

        /// Stop after the first failed request
        #[arg(long)]
        stop_on_error: bool,

        /// Request timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Shape {
    Wrapped,
    Bare,
}

impl From<Shape> for ListShape {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Wrapped => ListShape::Wrapped,
            Shape::Bare => ListShape::Bare,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Apply {
            page,
            config,
            json,
            no_random_ids,
        } => run_apply(&page, &config, json, no_random_ids).await,
        Commands::List {
            github,
            bitbucket,
            url,
            shape,
            field,
            prefix,
            stop_on_error,
            timeout,
        } => {
            let fetch = FetchConfig {
                timeout_secs: timeout,
                ..Default::default()
            };
            match list_loader(github, bitbucket, url, shape, &field, &prefix) {
                Ok(loader) => run_list(loader.stop_on_error(stop_on_error), &fetch).await,
                Err(e) => Err(e),
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

async fn run_apply(page: &str, config_path: &str, json: bool, no_random_ids: bool) -> CliResult {
    let html = if page == "-" {
        use std::io::Read;
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(page)?
    };

    let mut config = Config::load(config_path)?;
    if no_random_ids {
        config.randomize_ids = false;
    }
    tracing::info!(fields = config.fields.len(), page = %page, "applying field configuration");
    let source: Arc<dyn RefSource> = Arc::new(HttpSource::with_config(&config.http)?);

    let surface = refdrop_core::apply(&html, &config, source).await?;

    if json {
        let summary = summarize(&surface, &config.bindings()?)?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", surface.to_html());
    }
    Ok(())
}

/// Option values of every located dropdown, keyed by field title.
fn summarize(
    surface: &DomSurface,
    bindings: &[FieldBinding],
) -> Result<BTreeMap<String, Vec<Vec<String>>>, Box<dyn std::error::Error>> {
    let mut summary = BTreeMap::new();
    for binding in bindings {
        let selector: SelectorList = binding.selector()?;
        let mut dropdowns = Vec::new();
        for element in surface.query(&selector) {
            let values = surface.options(&element)?.into_iter().map(|o| o.value).collect();
            dropdowns.push(values);
        }
        summary.insert(binding.title().to_string(), dropdowns);
    }
    Ok(summary)
}

fn list_loader(
    github: Option<String>,
    bitbucket: Option<String>,
    url: Option<String>,
    shape: Option<Shape>,
    field: &str,
    prefix: &str,
) -> Result<Loader, Box<dyn std::error::Error>> {
    if let Some(repo) = github {
        let (owner, name) = split_repo(&repo)?;
        return Ok(Loader::github_refs(owner, name, field, prefix)?);
    }
    let label = field_label(field, prefix);
    if let Some(repo) = bitbucket {
        let (owner, name) = split_repo(&repo)?;
        return Ok(Loader::with_label(Endpoint::bitbucket_branches(owner, name)?, label));
    }
    match (url, shape) {
        (Some(url), Some(shape)) => Ok(Loader::with_label(Endpoint::new(&url, shape.into())?, label)),
        _ => Err("one of --github, --bitbucket or --url is required".into()),
    }
}

fn split_repo(repo: &str) -> Result<(&str, &str), Box<dyn std::error::Error>> {
    repo.split_once('/')
        .ok_or_else(|| format!("expected owner/repo, got `{}`", repo).into())
}

async fn run_list(loader: Loader, fetch: &FetchConfig) -> CliResult {
    let source = HttpSource::with_config(fetch)?;
    tracing::info!(steps = loader.steps().len(), "listing refs");
    let report = loader.load_report(&source).await;
    for label in &report.labels {
        println!("{}", label);
    }
    match report.failures.first() {
        Some(failure) => Err(failure.message().into()),
        None => Ok(()),
    }
}
