//! CLI entry point for intent retrieval.
//!
//! Builds the intent index from the configured dataset and answers queries
//! against it, either one-shot (`query`) or line by line (`serve`). Responses
//! go to stdout; everything else goes to stderr.

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum,
    builder::styling::{AnsiColor, Effects, Styles},
};
use intent_rag::display::with_spinner;
use intent_rag::io::{ExitCode, QueryResponse, serve_lines};
use intent_rag::{
    IndexBuilder, IndexStore, QueryResult, QueryService, RetrievalError, RetrievalResult,
    Settings, SettingsOverrides, load_documents, runtime,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Semantic retrieval over chatbot intent patterns
#[derive(Parser)]
#[command(
    name = "intent-rag",
    version = env!("CARGO_PKG_VERSION"),
    about = "Semantic retrieval over chatbot intent patterns",
    long_about = "Embed the patterns of an intent dataset into a vector index and return the \
                  closest patterns, with their tag and responses, for a user message.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Intent dataset JSON (overrides dataset_path)
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Directory holding the index artifacts (overrides index.dir)
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    /// Embedding model name (overrides embedding.model)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    #[command(about = "Set up .intent-rag directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    #[command(about = "Display the effective settings")]
    Config,

    #[command(about = "Embed the dataset and publish the vector index")]
    Build,

    #[command(about = "Return the patterns nearest to TEXT as one JSON line")]
    Query {
        /// User message to look up
        text: Option<String>,

        /// Number of matches (overrides query.top_k)
        #[arg(short)]
        k: Option<usize>,

        /// Output format
        #[arg(long, value_enum, default_value_t = QueryFormat::Json)]
        format: QueryFormat,
    },

    #[command(about = "Answer one query per stdin line with one JSON line on stdout")]
    Serve {
        /// Number of matches (overrides query.top_k)
        #[arg(short)]
        k: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum QueryFormat {
    /// One compact JSON line
    Json,
    /// Prompt-context blocks for a chat model
    Context,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    if let Commands::Query { text: None, .. } = &cli.command {
        eprintln!("error: missing query text");
        let mut command = Cli::command();
        if let Some(query) = command.find_subcommand_mut("query") {
            eprintln!("{}", query.render_usage());
        }
        return ExitCode::GeneralError.into();
    }

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => return fail(&cli.command, &e),
    };
    init_tracing(settings.debug);

    let code = match &cli.command {
        Commands::Init { force } => run_init(*force),
        Commands::Config => run_config(&settings),
        Commands::Build => match run_build(&settings) {
            Ok(()) => ExitCode::Success,
            Err(e) => {
                report_error(&e);
                ExitCode::from_error(&e)
            }
        },
        Commands::Query { text, format, .. } => run_query(
            &settings,
            text.as_deref().unwrap_or_default(),
            *format,
        ),
        Commands::Serve { .. } => run_serve(&settings),
    };
    code.into()
}

fn load_settings(cli: &Cli) -> RetrievalResult<Settings> {
    let loaded = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = loaded.map_err(|e| RetrievalError::Config {
        reason: e.to_string(),
    })?;

    let top_k = match &cli.command {
        Commands::Query { k, .. } | Commands::Serve { k } => *k,
        _ => None,
    };
    Ok(settings.with_overrides(SettingsOverrides {
        dataset_path: cli.dataset.clone(),
        index_dir: cli.index_dir.clone(),
        model: cli.model.clone(),
        top_k,
        debug: cli.debug,
    }))
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("warn,intent_rag=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Report a failure that happened before the command could run.
fn fail(command: &Commands, error: &RetrievalError) -> std::process::ExitCode {
    if matches!(command, Commands::Query { .. }) {
        println!("{}", QueryResponse::from_error(error).to_json_line());
    }
    report_error(error);
    ExitCode::from_error(error).into()
}

fn report_error(error: &RetrievalError) {
    eprintln!("Error [{}]: {error}", error.status_code());
    for suggestion in error.recovery_suggestions() {
        eprintln!("  - {suggestion}");
    }
}

fn run_init(force: bool) -> ExitCode {
    match Settings::init_config_file(force) {
        Ok(path) => {
            println!("Created configuration file at: {}", path.display());
            println!("Edit this file to customize your settings.");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::ConfigError
        }
    }
}

fn run_config(settings: &Settings) -> ExitCode {
    match toml::to_string_pretty(settings) {
        Ok(toml_str) => {
            println!("{toml_str}");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error displaying config: {e}");
            ExitCode::ConfigError
        }
    }
}

fn run_build(settings: &Settings) -> RetrievalResult<()> {
    settings.validate()?;

    let documents = load_documents(&settings.dataset_path())?;
    if documents.is_empty() {
        return Err(RetrievalError::EmptyCorpus);
    }

    let generator = with_spinner("Loading embedding model", || {
        runtime::load_generator(settings)
    })?;
    let summary = with_spinner(
        &format!("Embedding {} patterns", documents.len()),
        || IndexBuilder::new(settings.index_paths()).build_with(&documents, generator.as_ref()),
    )?;

    println!(
        "Indexed {} patterns (model {}, dimension {}) into {}",
        summary.row_count,
        summary.manifest.model_name,
        summary.dimension,
        summary.paths.dir().display()
    );
    println!("Created: {}", summary.manifest.created());
    Ok(())
}

fn run_query(settings: &Settings, text: &str, format: QueryFormat) -> ExitCode {
    let outcome = query_once(settings, text);
    let (response, error) = match outcome {
        Ok(matches) => (QueryResponse::success(matches), None),
        Err(e) => (QueryResponse::from_error(&e), Some(e)),
    };

    match format {
        QueryFormat::Context if response.error.is_none() => {
            println!("{}", response.to_prompt_context());
        }
        _ => println!("{}", response.to_json_line()),
    }

    if let Some(error) = error.as_ref().filter(|e| !e.is_soft()) {
        report_error(error);
    }
    ExitCode::for_response(&response, error.as_ref())
}

fn query_once(settings: &Settings, text: &str) -> RetrievalResult<Vec<QueryResult>> {
    settings.validate()?;

    // Verify the published pair before paying for the model
    let paths = settings.index_paths();
    let snapshot = IndexStore::new(paths.clone()).open()?;

    let generator = runtime::load_generator(settings)?;
    QueryService::with_snapshot(generator, paths, snapshot).search(text, settings.query.top_k)
}

fn run_serve(settings: &Settings) -> ExitCode {
    if let Err(e) = settings.validate() {
        report_error(&e);
        return ExitCode::from_error(&e);
    }
    let service = match runtime::init(settings) {
        Ok(service) => service,
        Err(e) => {
            report_error(&e);
            return ExitCode::from_error(&e);
        }
    };
    let stdin = std::io::stdin();
    let result = serve_lines(
        &service,
        stdin.lock(),
        std::io::stdout().lock(),
        settings.query.top_k,
    );
    runtime::shutdown();

    match result {
        Ok(answered) => {
            tracing::debug!("Answered {answered} queries");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error: serve loop stopped: {e}");
            ExitCode::IoError
        }
    }
}
