use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use stencil_prep::reports::{
    TemplateReport, generate_json_report, generate_markdown_report, generate_summary_report,
};
use stencil_prep::{Config, DocumentFormat, TemplateFactory, scratch};

#[derive(Parser)]
#[command(name = "stencil-prep")]
#[command(about = "Prepare document templates and inspect their variables", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
    Summary,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare a template and print its format and variables
    Inspect {
        /// Path to the template file
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "summary")]
        output: OutputFormat,

        /// JSON render data to check the variables against; exits with code 1
        /// if any variable is missing
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
    /// List supported formats and their extensions
    Formats,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Removes scratch directories of templates nobody released
    let _exit_guard = scratch::exit_guard();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Inspect { file, output, data } => run_inspect(&config, &file, output, data),
        Commands::Formats => run_formats(&config),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    Ok(config)
}

fn run_inspect(
    config: &Config,
    file: &Path,
    output: OutputFormat,
    data: Option<PathBuf>,
) -> ExitCode {
    let data = match data.as_deref().map(read_data).transpose() {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Error reading data file: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let factory = TemplateFactory::from_config(config);
    let template = match factory.prepare_file(file) {
        Ok(template) => template,
        Err(e) => {
            eprintln!("Error preparing {}: {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut report = TemplateReport::from_template(&template);
    if let Some(data) = &data {
        report = report.with_data(&template, data);
    }
    template.release();

    let rendered = match output {
        OutputFormat::Json => generate_json_report(&report),
        OutputFormat::Markdown => Ok(generate_markdown_report(&report)),
        OutputFormat::Summary => Ok(generate_summary_report(&report)),
    };
    match rendered {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Failed to serialize report: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if report.missing_count() > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn read_data(path: &Path) -> anyhow::Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn run_formats(config: &Config) -> ExitCode {
    let registry = config.formats.registry();
    for format in DocumentFormat::ALL {
        let kind = if format.is_archive() { "archive" } else { "markup" };
        println!(
            "{:<5} {:<8} {}",
            format.tag(),
            kind,
            registry.extensions_for(format).join(", ")
        );
    }
    ExitCode::SUCCESS
}
