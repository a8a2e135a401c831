use anyhow::{Context, Result};
use cadgen_config::{
    CliRunOverrides, EnvConfig, ProgressSetting, RunDefaults, load_file_config,
    resolve_run_defaults,
};
use cadgen_core::{
    GenerationRequest, ProgressEvent, ProgressMode, ProgressSink, StderrSink, generate,
};
use cadgen_exec::{SandboxExecutor, Session};
use cadgen_kernel_http::HttpKernel;
use cadgen_llm_ollama::OllamaClient;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "cadgen", version, about = "Text-to-CAD generation pipeline")]
struct Cli {
    /// Path to a cadgen.json config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate a part from a natural-language description.
    Generate {
        /// Description of the part, e.g. "wrist splint, 270mm long".
        #[arg(required = true)]
        description: Vec<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        ollama_url: Option<String>,
        #[arg(long)]
        kernel_url: Option<String>,
        /// Repair attempts after the first failing candidate.
        #[arg(long)]
        max_repairs: Option<u32>,
        /// Kernel execution budget in seconds.
        #[arg(long)]
        timeout: Option<u64>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Print the final script to stdout.
        #[arg(long)]
        print_code: bool,
        #[arg(long)]
        no_progress: bool,
        /// Emit progress events as JSON lines on stdout.
        #[arg(long)]
        json_events: bool,
        #[arg(long)]
        verbose: bool,
    },
    /// Print an artifact from the most recent generation.
    Export {
        format: ExportFormat,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Stl,
    Step,
    Code,
}

/// Progress as JSON lines on stdout, one event per line.
struct JsonSink;

impl ProgressSink for JsonSink {
    fn emit(&self, event: &ProgressEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
    }
}

fn session_for(output_dir: Option<&PathBuf>, defaults: Option<&RunDefaults>) -> Result<Session> {
    let root = match output_dir {
        Some(dir) => dir.clone(),
        None => match defaults.and_then(|d| d.output_dir.clone()) {
            Some(dir) => PathBuf::from(dir),
            None => Session::default_root()?,
        },
    };
    Ok(Session::new(root))
}

fn generate_command(
    config: Option<PathBuf>,
    description: Vec<String>,
    model: Option<String>,
    ollama_url: Option<String>,
    kernel_url: Option<String>,
    max_repairs: Option<u32>,
    timeout: Option<u64>,
    output_dir: Option<PathBuf>,
    print_code: bool,
    no_progress: bool,
    json_events: bool,
    verbose: bool,
) -> Result<()> {
    let cwd = std::env::current_dir().context("failed resolving working directory")?;
    let file_cfg = load_file_config(config.as_deref(), &cwd)?;
    let env_cfg = EnvConfig::from_current_env();
    let cli = CliRunOverrides {
        model,
        ollama_url,
        kernel_url,
        timeout_secs: timeout,
        max_repair_attempts: max_repairs,
        output_dir: output_dir
            .as_ref()
            .map(|p| p.display().to_string()),
        print_code: print_code.then_some(true),
        no_progress: no_progress.then_some(true),
    };
    let defaults = resolve_run_defaults(&cli, &env_cfg, file_cfg.as_ref());

    let request = GenerationRequest::new(
        description.join(" "),
        defaults.model.clone(),
        Duration::from_secs(defaults.timeout_secs),
        defaults.max_repair_attempts,
    );

    let client = OllamaClient::new(defaults.ollama_url.clone());
    if verbose {
        eprintln!(
            "[cadgen] request {} model={} kernel={}",
            request.id(),
            defaults.model,
            defaults.kernel_url
        );
        if !client.is_reachable() {
            eprintln!("[cadgen] warning: Ollama at {} is not reachable", defaults.ollama_url);
        }
    }

    let executor = SandboxExecutor::new(Arc::new(HttpKernel::new(defaults.kernel_url.clone())));

    let mode = if verbose {
        ProgressMode::Verbose
    } else {
        match defaults.progress {
            ProgressSetting::Silent => ProgressMode::Silent,
            ProgressSetting::Verbose => ProgressMode::Verbose,
            ProgressSetting::Auto => ProgressMode::Minimal,
        }
    };

    let report = if json_events {
        generate(&client, &executor, &JsonSink, &request)?
    } else {
        generate(&client, &executor, &StderrSink::new(mode), &request)?
    };

    let session = session_for(output_dir.as_ref(), Some(&defaults))?;
    let artifacts = session.persist(&report.mesh, report.brep.as_deref(), &report.code)?;

    if defaults.print_code {
        println!("{}", report.code);
    }
    if !json_events {
        println!("{}", artifacts.stl.display());
        if let Some(step) = &artifacts.step {
            println!("{}", step.display());
        }
    }
    Ok(())
}

fn export_command(
    format: ExportFormat,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let session = session_for(output_dir.as_ref(), None)?;
    match format {
        ExportFormat::Stl => println!("{}", session.stl_path()?.display()),
        ExportFormat::Step => println!("{}", session.step_path()?.display()),
        ExportFormat::Code => print!("{}", session.code()?),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            description,
            model,
            ollama_url,
            kernel_url,
            max_repairs,
            timeout,
            output_dir,
            print_code,
            no_progress,
            json_events,
            verbose,
        } => generate_command(
            cli.config,
            description,
            model,
            ollama_url,
            kernel_url,
            max_repairs,
            timeout,
            output_dir,
            print_code,
            no_progress,
            json_events,
            verbose,
        ),
        Commands::Export { format, output_dir } => export_command(format, output_dir),
    }
}
