//! CLI entry point for `digestnorm`.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use digestnorm::config::{self, Config};
use digestnorm::model::stats::{Stage, StageStats};
use digestnorm::pipeline::snapshot::OutputLayout;
use digestnorm::pipeline::{self, parse, Pipeline, Tables};

#[derive(Parser)]
#[command(
    name = "digestnorm",
    version,
    about = "Normalize a plain-text mailing-list digest archive into JSON records",
    long_about = "Segments yearly digest files into messages, resolves sender aliases, \
                  removes known artifacts and spam, and writes one JSON snapshot per stage."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the yearly archive files
    #[arg(short, long, global = true, value_name = "DIR", env = "DIGESTNORM_INPUT")]
    input: Option<PathBuf>,

    /// Directory receiving the parsed/, cleaned/ and filtered/ snapshots
    #[arg(short, long, global = true, value_name = "DIR", env = "DIGESTNORM_OUTPUT")]
    output: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage 1: split archive files into normalized records
    Parse {
        /// Archive files to parse instead of scanning the input directory
        files: Vec<PathBuf>,
    },
    /// Stage 2: remove known artifacts and resolve sender aliases
    Clean,
    /// Stage 3: move spam to a side collection
    Filter,
    /// Run parse, clean and filter in sequence
    Run {
        /// Archive files to parse instead of scanning the input directory
        files: Vec<PathBuf>,
    },
    /// Load and validate the configuration and static tables
    CheckConfig,
    /// Show statistics written by previous runs
    Stats {
        /// Only this stage
        #[arg(long, value_enum)]
        stage: Option<StageArg>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Clone, Copy, ValueEnum)]
enum StageArg {
    Parse,
    Clean,
    Filter,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Parse => Stage::Parse,
            StageArg::Clean => Stage::Clean,
            StageArg::Filter => Stage::Filter,
        }
    }
}

const ALL_STAGES: [Stage; 3] = [Stage::Parse, Stage::Clean, Stage::Filter];

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config();
    if let Some(input) = cli.input {
        config.pipeline.input_dir = input;
    }
    if let Some(output) = cli.output {
        config.pipeline.output_dir = output;
    }

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Parse { files } => cmd_parse(&config, &files),
        Commands::Clean => cmd_stage(&config, Stage::Clean),
        Commands::Filter => cmd_stage(&config, Stage::Filter),
        Commands::Run { files } => cmd_run(&config, &files),
        Commands::CheckConfig => cmd_check_config(&config),
        Commands::Stats { stage, json } => cmd_stats(&config, stage.map(Stage::from), json),
        Commands::InitConfig { force } => cmd_init_config(&config, force),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = config::log_file_path(config);
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_name = log_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "digestnorm.log".to_string());
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn load_tables(config: &Config) -> anyhow::Result<Tables> {
    Tables::load(&config.tables).context("Static tables failed validation")
}

/// Explicit files, or the archive files found in the input directory.
fn resolve_inputs(config: &Config, files: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    if !files.is_empty() {
        for file in files {
            if !file.is_file() {
                anyhow::bail!("Archive file not found: {}", file.display());
            }
        }
        return Ok(files.to_vec());
    }
    parse::discover_inputs(&config.pipeline).with_context(|| {
        format!(
            "Looking for {}*.{} files",
            config.pipeline.file_prefix, config.pipeline.file_extension
        )
    })
}

fn file_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Parsing [{bar:40.cyan/blue}] {pos}/{len} files ({eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb
}

fn cmd_parse(config: &Config, files: &[PathBuf]) -> anyhow::Result<()> {
    let tables = load_tables(config)?;
    let pipeline = Pipeline::new(config, &tables)?;
    let inputs = resolve_inputs(config, files)?;

    let pb = file_progress_bar(inputs.len());
    let start = Instant::now();
    let out = pipeline.run_parse(
        &inputs,
        Some(&|current, total| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    )?;
    pb.finish_and_clear();

    print_input_summary(&inputs, out.input_bytes, start.elapsed());
    print_stats_table(&out.stats);
    print_written(pipeline.layout(), Stage::Parse);
    Ok(())
}

fn cmd_stage(config: &Config, stage: Stage) -> anyhow::Result<()> {
    let tables = load_tables(config)?;
    let pipeline = Pipeline::new(config, &tables)?;
    let previous = match stage {
        Stage::Clean => Stage::Parse,
        _ => Stage::Clean,
    };
    if !pipeline::snapshot_exists(pipeline.layout().root(), previous) {
        anyhow::bail!(
            "No {previous} snapshot under {}; run `digestnorm {previous}` first",
            pipeline.layout().root().display()
        );
    }

    let stats = match stage {
        Stage::Clean => pipeline.run_clean()?,
        _ => pipeline.run_filter()?,
    };
    print_stats_table(&stats);
    print_written(pipeline.layout(), stage);
    Ok(())
}

fn cmd_run(config: &Config, files: &[PathBuf]) -> anyhow::Result<()> {
    let tables = load_tables(config)?;
    let pipeline = Pipeline::new(config, &tables)?;
    let inputs = resolve_inputs(config, files)?;

    let pb = file_progress_bar(inputs.len());
    let start = Instant::now();
    let out = pipeline.run_parse(
        &inputs,
        Some(&|current, total| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    )?;
    pb.finish_and_clear();
    let cleaned = pipeline.run_clean()?;
    let filtered = pipeline.run_filter()?;

    print_input_summary(&inputs, out.input_bytes, start.elapsed());
    for stats in [&out.stats, &cleaned, &filtered] {
        print_stats_table(stats);
    }
    for stage in ALL_STAGES {
        print_written(pipeline.layout(), stage);
    }
    Ok(())
}

fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    let path = config::config_file_path();
    match &path {
        Some(p) if p.exists() => println!("  {:<22} {}", "Config file", p.display()),
        Some(p) => println!("  {:<22} {} (not found, using defaults)", "Config file", p.display()),
        None => println!("  {:<22} (none, using defaults)", "Config file"),
    }

    parse::ParseOptions::from_config(&config.pipeline).context("Invalid pipeline settings")?;
    let tables = load_tables(config)?;

    let source = |p: &Option<PathBuf>| {
        p.as_ref()
            .map_or_else(|| "embedded".to_string(), |p| p.display().to_string())
    };
    println!("  {:<22} {}", "Input directory", config.pipeline.input_dir.display());
    println!("  {:<22} {}", "Output directory", config.pipeline.output_dir.display());
    println!("  {:<22} {}", "Fallback encoding", config.pipeline.fallback_encoding);
    println!(
        "  {:<22} {} entries ({})",
        "Alias table",
        tables.aliases.len(),
        source(&config.tables.aliases)
    );
    println!(
        "  {:<22} {} entries, scheme {} ({})",
        "Artifact denylist",
        tables.denylist.len(),
        tables.denylist.scheme,
        source(&config.tables.denylist)
    );
    println!(
        "  {:<22} {} rules, min {} signals ({})",
        "Spam signal set",
        tables.signals.rules.len(),
        tables.signals.min_signals,
        source(&config.tables.spam_signals)
    );
    println!("  {:<22} {}", "Log file", config::log_file_path(config).display());
    println!();
    println!("  Configuration OK");
    Ok(())
}

fn cmd_stats(config: &Config, stage: Option<Stage>, json: bool) -> anyhow::Result<()> {
    let layout = OutputLayout::new(&config.pipeline.output_dir);
    let stages: Vec<Stage> = match stage {
        Some(s) => vec![s],
        None => ALL_STAGES
            .into_iter()
            .filter(|s| layout.stats_file(*s).is_file())
            .collect(),
    };
    if stages.is_empty() {
        anyhow::bail!("No statistics under {}", layout.root().display());
    }

    let all: Vec<StageStats> = stages
        .iter()
        .map(|s| pipeline::read_stats(&layout, *s))
        .collect::<Result<_, _>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&all)?);
    } else {
        for stats in &all {
            print_stats_table(stats);
        }
    }
    Ok(())
}

fn cmd_init_config(config: &Config, force: bool) -> anyhow::Result<()> {
    if let Some(path) = config::config_file_path() {
        if path.exists() && !force {
            anyhow::bail!(
                "{} already exists; pass --force to overwrite",
                path.display()
            );
        }
    }
    let path = config::save_config(config)?;
    println!("  Wrote {}", path.display());
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "digestnorm", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn print_input_summary(inputs: &[PathBuf], bytes: u64, elapsed: std::time::Duration) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "Input files", inputs.len());
    println!("  {:<20} {}", "Input size", format_size(bytes, BINARY));
    println!("  {:<20} {:.2?}", "Elapsed", elapsed);
}

/// Print one stage's statistics as a human-readable table.
fn print_stats_table(stats: &StageStats) {
    println!();
    println!("  Stage: {}", stats.stage);
    println!("  {:<20} {}", "Input records", stats.input_count);
    println!("  {:<20} {}", "Output records", stats.output_count);
    if stats.stage != Stage::Parse {
        println!("  {:<20} {}", "Removed", stats.removed_count);
    }
    println!(
        "  {:<20} {} ({:.1}%)",
        "Flagged",
        stats.flagged_count,
        if stats.output_count == 0 {
            0.0
        } else {
            stats.flagged_count as f64 / stats.output_count as f64 * 100.0
        }
    );

    if !stats.by_year.is_empty() {
        println!("  By year:");
        for (year, count) in &stats.by_year {
            println!("    {year:>6}  {count}");
        }
    }
    if !stats.flag_frequency.is_empty() {
        println!("  Flags:");
        for (flag, count) in &stats.flag_frequency {
            println!("    {count:>6}  {flag}");
        }
    }
    if let Some(categories) = stats.spam_categories.as_ref().filter(|c| !c.is_empty()) {
        println!("  Spam categories:");
        for (category, count) in categories {
            println!("    {count:>6}  {category}");
        }
    }
}

fn print_written(layout: &OutputLayout, stage: Stage) {
    println!("  {:<20} {}", "Snapshot", layout.stage_dir(stage).display());
}
