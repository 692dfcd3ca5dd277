//! The logsieve command line: mine template relations out of log files and
//! dump them as CSV.

use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Result};
use console::style;
use log::debug;

use logsieve::{
    cancel_requested, preset, preset_names, Algorithm, Column, JobEvent, JobRequest, MemoryStore,
    ParsePool, ParserConfig, TableStore, EVENT_TEMPLATE, OCCURRENCES,
};

#[derive(Debug, Parser)]
#[command(
    name = "logsieve",
    version,
    about = "Mines parametric templates out of unstructured log files"
)]
struct Cli {
    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity<clap_verbosity_flag::WarnLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse log files and write both result relations as CSV
    Parse {
        /// Input log files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Mining algorithm: Drain, JaccardDrain, Spell, AEL or Brain
        #[arg(short, long, default_value = "Drain")]
        algorithm: String,

        /// Builtin preset providing format, masking and delimiters
        #[arg(short, long)]
        preset: Option<String>,

        /// TOML parser config, instead of a preset
        #[arg(short, long, conflicts_with = "preset")]
        config: Option<PathBuf>,

        /// Log format spec, i.e. "<Date> <Time> <Level>: <Content>".
        /// Overrides the preset's format.
        #[arg(short, long)]
        format: Option<String>,

        /// Reconstruct per-line parameter lists
        #[arg(long)]
        keep_params: bool,

        /// Worker threads, defaults to the core count
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Output directory for the CSV dumps
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// List the mining algorithms
    ListAlgorithms,
    /// List the builtin presets
    ListPresets,
    /// Print a builtin preset as TOML
    DumpPreset {
        name: String,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::new().filter_or("LOGSIEVE", "warn"))
        .filter_level(cli.verbosity.log_level_filter())
        .init();

    match cli.command {
        Command::Parse {
            files,
            algorithm,
            preset,
            config,
            format,
            keep_params,
            jobs,
            out,
        } => run_parse(
            files,
            &algorithm,
            preset.as_deref(),
            config.as_deref(),
            format,
            keep_params,
            jobs,
            &out,
        ),
        Command::ListAlgorithms => {
            for algorithm in Algorithm::ALL {
                println!(
                    "{:<14} {}",
                    style(algorithm.name()).bold(),
                    algorithm.description()
                );
            }
            Ok(())
        }
        Command::ListPresets => {
            for name in preset_names() {
                println!("{name}");
            }
            Ok(())
        }
        Command::DumpPreset { name } => {
            print!("{}", preset(&name)?.to_toml()?);
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_parse(
    files: Vec<PathBuf>,
    algorithm: &str,
    preset_name: Option<&str>,
    config_path: Option<&std::path::Path>,
    format: Option<String>,
    keep_params: bool,
    jobs: Option<usize>,
    out: &std::path::Path,
) -> Result<()> {
    let algorithm: Algorithm = algorithm.parse()?;
    let mut config = match (config_path, preset_name, format.as_deref()) {
        (Some(path), _, _) => ParserConfig::load(path)?,
        (None, Some(name), _) => preset(name)?,
        (None, None, Some(format)) => ParserConfig::bare("custom", format),
        (None, None, None) => bail!("one of --preset, --config or --format is required"),
    };
    if let Some(format) = format {
        config.log_format = format;
    }

    #[cfg(not(target_os = "windows"))]
    std::thread::spawn(logsieve::signal_handler);

    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn TableStore> = store.clone();
    let (events, receiver) = channel();
    let pool = ParsePool::new(jobs.unwrap_or_else(num_cpus::get), shared, events)?;

    for (index, file) in files.iter().enumerate() {
        let log_id = index as u64 + 1;
        let stem = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("log{log_id}"));
        pool.submit(JobRequest {
            log_id,
            file: file.clone(),
            algorithm,
            config: config.clone(),
            structured_name: format!("{log_id}_{stem}_structured"),
            templates_name: format!("{log_id}_{stem}_templates"),
            keep_params,
        })?;
    }

    let failures = drive_jobs(&pool, &receiver, &files);

    fs_err::create_dir_all(out)?;
    for name in store.table_names() {
        if let Some(table) = store.get(&name) {
            let path = out.join(format!("{name}.csv"));
            table.write_csv(fs_err::File::create(&path)?)?;
            println!("wrote {}", path.display());
        }
    }
    summarize_templates(store.as_ref());

    if failures > 0 {
        bail!("{failures} of {} jobs did not finish", files.len());
    }
    Ok(())
}

/// Pump job events until every submission settled; a Ctrl-C in between
/// kills the pool and lets the running jobs abort cooperatively.
fn drive_jobs(pool: &ParsePool, receiver: &Receiver<JobEvent>, files: &[PathBuf]) -> usize {
    let file_of = |log_id: u64| {
        files
            .get(log_id as usize - 1)
            .map(|file| file.display().to_string())
            .unwrap_or_else(|| format!("job {log_id}"))
    };

    let mut failures = 0_usize;
    let mut settled = 0_usize;
    while settled < files.len() {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(JobEvent::Started(log_id)) => debug!("{} started", file_of(log_id)),
            Ok(JobEvent::Progress(log_id, percent)) => {
                debug!("{}: {percent}%", file_of(log_id));
            }
            Ok(JobEvent::Finished { log_id, line_count }) => {
                settled += 1;
                println!(
                    "{} {} ({line_count} lines)",
                    style("done").green().bold(),
                    file_of(log_id)
                );
            }
            Ok(JobEvent::Interrupted(log_id)) => {
                settled += 1;
                failures += 1;
                println!("{} {}", style("cancelled").yellow().bold(), file_of(log_id));
            }
            Ok(JobEvent::Error { log_id, message }) => {
                settled += 1;
                failures += 1;
                println!(
                    "{} {}: {message}",
                    style("failed").red().bold(),
                    file_of(log_id)
                );
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if cancel_requested() {
            pool.kill();
        }
    }
    failures
}

/// Print the most frequent templates of every published templates relation.
fn summarize_templates(store: &dyn TableStore) {
    const TOP: usize = 10;
    for name in store.table_names() {
        if !name.ends_with("_templates") {
            continue;
        }
        let Some(table) = store.get(&name) else {
            continue;
        };
        let (Some(Column::Str(templates)), Some(Column::Int(occurrences))) =
            (table.column(EVENT_TEMPLATE), table.column(OCCURRENCES))
        else {
            continue;
        };
        println!();
        println!(
            "{} ({} distinct)",
            style(&name).bold().underlined(),
            templates.len()
        );
        for (template, count) in templates.iter().zip(occurrences).take(TOP) {
            println!("{:>10}  {}", style(count).cyan(), template);
        }
        if templates.len() > TOP {
            println!("{:>10}  ...", "");
        }
    }
}
