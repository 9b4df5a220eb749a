use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use image_reducer::batch::ProgressEvent;
use image_reducer::config::config::DEFAULT_MAX_ITERATIONS;
use image_reducer::config::{ReduceConfig, TargetSize};
use image_reducer::format::format_size;
use image_reducer::results::{self, EMPTY_MESSAGE, EMPTY_TITLE, ResultsView};
use image_reducer::selection::MAX_SELECTION;
use image_reducer::session::{Session, StartOutcome};
use image_reducer::store::{self, FileStorage, HandoffStore, PersistReport};
use image_reducer::telemetry::{self, DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig};
use reduce_scale::presets::ResampleFilter;

/// Compress images to a target file size and download the results
#[derive(Parser, Debug)]
#[command(name = "reduce")]
#[command(about = "Compress up to 10 images to a target file size")]
#[command(long_about = "Compress up to 10 images to a target file size.
Results are kept in the data directory so `reduce results`, `reduce download` and
`reduce download-all` can pick them up later. `reduce clear` starts over.")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Directory holding the stored results
    #[arg(long, global = true, env = "REDUCE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    /// Log output format: pretty or json
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress images and store the results
    Compress {
        /// Image files to compress (at most 10 are used)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Target size per image in KB (10-2000, steps of 10)
        #[arg(short, long, default_value_t = TargetSize::default(), value_parser = parse_target_kb)]
        target_kb: TargetSize,

        /// Prefer quality: keep dimensions and only lower encoder quality
        #[arg(short, long)]
        keep_resolution: bool,

        /// Encode attempts per image
        #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
        max_iterations: u32,

        /// Resampling filter used when shrinking
        #[arg(long, value_enum, default_value_t = ResampleFilter::default())]
        filter: ResampleFilter,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the stored results and the total saving
    Results,
    /// Write one stored result to a directory
    Download {
        /// Result number as listed by `reduce results`
        index: usize,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Write every stored result into a zip archive
    DownloadAll {
        /// Archive path, or a directory to receive Reduced-Images.zip
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Start over: delete the stored results
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init_logging(&LoggingConfig {
        level: &cli.global.log_level,
        format: cli.global.log_format,
    })?;

    match cli.command {
        Command::Compress {
            files,
            target_kb,
            keep_resolution,
            max_iterations,
            filter,
            yes,
        } => {
            let config = ReduceConfig::new(
                target_kb,
                keep_resolution,
                max_iterations,
                filter,
                cli.global.data_dir,
            )?;
            config.validate()?;
            compress(&config, &files, yes).await
        }
        Command::Results => show_results(cli.global.data_dir),
        Command::Download { index, out } => {
            let handoff = open_store(cli.global.data_dir)?;
            let store = store::lock(handoff);
            let stored = loaded_results(&store)?;
            let position = index
                .checked_sub(1)
                .ok_or_else(|| anyhow!("result numbers start at 1"))?;
            let path = results::save_one(results::get(stored, position)?, &out)?;
            println!("Saved {}", path.display());
            Ok(())
        }
        Command::DownloadAll { out } => {
            let handoff = open_store(cli.global.data_dir)?;
            let store = store::lock(handoff);
            let path = results::export_archive(loaded_results(&store)?, &out)?;
            println!("Saved {}", path.display());
            Ok(())
        }
        Command::Clear { yes } => {
            let config = ReduceConfig::new(
                TargetSize::default(),
                false,
                DEFAULT_MAX_ITERATIONS,
                ResampleFilter::default(),
                cli.global.data_dir,
            )?;
            let handoff = open_store(Some(config.data_dir.clone()))?;
            let mut session = Session::from_config(&config);
            let mut confirm = prompt_or(yes);
            match session.start_over(&mut confirm, handoff) {
                None => println!("Nothing was deleted."),
                Some(PersistReport::Persisted) => println!("Stored results deleted."),
                Some(PersistReport::NotPersisted(e)) => {
                    println!("Stored results could not be deleted: {}", e)
                }
            }
            Ok(())
        }
    }
}

async fn compress(config: &ReduceConfig, files: &[PathBuf], yes: bool) -> Result<()> {
    let handoff = open_store(Some(config.data_dir.clone()))?;
    let mut session = Session::from_config(config);

    let added = session.add_paths(files);
    if let Some(notice) = &added.notice {
        println!("{}", notice);
    }
    for rejected in &added.rejected {
        println!("Skipped: {}", rejected);
    }
    if !session.has_pending_selection() {
        bail!("no images could be selected");
    }
    println!(
        "Selected {} of {} image(s), target {}{}",
        session.selection().len(),
        MAX_SELECTION,
        config.target,
        if config.preserve_resolution {
            ", keeping resolution"
        } else {
            ""
        }
    );

    let sink = |event: &ProgressEvent| match event {
        ProgressEvent::Completed(_) => {}
        ProgressEvent::ItemSkipped { .. } => println!("       {}", event.status()),
        _ => println!("[{:>3}%] {}", event.percent().unwrap_or(0), event.status()),
    };
    let mut confirm = prompt_or(yes);
    match session.start(&mut confirm, &sink, handoff).await? {
        StartOutcome::Declined => {
            println!("Nothing was compressed.");
        }
        StartOutcome::Completed { outcome, persist } => {
            for (i, result) in outcome.results.iter().enumerate() {
                println!("{:>3}. {}", i + 1, results::describe(result));
            }
            println!(
                "Compressed {} of {} image(s).",
                outcome.results.len(),
                outcome.total
            );
            if let PersistReport::NotPersisted(e) = persist {
                println!("Results could not be saved for later: {}", e);
            } else {
                println!("Run `reduce results` or `reduce download-all` to get them.");
            }
        }
    }
    Ok(())
}

fn show_results(data_dir: Option<PathBuf>) -> Result<()> {
    let handoff = open_store(data_dir)?;
    let store = store::lock(handoff);
    match ResultsView::from_store(store.read()) {
        ResultsView::Loading | ResultsView::Empty => {
            println!("{}", EMPTY_TITLE);
            println!("{}", EMPTY_MESSAGE);
        }
        ResultsView::Ready {
            results: stored,
            summary,
        } => {
            for (i, result) in stored.iter().enumerate() {
                println!("{:>3}. {}", i + 1, results::describe(result));
            }
            println!(
                "Total: {} -> {}, saved {} ({:.1}%)",
                format_size(summary.total_original),
                format_size(summary.total_new),
                summary.savings_text(),
                summary.percent_saved()
            );
        }
    }
    Ok(())
}

/// Install the process-wide store for `data_dir` and load it.
fn open_store(data_dir: Option<PathBuf>) -> Result<&'static Mutex<HandoffStore>> {
    let dir = match data_dir {
        Some(dir) => dir,
        None => image_reducer::config::config::default_data_dir()
            .context("no platform data directory found, pass --data-dir")?,
    };
    drop(store::global::init(FileStorage::new(dir))?);
    store::global::store().ok_or_else(|| anyhow!("result store is not initialized"))
}

fn loaded_results(store: &HandoffStore) -> Result<&[image_reducer::CompressedResult]> {
    match ResultsView::from_store(store.read()) {
        ResultsView::Ready { results: stored, .. } => Ok(stored),
        ResultsView::Loading | ResultsView::Empty => {
            bail!("{} {}", EMPTY_TITLE, EMPTY_MESSAGE)
        }
    }
}

/// Confirmation that answers yes when `yes` is set and asks on the terminal otherwise.
fn prompt_or(yes: bool) -> impl FnMut(&str) -> bool {
    move |prompt: &str| yes || ask(prompt).unwrap_or(false)
}

fn ask(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Parse the target size in KB: "250", "250KB" or "250 KB"
fn parse_target_kb(value: &str) -> Result<TargetSize, String> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_suffix("KB")
        .or_else(|| trimmed.strip_suffix("kb"))
        .unwrap_or(trimmed)
        .trim_end();
    let kb: u32 = digits
        .parse()
        .map_err(|_| format!("Invalid target size: {}", value))?;
    TargetSize::from_kb(kb).map_err(|e| e.to_string())
}
