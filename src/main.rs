use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::Sender;
use rand::rngs::StdRng;
use rand::SeedableRng;

use retype::emitter::DiscardEmitter;
use retype::model::{Session, TypingConfig, SESSION_VERSION};
use retype::scheduler::{stats, Notice, RunHandle, Status, TypingJob, TypingScheduler};

#[derive(Debug, Parser)]
#[command(name = "retype")]
#[command(about = "Types a Unicode text buffer into the focused window, like a human", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Type a text buffer into the currently focused window
    Type {
        /// Input text file, or '-' for stdin
        #[arg(long, value_name = "PATH")]
        input: PathBuf,

        /// Fixed delay between clusters, in milliseconds
        #[arg(long, default_value_t = 10)]
        base_delay: u64,

        /// Upper bound of the random additive delay, in milliseconds
        #[arg(long, default_value_t = 5)]
        jitter: u64,

        /// Countdown seconds before the first keystroke
        #[arg(long, default_value_t = 3)]
        countdown: u64,

        /// Cluster index to start from (for manual resume)
        #[arg(long, default_value_t = 0)]
        start_offset: usize,

        /// Optional RNG seed for the pacing jitter (for debugging)
        #[arg(long)]
        seed: Option<u64>,

        /// Session file to write if the run is interrupted, so it can be
        /// resumed later from the exact stopping point
        #[arg(long, value_name = "PATH")]
        session: Option<PathBuf>,

        /// Pace through the job without injecting any input
        #[arg(long)]
        dry_run: bool,
    },

    /// Resume an interrupted run from a saved session file
    Resume {
        /// Session file written by a previous `type --session` run
        #[arg(long, value_name = "PATH")]
        session: PathBuf,

        /// Override the saved countdown seconds
        #[arg(long)]
        countdown: Option<u64>,

        /// Optional RNG seed for the pacing jitter (for debugging)
        #[arg(long)]
        seed: Option<u64>,

        /// Pace through the job without injecting any input
        #[arg(long)]
        dry_run: bool,
    },

    /// Show cluster/event counts and a duration estimate without typing
    Inspect {
        /// Input text file, or '-' for stdin
        #[arg(long, value_name = "PATH")]
        input: PathBuf,
    },
}

fn read_input(path: &PathBuf) -> Result<String> {
    if path.as_os_str() == std::ffi::OsStr::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }

    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_session(path: &PathBuf) -> Result<Session> {
    let json =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let session: Session =
        serde_json::from_str(&json).context("failed to parse session JSON")?;

    if session.version != SESSION_VERSION {
        return Err(anyhow!(
            "unsupported session version {}; expected {SESSION_VERSION}",
            session.version
        ));
    }

    Ok(session)
}

fn write_session(path: &PathBuf, session: &Session) -> Result<()> {
    let json = serde_json::to_string_pretty(session).context("failed to serialize session")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn print_status_line(line: &str) {
    const RESET: &str = "\x1b[0m";
    const TYPING: &str = "\x1b[34m";
    const STOPPED: &str = "\x1b[33m";
    const FINISHED: &str = "\x1b[32m";

    if let Some(rest) = line.strip_prefix("Typing") {
        eprintln!("{TYPING}Typing{RESET}{rest}");
    } else if let Some(rest) = line.strip_prefix("Stopped") {
        eprintln!("{STOPPED}Stopped{RESET}{rest}");
    } else if let Some(rest) = line.strip_prefix("Finished") {
        eprintln!("{FINISHED}Finished{RESET}{rest}");
    } else {
        eprintln!("{line}");
    }
}

#[cfg(feature = "enigo")]
fn spawn_injecting(job: TypingJob, notices: Sender<Notice>, rng: StdRng) -> Result<RunHandle> {
    use retype::emitter::backends::enigo::EnigoEmitter;

    let emitter = EnigoEmitter::new()?;
    Ok(TypingScheduler::with_rng(emitter, notices, rng).spawn(job))
}

#[cfg(not(feature = "enigo"))]
fn spawn_injecting(job: TypingJob, notices: Sender<Notice>, rng: StdRng) -> Result<RunHandle> {
    let _ = (job, notices, rng);
    Err(anyhow!(
        "input injection is disabled in this build (rebuild with `--features enigo`), or pass --dry-run"
    ))
}

fn run_job(
    job: TypingJob,
    text: &str,
    session_path: Option<&PathBuf>,
    dry_run: bool,
    seed: Option<u64>,
) -> Result<()> {
    let job_stats = stats(&job);
    eprintln!(
        "Pending: {} clusters, {} input events, ~{:.1}s",
        job_stats.clusters,
        job_stats.input_events,
        (job_stats.est_wait_ms as f64) / 1000.0
    );

    let (tx, rx) = crossbeam_channel::unbounded();
    let rng = rng_from_seed(seed);

    let handle = if dry_run {
        TypingScheduler::with_rng(DiscardEmitter, tx, rng).spawn(job)
    } else {
        spawn_injecting(job, tx, rng)?
    };

    {
        let stop = handle.stop_flag();
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })
        .context("failed to install Ctrl+C handler")?;
    }

    let mut last_decile = 0u8;
    for notice in rx {
        match notice {
            Notice::Status(Status::Preparing { seconds_left }) => {
                eprintln!("Focus the target window. Starting in {seconds_left}s...");
            }
            Notice::Status(Status::Typing) => print_status_line("Typing..."),
            Notice::Status(Status::Stopped) => print_status_line("Stopped"),
            Notice::Status(Status::Finished) => print_status_line("Finished"),
            Notice::Progress(progress) => {
                if progress / 10 > last_decile {
                    last_decile = progress / 10;
                    eprintln!("  {progress}%");
                }
            }
        }
    }

    let job = handle.join()?;

    if job.is_incomplete() {
        eprintln!("Interrupted at cluster {}/{}.", job.offset(), job.total());
    }

    // Keeping the session in step with the final offset makes a repeat
    // `resume` after completion a harmless no-op instead of a retype.
    if let Some(path) = session_path {
        let session = Session::new(text.to_string(), job.offset(), job.config());
        write_session(path, &session)?;
        if job.is_incomplete() {
            eprintln!(
                "Session saved; continue with `retype resume --session {}`.",
                path.display()
            );
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Type {
            input,
            base_delay,
            jitter,
            countdown,
            start_offset,
            seed,
            session,
            dry_run,
        } => {
            let text = read_input(&input)?;
            let config = TypingConfig {
                base_delay_ms: base_delay,
                jitter_max_ms: jitter,
                countdown_secs: countdown,
            };

            let mut job = TypingJob::new(&text, config);
            if start_offset > 0 {
                job = job.resume(start_offset);
            }

            run_job(job, &text, session.as_ref(), dry_run, seed)?;
        }
        Command::Resume {
            session,
            countdown,
            seed,
            dry_run,
        } => {
            let saved = load_session(&session)?;
            let mut config = saved.config;
            if let Some(countdown) = countdown {
                config.countdown_secs = countdown;
            }

            let job = TypingJob::new(&saved.text, config).resume(saved.offset);
            run_job(job, &saved.text, Some(&session), dry_run, seed)?;
        }
        Command::Inspect { input } => {
            let text = read_input(&input)?;
            let job = TypingJob::new(&text, TypingConfig::default());
            let job_stats = stats(&job);

            println!("clusters:     {}", job_stats.clusters);
            println!("code units:   {}", job_stats.code_units);
            println!("input events: {}", job_stats.input_events);
            println!(
                "est. time:    ~{:.1}s (defaults, incl. countdown)",
                (job_stats.est_wait_ms as f64) / 1000.0
            );
        }
    }

    Ok(())
}
