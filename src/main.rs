use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use setmix::config::AppConfig;
use setmix::selector::{SelectionContext, rank};
use setmix::session::DjSession;
use setmix::track::Track;
use setmix::transition::{HeuristicPlanner, PlannedTransition, TransitionContext, TransitionPlanner};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "setmix", version, about = "Automatic DJ track selection and transition planning")]
struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Number of parallel workers for loading (0 = auto-detect from config)
    #[arg(short = 'j', long, default_value = "0", global = true)]
    jobs: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load analyses and show tempo, key, energy and mix points
    Analyze {
        /// Analysis files or directories (defaults to config file library_dirs)
        paths: Vec<PathBuf>,
    },

    /// Rank candidates to follow a track
    Next {
        /// Title of the playing track (substring match)
        current: String,

        /// Analysis files or directories (defaults to config file library_dirs)
        paths: Vec<PathBuf>,

        /// Desired energy of the next track (0-1, default: hold current)
        #[arg(long)]
        target_energy: Option<f64>,

        /// Number of results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Plan the transition between two tracks
    Plan {
        /// Title of the outgoing track (substring match)
        current: String,

        /// Title of the incoming track (substring match)
        next: String,

        /// Analysis files or directories (defaults to config file library_dirs)
        paths: Vec<PathBuf>,

        /// Preferred transition length in seconds (default from config)
        #[arg(long)]
        preferred: Option<f64>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Simulate a whole set over the library
    Set {
        /// Analysis files or directories (defaults to config file library_dirs)
        paths: Vec<PathBuf>,

        /// Stop after this many tracks
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print the steps as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();
    let workers = if cli.jobs > 0 { cli.jobs } else { config.resolve_workers() };

    match cli.command {
        Commands::Analyze { paths } => {
            let tracks = load_tracks(&config, paths, workers)?;
            if tracks.is_empty() {
                println!("No analyses found.");
                return Ok(());
            }

            println!(
                "{:<40} {:>6} {:>4} {:>6} {:>7} {:>7} {:>7}",
                "Title", "BPM", "Key", "Energy", "In", "Out", "Length"
            );
            println!("{}", "-".repeat(83));
            for t in &tracks {
                println!(
                    "{:<40} {:>6.1} {:>4} {:>6.2} {:>7} {:>7} {:>7}",
                    truncate(&t.title, 40),
                    t.bpm,
                    t.key.as_deref().unwrap_or("-"),
                    t.energy(),
                    format_time(t.mix_in_point()),
                    format_time(t.mix_out_point()),
                    format_time(t.duration),
                );
            }
            println!();
            println!("{} tracks", tracks.len());
        }

        Commands::Next { current, paths, target_energy, limit } => {
            let tracks = load_tracks(&config, paths, workers)?;
            let playing = find_track(&tracks, &current)?;
            let pool: Vec<Track> = tracks
                .iter()
                .filter(|t| t.path != playing.path)
                .cloned()
                .collect();
            let ctx = SelectionContext { target_energy };

            let ranked = rank(&pool, playing, Some(&ctx));
            if ranked.is_empty() {
                println!("No other tracks to choose from.");
                return Ok(());
            }

            println!(
                "Best follow-ups for \"{}\" ({:.1} BPM, {}, energy {:.2}):",
                playing.title,
                playing.bpm,
                playing.key.as_deref().unwrap_or("no key"),
                playing.energy()
            );
            println!();
            println!("{:>3}  {:<40} {:>6} {:>4} {:>6} {:>6}", "#", "Title", "BPM", "Key", "Energy", "Score");
            for (i, (t, s)) in ranked.iter().take(limit).enumerate() {
                println!(
                    "{:>3}  {:<40} {:>6.1} {:>4} {:>6.2} {:>6.3}",
                    i + 1,
                    truncate(&t.title, 40),
                    t.bpm,
                    t.key.as_deref().unwrap_or("-"),
                    t.energy(),
                    s
                );
            }
        }

        Commands::Plan { current, next, paths, preferred, json } => {
            let tracks = load_tracks(&config, paths, workers)?;
            let from = find_track(&tracks, &current)?;
            let to = find_track(&tracks, &next)?;

            let ctx = TransitionContext::between(from, to)
                .with_intensity(config.transition.intensity)
                .with_preferred_duration(preferred.unwrap_or(config.transition.preferred_duration_secs));
            let planned = HeuristicPlanner
                .plan(&ctx)
                .context("Planner produced no transition")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&planned)?);
            } else {
                print_plan(&from.title, &to.title, &planned);
            }
        }

        Commands::Set { paths, limit, json } => {
            let tracks = load_tracks(&config, paths, workers)?;
            if tracks.is_empty() {
                println!("No analyses found.");
                return Ok(());
            }

            let mut session = DjSession::new(tracks, HeuristicPlanner, config.transition);
            let steps = session.run_set(limit);

            if json {
                println!("{}", serde_json::to_string_pretty(&steps)?);
                return Ok(());
            }

            match steps.first() {
                Some(first) => println!("Set opens with \"{}\"", first.from),
                None => {
                    if let Some(only) = session.current() {
                        println!("Set is a single track: \"{}\"", only.title);
                    }
                    return Ok(());
                }
            }
            println!();
            println!(
                "{:>3}  {:<32} {:<32} {:>6} {:>7} {:>7} {:>5}",
                "#", "From", "To", "Fade", "Out@", "In@", "Merge"
            );
            for (i, step) in steps.iter().enumerate() {
                let plan = &step.transition.plan;
                println!(
                    "{:>3}  {:<32} {:<32} {:>5.1}s {:>7} {:>7} {:>5}",
                    i + 1,
                    truncate(&step.from, 32),
                    truncate(&step.to, 32),
                    plan.duration,
                    format_time(plan.start_offset_out),
                    format_time(plan.start_offset_in),
                    if step.transition.diagnostics.harmonic_merge { "yes" } else { "" },
                );
            }
            println!();
            println!("{} transitions, {} tracks left unplayed", steps.len(), session.remaining().len());
        }
    }

    Ok(())
}

/// Resolve input paths (CLI args > config library_dirs) and load the library.
fn load_tracks(config: &AppConfig, paths: Vec<PathBuf>, workers: usize) -> Result<Vec<Track>> {
    let paths = if !paths.is_empty() {
        paths
    } else if !config.library_dirs.is_empty() {
        config.library_dirs.clone()
    } else {
        anyhow::bail!("No analyses to load. Pass paths as arguments or set library_dirs in config.");
    };

    setmix::library::load_library(&paths, workers).context("Failed to load library")
}

/// First track whose title contains `query` (case-insensitive).
fn find_track<'a>(tracks: &'a [Track], query: &str) -> Result<&'a Track> {
    let needle = query.to_lowercase();
    tracks
        .iter()
        .find(|t| t.title.to_lowercase().contains(&needle))
        .with_context(|| format!("No track matching \"{}\"", query))
}

fn print_plan(from: &str, to: &str, planned: &PlannedTransition) {
    let plan = &planned.plan;
    let diag = &planned.diagnostics;

    println!("\"{}\" -> \"{}\"", from, to);
    println!();
    println!("  Duration:      {:.2}s", plan.duration);
    println!("  Out at:        {}", format_time(plan.start_offset_out));
    println!("  In from:       {} ({:.0}% into track)", format_time(plan.start_offset_in), diag.entry_position * 100.0);
    println!("  Harmonic merge: {}", if diag.harmonic_merge { "yes" } else { "no" });
    println!(
        "  Fade:          base {:.2}s, preferred {:.2}s",
        diag.base_fade_secs, diag.preferred_secs
    );
    println!(
        "  Entry search:  window {:.2}s, energy delta {:+.2}, {} beat pattern",
        diag.window_secs, diag.desired_energy_delta, diag.pattern_beats
    );
    println!();
    println!(
        "{:>7} {:>6} {:>6} {:>8} {:>8} {:>6}",
        "Time", "VolOut", "VolIn", "HPF", "LPF", "Tempo"
    );
    // One row per second keeps the table readable
    let stride = ((plan.waypoints.len() as f64 / plan.duration.max(1.0)).round() as usize).max(1);
    let last = plan.waypoints.len().saturating_sub(1);
    for (i, w) in plan.waypoints.iter().enumerate() {
        if i % stride != 0 && i != last {
            continue;
        }
        println!(
            "{:>6.2}s {:>6.2} {:>6.2} {:>7.0}Hz {:>6.0}Hz {:>5.1}%",
            w.time, w.volume_out, w.volume_in, w.cutoff_out, w.cutoff_in, w.tempo_in
        );
    }
}

fn format_time(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
        out.push_str("...");
        out
    }
}
