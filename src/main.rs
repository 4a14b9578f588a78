use std::cell::Cell;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use duel_2048::engine::{Move, Score, State};
use duel_2048::expectimax::{Expectimax, ExpectimaxConfig};
use duel_2048::harness::{self, CompareConfig, Comparison, GameRecord, Summary};
use duel_2048::mcts::{make_policy, MctsConfig};
use duel_2048::policy::Policy;
use duel_2048::render::{render_board, CLEAR_SCREEN};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

#[derive(Debug, Parser)]
#[command(name = "duel-2048", version, about = "MCTS vs Expectimax on 3x3 2048")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Play N games per agent and report score statistics
    Compare {
        /// Games played by each agent
        #[arg(short = 'n', long, default_value_t = 100)]
        games: usize,
        /// MCTS time budget per move in seconds
        #[arg(long, default_value_t = 0.5)]
        mcts_time: f64,
        /// UCB1 exploration constant
        #[arg(long, default_value_t = 1.5)]
        exploration: f64,
        /// Expectimax search depth (max and chance layers each count one)
        #[arg(long, default_value_t = 4)]
        depth: u32,
        /// Seed for reproducible games (random if omitted)
        #[arg(long)]
        seed: Option<u64>,
        /// Play rounds concurrently; MCTS sessions share one weight store
        #[arg(long)]
        parallel: bool,
        /// Write the full comparison as JSON to this path
        #[arg(long, value_name = "PATH")]
        json: Option<PathBuf>,
        /// Suppress the progress bar
        #[arg(long)]
        quiet: bool,
    },
    /// Watch an agent play in the terminal
    Watch {
        #[arg(long, value_enum, default_value_t = Agent::Expectimax)]
        agent: Agent,
        #[arg(long, value_enum, default_value_t = Speed::Normal)]
        speed: Speed,
        /// MCTS time budget per move in seconds
        #[arg(long, default_value_t = 0.3)]
        mcts_time: f64,
        /// Expectimax search depth
        #[arg(long, default_value_t = 4)]
        depth: u32,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Agent {
    Expectimax,
    Mcts,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Speed {
    Slow,
    Normal,
    Fast,
}

impl Speed {
    fn delay(self) -> Duration {
        match self {
            Speed::Slow => Duration::from_millis(800),
            Speed::Normal => Duration::from_millis(300),
            Speed::Fast => Duration::from_millis(100),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    match Cli::parse().cmd {
        Cmd::Compare { games, mcts_time, exploration, depth, seed, parallel, json, quiet } => {
            let cfg = CompareConfig {
                games,
                mcts: MctsConfig::from_secs(mcts_time, exploration),
                expectimax: ExpectimaxConfig { depth },
                seed: seed.unwrap_or_else(|| rand::thread_rng().next_u64()),
                parallel,
            };
            run_compare(&cfg, json, quiet)
        }
        Cmd::Watch { agent, speed, mcts_time, depth, seed } => {
            let seed = seed.unwrap_or_else(|| rand::thread_rng().next_u64());
            run_watch(agent, speed.delay(), mcts_time, depth, seed)
        }
    }
}

fn run_compare(cfg: &CompareConfig, json: Option<PathBuf>, quiet: bool) -> anyhow::Result<()> {
    info!(
        "Comparing over {} games (seed {}, MCTS {:.3}s/move, Expectimax depth {})",
        cfg.games,
        cfg.seed,
        cfg.mcts.time_limit.as_secs_f64(),
        cfg.expectimax.depth
    );
    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(cfg.games as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} [{bar:30}] {pos}/{len} | {msg}")?
                .progress_chars("=> "),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };
    let cmp = harness::compare(cfg, |round| {
        pb.inc(1);
        pb.set_message(format!("MCTS={} Expectimax={}", round.mcts.score, round.expectimax.score));
    });
    pb.finish_and_clear();

    print_summary(&cmp);
    if let Some(path) = json {
        let file = fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(file, &cmp).with_context(|| format!("writing {}", path.display()))?;
        info!("Wrote comparison to {}", path.display());
    }
    Ok(())
}

fn print_summary(cmp: &Comparison) {
    let line = |name: &str, s: &Summary| {
        println!(
            "{name}: avg={:.2}, std={:.2}, var={:.2}, 95% CI=({:.2}, {:.2})",
            s.mean, s.std_dev, s.variance, s.ci95.0, s.ci95.1
        )
    };
    println!("\n--- Summary ---");
    line("MCTS", &cmp.mcts);
    line("Expectimax", &cmp.expectimax);
    println!("MCTS won {}/{} games", cmp.mcts_wins, cmp.rounds.len());
}

fn run_watch(agent: Agent, delay: Duration, mcts_time: f64, depth: u32, seed: u64) -> anyhow::Result<()> {
    let mut agents: Vec<(String, Box<dyn Policy>)> = Vec::new();
    if matches!(agent, Agent::Expectimax | Agent::Both) {
        let ex = Expectimax::seeded(ExpectimaxConfig { depth }, seed ^ 0xE4B1);
        agents.push((format!("Expectimax (depth={depth})"), Box::new(ex)));
    }
    if matches!(agent, Agent::Mcts | Agent::Both) {
        let policy = make_policy(mcts_time, 1.5, StdRng::seed_from_u64(seed ^ 0x5EED));
        agents.push((format!("MCTS ({mcts_time}s/move)"), Box::new(policy)));
    }

    let mut results = Vec::with_capacity(agents.len());
    let mut stdout = io::stdout().lock();
    for (name, policy) in agents.iter_mut() {
        let mut rng = StdRng::seed_from_u64(seed);
        let record = watch_game(policy.as_mut(), &mut rng, name, delay, &mut stdout)?;
        let outcome = if record.reached_win { "Reached 2048!" } else { "Game over" };
        writeln!(stdout, "\n  {outcome}  |  Final score: {}  |  Moves: {}\n", record.score, record.moves)?;
        results.push((name.clone(), record.score));
    }

    if results.len() > 1 {
        writeln!(stdout, "  -- Head-to-head --")?;
        for (name, score) in &results {
            writeln!(stdout, "  {name:<30} {score}")?;
        }
        match head_to_head_winner(&results) {
            Some(winner) => writeln!(stdout, "\n  Winner: {winner}\n")?,
            None => writeln!(stdout, "\n  Tie\n")?,
        }
    }
    Ok(())
}

/// Play one game, drawing every position to `out`. A failed write stops the
/// game and is returned as the error.
fn watch_game<W: Write>(
    policy: &mut dyn Policy,
    rng: &mut StdRng,
    title: &str,
    delay: Duration,
    out: &mut W,
) -> anyhow::Result<GameRecord> {
    let start = Instant::now();
    let stopped = Cell::new(false);
    let mut write_err = None;
    let mut guarded = |s: &State| -> Option<Move> { if stopped.get() { None } else { policy.select_action(s) } };
    let record = harness::play_game_with(&mut guarded, rng, |state, last, n| {
        if stopped.get() {
            return;
        }
        let frame = render_board(state, title, n, last, start.elapsed());
        match draw_frame(&mut *out, &frame) {
            Ok(()) => thread::sleep(delay),
            Err(e) => {
                write_err = Some(e);
                stopped.set(true);
            }
        }
    });
    match write_err {
        Some(e) => Err(e).context("drawing the board"),
        None => Ok(record),
    }
}

fn draw_frame<W: Write>(out: &mut W, frame: &str) -> io::Result<()> {
    writeln!(out, "{CLEAR_SCREEN}{frame}")?;
    out.flush()
}

/// Name of the single top scorer; `None` when the best score is shared.
fn head_to_head_winner(results: &[(String, Score)]) -> Option<&str> {
    let best = results.iter().map(|(_, score)| *score).max()?;
    let mut top = results.iter().filter(|(_, score)| *score == best);
    let (name, _) = top.next()?;
    if top.next().is_some() { None } else { Some(name.as_str()) }
}
