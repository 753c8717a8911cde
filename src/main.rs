//! Coin Flip Casino
//!
//! `coin-flip-casino serve` runs the shared score relay.
//! `coin-flip-casino play` opens a terminal table against the relay named by
//! `COIN_FLIP_STORE_URL`, or against an in-process leaderboard when unset.

use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use coin_flip::{
    VERSION,
    config::AppConfig,
    core::{CoinFace, DeterministicRng},
    game::{
        events::{RejectReason, RoundEvent},
        round::RoundEngine,
        state::SessionState,
        table::{CoinTable, TableError},
    },
    leaderboard::{
        entry::normalize_name, memory::MemoryScoreStore, source::RealtimeSource, sync::LeaderboardSync,
    },
    network::{client::RemoteScoreStore, server::ScoreServer},
    storage::records::JsonFileRecordStore,
};

const USAGE: &str = "usage: coin-flip-casino <serve|play>";

const HELP: &str = "\
  h        call HEADS
  t        call TAILS
  f        flip the coin
  a NAME   add your score to the leaderboard
  b        show the leaderboard
  q        quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    info!("Coin Flip Casino v{}", VERSION);

    let mode = std::env::args().nth(1);
    match mode.as_deref() {
        Some("serve") => serve(config).await,
        Some("play") | None => match config.store_url.clone() {
            Some(url) => {
                let store = RemoteScoreStore::connect(&url)
                    .await
                    .with_context(|| format!("connecting to score relay at {}", url))?;
                play(config, store).await
            }
            None => play(config, MemoryScoreStore::new()).await,
        },
        Some(other) => bail!("unknown command {:?}\n{}", other, USAGE),
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let server = Arc::new(ScoreServer::new(config.server));

    let stopper = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            stopper.shutdown();
        }
    });

    server.run().await?;
    Ok(())
}

/// Terminal commands.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Call(CoinFace),
    Flip,
    Submit(String),
    Board,
    Quit,
    Help,
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head {
        "h" => Some(Command::Call(CoinFace::Heads)),
        "t" => Some(Command::Call(CoinFace::Tails)),
        "f" => Some(Command::Flip),
        "a" => Some(Command::Submit(rest.to_string())),
        "b" => Some(Command::Board),
        "q" => Some(Command::Quit),
        "?" | "help" => Some(Command::Help),
        _ => None,
    }
}

fn print_status(session: &SessionState) {
    println!(
        "SCORE {:04}  STREAK {}  HIGH {:04}  RECORD {}",
        session.current_score,
        session.current_streak,
        session.high_score(),
        session.record_streak()
    );
}

fn report(err: TableError) {
    match err {
        TableError::Round(e) => println!("{}", RoundEvent::Rejected { reason: e.into() }),
        TableError::Submit(e) => println!("SUBMIT FAILED: {}", e.to_string().to_uppercase()),
    }
}

/// Handle everything except flipping. Returns false on quit.
async fn handle<S: RealtimeSource>(table: &CoinTable<JsonFileRecordStore, S>, command: Command) -> bool {
    match command {
        Command::Call(choice) => match table.select_prediction(choice) {
            Ok(()) => println!("{}", RoundEvent::PredictionSelected { choice }),
            Err(e) => report(e),
        },
        Command::Submit(name) => match table.submit_score(&name).await {
            Ok(submitted) => {
                let name = normalize_name(&name).unwrap_or(name);
                println!(
                    "{}",
                    RoundEvent::ScoreSubmitted { name, score: submitted.score, streak: submitted.streak }
                );
                print_status(&table.session());
            }
            Err(e) => report(e),
        },
        Command::Board => print!("{}", table.leaderboard().latest()),
        Command::Help => println!("{}", HELP),
        Command::Flip => println!("{}", RoundEvent::Rejected { reason: RejectReason::FlipInProgress }),
        Command::Quit => return false,
    }
    true
}

async fn play<S: RealtimeSource>(config: AppConfig, store: S) -> anyhow::Result<()> {
    let records = JsonFileRecordStore::new(&config.records_path);
    let engine = RoundEngine::new(records);
    let table = CoinTable::with_flip_delay(engine, LeaderboardSync::new(store), config.flip_delay);
    let mut coin = match config.seed.as_deref() {
        Some(label) => {
            info!("Replaying flips for seed {:?}", label);
            DeterministicRng::from_label(label)
        }
        None => DeterministicRng::from_entropy(),
    };

    let _subscription = table.leaderboard().subscribe(|view| {
        print!("\n{}", view);
    });

    println!("{}", RoundEvent::Ready);
    print_status(&table.session());
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse_command(&line) else {
            println!("{}", HELP);
            continue;
        };

        if command != Command::Flip {
            if !handle(&table, command).await {
                break;
            }
            continue;
        }

        let session = table.session();
        if let Some(prediction) = session.prediction {
            if !table.is_flipping() {
                println!("{}", RoundEvent::FlipStarted { prediction });
            }
        }

        let flip = table.flip(&mut coin);
        tokio::pin!(flip);
        let mut quit = false;
        loop {
            tokio::select! {
                result = &mut flip => {
                    match result {
                        Ok(result) => {
                            let outcome = result.outcome;
                            println!("{} {}", outcome.label(), RoundEvent::FlipResolved(result));
                            print_status(&table.session());
                        }
                        Err(e) => report(e),
                    }
                    break;
                }
                line = lines.next_line() => {
                    // Input during the animation window is still processed and
                    // mostly refused by the table.
                    match line? {
                        Some(line) => match parse_command(&line) {
                            Some(command) => {
                                if !handle(&table, command).await {
                                    quit = true;
                                    break;
                                }
                            }
                            None => println!("{}", HELP),
                        },
                        None => {
                            quit = true;
                            break;
                        }
                    }
                }
            }
        }
        if quit {
            break;
        }
    }

    info!("Goodbye");
    Ok(())
}
