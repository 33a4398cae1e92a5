use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    generate_client_seed, BoardGeometry, DropOutcome, FrameKind, HttpRoundAuthority,
    PathPlaybackEngine, RoundController, RoundEvent, VerificationReport, VerifyForm,
};
use shared::{
    domain::{GameResult, VerificationField},
    money::format_cents,
};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, normalize_base_url, Settings};

#[derive(Parser, Debug)]
#[command(name = "plinko", about = "Play and verify provably fair Plinko rounds")]
struct Cli {
    /// Round authority base URL; overrides plinko.toml and the environment.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drop one ball and watch it fall.
    Play {
        #[arg(long, default_value_t = 6)]
        column: u8,
        #[arg(long, default_value = "1.00")]
        bet: String,
        #[arg(long)]
        client_seed: Option<String>,
        /// Reveal the server seed and verify the round afterwards.
        #[arg(long)]
        verify: bool,
    },
    /// Verify a past round from its seeds.
    Verify {
        #[arg(long)]
        server_seed: String,
        #[arg(long)]
        client_seed: String,
        #[arg(long)]
        nonce: String,
        #[arg(long)]
        drop_column: String,
    },
    /// Print a fresh client seed.
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(api_url) = cli.api_url {
        settings.api_base_url = api_url;
    }
    settings.api_base_url = normalize_base_url(&settings.api_base_url)?;

    match cli.command {
        Command::Seed => println!("{}", generate_client_seed()),
        Command::Play {
            column,
            bet,
            client_seed,
            verify,
        } => {
            let client_seed = client_seed.unwrap_or_else(generate_client_seed);
            play(&settings, column, &bet, &client_seed, verify).await?;
        }
        Command::Verify {
            server_seed,
            client_seed,
            nonce,
            drop_column,
        } => {
            let authority = authority(&settings);
            let mut form = VerifyForm::new();
            form.set_field(VerificationField::ServerSeed, server_seed);
            form.set_field(VerificationField::ClientSeed, client_seed);
            form.set_field(VerificationField::Nonce, nonce);
            form.set_field(VerificationField::DropColumn, drop_column);
            let report = form.submit(authority.as_ref()).await?;
            print_report(&report);
        }
    }

    Ok(())
}

fn authority(settings: &Settings) -> Arc<HttpRoundAuthority> {
    Arc::new(HttpRoundAuthority::with_timeout(
        settings.api_base_url.clone(),
        settings.request_timeout(),
    ))
}

async fn play(
    settings: &Settings,
    column: u8,
    bet: &str,
    client_seed: &str,
    verify: bool,
) -> Result<()> {
    let controller = RoundController::with_engine(
        authority(settings),
        PathPlaybackEngine::new(BoardGeometry::default(), settings.playback_timing()),
    );
    let mut events = controller.subscribe();
    let mut frames = controller.engine().subscribe();

    println!("Client seed: {client_seed}");
    match controller.request_drop(column, bet, client_seed).await? {
        DropOutcome::Started(result) => {
            if let Some(round_id) = &result.round_id {
                println!("Round {round_id} started, dropping from column {column}");
            }
        }
        DropOutcome::Rejected(phase) => bail!("a round is already in progress ({phase:?})"),
    }

    let result = loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(frame) => match frame.kind {
                    FrameKind::Step { row } => println!(
                        "  row {row:>2}  ball at ({:>6.1}, {:>6.1})",
                        frame.position.x, frame.position.y
                    ),
                    FrameKind::Terminal => println!(
                        "  landed   ball at ({:>6.1}, {:>6.1})",
                        frame.position.x, frame.position.y
                    ),
                },
                Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "frame output lagged"),
                Err(RecvError::Closed) => bail!("playback engine stopped"),
            },
            event = events.recv() => match event {
                Ok(RoundEvent::RoundCompleted { result, .. }) => break result,
                Ok(RoundEvent::RoundFailed(report)) => bail!("{}", report.message),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "event output lagged"),
                Err(RecvError::Closed) => bail!("round controller stopped"),
            },
            _ = tokio::signal::ctrl_c() => {
                controller.shutdown();
                bail!("interrupted");
            }
        }
    };
    print_summary(&result);

    if !verify {
        return Ok(());
    }

    let reconciled = controller.request_verification().await?;
    let mut form = VerifyForm::new();
    form.prefill(&reconciled);
    if let Some(notice) = form.notice() {
        eprintln!("warning: {notice}");
    }
    if let Err(err) = form.validate() {
        let input = form.input();
        println!("Cannot verify yet ({err}). Once you have the server seed, run:");
        println!(
            "  plinko verify --server-seed <SEED> --client-seed {} --nonce {} --drop-column {}",
            input.client_seed, input.nonce, input.drop_column
        );
        return Ok(());
    }
    let report = form.submit(controller.authority().as_ref()).await?;
    print_report(&report);
    Ok(())
}

fn print_summary(result: &GameResult) {
    println!();
    println!("Landed in Bin: {}", result.bin_index);
    println!("Multiplier: {}x", result.payout_multiplier);
    println!("Bet Amount: {}", format_cents(result.bet_cents));
    let outcome = if result.won() { "won" } else { "lost" };
    println!("Win Amount: {} ({outcome})", format_cents(result.win_amount));
}

fn print_report(report: &VerificationReport) {
    println!();
    print!("{report}");
    if report.is_success() {
        println!("Verified: the authority reproduced this round.");
    } else {
        println!("Not verified: the authority returned no final bin.");
    }
}
