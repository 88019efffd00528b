use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{BookingController, ControllerConfig, HttpSyncClient};
use shared::domain::BookingId;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod presenter;
mod settings;

use presenter::{on_slot_booked_clicked, on_slot_free_clicked, render_board};
use settings::load_board_settings;

#[derive(Parser, Debug)]
#[command(about = "Book and cancel appointments on the daily board")]
struct Args {
    /// Remote store base url; overrides board.toml and BOARD_SERVER_URL.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Show,
    Book {
        #[arg(long)]
        time: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
    },
    Cancel {
        #[arg(long)]
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();
    let args = Args::parse();

    let mut settings = load_board_settings()?;
    if let Some(url) = args.server_url {
        settings.server_url = url;
    }
    if let Some(secs) = args.timeout_secs {
        settings.request_timeout_secs = secs;
    }

    let sync = HttpSyncClient::new(&settings.server_url, settings.request_timeout())?;
    let config = ControllerConfig {
        request_timeout: settings.request_timeout(),
        ..ControllerConfig::default()
    };
    let controller =
        BookingController::new_with_config(Arc::new(sync), settings.template()?, config);
    let report = controller
        .load_and_reconcile()
        .await
        .with_context(|| format!("failed to load board from {}", settings.server_url))?;
    info!(
        server_url = %settings.server_url,
        booked = report.booked,
        free = report.free,
        "board loaded"
    );
    for mismatch in &report.mismatches {
        eprintln!(
            "warning: booking {} at {} does not fit the board and is hidden",
            mismatch.booking.id, mismatch.booking.time
        );
    }

    match args.command {
        Command::Show => {}
        Command::Book { time, name, phone } => {
            let booking = on_slot_free_clicked(&controller, &time, &name, &phone).await?;
            println!("Booked {} for {} (id {})", booking.time, booking.name, booking.id);
        }
        Command::Cancel { id, yes } => {
            let id = BookingId(id);
            let confirmed = yes || confirm_cancel(&id).await?;
            let time = on_slot_booked_clicked(&controller, &id, |_| confirmed).await?;
            println!("Cancelled booking at {time}");
        }
    }

    println!("{}", render_board(&controller.snapshot().await));
    Ok(())
}

async fn confirm_cancel(id: &BookingId) -> Result<bool> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(format!("Cancel booking {id}? [y/N] ").as_bytes())
        .await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}
