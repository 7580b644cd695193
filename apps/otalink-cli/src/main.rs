//! otalink entry point.

mod cli;
mod config;
mod output;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use otalink_data_channel::{OtaReceiver, TcpConnector};
use otalink_protocol::{ProgressEvent, TransferOutcome};
use otalink_transfer::{CancelHandle, Payload, execute};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, PushArgs, ReceiveArgs};
use config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON event lines.
    let default_filter = if cli.debug {
        "info,otalink=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "failed to load config, using defaults");
            AppConfig::default()
        }
    };

    let result = match cli.command {
        Command::Push(args) => push(args, config).await,
        Command::Receive(args) => receive(args, config).await,
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "otalink failed");
            ExitCode::FAILURE
        }
    }
}

async fn push(args: PushArgs, config: AppConfig) -> anyhow::Result<ExitCode> {
    let link = config.link_config(args.addr, args.packet_size, args.negotiate);
    let connector = TcpConnector::new(link);
    let peripheral = args.id.unwrap_or_else(|| config.peripheral_id.clone());

    let cancel = CancelHandle::new();
    spawn_interrupt_handler({
        let cancel = cancel.clone();
        move || cancel.cancel()
    });

    // Every progress event reaches stdout, including the final 100.
    let (progress_tx, progress_rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let printer = tokio::spawn(output::print_progress(progress_rx));
    let (done_tx, done_rx) = oneshot::channel::<TransferOutcome>();

    info!(file = %args.file.display(), peripheral = %peripheral, "pushing firmware");
    execute(
        peripheral.clone(),
        Payload::File(args.file),
        &connector,
        progress_tx,
        Box::new(move |outcome| {
            let _ = done_tx.send(outcome);
        }),
        cancel,
        config.transfer.clone(),
    )
    .await;

    let outcome = done_rx
        .await
        .context("transfer finished without reporting an outcome")?;
    printer.await.context("progress printer panicked")??;
    output::emit(&output::result_line(&peripheral, &outcome)?)?;

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn receive(args: ReceiveArgs, config: AppConfig) -> anyhow::Result<ExitCode> {
    let cancel = CancellationToken::new();
    spawn_interrupt_handler({
        let cancel = cancel.clone();
        move || cancel.cancel()
    });

    let bind = args.bind.unwrap_or(config.bind);
    let receiver = OtaReceiver::bind(bind, args.packet_size, cancel)
        .await
        .with_context(|| format!("failed to listen on {bind}"))?
        .with_accept_timeout(config.connect_timeout());

    let total = receiver
        .receive_to_file(&args.out)
        .await
        .with_context(|| format!("failed to receive into {}", args.out.display()))?;
    info!(out = %args.out.display(), total, "done");
    Ok(ExitCode::SUCCESS)
}

/// Runs `on_interrupt` on the first Ctrl-C.
fn spawn_interrupt_handler(on_interrupt: impl FnOnce() + Send + 'static) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_interrupt();
        }
    });
}
