//! Command-line arguments.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "otalink", version, about)]
/// Push firmware images over a packet-limited link, or receive them as a device.
pub struct Cli {
    /// Read configuration from FILE instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable detailed debug output
    ///
    /// This has the same effect as setting `RUST_LOG=otalink=debug` in the environment.
    /// If present, `RUST_LOG` overrides this option.
    #[arg(short, long, global = true, action)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a firmware image to a receiving device
    Push(PushArgs),
    /// Act as the device: accept one image and store it
    Receive(ReceiveArgs),
}

#[derive(Debug, Args)]
pub struct PushArgs {
    /// The firmware image to send
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Address of the receiving device
    #[arg(long, value_name = "HOST:PORT")]
    pub addr: Option<SocketAddr>,

    /// Maximum packet size of the link, headers included
    #[arg(long, value_name = "BYTES", conflicts_with("negotiate"))]
    pub packet_size: Option<u16>,

    /// Learn the packet size from the device instead
    #[arg(long, action)]
    pub negotiate: bool,

    /// Peripheral identifier reported in progress events
    #[arg(long, value_name = "ID")]
    pub id: Option<String>,
}

#[derive(Debug, Args)]
pub struct ReceiveArgs {
    /// Where to store the received image
    #[arg(value_name = "OUT")]
    pub out: PathBuf,

    /// Address to listen on
    #[arg(long, value_name = "HOST:PORT")]
    pub bind: Option<SocketAddr>,

    /// Announce this maximum packet size to negotiating senders
    #[arg(long, value_name = "BYTES")]
    pub packet_size: Option<u16>,
}
