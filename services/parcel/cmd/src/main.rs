//! Parcel wire tool.
//!
//! Decodes captured parcel/chunk streams into JSON lines, encodes message
//! bodies into parcel and chunk frames, and emits handshake frames.

use bytes::Bytes;
use clap::{Parser, Subcommand};
use parcel_wire::{Compression, Encoding, ParcelType};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod logging;

use commands::EncodeOptions;
use config::ToolConfig;
use logging::ParcelLogFormatter;

/// Parcel wire protocol encoder and decoder
#[derive(Parser, Debug)]
#[command(name = "parcel", version, about = "Parcel wire protocol encoder and decoder")]
struct Args {
    /// Configuration file path
    #[arg(long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Read and write hex text instead of raw bytes
    #[arg(long, global = true)]
    hex: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode parcels and chunks and print them as JSON lines
    Decode {
        /// Input file (stdin when omitted)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Input starts with a 36-byte handshake frame
        #[arg(long)]
        handshake: bool,
    },

    /// Encode a message body as a parcel header followed by chunks
    Encode {
        /// Parcel id
        #[arg(long)]
        parcel_id: u32,

        /// Parcel type: ping, pong, call, callback, event, stream
        #[arg(long = "type", default_value = "call")]
        parcel_type: ParcelType,

        /// Declared compression: none, gzip
        #[arg(long, default_value = "none")]
        compression: Compression,

        /// Declared encoding: binary, jstp, json, bson, v8
        #[arg(long, default_value = "binary")]
        encoding: Encoding,

        /// Maximum chunk payload (overrides config)
        #[arg(long)]
        fragment_size: Option<usize>,

        /// Body file (stdin when omitted)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Emit a handshake frame
    Handshake {
        /// Restore an existing session instead of opening a new one
        #[arg(long)]
        restore: bool,

        /// Session token to restore
        #[arg(long, default_value_t = 0)]
        token: u32,

        /// Reserved byte
        #[arg(long, default_value_t = 0)]
        reserved: u8,

        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = args
        .log_level
        .clone()
        .or_else(|| std::env::var("PARCEL_LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string());

    let env_filter = EnvFilter::new("warn")
        .add_directive(format!("parcel={}", log_level).parse()?)
        .add_directive(format!("parcel_wire={}", log_level).parse()?);

    let formatter = ParcelLogFormatter::new("parcel".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(formatter)
        .init();

    info!("Starting parcel tool v{}", env!("CARGO_PKG_VERSION"));

    let mut tool_config = ToolConfig::load_from_file(&args.config)?;
    if args.hex {
        tool_config.hex_output = true;
    }

    if let Err(e) = run(args.command, &tool_config).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(command: Command, tool_config: &ToolConfig) -> anyhow::Result<()> {
    match command {
        Command::Decode { input, handshake } => {
            let raw = commands::read_input(input.as_deref()).await?;
            let wire = commands::unwrap_input(&raw, tool_config.hex_output)?;
            let report =
                commands::decode_bytes(&wire, handshake, tool_config.max_chunk_payload)?;

            let mut lines = String::new();
            if let Some(hs) = &report.handshake {
                lines.push_str(&commands::describe_handshake(hs).to_string());
                lines.push('\n');
            }
            for record in &report.records {
                lines.push_str(&commands::describe(record)?.to_string());
                lines.push('\n');
            }
            commands::write_output(None, lines.as_bytes()).await?;

            component_info!(
                "decode",
                "decoded {} records from {} bytes",
                report.records.len(),
                wire.len()
            );
        }

        Command::Encode {
            parcel_id,
            parcel_type,
            compression,
            encoding,
            fragment_size,
            input,
            output,
        } => {
            let options = EncodeOptions {
                parcel_id,
                parcel_type,
                compression,
                encoding,
                fragment_size: fragment_size.unwrap_or(tool_config.fragment_size),
            };
            let body = commands::read_input(input.as_deref()).await?;
            let body_len = body.len();
            let encoded = commands::encode_message(&options, Bytes::from(body))?;

            let out = commands::wrap_output(&encoded.concat(), tool_config.hex_output);
            commands::write_output(output.as_deref(), &out).await?;

            component_info!(
                "encode",
                "parcel {} ({}): {} body bytes in {} chunks",
                parcel_id,
                parcel_type,
                body_len,
                encoded.chunks.len()
            );
        }

        Command::Handshake {
            restore,
            token,
            reserved,
            output,
        } => {
            let frame = commands::encode_handshake(restore, token, reserved)?;
            let out = commands::wrap_output(&frame, tool_config.hex_output);
            commands::write_output(output.as_deref(), &out).await?;

            component_info!("handshake", "emitted handshake restore={} token={}", restore, token);
        }
    }

    Ok(())
}
