use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "modelpack", about = "Pack and inspect QMSH models")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode a JSON scene description into a binary model.
    Encode {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Position quantization bits (8..=16).
        #[arg(long)]
        bits: Option<u8>,
    },
    /// Print a JSON summary of a binary model.
    Inspect { file: PathBuf },
    /// Write the decoder module manifest.
    DecoderModule {
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Command::Encode {
            input,
            output,
            bits,
        } => {
            let summary = tools::encode_file(&input, &output, bits)?;
            eprintln!(
                "wrote {} ({} bytes, blake3={})",
                output.display(),
                summary.byte_len,
                summary.content_hash
            );
        }
        Command::Inspect { file } => {
            let summary = tools::inspect_file(&file)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::DecoderModule { output } => {
            tools::write_decoder_module(&output)?;
            eprintln!("wrote {}", output.display());
        }
    }
    Ok(())
}
