use std::time::Duration;

use anyhow::Result;
use barcard::commands::{self, Session, TagInfo};
use barcard::nfc::protocol::{RECORD_PAGES, RECORD_PAGE_OFFSET};
use barcard::nfc::{ApplicationId, CardConfig, CardProtocol, DEFAULT_AID};
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[clap(version, about, long_about = None)]
struct Cli {
    /// PC/SC reader to use, defaults to the first one attached
    #[arg(long, short = 'r', env = "BARCARD_READER", global = true)]
    reader: Option<String>,

    /// Application identifier selected on ISO-DEP cards
    #[arg(long, env = "BARCARD_AID", default_value = DEFAULT_AID, global = true)]
    aid: ApplicationId,

    /// First Ultralight page of the card record
    #[arg(long, env = "BARCARD_PAGE_OFFSET", default_value_t = RECORD_PAGE_OFFSET, global = true)]
    page_offset: u8,

    /// Seconds to wait for a tag
    #[arg(long, short = 't', env = "BARCARD_TIMEOUT", default_value_t = 5, global = true)]
    timeout: u64,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List attached PC/SC readers
    Readers,
    /// Report which technology the tag on the reader speaks
    Detect,
    /// SELECT an application over ISO-DEP and print its payload
    Select,
    /// Register a customer name on a MIFARE Ultralight tag
    Write { name: String },
    /// Dump the raw record pages
    Read {
        #[arg(long, default_value_t = RECORD_PAGES)]
        pages: u8,
    },
    /// Read the customer name with whichever technology the tag offers
    ReadCard,
    /// Decode a Beam NDEF message given in hex
    BeamDecode { message: String },
}

fn print<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text(value));
    }
    Ok(())
}

fn describe(info: &TagInfo) -> String {
    let mut out = format!("{} on {} (ATR {})", info.technology, info.reader, info.atr);
    if let Some(text) = &info.text {
        out.push_str(&format!("\n{:?}", text));
    }
    if let Some(payload) = &info.payload {
        out.push_str(&format!("\npayload: {}", payload));
    }
    out
}

fn run(cli: Cli) -> Result<()> {
    let protocol = CardProtocol::new(CardConfig {
        aid: cli.aid.clone(),
        page_offset: cli.page_offset,
        ..CardConfig::default()
    });
    let session = || Session::new(cli.reader.clone(), Duration::from_secs(cli.timeout), protocol.clone());

    match &cli.command {
        Command::Readers => print(cli.json, &commands::list_readers()?, |readers| readers.join("\n")),
        Command::Detect => print(cli.json, &session()?.detect()?, describe),
        Command::Select => print(cli.json, &session()?.select()?, describe),
        Command::Write { name } => print(cli.json, &session()?.write_card(name)?, describe),
        Command::Read { pages } => print(cli.json, &session()?.read_record(Some(*pages))?, describe),
        Command::ReadCard => print(cli.json, &session()?.read_card()?, describe),
        Command::BeamDecode { message } => print(cli.json, &commands::beam_decode(message)?, |beam| {
            format!("{:.2} ({})", beam.amount, beam.record_type)
        }),
    }
}

fn main() {
    env_logger::init();

    if let Err(error) = run(Cli::parse()) {
        eprintln!("error: {:#}", error);
        std::process::exit(1);
    }
}
