/*
 * rootshard: deterministic shamir shares for a 32-byte root key
 * Copyright (C) 2018-2022 Aleksa Sarai <cyphar@cyphar.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::{
    error::Error as StdError,
    fs::{self, File},
    io,
    io::{prelude::*, BufReader},
};

use anyhow::{anyhow, Context, Error};
use clap::{Arg, ArgAction, ArgMatches, Command};
use multibase::Base;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

extern crate rootshard_core;
use rootshard_core::{
    fatal::OrExit,
    seal::{self, SealKey, Sealed},
    Config, FromWire, RootKey, RootShareGenerator, Share, ToWire,
};

const ROOT_KEY_BASE: Base = Base::Base16Lower;
const SHARE_BASE: Base = Base::Base32Z;

fn shamir_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("threshold")
            .short('n')
            .long("threshold")
            .value_name("THRESHOLD")
            .help("Number of shares required to recover the root key (must not be larger than --shares). Defaults to $ROOTSHARD_SHAMIR_THRESHOLD or 2.")
            .action(ArgAction::Set),
    )
    .arg(
        Arg::new("shares")
            .short('k')
            .long("shares")
            .value_name("NUM SHARES")
            .help("Number of shares to create (must not be smaller than --threshold). Defaults to $ROOTSHARD_SHAMIR_SHARES or 3.")
            .action(ArgAction::Set),
    )
}

fn seal_key_arg(help: &'static str) -> Arg {
    Arg::new("seal-key")
        .long("seal-key")
        .value_name("KEYFILE")
        .help(help)
        .action(ArgAction::Set)
}

fn config(matches: &ArgMatches) -> Result<Config, Error> {
    let mut config = Config::from_env();
    if let Some(threshold) = matches.get_one::<String>("threshold") {
        config.threshold = threshold
            .parse()
            .context("--threshold argument was not an unsigned integer")?;
    }
    if let Some(shares) = matches.get_one::<String>("shares") {
        config.shares = shares
            .parse()
            .context("--shares argument was not an unsigned integer")?;
    }
    Ok(config)
}

fn seal_key(matches: &ArgMatches) -> Result<Option<SealKey>, Error> {
    matches
        .get_one::<String>("seal-key")
        .map(|path| -> Result<SealKey, Error> {
            let bytes = Zeroizing::new(
                fs::read(path).with_context(|| format!("failed to read seal key '{}'", path))?,
            );
            Ok(SealKey::from_slice(&*bytes).or_exit())
        })
        .transpose()
}

fn read_input(path: &str) -> Result<Zeroizing<String>, Error> {
    let (mut stdin_reader, mut file_reader);
    let input: &mut dyn Read = if path == "-" {
        stdin_reader = io::stdin();
        &mut stdin_reader
    } else {
        file_reader =
            File::open(path).with_context(|| format!("failed to open input file '{}'", path))?;
        &mut file_reader
    };

    let mut buffer = Zeroizing::new(String::new());
    BufReader::new(input)
        .read_to_string(&mut buffer)
        .with_context(|| format!("failed to read data from '{}'", path))?;
    Ok(buffer)
}

fn write_output(path: &str, data: &str) -> Result<(), Error> {
    let (mut stdout_writer, mut file_writer);
    let output: &mut dyn Write = if path == "-" {
        stdout_writer = io::stdout();
        &mut stdout_writer
    } else {
        file_writer = File::create(path)
            .with_context(|| format!("failed to open output file '{}'", path))?;
        &mut file_writer
    };

    writeln!(output, "{}", data).with_context(|| format!("failed to write to '{}'", path))
}

fn read_multiline<S: AsRef<str>>(prompt: S) -> Result<Vec<String>, Error> {
    eprintln!("{}:", prompt.as_ref());

    let buffer_stdin = BufReader::new(io::stdin());
    buffer_stdin
        .lines()
        .map(|line| line.map(|s| s.trim().to_string()))
        .take_while(|s| !matches!(s.as_deref(), Ok("") | Err(_)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| anyhow!("failed to read data: {}", err))
}

fn encode_root_key(root_key: &RootKey, seal_key: Option<&SealKey>) -> Result<String, Error> {
    Ok(match seal_key {
        None => multibase::encode(ROOT_KEY_BASE, root_key.as_bytes()),
        Some(seal_key) => seal::seal(seal_key, root_key.as_bytes())
            .or_exit()
            .to_wire_multibase(SHARE_BASE),
    })
}

fn decode_root_key(input: &str, seal_key: Option<&SealKey>) -> Result<RootKey, Error> {
    let root_key = match seal_key {
        None => {
            let (_, bytes) = multibase::decode(input.trim())
                .map_err(|err| anyhow!("failed to decode root key: {}", err))?;
            let bytes = Zeroizing::new(bytes);
            RootKey::from_slice(&*bytes)
        }
        Some(seal_key) => {
            let sealed = Sealed::from_wire_multibase(input)
                .map_err(|err| anyhow!("failed to decode sealed root key: {}", err))?;
            RootKey::from_slice(&*seal::open(seal_key, &sealed).or_exit())
        }
    };
    Ok(root_key.or_exit())
}

fn print_shares(shares: &[Share]) {
    for share in shares {
        println!("{}", share.to_wire_multibase(SHARE_BASE));
    }
}

// rootshard generate [-n <THRESHOLD>] [-k <SHARES>] [--seal-key <KEYFILE>] OUTPUT
fn generate_cli() -> Command {
    shamir_args(
        Command::new("generate")
            .about("Generate a brand-new root key and print its shares (one per line)."),
    )
    .arg(seal_key_arg(
        "Seal the root key with the AES-256 key stored in KEYFILE before writing it.",
    ))
    .arg(
        Arg::new("OUTPUT")
            .help("Path to write the new root key to (stdout is reserved for the shares).")
            .action(ArgAction::Set)
            .required(true)
            .index(1),
    )
}

fn generate(matches: &ArgMatches) -> Result<(), Error> {
    let output_path = matches
        .get_one::<String>("OUTPUT")
        .context("required OUTPUT argument not provided")?;
    // The shares go to stdout, and the root key must never be mixed in with
    // them.
    if output_path == "-" {
        return Err(anyhow!("generate cannot write the root key to stdout"));
    }
    let config = config(matches)?;
    let seal_key = seal_key(matches)?;

    let generator = RootShareGenerator::new();
    let mut root_key = RootKey::default();
    let shares = generator
        .generate_root_shares(&config, &mut root_key)
        .or_exit();

    write_output(
        output_path,
        &encode_root_key(&root_key, seal_key.as_ref())?,
    )?;
    print_shares(&shares);

    Ok(())
}

// rootshard split [-n <THRESHOLD>] [-k <SHARES>] [--seal-key <KEYFILE>] INPUT
fn split_cli() -> Command {
    shamir_args(
        Command::new("split")
            .about("Compute the (deterministic) shares of an existing root key."),
    )
    .arg(seal_key_arg(
        "The root key was sealed with the AES-256 key stored in KEYFILE.",
    ))
    .arg(
        Arg::new("INPUT")
            .help(r#"Path to file containing the multibase root key ("-" to read from stdin)."#)
            .action(ArgAction::Set)
            .allow_hyphen_values(true)
            .required(true)
            .index(1),
    )
}

fn split(matches: &ArgMatches) -> Result<(), Error> {
    let config = config(matches)?;
    let seal_key = seal_key(matches)?;
    let input_path = matches
        .get_one::<String>("INPUT")
        .context("required INPUT argument not provided")?;

    let input = read_input(input_path)?;
    let root_key = decode_root_key(&input, seal_key.as_ref())?;

    let (_, shares) = rootshard_core::compute_shares(&config, &root_key).or_exit();
    print_shares(&shares);

    Ok(())
}

// rootshard recover [-n <THRESHOLD>] [--seal-key <KEYFILE>] OUTPUT
fn recover_cli() -> Command {
    shamir_args(
        Command::new("recover")
            .about("Recover a root key from its shares (read from stdin, one per line)."),
    )
    .arg(seal_key_arg(
        "Seal the recovered root key with the AES-256 key stored in KEYFILE before writing it.",
    ))
    .arg(
        Arg::new("OUTPUT")
            .help(r#"Path to write the recovered root key to ("-" to write to stdout)."#)
            .action(ArgAction::Set)
            .allow_hyphen_values(true)
            .required(true)
            .index(1),
    )
}

fn recover(matches: &ArgMatches) -> Result<(), Error> {
    let config = config(matches)?;
    let seal_key = seal_key(matches)?;
    let output_path = matches
        .get_one::<String>("OUTPUT")
        .context("required OUTPUT argument not provided")?;

    let shares = read_multiline(format!(
        "Enter at least {} shares (empty line to finish)",
        config.threshold
    ))?
    .iter()
    .enumerate()
    .map(|(idx, line)| {
        Share::from_wire_multibase(line)
            .map_err(|err| anyhow!(err)) // TODO: Fix this once FromWire supports non-String errors.
            .with_context(|| format!("parsing share {}", idx + 1))
    })
    .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(provided = shares.len(), "parsed shares");

    let secret = rootshard_core::recover_secret(&config, &shares).or_exit();
    write_output(
        output_path,
        &encode_root_key(&secret.to_root_key(), seal_key.as_ref())?,
    )?;

    Ok(())
}

// rootshard seal-keygen OUTPUT
fn seal_keygen_cli() -> Command {
    Command::new("seal-keygen")
        .about("Generate a new AES-256 key for use with --seal-key.")
        .arg(
            Arg::new("OUTPUT")
                .help("Path to write the new key to (must not already exist).")
                .action(ArgAction::Set)
                .required(true)
                .index(1),
        )
}

fn seal_keygen(matches: &ArgMatches) -> Result<(), Error> {
    let output_path = matches
        .get_one::<String>("OUTPUT")
        .context("required OUTPUT argument not provided")?;

    let key = SealKey::generate().or_exit();
    File::options()
        .write(true)
        .create_new(true)
        .open(output_path)
        .and_then(|mut file| file.write_all(key.as_bytes()))
        .with_context(|| format!("failed to write seal key to '{}'", output_path))?;
    tracing::info!(path = %output_path, "wrote new seal key");

    Ok(())
}

fn cli() -> Command {
    Command::new("rootshard")
        .version("0.0.0")
        .author("Aleksa Sarai <cyphar@cyphar.com>")
        .about("Compute and recover deterministic Shamir shares of a root key.")
        // rootshard generate [-n <THRESHOLD>] [-k <SHARES>] [--seal-key <KEYFILE>] OUTPUT
        .subcommand(generate_cli())
        // rootshard split [-n <THRESHOLD>] [-k <SHARES>] [--seal-key <KEYFILE>] INPUT
        .subcommand(split_cli())
        // rootshard recover [-n <THRESHOLD>] [--seal-key <KEYFILE>] OUTPUT
        .subcommand(recover_cli())
        // rootshard seal-keygen OUTPUT
        .subcommand(seal_keygen_cli())
}

fn main() -> Result<(), Box<dyn StdError>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let mut app = cli();

    let ret = match app.get_matches_mut().subcommand() {
        Some(("generate", sub_matches)) => generate(sub_matches),
        Some(("split", sub_matches)) => split(sub_matches),
        Some(("recover", sub_matches)) => recover(sub_matches),
        Some(("seal-keygen", sub_matches)) => seal_keygen(sub_matches),
        Some((subcommand, _)) => {
            // We should never end up here.
            app.print_help()?;
            Err(anyhow!("unknown subcommand '{}'", subcommand))
        }
        None => {
            app.print_help()?;
            Err(anyhow!("no subcommand specified"))
        }
    }?;

    Ok(ret)
}

#[test]
fn verify_cli() {
    cli().debug_assert();
}

#[test]
fn generate_refuses_stdout() {
    let matches = cli()
        .try_get_matches_from(["rootshard", "generate", "--", "-"])
        .unwrap();
    let (_, sub_matches) = matches.subcommand().unwrap();
    let err = generate(sub_matches).unwrap_err();
    assert!(err.to_string().contains("stdout"));
}

#[test]
fn root_key_text_roundtrip() {
    let root_key = RootKey::from([0x01; rootshard_core::ROOT_KEY_LENGTH]);
    let encoded = encode_root_key(&root_key, None).unwrap();
    assert!(encoded.starts_with('f'));
    let decoded = decode_root_key(&format!("{}\n", encoded), None).unwrap();
    assert_eq!(decoded.as_bytes(), root_key.as_bytes());
}

#[test]
fn sealed_root_key_text_roundtrip() {
    let seal_key = SealKey::generate().unwrap();
    let root_key = RootKey::from([0x01; rootshard_core::ROOT_KEY_LENGTH]);
    let encoded = encode_root_key(&root_key, Some(&seal_key)).unwrap();
    let decoded = decode_root_key(&encoded, Some(&seal_key)).unwrap();
    assert_eq!(decoded.as_bytes(), root_key.as_bytes());
}
