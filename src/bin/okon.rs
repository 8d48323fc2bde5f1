//! # okon CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Compile a sorted corpus into <dir>/okon.btree
//! okon prepare pwned-passwords-sha1.txt ./data --order 1024
//!
//! # Query a digest; exit code 1 if found, 0 if not
//! okon exists CBFDAC6008F9CAB4083784CBD1874F76618D2A97 ./data/okon.btree
//! ```
//!
//! Exit codes follow the library's C ABI convention: `exists` exits 1
//! when the digest is present and 0 when it is not, `prepare` exits 0 on
//! success, and any failure exits 2.

use std::path::PathBuf;
use std::process::ExitCode;

use eyre::{bail, ensure, Result, WrapErr};
use okon::{prepare_file, text_to_sha1, Btree, DEFAULT_ORDER};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => ExitCode::from(code),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<u8> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(0);
    }

    match args[1].as_str() {
        "--help" | "-h" => {
            print_usage();
            Ok(0)
        }
        "--version" | "-v" => {
            println!("okon {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
        "prepare" => run_prepare(&args[2..]),
        "exists" => run_exists(&args[2..]),
        other => bail!("unknown command '{}'; see okon --help", other),
    }
}

fn run_prepare(args: &[String]) -> Result<u8> {
    let mut input: Option<PathBuf> = None;
    let mut output_dir: Option<PathBuf> = None;
    let mut order = DEFAULT_ORDER;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--order" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| eyre::eyre!("--order requires a value"))?;
                order = value
                    .parse::<u32>()
                    .wrap_err_with(|| format!("invalid order '{}'", value))?;
                ensure!(order > 0, "order must be positive");
            }
            arg if arg.starts_with('-') => bail!("unknown option '{}'", arg),
            path if input.is_none() => input = Some(PathBuf::from(path)),
            path if output_dir.is_none() => output_dir = Some(PathBuf::from(path)),
            _ => bail!("too many arguments for 'prepare'"),
        }
        i += 1;
    }

    let (Some(input), Some(output_dir)) = (input, output_dir) else {
        bail!("usage: okon prepare <corpus.txt> <output-dir> [--order N]");
    };

    let summary = prepare_file(&input, &output_dir, order)
        .wrap_err_with(|| format!("failed to prepare '{}'", input.display()))?;
    println!(
        "indexed {} digests into {}",
        summary.keys,
        summary.index_path.display()
    );

    Ok(0)
}

fn run_exists(args: &[String]) -> Result<u8> {
    let [sha1_text, index_path] = args else {
        bail!("usage: okon exists <40-hex-sha1> <index-file>");
    };

    let sha1 = text_to_sha1(sha1_text).wrap_err("invalid SHA-1 digest")?;
    let mut btree = Btree::open_file(PathBuf::from(index_path))?;

    if btree.contains(&sha1) {
        println!("found");
        Ok(1)
    } else {
        println!("not found");
        Ok(0)
    }
}

fn print_usage() {
    println!("okon - membership queries over huge SHA-1 corpora");
    println!();
    println!("USAGE:");
    println!("    okon <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    prepare <corpus.txt> <output-dir> [--order N]");
    println!("        Compile a sorted digest corpus into <output-dir>/okon.btree.");
    println!("        Exits 0 on success.");
    println!();
    println!("    exists <40-hex-sha1> <index-file>");
    println!("        Check whether a digest is in the index.");
    println!("        Exits 1 if found, 0 if not found.");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help         Print help information");
    println!("    -v, --version      Print version information");
    println!();
    println!("Any error exits 2.");
}
