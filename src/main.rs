//! `glcp`: add placeholder doc comments to the exported declarations of Go
//! packages.

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::debug;

use glcp::{process, resolve, BuildContext};

#[derive(Parser)]
#[command(
    name = "glcp",
    about = "Insert placeholder doc comments above exported Go declarations"
)]
struct Cli {
    /// Write result to (source) file instead of stdout
    #[arg(short = 'w')]
    write: bool,

    /// Packages to process: import paths or local directories
    #[arg(required = true, value_name = "PACKAGE")]
    packages: Vec<String>,
}

fn run(cli: &Cli) -> Result<()> {
    let ctx = BuildContext::from_env();
    debug!("build context: {}/{}", ctx.goos, ctx.goarch);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for package in &cli.packages {
        let files = resolve(package, &ctx)?;
        process(cli.write, &files, &mut out)
            .with_context(|| format!("Failed to process package {package}"))?;
    }
    out.flush().context("Failed to flush stdout")?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
