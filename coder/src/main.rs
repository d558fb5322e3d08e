//! Interactive coding agent over a project directory.
//!
//! Reads user turns from stdin, lets the model read the project and write
//! files back into it, and prints replies on stdout.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use coder::exit_codes;
use coder::io::console::StdConsole;
use coder::logging;
use coder::repl::run_repl;
use coder::start::{StartOptions, build_client, prepare_session};

#[derive(Parser, Debug)]
#[command(
    name = "coder",
    version,
    about = "Chat with a model that can read and rewrite a project directory"
)]
struct Cli {
    /// Project directory the model may read and write.
    root: PathBuf,

    /// Extra regex excluding matching paths from project reads (repeatable).
    #[arg(short, long = "ignore", value_name = "REGEX")]
    ignore: Vec<String>,

    /// Config file (default: <ROOT>/.coder/config.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Model name, overriding the config file.
    #[arg(long, value_name = "NAME")]
    model: Option<String>,
}

impl Cli {
    fn into_options(self) -> StartOptions {
        StartOptions {
            root: self.root,
            ignore: self.ignore,
            config_path: self.config,
            model: self.model,
        }
    }
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    if let Err(err) = run(cli.into_options()) {
        eprintln!("error: {err:#}");
        std::process::exit(exit_codes::for_error(&err));
    }
    std::process::exit(exit_codes::OK);
}

fn run(opts: StartOptions) -> Result<()> {
    let mut prepared = prepare_session(&opts)?;
    let client = build_client(&prepared.config)?;
    let mut console = StdConsole::stdio();
    run_repl(&mut prepared.session, &client, &mut console)?;
    Ok(())
}
