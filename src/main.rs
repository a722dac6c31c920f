#[macro_use]
mod errors;
#[macro_use]
mod console;
mod command;
mod repl;
mod session;
mod storage;
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "leafdb",
    version = VERSION,
    about = "Tiny single-table B+Tree database."
)]
struct Cli {
    /// Database file. Created if it does not exist.
    #[arg(env = "LEAFDB_FILE")]
    filename: Option<PathBuf>,

    /// Log filter, e.g. `info` or `leafdb=trace`. Logs go to stderr.
    #[arg(long, env = "LEAFDB_LOG", default_value = "warn")]
    log: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let Some(filename) = cli.filename else {
        println!("Must supply a database filename.");
        return ExitCode::FAILURE;
    };

    let mut session = match session::Session::open(&filename) {
        Ok(s) => s,
        Err(e) => {
            println!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    match repl::run(
        &mut session,
        stdin.lock(),
        &mut stdout,
        console::stdout_is_tty(),
    ) {
        Ok(repl::Exit::Requested) => ExitCode::SUCCESS,
        Ok(repl::Exit::EndOfInput) => {
            println!("Error reading input");
            ExitCode::FAILURE
        }
        Err(e) => {
            println!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
