use clap::Parser;
use hexterm::config::{Cli, Config};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match Config::from_cli(&cli) {
        Ok(config) => match hexterm::supervisor::run(config) {
            Ok(()) => std::process::ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("hexterm: {e}");
                std::process::ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("hexterm: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

/// Installs a `tracing` subscriber. `RUST_LOG` wins if set; otherwise
/// `-v`/`-vv`/... steps through warn/info/debug/trace.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
