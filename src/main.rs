use clap::Parser;
use media_readability::cli;

fn main() {
    let args = cli::Args::parse();
    match cli::dispatch(args) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            // Logging is not initialized yet on this path.
            eprintln!("ERROR: {:#}", err);
            std::process::exit(cli::EXIT_ABORTED);
        }
    }
}
