//! Command-line front end: read an OBJ mesh, synthesize an N-direction
//! field and write it back out as an OBJ field file.

mod args;
mod run;

use args::{Options, USAGE};
use tracing_subscriber::EnvFilter;

fn main() {
    let options = match Options::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err:#}");
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    init_tracing(options.verbose);

    if let Err(err) = run::run(&options) {
        eprintln!("field_cli error: {err:#}");
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `--verbose` turns on info-level diagnostics.
fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
