mod cli;
mod initializers;

use clap::Parser;
use tracing::error;

use crate::{cli::CLI, initializers::init_tracing};

fn main() {
    let CLI { opts } = CLI::parse();
    init_tracing(&opts);

    let report = match cli::run(&opts) {
        Ok(report) => report,
        Err(err) => {
            error!("{err:?}");
            std::process::exit(1);
        }
    };

    if opts.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                error!("Failed to serialize report: {err}");
                std::process::exit(1);
            }
        }
    }
}
