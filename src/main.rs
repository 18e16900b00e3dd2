// mapset: Set operations and comparison of alignment results.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
use clap::Parser;
use log::{error, info};

mod cli;

/// Initializes the logger with verbosity given in `log_max_level`.
fn init_log(log_max_level: usize) {
    let res = stderrlog::new()
    .module(module_path!())
    .quiet(false)
    .verbosity(log_max_level)
    .timestamp(stderrlog::Timestamp::Off)
    .init();
    if let Err(e) = res {
        eprintln!("could not initialize logging: {}", e);
    }
}

fn main() {
    let cli = cli::Cli::parse();
    init_log(if cli.verbose { 2 } else { 1 });

    let res = cli.to_config().and_then(|config| {
        info!("Master: {}", config.input_1.as_ref().map(|x| x.display().to_string()).unwrap_or("<stdin>".to_string()));
        if config.operation != mapset::Operation::DisplayCompact {
            info!("Slave: {}", config.input_2.as_ref().map(|x| x.display().to_string()).unwrap_or("<stdin>".to_string()));
        }
        mapset::run(&config)
    });

    match res {
        Ok(n) => info!("Done, {} records written", n),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        },
    }
}
