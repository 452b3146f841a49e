use std::path::Path;
use std::process;

use clap::{App, AppSettings, Arg, SubCommand};
use log::error;
use simplelog::*;

use tallyboard::config::ElectionConfig;
use tallyboard::election::service::ElectionService;

fn main() {
    let matches = App::new("tallyboard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Encrypted bulletin board and homomorphic tally")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .default_value("election.json")
                .help("Election config file"),
        )
        .arg(
            Arg::with_name("v")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("init")
                .about("Creates key and board if missing and exports the voting tokens"),
        )
        .subcommand(SubCommand::with_name("status").about("Prints election metadata and phase"))
        .subcommand(SubCommand::with_name("result").about("Prints the result, once available"))
        .subcommand(
            SubCommand::with_name("tokens")
                .about("Exports the unspent tokens")
                .arg(
                    Arg::with_name("OUTPUT")
                        .index(1)
                        .help("Output file, defaults to tokens_path from the config"),
                ),
        )
        .get_matches();

    let level = match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    setup_log(level);

    let config_path = matches.value_of("config").unwrap_or("election.json");
    let config = match ElectionConfig::load(Path::new(config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tallyboard: {}: {}", config_path, e);
            process::exit(1);
        }
    };
    let service = match ElectionService::open(&config) {
        Ok(service) => service,
        Err(e) => {
            error!("could not open election: {}", e);
            eprintln!("tallyboard: {}", e);
            process::exit(2);
        }
    };

    let outcome = match matches.subcommand() {
        ("init", Some(_)) => service
            .export_tokens(&config.tokens_path)
            .map(|n| println!("{} tokens written to {}", n, config.tokens_path.display())),
        ("status", Some(_)) => service.status().map(|status| print_json(&status)),
        ("result", Some(_)) => {
            print_json(&service.result_response());
            Ok(())
        }
        ("tokens", Some(sub)) => {
            let output = sub
                .value_of("OUTPUT")
                .map(Path::new)
                .unwrap_or_else(|| config.tokens_path.as_path());
            service
                .export_tokens(output)
                .map(|n| println!("{} tokens written to {}", n, output.display()))
        }
        _ => Ok(()),
    };

    if let Err(e) = outcome {
        eprintln!("tallyboard: {}", e);
        process::exit(3);
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("tallyboard: {}", e),
    }
}

fn setup_log(level: LevelFilter) {
    let result = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
    )]);
    if let Err(e) = result {
        eprintln!("tallyboard: could not set up logging: {}", e);
    }
}
