//! nsbridge control CLI: inspect the host, exercise the address codec and
//! run the isolation stages

mod cli;
mod commands;
mod logging;
mod runner;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{check_requirements, list_seccomp, show_addr, show_cidr, show_match};
use console::style;
use runner::run_isolate;

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", style("error:").red().bold(), message);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    logging::init_logger(cli.verbose);

    match cli.command {
        Commands::Check => check_requirements(),
        Commands::Addr { text } => match show_addr(&text) {
            Ok(out) => println!("{}", out),
            Err(e) => fail(e),
        },
        Commands::Cidr { text } => match show_cidr(&text) {
            Ok(out) => println!("{}", out),
            Err(e) => fail(e),
        },
        Commands::Match { a, b } => match show_match(&a, &b) {
            Ok(true) => println!("{}", style("match").green()),
            Ok(false) => {
                println!("{}", style("no match").red());
                std::process::exit(2);
            }
            Err(e) => fail(e),
        },
        Commands::Seccomp { mode } => list_seccomp(mode),
        Commands::Isolate(args) => {
            if let Err(e) = run_isolate(&args) {
                fail(e);
            }
        }
    }
}
