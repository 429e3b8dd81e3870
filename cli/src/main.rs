
mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{aggregate, assemble, sample, translate};

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Aggregate(args) => aggregate::run(&cli, args),
        Commands::Sample(args) => sample::run(&cli, args),
        Commands::Assemble(args) => assemble::run(&cli, args),
        Commands::Translate(args) => translate::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }
