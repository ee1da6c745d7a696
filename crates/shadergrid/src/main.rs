mod cli;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Check(target)) => run::check(&cli.run, target.shader),
        Some(Command::Compose(target)) => run::print_composed(&cli.run, target.shader),
        Some(Command::Where) => run::describe_paths(&cli.run),
        None => run::run(cli.run),
    }
}
