use clap::Parser;
use stencil::{logging, run, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref())?;

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    run(&cli, stdin.lock(), stdout.lock())
}
