use clap::Parser;

use rac::cli::args::Cli;
use rac::notify::set_notification_level;

fn main() {
    let cli = Cli::parse();
    set_notification_level(cli.verbose);

    if let Err(err) = rac::cli::run(cli.command) {
        eprintln!("ractool: {err}");
        std::process::exit(1);
    }
}
