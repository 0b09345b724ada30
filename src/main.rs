//! cgrid - Command-line tool for applying and replaying calibrated sampling grids

use std::process::ExitCode;

use combined_grids::cli;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    cli::run()
}
