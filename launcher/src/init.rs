use clap::Parser;

use crate::cli::ReplibenchCli;

pub fn init() -> ReplibenchCli {
    env_logger::init();

    ReplibenchCli::parse()
}
