pub mod crawl;
pub mod job;
pub mod report;

use colored::Colorize;

pub fn print_banner() {
    println!(
        "{}",
        r#"
                _           __                          __
    ____  _____(_)_______  / /_  ____  __  ______  ____/ /
   / __ \/ ___/ / ___/ _ \/ __ \/ __ \/ / / / __ \/ __  /
  / /_/ / /  / / /__/  __/ / / / /_/ / /_/ / / / / /_/ /
 / .___/_/  /_/\___/\___/_/ /_/\____/\__,_/_/ /_/\__,_/
/_/"#
            .bright_cyan()
    );
    println!(
        "  {} {}\n",
        "follows the links, sniffs out the prices".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
}
