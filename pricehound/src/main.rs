use colored::Colorize;
use pricehound::commands::command_argument_builder;
use pricehound::handlers::{handle_crawl, handle_jobs, init_tracing};
use pricehound_core::print_banner;
use pricehound_scanner::CancellationToken;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    init_tracing();

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    // Ctrl-C stops new fetches; in-flight pages finish and partial results are kept
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}  Interrupted, winding down...", "[!]".yellow());
            interrupt.cancel();
        }
    });

    match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => handle_crawl(primary_command, quiet, cancel).await,
        Some(("jobs", primary_command)) => handle_jobs(primary_command, quiet, cancel).await,
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
