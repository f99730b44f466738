//! `browser-broker` binary entry point: parse CLI/env/config-file, then
//! hand off to the library's composition root.

use browser_broker::config::Cli;

fn main() {
    let cli = Cli::load();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(browser_broker::run(cli));
    if let Err(e) = result {
        eprintln!("fatal: {e:#}");
        std::process::exit(1);
    }
}
