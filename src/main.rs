use clap::Parser;
use explaintree::app::{AppConfig, ExplainTreeApp};

fn main() {
    let _ = env_logger::builder().format_timestamp(None).try_init();

    let config = AppConfig::parse();
    if let Err(err) = ExplainTreeApp::run(&config) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
