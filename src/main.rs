// src/main.rs

use modhost::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        // The stdin reader may still be parked in a blocking read; exit
        // instead of waiting for the runtime to wind it down.
        Ok(()) => std::process::exit(0),
        Err(err) => {
            eprintln!("modhost error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
