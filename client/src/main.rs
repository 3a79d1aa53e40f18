use clap::Parser;
use client::{config, network::Client};
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the two-line server config file (address, then port)
    #[arg(short, long, default_value = "server.txt")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let server_addr = config::load_server_addr(&args.config)?;
    info!("Connecting to {}", server_addr);

    let mut client = Client::connect(&server_addr).await?;
    client.send_state().await?;
    client.run().await?;

    Ok(())
}
