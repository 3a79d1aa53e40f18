use clap::Parser;
use log::info;
use server::dispatch::DispatchConfig;
use server::network::Server;
use std::io::Write;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Listen port; prompted on stdin when omitted
    #[arg(short, long)]
    port: Option<u16>,

    /// Dispatch queue capacity
    #[arg(long, default_value = "256")]
    queue_capacity: usize,

    /// Dispatch worker count
    #[arg(long, default_value = "4")]
    workers: usize,
}

/// Reads the listen port from a single console prompt.
fn prompt_port() -> Result<u16, Box<dyn std::error::Error>> {
    print!("Listen port: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().parse()?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let port = match args.port {
        Some(port) => port,
        None => prompt_port()?,
    };
    let addr = format!("{}:{}", args.host, port);

    let dispatch = DispatchConfig {
        capacity: args.queue_capacity,
        workers: args.workers,
    };

    // Transport initialization failure is fatal: report and exit 1.
    let mut server = match Server::bind(&addr, dispatch).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Press Ctrl+C for graceful shutdown");
    server.run().await?;

    Ok(())
}
