use std::{error::Error, sync::mpsc};

use clap::Parser;
use courier::Server;

/// Echo server: replies to every string request with the same string.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Port to listen on; 0 picks a free port
    #[arg(short, long, default_value_t = 0)]
    port: u16,
    /// Worker pool size
    #[arg(short, long, default_value_t = 20)]
    workers: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();

    let mut server = Server::new(|line: String| Some(line), cli.port);
    server.set_worker_count(cli.workers);
    server.start()?;
    println!("echoing on port {}", server.port());

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })?;
    rx.recv()?;

    server.shutdown();
    Ok(())
}
