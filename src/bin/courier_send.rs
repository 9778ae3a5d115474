use std::error::Error;

use clap::Parser;
use courier::Client;

/// Send one string request to a courier server and print the reply.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server host
    host: String,
    /// Server port
    port: u16,
    /// Request payload
    message: String,
    /// Fire and forget; do not wait for a reply
    #[arg(long)]
    no_reply: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let client: Client<String, String> = Client::new(cli.host, cli.port);

    if cli.no_reply {
        client.send_unreplied(cli.message)?;
    } else {
        match client.send_replied(cli.message)? {
            Some(reply) => println!("{reply}"),
            None => eprintln!("no reply"),
        }
    }

    Ok(())
}
