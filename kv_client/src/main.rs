mod cli;
mod client;
mod repl;
use client::Client;
use repl::Repl;
use shared::logger::Logger;
use tracing::{trace, warn};

fn main() {
    let args = cli::parse_args();

    let logger = Logger::init(args.log_level(), args.log_dir(), args.log_file())
        .expect("Could not initialize logger");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Could not load tokio runtime")
        .block_on(async {
            let mut client = Client::new(args.cluster_id(), args.member_id());
            match args.server_addr() {
                Some(Ok(addr)) => {
                    if let Err(e) = client.connect(&addr).await {
                        warn!("Could not connect to {}: {}", addr, e);
                        println!("Could not connect to {}: {}", addr, e);
                    }
                }
                Some(Err(e)) => println!("{}", e),
                None => {}
            }

            let mut repl = Repl::new(logger, client);
            repl.run().await;
            trace!("Client stopped");
        })
}
