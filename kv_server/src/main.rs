mod cache;
mod cli;
mod error;
mod log_storage;
mod server;
mod service;
mod storage;
mod store;

use crate::{
    cache::{Cache, SupportedCache},
    server::Server,
    storage::{Storage, SupportedStorage},
    store::{Request, Store},
};
use anyhow::Result;
use shared::key::Key;
use shared::logger::Logger;
use shared::value::Value;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

fn main() {
    let args = Arc::new(cli::parse_args().validate());

    let _logger = Logger::init(args.log_level(), args.log_dir(), args.log_file())
        .expect("Could not initialize logger");

    info!("Starting with args: {:?}", args);

    let storage = SupportedStorage::new(args.storage(), args.data_dir(), args.log_options())
        .expect("Could not initialize storage");
    info!(
        "Opened {} storage in {} holding {} keys",
        args.storage(),
        args.data_dir().display(),
        storage.size()
    );

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Could not load tokio runtime")
        .block_on(async move {
            let signal_rx = setup_signal_handler().expect("Could not setup signal handler");

            let (shutdown_tx, _) = broadcast::channel::<()>(1);

            let (store_tx, store_rx) = mpsc::channel::<Request>(args.store_queue_size());

            let cache: SupportedCache<Key, Value> =
                SupportedCache::new(args.cache_eviction_strategy(), args.cache_size());
            debug!(
                "Caching up to {} values with {} eviction",
                cache.capacity(),
                args.cache_eviction_strategy()
            );
            let store_handle = tokio::task::spawn_blocking(move || {
                let mut store = Store::new(cache, storage, store_rx);
                store.run()
            });

            let mut server = Server::with_args(args, shutdown_tx, signal_rx, store_tx);
            let res = server.run().await;
            if let Err(e) = res {
                error!("Server error: {:#}", e);
            } else {
                debug!("Server stopped");
            }
            // the server dropped its sender, so the store drains and stops
            match store_handle.await {
                Ok(Ok(())) => debug!("Store stopped"),
                Ok(Err(e)) => error!("Store error: {:#}", e),
                Err(e) => error!("Store task failed: {}", e),
            }
        });

    info!("KV server with all of its tasks stopped");
}

#[derive(Clone, Debug)]
pub enum ProcessSignal {
    CtrlCPressed,
}

fn setup_signal_handler() -> Result<broadcast::Receiver<ProcessSignal>> {
    // happens when ctrl-c is pressed
    let (tx, rx) = broadcast::channel::<ProcessSignal>(8);
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let mut sigquit = signal::unix::signal(signal::unix::SignalKind::quit())?;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    debug!("Received SIGINT");
                    let _ = tx.send(ProcessSignal::CtrlCPressed);
                }
                _ = sigterm.recv() => {
                    debug!("Received SIGTERM");
                    let _ = tx.send(ProcessSignal::CtrlCPressed);
                }
                _ = sigquit.recv() => {
                    debug!("Received SIGQUIT");
                    let _ = tx.send(ProcessSignal::CtrlCPressed);
                }
            }
        }
    });
    Ok(rx)
}
