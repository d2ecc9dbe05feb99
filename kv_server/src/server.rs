use crate::cli::Args;
use crate::service::StoreService;
use crate::store::Request;
use crate::ProcessSignal;
use anyhow::{Context, Result};
use protocol::meta_store::store_server::StoreServer;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::{broadcast, mpsc};
use tonic::transport::Server as TonicServer;
use tracing::{debug, info, instrument, trace};

pub struct Server {
    args: Arc<Args>,
    local_addr: SocketAddr,
    shutdown_tx: Option<broadcast::Sender<()>>,
    signal_rx: broadcast::Receiver<ProcessSignal>,
    store_tx: Option<mpsc::Sender<Request>>,
}

impl Server {
    pub fn with_args(
        args: Arc<Args>,
        shutdown_tx: broadcast::Sender<()>,
        signal_rx: broadcast::Receiver<ProcessSignal>,
        store_tx: mpsc::Sender<Request>,
    ) -> Self {
        Self {
            local_addr: args.socket_addr(),
            args,
            shutdown_tx: Some(shutdown_tx),
            signal_rx,
            store_tx: Some(store_tx),
        }
    }
    #[instrument(
        name = "Server::run",
        skip(self),
        fields(
            listening_addr = %self.local_addr,
            cluster_id = self.args.cluster_id()
        ),
    )]
    pub async fn run(&mut self) -> Result<()> {
        let local_addr = self.local_addr;
        let mut shutdown_rx = self
            .shutdown_tx
            .as_ref()
            .context("Server has already been shut down")?
            .subscribe();
        // once the grpc server is gone nobody can reach the store anymore and it stops
        let store_tx = self
            .store_tx
            .take()
            .context("Server has already been started")?;
        let service = StoreService::new(self.args.cluster_id(), store_tx);

        let grpc_server = TonicServer::builder()
            .timeout(self.args.request_timeout())
            .concurrency_limit_per_connection(self.args.concurrency_limit())
            .add_service(StoreServer::new(service))
            .serve_with_shutdown(local_addr, async move {
                let _ = shutdown_rx.recv().await;
                info!("Shutting down store grpc server");
            });
        let mut grpc_handle = tokio::spawn(grpc_server);
        info!("Serving store requests on {}", local_addr);

        loop {
            tokio::select! {
                res = &mut grpc_handle => {
                    return res
                        .context("Store grpc server panicked")?
                        .with_context(|| format!("Serving on {}", local_addr));
                },
                signal = self.signal_rx.recv() => {
                    match signal {
                        Ok(signal) => self.handle_process_signal(signal),
                        Err(e) => {
                            info!("Error receiving signal: {}", e);
                        }
                    }
                },
            }
        }
    }
    fn handle_process_signal(&mut self, command: ProcessSignal) {
        match command {
            ProcessSignal::CtrlCPressed => {
                debug!("Server received ctrl-c signal, initiating shutdown");
                match self.shutdown_tx.take() {
                    None => {
                        trace!("Shutdown already in progress");
                    }
                    Some(shutdown_tx) => {
                        // finally, blow the horn to inform all tasks to shutdown
                        if shutdown_tx.send(()).is_err() {
                            debug!("Nobody is listening for the shutdown anymore");
                        }
                    }
                }
            }
        }
    }
}
