//! Relay server
//!
//! Owns the listener and wires the per-connection tasks, the registry, the
//! pipeline and the broadcaster together.

use std::future::{pending, Future};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::broadcaster::Broadcaster;
use crate::config::Config;
use crate::connection::{self, FailureReceiver, FailureSender};
use crate::error::RelayError;
use crate::pipeline::{self, PipelineReceiver, PipelineSender};
use crate::producer;
use crate::registry::Registry;
use crate::session::{self, Assignment};
use crate::types::ConnectionId;

/// Shared handles cloned into every connection task
#[derive(Clone)]
struct Shared {
    registry: Arc<Registry>,
    pipeline: PipelineSender,
    failures: FailureSender,
}

/// A bound relay, ready to run
pub struct Relay {
    listener: TcpListener,
    shared: Shared,
    messages: PipelineReceiver,
    failure_rx: FailureReceiver,
}

impl Relay {
    /// Bind the listening socket described by `config`
    pub async fn bind(config: &Config) -> Result<Self, RelayError> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RelayError::Listen { addr, source })?;

        let (pipeline, messages) = pipeline::channel(config.pipeline_capacity);
        let (failures, failure_rx) = mpsc::unbounded_channel();

        Ok(Self {
            listener,
            shared: Shared {
                registry: Arc::new(Registry::new()),
                pipeline,
                failures,
            },
            messages,
            failure_rx,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Registry shared with every connection
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.shared.registry)
    }

    /// Accept connections until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Relay {
            listener,
            shared,
            messages,
            failure_rx,
        } = self;

        let broadcaster = Broadcaster::new(Arc::clone(&shared.registry), messages, failure_rx);
        tokio::spawn(broadcaster.run());
        info!("relay running");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("relay shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("New connection from {}", addr);
                        let shared = shared.clone();
                        tokio::spawn(handle_connection(stream, addr, shared));
                    }
                    Err(e) => {
                        error!("unable to accept connection: {}", e);
                    }
                },
            }
        }
    }

    /// Accept connections until Ctrl-C
    pub async fn run(self) {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
                pending::<()>().await;
            }
        })
        .await
    }
}

/// Drive one connection from classification to close
async fn handle_connection(stream: TcpStream, addr: SocketAddr, shared: Shared) {
    let peer = addr.to_string();
    let id = ConnectionId::new();
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    let assignment =
        match session::classify(&mut reader, &mut write, id, &peer, &shared.registry).await {
            Ok(assignment) => assignment,
            Err(e) => {
                connection::handle_connection_error(&peer, &e);
                shared.registry.remove(id).await;
                return;
            }
        };

    let result = match assignment {
        Assignment::Producer => {
            // The write half stays open for as long as the producer reads.
            let result = producer::run(&mut reader, &peer, "", &shared.pipeline, pending()).await;
            drop(write);
            result
        }
        Assignment::Consumer(queue) => {
            let mut closed =
                connection::spawn_writer(id, peer.clone(), write, queue, shared.failures.clone());
            connection::discard_until_closed(&mut reader, &mut closed).await
        }
        Assignment::Chat { name, queue } => {
            let closed =
                connection::spawn_writer(id, peer.clone(), write, queue, shared.failures.clone());
            producer::run(&mut reader, &peer, &name, &shared.pipeline, closed).await
        }
    };

    if let Err(e) = result {
        connection::handle_connection_error(&peer, &e);
    }
    shared.registry.remove(id).await;
    debug!(peer = %peer, connection = %id, "connection task ended");
}
