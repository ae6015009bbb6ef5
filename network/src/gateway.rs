// Copyright (C) 2023-2025 Fleetgate Systems Inc.
// This file is part of the fleetgate library.

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
// http://www.apache.org/licenses/LICENSE-2.0

// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    net::SocketAddr,
    ops::Deref,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use fleetgate_metrics::connections;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tokio::{net::TcpListener, sync::Semaphore, task::JoinHandle};

use crate::{config::Config, connection::Connection, dedup::DedupIndex, errors::NetworkError, publisher::Publisher};

/// The internal state of a gateway.
pub struct InnerGateway {
    /// The pre-configured parameters of this gateway.
    config: Config,
    /// The local address the acceptor is bound to.
    local_address: OnceCell<SocketAddr>,
    /// The duplicate-suppression index shared by all handlers.
    dedup: DedupIndex,
    /// The publisher through which classified messages leave the gateway.
    publisher: Arc<dyn Publisher>,
    /// The admission budget; a permit is held for the lifetime of each handler.
    admission: Arc<Semaphore>,
    /// The acceptor task.
    acceptor: Mutex<Option<JoinHandle<()>>>,
    /// The in-flight connection handler tasks.
    handlers: Mutex<Vec<JoinHandle<()>>>,
    /// An indicator of whether the gateway is shutting down.
    shutting_down: AtomicBool,
}

/// A core data structure for operating the ingestion stack of this gateway.
#[derive(Clone)]
pub struct Gateway(Arc<InnerGateway>);

impl Deref for Gateway {
    type Target = Arc<InnerGateway>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Gateway {
    /// Creates a new instance of `Gateway`.
    pub fn new(config: Config, publisher: Arc<dyn Publisher>) -> Result<Self, NetworkError> {
        config.validate()?;

        let admission = Arc::new(Semaphore::new(config.max_connections as usize));
        let dedup = DedupIndex::new(config.dedup_entries_per_device);

        Ok(Self(Arc::new(InnerGateway {
            config,
            local_address: Default::default(),
            dedup,
            publisher,
            admission,
            acceptor: Default::default(),
            handlers: Default::default(),
            shutting_down: Default::default(),
        })))
    }

    /// Returns the pre-configured parameters of this gateway.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the duplicate-suppression index of this gateway.
    #[inline]
    pub fn dedup(&self) -> &DedupIndex {
        &self.dedup
    }

    /// Returns the publisher of this gateway.
    #[inline]
    pub fn publisher(&self) -> &Arc<dyn Publisher> {
        &self.publisher
    }

    /// Returns the local address of the acceptor, once started.
    pub fn local_address(&self) -> Option<SocketAddr> {
        self.local_address.get().copied()
    }

    /// Returns `true` if the gateway is shutting down.
    #[inline]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Returns `true` while the acceptor is running; this is the health signal.
    pub fn is_running(&self) -> bool {
        !self.is_shutting_down()
            && self.acceptor.lock().as_ref().map_or(false, |acceptor| !acceptor.is_finished())
    }

    /// The number of admission permits currently unclaimed.
    pub fn available_permits(&self) -> usize {
        self.admission.available_permits()
    }

    /// The number of connection handlers still running.
    pub fn active_handlers(&self) -> usize {
        self.handlers.lock().iter().filter(|handler| !handler.is_finished()).count()
    }

    /// Binds the listener and starts the acceptor.
    ///
    /// A bind failure is the one error that propagates to process exit.
    pub async fn start(&self) -> Result<SocketAddr, NetworkError> {
        let listener = TcpListener::bind(self.config.listen_address).await?;
        let local_address = listener.local_addr()?;
        self.local_address.set(local_address).expect("the gateway was started twice");
        info!("Listening for devices at {}", local_address);

        let gateway = self.clone();
        *self.acceptor.lock() = Some(tokio::spawn(async move { gateway.listen(listener).await }));

        Ok(local_address)
    }

    /// The accept loop: admit, hand off, reap.
    async fn listen(&self, listener: TcpListener) {
        while !self.is_shutting_down() {
            match listener.accept().await {
                Ok((stream, remote_address)) => {
                    // Claim an admission slot before spawning anything; accepts
                    // never queue behind admission.
                    match self.admission.clone().try_acquire_owned() {
                        Ok(permit) => {
                            debug!("Accepted a connection from {}", remote_address);
                            metrics::increment_counter!(connections::ACCEPTED);

                            let handler = Connection::receive(self.clone(), stream, remote_address, permit);
                            let mut handlers = self.handlers.lock();
                            handlers.retain(|handler| !handler.is_finished());
                            handlers.push(handler);
                        }
                        Err(_) => {
                            warn!("Rejecting a connection from {}: the gateway is at capacity", remote_address);
                            metrics::increment_counter!(connections::REJECTED);
                            // Dropping the stream closes the socket immediately.
                            drop(stream);
                        }
                    }
                }
                Err(e) => error!("Failed to accept a connection: {}", e),
            }
        }
    }

    /// Shuts the gateway down: stops accepting, cancels the handlers and waits
    /// for them, then drains and releases the publisher.
    pub async fn shut_down(&self) {
        debug!("The gateway is shutting down...");
        self.shutting_down.store(true, Ordering::SeqCst);

        let acceptor = self.acceptor.lock().take();
        if let Some(acceptor) = acceptor {
            acceptor.abort();
            let _ = acceptor.await;
        }

        let handlers: Vec<_> = self.handlers.lock().drain(..).collect();
        for handler in handlers {
            handler.abort();
            // A cancelled handler resolves to a join error; its permit and
            // socket are released either way.
            let _ = handler.await;
        }

        let deadline = self.config.publisher.timeout();
        if let Err(e) = self.publisher.flush(deadline).await {
            warn!("Failed to drain the publisher during shutdown: {}", e);
        }
        self.publisher.close().await;
        info!("The gateway has shut down");
    }
}
