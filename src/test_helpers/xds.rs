// Copyright the mesh-discovery Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use prometheus_client::registry::Registry;
use prost_types::Any;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::{Response, Status, Streaming};
use tracing::{debug, info};

use super::test_config;
use crate::metrics::sub_registry;
use crate::xds;
use crate::xds::AdsObserver;
use crate::xds::proto::service::discovery::v3::aggregated_discovery_service_server::{
    AggregatedDiscoveryService, AggregatedDiscoveryServiceServer,
};
use crate::xds::proto::service::discovery::v3::{DiscoveryRequest, DiscoveryResponse};

/// In-process control plane. Each client stream surfaces as an
/// [`AdsConnection`] with raw request/response channels, so tests decide
/// exactly what goes on the wire and when.
pub struct AdsServer {
    address: String,
    connections: Mutex<mpsc::Receiver<AdsConnection>>,
}

pub struct AdsConnection {
    pub tx: mpsc::Sender<Result<DiscoveryResponse, Status>>,
    pub rx: mpsc::Receiver<DiscoveryRequest>,
}

impl AdsConnection {
    pub async fn next_request(&mut self, timeout: Duration) -> DiscoveryRequest {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .expect("timed out waiting for a request")
            .expect("client stream closed")
    }

    pub async fn push(&self, type_url: &str, version: &str, nonce: &str, resources: Vec<Any>) {
        self.tx
            .send(Ok(DiscoveryResponse {
                version_info: version.to_string(),
                resources,
                type_url: type_url.to_string(),
                nonce: nonce.to_string(),
            }))
            .await
            .expect("connection closed");
    }
}

impl AdsServer {
    /// Starts the server without a client; callers bring their own.
    pub async fn bind() -> AdsServer {
        let (connection_tx, connection_rx) = mpsc::channel(100);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let service = AdsService { tx: connection_tx };
        tokio::spawn(async move {
            tonic::transport::Server::builder()
                .add_service(AggregatedDiscoveryServiceServer::new(service))
                .serve_with_incoming(TcpListenerStream::new(listener))
                .await
                .unwrap();
        });
        AdsServer {
            address,
            connections: Mutex::new(connection_rx),
        }
    }

    /// Starts the server plus a connected observer with test config.
    pub async fn spawn() -> (AdsServer, AdsObserver, JoinHandle<Result<(), xds::Error>>) {
        let server = Self::bind().await;
        let mut registry = Registry::default();
        let metrics = xds::metrics::Metrics::new(sub_registry(&mut registry, "test"));
        let (block_tx, _block_rx) = watch::channel(());
        let (observer, worker) =
            AdsObserver::new(Arc::new(server.config()), metrics, block_tx);
        let handle = tokio::spawn(worker.run());
        (server, observer, handle)
    }

    pub fn config(&self) -> crate::config::Config {
        test_config(&self.address)
    }

    pub async fn next_connection(&self, timeout: Duration) -> AdsConnection {
        let mut connections = self.connections.lock().await;
        tokio::time::timeout(timeout, connections.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("server stopped")
    }
}

struct AdsService {
    tx: mpsc::Sender<AdsConnection>,
}

#[async_trait]
impl AggregatedDiscoveryService for AdsService {
    type StreamAggregatedResourcesStream =
        Pin<Box<dyn Stream<Item = Result<DiscoveryResponse, Status>> + Send>>;

    async fn stream_aggregated_resources(
        &self,
        request: tonic::Request<Streaming<DiscoveryRequest>>,
    ) -> Result<Response<Self::StreamAggregatedResourcesStream>, Status> {
        let mut in_stream = request.into_inner();
        let (resp_tx, mut resp_rx) = mpsc::channel(128);
        let (req_tx, req_rx) = mpsc::channel(128);
        let (tx, rx) = mpsc::channel(128);

        let conn = AdsConnection {
            rx: req_rx,
            tx: resp_tx,
        };
        self.tx.send(conn).await.unwrap();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    req = in_stream.next() => {
                        match req {
                            Some(Ok(req)) => {
                                debug!("ads_server: request {:?}", req);
                                if req_tx.send(req).await.is_err() {
                                    info!("ads_server: connection dropped by test");
                                    return;
                                }
                            }
                            Some(Err(e)) => {
                                info!("ads_server: stream over - {:?}", e);
                                return;
                            }
                            None => {
                                info!("ads_server: stream over");
                                return;
                            }
                        }
                    }
                    response = resp_rx.recv() => {
                        match response {
                            Some(response) => {
                                debug!("ads_server: response {:?}", response);
                                if tx.send(response).await.is_err() {
                                    info!("ads_server: send terminated");
                                    return;
                                }
                            }
                            None => {
                                info!("ads_server: response channel closed");
                                return;
                            }
                        }
                    }
                }
            }
        });

        let output_stream = ReceiverStream::new(rx);
        Ok(Response::new(
            Box::pin(output_stream) as Self::StreamAggregatedResourcesStream
        ))
    }
}
