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

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::Stream;
use tonic::codec::Streaming;
use tonic::transport::Endpoint;
use tracing::debug;

use super::proto::service::discovery::v3::aggregated_discovery_service_client::AggregatedDiscoveryServiceClient;
use super::proto::service::discovery::v3::{DiscoveryRequest, DiscoveryResponse};
use super::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the transport connection to the control plane and opens the duplex
/// discovery stream on it.
///
/// All setup failures are returned from `open` and treated as recoverable by
/// the caller; once `close` is called every subsequent `open` fails fast with
/// `Error::ChannelClosed` and no reconnect is possible.
pub struct DiscoveryChannel {
    address: String,
    max_message_size: usize,
    closed: AtomicBool,
}

impl DiscoveryChannel {
    pub fn new(address: String, max_message_size: usize) -> Self {
        Self {
            address,
            max_message_size,
            closed: AtomicBool::new(false),
        }
    }

    /// Establishes a connection and starts the bidirectional stream. The
    /// returned stream yields responses; `outbound` supplies requests.
    pub async fn open<S>(&self, outbound: S) -> Result<Streaming<DiscoveryResponse>, Error>
    where
        S: Stream<Item = DiscoveryRequest> + Send + 'static,
    {
        if self.is_closed() {
            return Err(Error::ChannelClosed);
        }
        let endpoint = Endpoint::from_shared(self.address.clone())
            .map_err(|e| Error::Connection(self.address.clone(), e))?
            .connect_timeout(CONNECT_TIMEOUT);
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| Error::Connection(self.address.clone(), e))?;
        debug!(address = self.address, "connection established");

        // close() may have raced the connect; drop the stream before use.
        if self.is_closed() {
            return Err(Error::ChannelClosed);
        }
        let response = AggregatedDiscoveryServiceClient::new(channel)
            .max_decoding_message_size(self.max_message_size)
            .stream_aggregated_resources(outbound)
            .await?;
        Ok(response.into_inner())
    }

    /// Releases the connection. The active stream (if any) is torn down when
    /// its halves are dropped by the caller; further opens fail fast.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn open_after_close_fails_fast() {
        let channel = DiscoveryChannel::new("http://127.0.0.1:1".to_string(), 4 * 1024 * 1024);
        channel.close();
        let res = channel.open(stream::empty()).await;
        assert!(matches!(res, Err(Error::ChannelClosed)));
    }

    #[tokio::test]
    async fn connection_refused_surfaces_as_connection_error() {
        // Port 1 is essentially guaranteed to refuse on loopback.
        let channel = DiscoveryChannel::new("http://127.0.0.1:1".to_string(), 4 * 1024 * 1024);
        let res = channel.open(stream::empty()).await;
        assert!(matches!(res, Err(Error::Connection(_, _))));
    }
}
