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

use tokio::sync::mpsc;

mod channel;
mod client;
mod exchanger;
pub mod metrics;
pub mod proto;
mod protocol;
mod resource;

pub use channel::DiscoveryChannel;
pub use client::{AdsObserver, AdsWorker};
pub use exchanger::{Exchanger, VirtualHostListener};
pub use protocol::{GroupListener, RejectedConfig, UpdateListener, XdsProtocol};
pub use resource::*;

use self::proto::service::discovery::v3::DiscoveryRequest;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("gRPC error ({}): {}", .0.code(), .0.message())]
    GrpcStatus(#[from] tonic::Status),
    #[error("gRPC connection error to {0}: {1}")]
    Connection(String, #[source] tonic::transport::Error),
    /// Attempted to send on the request sink of a stream which has gone away
    #[error(transparent)]
    RequestFailure(#[from] Box<mpsc::error::SendError<DiscoveryRequest>>),
    #[error("discovery channel is closed")]
    ChannelClosed,
    #[error("timed out waiting for initial discovery data")]
    BootstrapTimeout,
}
