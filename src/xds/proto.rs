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

//! Hand-maintained protobuf definitions for the discovery protocol.
//!
//! These mirror the upstream envoy/google protos, restricted to the fields
//! this client reads. Field numbers match upstream exactly, so messages
//! produced by a real control plane decode correctly (unknown fields are
//! skipped by prost). Keeping these in-tree avoids a protoc dependency for
//! what is a small and very stable message surface.

pub mod rpc {
    /// `google.rpc.Status`, used as the NACK error detail.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Status {
        #[prost(int32, tag = "1")]
        pub code: i32,
        #[prost(string, tag = "2")]
        pub message: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "3")]
        pub details: ::prost::alloc::vec::Vec<::prost_types::Any>,
    }
}

pub mod config {
    pub mod core {
        pub mod v3 {
            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct Locality {
                #[prost(string, tag = "1")]
                pub region: ::prost::alloc::string::String,
                #[prost(string, tag = "2")]
                pub zone: ::prost::alloc::string::String,
                #[prost(string, tag = "3")]
                pub sub_zone: ::prost::alloc::string::String,
            }

            /// Client identity attached to every discovery request.
            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct Node {
                #[prost(string, tag = "1")]
                pub id: ::prost::alloc::string::String,
                #[prost(string, tag = "2")]
                pub cluster: ::prost::alloc::string::String,
                #[prost(message, optional, tag = "3")]
                pub metadata: ::core::option::Option<::prost_types::Struct>,
                #[prost(string, tag = "6")]
                pub user_agent_name: ::prost::alloc::string::String,
                #[prost(message, optional, tag = "9")]
                pub locality: ::core::option::Option<Locality>,
            }

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct Address {
                #[prost(oneof = "address::Address", tags = "1")]
                pub address: ::core::option::Option<address::Address>,
            }
            pub mod address {
                #[derive(Clone, PartialEq, ::prost::Oneof)]
                pub enum Address {
                    #[prost(message, tag = "1")]
                    SocketAddress(super::SocketAddress),
                }
            }

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct SocketAddress {
                #[prost(string, tag = "2")]
                pub address: ::prost::alloc::string::String,
                #[prost(oneof = "socket_address::PortSpecifier", tags = "3, 4")]
                pub port_specifier: ::core::option::Option<socket_address::PortSpecifier>,
            }
            pub mod socket_address {
                #[derive(Clone, PartialEq, ::prost::Oneof)]
                pub enum PortSpecifier {
                    #[prost(uint32, tag = "3")]
                    PortValue(u32),
                    #[prost(string, tag = "4")]
                    NamedPort(::prost::alloc::string::String),
                }
            }

            #[derive(
                Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
            )]
            #[repr(i32)]
            pub enum HealthStatus {
                Unknown = 0,
                Healthy = 1,
                Unhealthy = 2,
                Draining = 3,
                Timeout = 4,
                Degraded = 5,
            }
        }
    }

    pub mod listener {
        pub mod v3 {
            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct Listener {
                #[prost(string, tag = "1")]
                pub name: ::prost::alloc::string::String,
                #[prost(message, repeated, tag = "3")]
                pub filter_chains: ::prost::alloc::vec::Vec<FilterChain>,
                #[prost(message, optional, tag = "19")]
                pub api_listener: ::core::option::Option<ApiListener>,
            }

            /// Wrapper around the HTTP connection manager for API listeners.
            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct ApiListener {
                #[prost(message, optional, tag = "1")]
                pub api_listener: ::core::option::Option<::prost_types::Any>,
            }

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct FilterChain {
                #[prost(message, repeated, tag = "3")]
                pub filters: ::prost::alloc::vec::Vec<Filter>,
            }

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct Filter {
                #[prost(string, tag = "1")]
                pub name: ::prost::alloc::string::String,
                #[prost(oneof = "filter::ConfigType", tags = "4")]
                pub config_type: ::core::option::Option<filter::ConfigType>,
            }
            pub mod filter {
                #[derive(Clone, PartialEq, ::prost::Oneof)]
                pub enum ConfigType {
                    #[prost(message, tag = "4")]
                    TypedConfig(::prost_types::Any),
                }
            }
        }
    }

    pub mod route {
        pub mod v3 {
            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct RouteConfiguration {
                #[prost(string, tag = "1")]
                pub name: ::prost::alloc::string::String,
                #[prost(message, repeated, tag = "2")]
                pub virtual_hosts: ::prost::alloc::vec::Vec<VirtualHost>,
            }

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct VirtualHost {
                #[prost(string, tag = "1")]
                pub name: ::prost::alloc::string::String,
                #[prost(string, repeated, tag = "2")]
                pub domains: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
                #[prost(message, repeated, tag = "3")]
                pub routes: ::prost::alloc::vec::Vec<Route>,
            }

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct Route {
                #[prost(message, optional, tag = "1")]
                pub r#match: ::core::option::Option<RouteMatch>,
                #[prost(string, tag = "14")]
                pub name: ::prost::alloc::string::String,
                #[prost(oneof = "route::Action", tags = "2")]
                pub action: ::core::option::Option<route::Action>,
            }
            pub mod route {
                #[derive(Clone, PartialEq, ::prost::Oneof)]
                pub enum Action {
                    #[prost(message, tag = "2")]
                    Route(super::RouteAction),
                }
            }

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct RouteMatch {
                #[prost(oneof = "route_match::PathSpecifier", tags = "1, 2")]
                pub path_specifier: ::core::option::Option<route_match::PathSpecifier>,
            }
            pub mod route_match {
                #[derive(Clone, PartialEq, ::prost::Oneof)]
                pub enum PathSpecifier {
                    #[prost(string, tag = "1")]
                    Prefix(::prost::alloc::string::String),
                    #[prost(string, tag = "2")]
                    Path(::prost::alloc::string::String),
                }
            }

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct RouteAction {
                #[prost(oneof = "route_action::ClusterSpecifier", tags = "1, 3")]
                pub cluster_specifier: ::core::option::Option<route_action::ClusterSpecifier>,
            }
            pub mod route_action {
                #[derive(Clone, PartialEq, ::prost::Oneof)]
                pub enum ClusterSpecifier {
                    #[prost(string, tag = "1")]
                    Cluster(::prost::alloc::string::String),
                    #[prost(message, tag = "3")]
                    WeightedClusters(super::WeightedCluster),
                }
            }

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct WeightedCluster {
                #[prost(message, repeated, tag = "1")]
                pub clusters: ::prost::alloc::vec::Vec<weighted_cluster::ClusterWeight>,
            }
            pub mod weighted_cluster {
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct ClusterWeight {
                    #[prost(string, tag = "1")]
                    pub name: ::prost::alloc::string::String,
                    #[prost(message, optional, tag = "2")]
                    pub weight: ::core::option::Option<u32>,
                }
            }
        }
    }

    pub mod cluster {
        pub mod v3 {
            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct Cluster {
                #[prost(string, tag = "1")]
                pub name: ::prost::alloc::string::String,
                #[prost(message, optional, tag = "3")]
                pub eds_cluster_config: ::core::option::Option<cluster::EdsClusterConfig>,
                #[prost(enumeration = "cluster::LbPolicy", tag = "6")]
                pub lb_policy: i32,
                #[prost(oneof = "cluster::ClusterDiscoveryType", tags = "2")]
                pub cluster_discovery_type:
                    ::core::option::Option<cluster::ClusterDiscoveryType>,
            }
            pub mod cluster {
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct EdsClusterConfig {
                    #[prost(string, tag = "2")]
                    pub service_name: ::prost::alloc::string::String,
                }

                #[derive(
                    Clone,
                    Copy,
                    Debug,
                    PartialEq,
                    Eq,
                    Hash,
                    PartialOrd,
                    Ord,
                    ::prost::Enumeration,
                )]
                #[repr(i32)]
                pub enum DiscoveryType {
                    Static = 0,
                    StrictDns = 1,
                    LogicalDns = 2,
                    Eds = 3,
                    OriginalDst = 4,
                }

                #[derive(
                    Clone,
                    Copy,
                    Debug,
                    PartialEq,
                    Eq,
                    Hash,
                    PartialOrd,
                    Ord,
                    ::prost::Enumeration,
                )]
                #[repr(i32)]
                pub enum LbPolicy {
                    RoundRobin = 0,
                    LeastRequest = 1,
                    RingHash = 2,
                    Random = 3,
                    Maglev = 5,
                }

                #[derive(Clone, PartialEq, ::prost::Oneof)]
                pub enum ClusterDiscoveryType {
                    #[prost(enumeration = "DiscoveryType", tag = "2")]
                    Type(i32),
                }
            }
        }
    }

    pub mod endpoint {
        pub mod v3 {
            use super::super::core::v3 as core_v3;

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct ClusterLoadAssignment {
                #[prost(string, tag = "1")]
                pub cluster_name: ::prost::alloc::string::String,
                #[prost(message, repeated, tag = "2")]
                pub endpoints: ::prost::alloc::vec::Vec<LocalityLbEndpoints>,
            }

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct LocalityLbEndpoints {
                #[prost(message, optional, tag = "1")]
                pub locality: ::core::option::Option<core_v3::Locality>,
                #[prost(message, repeated, tag = "2")]
                pub lb_endpoints: ::prost::alloc::vec::Vec<LbEndpoint>,
                #[prost(message, optional, tag = "3")]
                pub load_balancing_weight: ::core::option::Option<u32>,
                #[prost(uint32, tag = "5")]
                pub priority: u32,
            }

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct LbEndpoint {
                #[prost(enumeration = "core_v3::HealthStatus", tag = "2")]
                pub health_status: i32,
                #[prost(message, optional, tag = "4")]
                pub load_balancing_weight: ::core::option::Option<u32>,
                #[prost(oneof = "lb_endpoint::HostIdentifier", tags = "1")]
                pub host_identifier: ::core::option::Option<lb_endpoint::HostIdentifier>,
            }
            pub mod lb_endpoint {
                #[derive(Clone, PartialEq, ::prost::Oneof)]
                pub enum HostIdentifier {
                    #[prost(message, tag = "1")]
                    Endpoint(super::Endpoint),
                }
            }

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct Endpoint {
                #[prost(message, optional, tag = "1")]
                pub address: ::core::option::Option<core_v3::Address>,
            }
        }
    }

    pub mod hcm {
        /// `envoy.extensions.filters.network.http_connection_manager.v3`,
        /// reduced to route discovery fields.
        pub mod v3 {
            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct HttpConnectionManager {
                #[prost(string, tag = "2")]
                pub stat_prefix: ::prost::alloc::string::String,
                #[prost(
                    oneof = "http_connection_manager::RouteSpecifier",
                    tags = "3, 4"
                )]
                pub route_specifier:
                    ::core::option::Option<http_connection_manager::RouteSpecifier>,
            }
            pub mod http_connection_manager {
                #[derive(Clone, PartialEq, ::prost::Oneof)]
                pub enum RouteSpecifier {
                    #[prost(message, tag = "3")]
                    Rds(super::Rds),
                    #[prost(message, tag = "4")]
                    RouteConfig(super::super::super::route::v3::RouteConfiguration),
                }
            }

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct Rds {
                #[prost(string, tag = "2")]
                pub route_config_name: ::prost::alloc::string::String,
            }
        }
    }
}

pub mod service {
    pub mod discovery {
        pub mod v3 {
            use crate::xds::proto::config::core::v3::Node;

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct DiscoveryRequest {
                #[prost(string, tag = "1")]
                pub version_info: ::prost::alloc::string::String,
                #[prost(message, optional, tag = "2")]
                pub node: ::core::option::Option<Node>,
                #[prost(string, repeated, tag = "3")]
                pub resource_names: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
                #[prost(string, tag = "4")]
                pub type_url: ::prost::alloc::string::String,
                #[prost(string, tag = "5")]
                pub response_nonce: ::prost::alloc::string::String,
                #[prost(message, optional, tag = "6")]
                pub error_detail: ::core::option::Option<crate::xds::proto::rpc::Status>,
            }

            #[derive(Clone, PartialEq, ::prost::Message)]
            pub struct DiscoveryResponse {
                #[prost(string, tag = "1")]
                pub version_info: ::prost::alloc::string::String,
                #[prost(message, repeated, tag = "2")]
                pub resources: ::prost::alloc::vec::Vec<::prost_types::Any>,
                #[prost(string, tag = "4")]
                pub type_url: ::prost::alloc::string::String,
                #[prost(string, tag = "5")]
                pub nonce: ::prost::alloc::string::String,
            }

            /// Client stub for the aggregated discovery service, written in
            /// the tonic generated-code style.
            pub mod aggregated_discovery_service_client {
                #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
                use tonic::codegen::http::Uri;
                use tonic::codegen::*;
                #[derive(Debug, Clone)]
                pub struct AggregatedDiscoveryServiceClient<T> {
                    inner: tonic::client::Grpc<T>,
                }
                impl<T> AggregatedDiscoveryServiceClient<T>
                where
                    T: tonic::client::GrpcService<tonic::body::BoxBody>,
                    T::Error: Into<StdError>,
                    T::ResponseBody: Body<Data = Bytes> + Send + 'static,
                    <T::ResponseBody as Body>::Error: Into<StdError> + Send,
                {
                    pub fn new(inner: T) -> Self {
                        let inner = tonic::client::Grpc::new(inner);
                        Self { inner }
                    }
                    pub fn with_origin(inner: T, origin: Uri) -> Self {
                        let inner = tonic::client::Grpc::with_origin(inner, origin);
                        Self { inner }
                    }
                    /// Limits the maximum size of a decoded message.
                    ///
                    /// Default: `4MB`
                    #[must_use]
                    pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
                        self.inner = self.inner.max_decoding_message_size(limit);
                        self
                    }
                    pub async fn stream_aggregated_resources(
                        &mut self,
                        request: impl tonic::IntoStreamingRequest<
                            Message = super::DiscoveryRequest,
                        >,
                    ) -> std::result::Result<
                        tonic::Response<tonic::codec::Streaming<super::DiscoveryResponse>>,
                        tonic::Status,
                    > {
                        self.inner.ready().await.map_err(|e| {
                            tonic::Status::new(
                                tonic::Code::Unknown,
                                format!("Service was not ready: {}", e.into()),
                            )
                        })?;
                        let codec = tonic::codec::ProstCodec::default();
                        let path = http::uri::PathAndQuery::from_static(
                            "/envoy.service.discovery.v3.AggregatedDiscoveryService/StreamAggregatedResources",
                        );
                        let mut req = request.into_streaming_request();
                        req.extensions_mut().insert(GrpcMethod::new(
                            "envoy.service.discovery.v3.AggregatedDiscoveryService",
                            "StreamAggregatedResources",
                        ));
                        self.inner.streaming(req, path, codec).await
                    }
                }
            }

            /// Server stub, used by the in-process fake control plane in tests.
            pub mod aggregated_discovery_service_server {
                #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
                use tonic::codegen::*;
                /// Generated trait containing gRPC methods that should be
                /// implemented for use with AggregatedDiscoveryServiceServer.
                #[async_trait]
                pub trait AggregatedDiscoveryService: Send + Sync + 'static {
                    /// Server streaming response type for the StreamAggregatedResources method.
                    type StreamAggregatedResourcesStream: tonic::codegen::tokio_stream::Stream<
                            Item = std::result::Result<super::DiscoveryResponse, tonic::Status>,
                        > + Send
                        + 'static;
                    async fn stream_aggregated_resources(
                        &self,
                        request: tonic::Request<tonic::Streaming<super::DiscoveryRequest>>,
                    ) -> std::result::Result<
                        tonic::Response<Self::StreamAggregatedResourcesStream>,
                        tonic::Status,
                    >;
                }
                #[derive(Debug)]
                pub struct AggregatedDiscoveryServiceServer<T: AggregatedDiscoveryService> {
                    inner: _Inner<T>,
                    accept_compression_encodings: EnabledCompressionEncodings,
                    send_compression_encodings: EnabledCompressionEncodings,
                    max_decoding_message_size: Option<usize>,
                    max_encoding_message_size: Option<usize>,
                }
                struct _Inner<T>(Arc<T>);
                impl<T: AggregatedDiscoveryService> AggregatedDiscoveryServiceServer<T> {
                    pub fn new(inner: T) -> Self {
                        Self::from_arc(Arc::new(inner))
                    }
                    pub fn from_arc(inner: Arc<T>) -> Self {
                        let inner = _Inner(inner);
                        Self {
                            inner,
                            accept_compression_encodings: Default::default(),
                            send_compression_encodings: Default::default(),
                            max_decoding_message_size: None,
                            max_encoding_message_size: None,
                        }
                    }
                }
                impl<T, B> tonic::codegen::Service<http::Request<B>>
                    for AggregatedDiscoveryServiceServer<T>
                where
                    T: AggregatedDiscoveryService,
                    B: Body + Send + 'static,
                    B::Error: Into<StdError> + Send + 'static,
                {
                    type Response = http::Response<tonic::body::BoxBody>;
                    type Error = std::convert::Infallible;
                    type Future = BoxFuture<Self::Response, Self::Error>;
                    fn poll_ready(
                        &mut self,
                        _cx: &mut Context<'_>,
                    ) -> Poll<std::result::Result<(), Self::Error>> {
                        Poll::Ready(Ok(()))
                    }
                    fn call(&mut self, req: http::Request<B>) -> Self::Future {
                        let inner = self.inner.clone();
                        match req.uri().path() {
                            "/envoy.service.discovery.v3.AggregatedDiscoveryService/StreamAggregatedResources" => {
                                #[allow(non_camel_case_types)]
                                struct StreamAggregatedResourcesSvc<T: AggregatedDiscoveryService>(
                                    pub Arc<T>,
                                );
                                impl<T: AggregatedDiscoveryService>
                                    tonic::server::StreamingService<super::DiscoveryRequest>
                                    for StreamAggregatedResourcesSvc<T>
                                {
                                    type Response = super::DiscoveryResponse;
                                    type ResponseStream = T::StreamAggregatedResourcesStream;
                                    type Future = BoxFuture<
                                        tonic::Response<Self::ResponseStream>,
                                        tonic::Status,
                                    >;
                                    fn call(
                                        &mut self,
                                        request: tonic::Request<
                                            tonic::Streaming<super::DiscoveryRequest>,
                                        >,
                                    ) -> Self::Future {
                                        let inner = Arc::clone(&self.0);
                                        let fut = async move {
                                            <T as AggregatedDiscoveryService>::stream_aggregated_resources(
                                                &inner, request,
                                            )
                                            .await
                                        };
                                        Box::pin(fut)
                                    }
                                }
                                let accept_compression_encodings = self.accept_compression_encodings;
                                let send_compression_encodings = self.send_compression_encodings;
                                let max_decoding_message_size = self.max_decoding_message_size;
                                let max_encoding_message_size = self.max_encoding_message_size;
                                let inner = self.inner.clone();
                                let fut = async move {
                                    let inner = inner.0;
                                    let method = StreamAggregatedResourcesSvc(inner);
                                    let codec = tonic::codec::ProstCodec::default();
                                    let mut grpc = tonic::server::Grpc::new(codec)
                                        .apply_compression_config(
                                            accept_compression_encodings,
                                            send_compression_encodings,
                                        )
                                        .apply_max_message_size_config(
                                            max_decoding_message_size,
                                            max_encoding_message_size,
                                        );
                                    let res = grpc.streaming(method, req).await;
                                    Ok(res)
                                };
                                Box::pin(fut)
                            }
                            _ => Box::pin(async move {
                                Ok(http::Response::builder()
                                    .status(200)
                                    .header("grpc-status", "12")
                                    .header("content-type", "application/grpc")
                                    .body(empty_body())
                                    .unwrap())
                            }),
                        }
                    }
                }
                impl<T: AggregatedDiscoveryService> Clone for AggregatedDiscoveryServiceServer<T> {
                    fn clone(&self) -> Self {
                        let inner = self.inner.clone();
                        Self {
                            inner,
                            accept_compression_encodings: self.accept_compression_encodings,
                            send_compression_encodings: self.send_compression_encodings,
                            max_decoding_message_size: self.max_decoding_message_size,
                            max_encoding_message_size: self.max_encoding_message_size,
                        }
                    }
                }
                impl<T> Clone for _Inner<T> {
                    fn clone(&self) -> Self {
                        Self(Arc::clone(&self.0))
                    }
                }
                impl<T: std::fmt::Debug> std::fmt::Debug for _Inner<T> {
                    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                        write!(f, "{:?}", self.0)
                    }
                }
                impl<T: AggregatedDiscoveryService> tonic::server::NamedService
                    for AggregatedDiscoveryServiceServer<T>
                {
                    const NAME: &'static str =
                        "envoy.service.discovery.v3.AggregatedDiscoveryService";
                }
            }
        }
    }
}
