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

//! Builders for wire-shaped discovery resources, packed as `Any` the way a
//! control plane would send them.

use prost::Message;
use prost_types::Any;

use crate::xds::proto::config::cluster::v3 as cluster_v3;
use crate::xds::proto::config::core::v3 as core_v3;
use crate::xds::proto::config::endpoint::v3 as endpoint_v3;
use crate::xds::proto::config::hcm::v3 as hcm_v3;
use crate::xds::proto::config::listener::v3 as listener_v3;
use crate::xds::proto::config::route::v3 as route_v3;
use crate::xds::{CLUSTER_TYPE, ENDPOINT_TYPE, LISTENER_TYPE, ROUTE_TYPE};

const HCM_TYPE: &str = "type.googleapis.com/envoy.extensions.filters.network.http_connection_manager.v3.HttpConnectionManager";

fn pack<T: Message>(type_url: &str, msg: &T) -> Any {
    Any {
        type_url: type_url.to_string(),
        value: msg.encode_to_vec(),
    }
}

fn hcm_any(route_config_name: &str) -> Any {
    pack(
        HCM_TYPE,
        &hcm_v3::HttpConnectionManager {
            stat_prefix: "http".to_string(),
            route_specifier: Some(hcm_v3::http_connection_manager::RouteSpecifier::Rds(
                hcm_v3::Rds {
                    route_config_name: route_config_name.to_string(),
                },
            )),
        },
    )
}

/// A listener referencing the given RDS route configs: the first through an
/// API listener, the rest through filter chains.
pub fn listener_any(name: &str, route_configs: &[&str]) -> Any {
    let api_listener = route_configs.first().map(|rc| listener_v3::ApiListener {
        api_listener: Some(hcm_any(rc)),
    });
    let filter_chains = route_configs
        .iter()
        .skip(1)
        .map(|rc| listener_v3::FilterChain {
            filters: vec![listener_v3::Filter {
                name: "envoy.filters.network.http_connection_manager".to_string(),
                config_type: Some(listener_v3::filter::ConfigType::TypedConfig(hcm_any(rc))),
            }],
        })
        .collect();
    pack(
        LISTENER_TYPE,
        &listener_v3::Listener {
            name: name.to_string(),
            filter_chains,
            api_listener,
        },
    )
}

/// A route config with one catch-all prefix route per virtual host,
/// described as `(virtual host name, domains, cluster)`.
pub fn route_any(name: &str, virtual_hosts: &[(&str, &[&str], &str)]) -> Any {
    let virtual_hosts = virtual_hosts
        .iter()
        .map(|(vh_name, domains, cluster)| route_v3::VirtualHost {
            name: vh_name.to_string(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            routes: vec![route_v3::Route {
                name: "default".to_string(),
                r#match: Some(route_v3::RouteMatch {
                    path_specifier: Some(route_v3::route_match::PathSpecifier::Prefix(
                        "/".to_string(),
                    )),
                }),
                action: Some(route_v3::route::Action::Route(route_v3::RouteAction {
                    cluster_specifier: Some(route_v3::route_action::ClusterSpecifier::Cluster(
                        cluster.to_string(),
                    )),
                })),
            }],
        })
        .collect();
    pack(
        ROUTE_TYPE,
        &route_v3::RouteConfiguration {
            name: name.to_string(),
            virtual_hosts,
        },
    )
}

/// An EDS cluster, optionally carrying a service-name override.
pub fn cluster_any(name: &str, eds_service_name: Option<&str>) -> Any {
    pack(
        CLUSTER_TYPE,
        &cluster_v3::Cluster {
            name: name.to_string(),
            eds_cluster_config: eds_service_name.map(|sn| cluster_v3::cluster::EdsClusterConfig {
                service_name: sn.to_string(),
            }),
            lb_policy: cluster_v3::cluster::LbPolicy::RoundRobin as i32,
            cluster_discovery_type: Some(cluster_v3::cluster::ClusterDiscoveryType::Type(
                cluster_v3::cluster::DiscoveryType::Eds as i32,
            )),
        },
    )
}

/// A load assignment with one endpoint per `(address, port, healthy)` entry.
pub fn endpoints_any(cluster_name: &str, endpoints: &[(&str, u32, bool)]) -> Any {
    let lb_endpoints = endpoints
        .iter()
        .map(|(address, port, healthy)| endpoint_v3::LbEndpoint {
            health_status: if *healthy {
                core_v3::HealthStatus::Healthy as i32
            } else {
                core_v3::HealthStatus::Unhealthy as i32
            },
            load_balancing_weight: Some(1),
            host_identifier: Some(endpoint_v3::lb_endpoint::HostIdentifier::Endpoint(
                endpoint_v3::Endpoint {
                    address: Some(core_v3::Address {
                        address: Some(core_v3::address::Address::SocketAddress(
                            core_v3::SocketAddress {
                                address: address.to_string(),
                                port_specifier: Some(
                                    core_v3::socket_address::PortSpecifier::PortValue(*port),
                                ),
                            },
                        )),
                    }),
                },
            )),
        })
        .collect();
    pack(
        ENDPOINT_TYPE,
        &endpoint_v3::ClusterLoadAssignment {
            cluster_name: cluster_name.to_string(),
            endpoints: vec![endpoint_v3::LocalityLbEndpoints {
                locality: None,
                lb_endpoints,
                load_balancing_weight: None,
                priority: 0,
            }],
        },
    )
}
