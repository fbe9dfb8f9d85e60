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

use std::collections::BTreeSet;
use std::fmt;
use std::fmt::{Display, Formatter};

use prost::{DecodeError, Message};
use prost_types::Any;
use thiserror::Error;
use tracing::debug;

use crate::xds::proto::config::cluster::v3 as cluster_v3;
use crate::xds::proto::config::cluster::v3::cluster::{DiscoveryType, LbPolicy};
use crate::xds::proto::config::core::v3 as core_v3;
use crate::xds::proto::config::endpoint::v3 as endpoint_v3;
use crate::xds::proto::config::hcm::v3 as hcm_v3;
use crate::xds::proto::config::listener::v3 as listener_v3;
use crate::xds::proto::config::route::v3 as route_v3;

pub const LISTENER_TYPE: &str = "type.googleapis.com/envoy.config.listener.v3.Listener";
pub const ROUTE_TYPE: &str = "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";
pub const CLUSTER_TYPE: &str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";
pub const ENDPOINT_TYPE: &str =
    "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";
const HCM_TYPE: &str = "type.googleapis.com/envoy.extensions.filters.network.http_connection_manager.v3.HttpConnectionManager";

/// The subscribable resource kinds. One wire type URL per kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Listener,
    RouteConfiguration,
    Cluster,
    ClusterLoadAssignment,
}

impl ResourceKind {
    pub fn type_url(&self) -> &'static str {
        match self {
            ResourceKind::Listener => LISTENER_TYPE,
            ResourceKind::RouteConfiguration => ROUTE_TYPE,
            ResourceKind::Cluster => CLUSTER_TYPE,
            ResourceKind::ClusterLoadAssignment => ENDPOINT_TYPE,
        }
    }

    pub fn from_type_url(type_url: &str) -> Result<ResourceKind, AdsError> {
        match type_url {
            LISTENER_TYPE => Ok(ResourceKind::Listener),
            ROUTE_TYPE => Ok(ResourceKind::RouteConfiguration),
            CLUSTER_TYPE => Ok(ResourceKind::Cluster),
            ENDPOINT_TYPE => Ok(ResourceKind::ClusterLoadAssignment),
            unknown => Err(AdsError::UnknownResourceType(unknown.to_string())),
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_url())
    }
}

#[derive(Clone, Debug, Error)]
pub enum AdsError {
    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
    #[error("resource without a name")]
    MissingName,
}

/// Describes one subscribable kind: its wire type URL and how to turn the
/// raw `Any` payload into a typed, value-comparable update.
pub trait XdsResourceType: Send + Sync + 'static {
    type Update: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    const KIND: ResourceKind;

    fn parse(raw: &Any) -> Result<Self::Update, AdsError>;
    fn name(update: &Self::Update) -> &str;
}

fn decode<T: Message + Default>(raw: &Any) -> Result<T, AdsError> {
    Ok(T::decode(raw.value.as_slice())?)
}

/// A Listener reduced to the RDS route configurations it references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerUpdate {
    pub name: String,
    pub route_configs: BTreeSet<String>,
}

pub struct ListenerType;

impl XdsResourceType for ListenerType {
    type Update = ListenerUpdate;

    const KIND: ResourceKind = ResourceKind::Listener;

    fn parse(raw: &Any) -> Result<ListenerUpdate, AdsError> {
        let listener: listener_v3::Listener = decode(raw)?;
        if listener.name.is_empty() {
            return Err(AdsError::MissingName);
        }

        let mut route_configs = BTreeSet::new();
        let api_hcm = listener
            .api_listener
            .as_ref()
            .and_then(|al| al.api_listener.as_ref());
        let chain_hcms = listener
            .filter_chains
            .iter()
            .flat_map(|fc| fc.filters.iter())
            .filter_map(|f| match &f.config_type {
                Some(listener_v3::filter::ConfigType::TypedConfig(any)) => Some(any),
                None => None,
            });
        for any in api_hcm.into_iter().chain(chain_hcms) {
            if any.type_url != HCM_TYPE {
                continue;
            }
            let hcm: hcm_v3::HttpConnectionManager = decode(any)?;
            match hcm.route_specifier {
                Some(hcm_v3::http_connection_manager::RouteSpecifier::Rds(rds)) => {
                    if !rds.route_config_name.is_empty() {
                        route_configs.insert(rds.route_config_name);
                    }
                }
                // Inlined route tables need no RDS subscription.
                Some(hcm_v3::http_connection_manager::RouteSpecifier::RouteConfig(rc)) => {
                    debug!(listener = listener.name, route_config = rc.name, "inline route config");
                }
                None => {}
            }
        }
        Ok(ListenerUpdate {
            name: listener.name,
            route_configs,
        })
    }

    fn name(update: &ListenerUpdate) -> &str {
        &update.name
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathMatch {
    Prefix(String),
    Exact(String),
    Any,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterWeight {
    pub name: String,
    pub weight: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteRule {
    pub name: String,
    pub r#match: PathMatch,
    pub clusters: Vec<ClusterWeight>,
}

/// A named routing-rule group covering one or more domains.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VirtualHost {
    pub name: String,
    pub domains: Vec<String>,
    pub routes: Vec<RouteRule>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteUpdate {
    pub name: String,
    pub virtual_hosts: Vec<VirtualHost>,
}

pub struct RouteType;

impl XdsResourceType for RouteType {
    type Update = RouteUpdate;

    const KIND: ResourceKind = ResourceKind::RouteConfiguration;

    fn parse(raw: &Any) -> Result<RouteUpdate, AdsError> {
        let rc: route_v3::RouteConfiguration = decode(raw)?;
        if rc.name.is_empty() {
            return Err(AdsError::MissingName);
        }
        let virtual_hosts = rc
            .virtual_hosts
            .into_iter()
            .map(|vh| VirtualHost {
                name: vh.name,
                domains: vh.domains,
                routes: vh.routes.into_iter().map(convert_route).collect(),
            })
            .collect();
        Ok(RouteUpdate {
            name: rc.name,
            virtual_hosts,
        })
    }

    fn name(update: &RouteUpdate) -> &str {
        &update.name
    }
}

fn convert_route(route: route_v3::Route) -> RouteRule {
    let r#match = match route.r#match.and_then(|m| m.path_specifier) {
        Some(route_v3::route_match::PathSpecifier::Prefix(p)) => PathMatch::Prefix(p),
        Some(route_v3::route_match::PathSpecifier::Path(p)) => PathMatch::Exact(p),
        None => PathMatch::Any,
    };
    let clusters = match route.action {
        Some(route_v3::route::Action::Route(action)) => match action.cluster_specifier {
            Some(route_v3::route_action::ClusterSpecifier::Cluster(name)) => {
                vec![ClusterWeight { name, weight: None }]
            }
            Some(route_v3::route_action::ClusterSpecifier::WeightedClusters(wc)) => wc
                .clusters
                .into_iter()
                .map(|cw| ClusterWeight {
                    name: cw.name,
                    weight: cw.weight,
                })
                .collect(),
            None => vec![],
        },
        None => vec![],
    };
    RouteRule {
        name: route.name,
        r#match,
        clusters,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterUpdate {
    pub name: String,
    /// EDS service name override; fall back to the cluster name when unset.
    pub eds_service_name: Option<String>,
    pub discovery: DiscoveryType,
    pub lb_policy: LbPolicy,
}

impl ClusterUpdate {
    /// The name to subscribe to for this cluster's endpoints.
    pub fn endpoint_resource(&self) -> &str {
        self.eds_service_name.as_deref().unwrap_or(&self.name)
    }
}

pub struct ClusterType;

impl XdsResourceType for ClusterType {
    type Update = ClusterUpdate;

    const KIND: ResourceKind = ResourceKind::Cluster;

    fn parse(raw: &Any) -> Result<ClusterUpdate, AdsError> {
        let cluster: cluster_v3::Cluster = decode(raw)?;
        if cluster.name.is_empty() {
            return Err(AdsError::MissingName);
        }
        let discovery = match cluster.cluster_discovery_type {
            Some(cluster_v3::cluster::ClusterDiscoveryType::Type(t)) => {
                DiscoveryType::try_from(t).unwrap_or(DiscoveryType::Static)
            }
            None => DiscoveryType::Static,
        };
        let eds_service_name = cluster
            .eds_cluster_config
            .map(|eds| eds.service_name)
            .filter(|name| !name.is_empty());
        let lb_policy =
            LbPolicy::try_from(cluster.lb_policy).unwrap_or(LbPolicy::RoundRobin);
        Ok(ClusterUpdate {
            name: cluster.name,
            eds_service_name,
            discovery,
            lb_policy,
        })
    }

    fn name(update: &ClusterUpdate) -> &str {
        &update.name
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Locality {
    pub region: String,
    pub zone: String,
    pub sub_zone: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub address: String,
    pub port: u32,
    pub weight: u32,
    pub healthy: bool,
    pub locality: Option<Locality>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointUpdate {
    pub cluster_name: String,
    pub endpoints: Vec<Endpoint>,
}

pub struct EndpointType;

impl XdsResourceType for EndpointType {
    type Update = EndpointUpdate;

    const KIND: ResourceKind = ResourceKind::ClusterLoadAssignment;

    fn parse(raw: &Any) -> Result<EndpointUpdate, AdsError> {
        let cla: endpoint_v3::ClusterLoadAssignment = decode(raw)?;
        if cla.cluster_name.is_empty() {
            return Err(AdsError::MissingName);
        }
        let mut endpoints = Vec::new();
        for lle in cla.endpoints {
            let locality = lle.locality.map(|l| Locality {
                region: l.region,
                zone: l.zone,
                sub_zone: l.sub_zone,
            });
            for lbe in lle.lb_endpoints {
                let Some(endpoint_v3::lb_endpoint::HostIdentifier::Endpoint(ep)) =
                    lbe.host_identifier
                else {
                    continue;
                };
                let Some(core_v3::address::Address::SocketAddress(sa)) =
                    ep.address.and_then(|a| a.address)
                else {
                    continue;
                };
                let port = match sa.port_specifier {
                    Some(core_v3::socket_address::PortSpecifier::PortValue(p)) => p,
                    _ => 0,
                };
                let healthy = matches!(
                    core_v3::HealthStatus::try_from(lbe.health_status),
                    Ok(core_v3::HealthStatus::Healthy) | Ok(core_v3::HealthStatus::Unknown)
                );
                endpoints.push(Endpoint {
                    address: sa.address,
                    port,
                    weight: lbe.load_balancing_weight.unwrap_or(1),
                    healthy,
                    locality: locality.clone(),
                });
            }
        }
        Ok(EndpointUpdate {
            cluster_name: cla.cluster_name,
            endpoints,
        })
    }

    fn name(update: &EndpointUpdate) -> &str {
        &update.cluster_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::xds_resources::*;

    #[test]
    fn listener_extracts_rds_names() {
        let raw = listener_any("outbound_0.0.0.0_80", &["svc-a-routes", "svc-b-routes"]);
        let update = ListenerType::parse(&raw).unwrap();
        assert_eq!(update.name, "outbound_0.0.0.0_80");
        assert_eq!(
            update.route_configs,
            BTreeSet::from(["svc-a-routes".to_string(), "svc-b-routes".to_string()])
        );
    }

    #[test]
    fn garbage_payload_is_a_decode_error() {
        let raw = prost_types::Any {
            type_url: LISTENER_TYPE.to_string(),
            value: vec![0xff, 0xff, 0xff],
        };
        assert!(matches!(
            ListenerType::parse(&raw),
            Err(AdsError::Decode(_))
        ));
    }

    #[test]
    fn unnamed_resource_is_rejected() {
        let raw = listener_any("", &[]);
        assert!(matches!(
            ListenerType::parse(&raw),
            Err(AdsError::MissingName)
        ));
    }

    #[test]
    fn endpoints_flatten_with_health_and_weight() {
        let raw = endpoints_any(
            "svc-a",
            &[("10.0.0.1", 8080, true), ("10.0.0.2", 8080, false)],
        );
        let update = EndpointType::parse(&raw).unwrap();
        assert_eq!(update.cluster_name, "svc-a");
        assert_eq!(update.endpoints.len(), 2);
        assert!(update.endpoints[0].healthy);
        assert!(!update.endpoints[1].healthy);
        assert_eq!(update.endpoints[0].port, 8080);
    }

    #[test]
    fn eds_service_name_falls_back_to_cluster_name() {
        let with_override = cluster_any("outbound|80||svc-a", Some("svc-a-eds"));
        let update = ClusterType::parse(&with_override).unwrap();
        assert_eq!(update.endpoint_resource(), "svc-a-eds");

        let plain = cluster_any("outbound|80||svc-a", None);
        let update = ClusterType::parse(&plain).unwrap();
        assert_eq!(update.endpoint_resource(), "outbound|80||svc-a");
    }

    #[test]
    fn kind_round_trips_through_type_url() {
        for kind in [
            ResourceKind::Listener,
            ResourceKind::RouteConfiguration,
            ResourceKind::Cluster,
            ResourceKind::ClusterLoadAssignment,
        ] {
            assert_eq!(ResourceKind::from_type_url(kind.type_url()).unwrap(), kind);
        }
        assert!(ResourceKind::from_type_url("type.googleapis.com/envoy.unknown").is_err());
    }
}
