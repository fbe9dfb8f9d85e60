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

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use prometheus_client::registry::Registry;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::xds::client::AdsObserver;
use crate::xds::metrics::Metrics;
use crate::xds::protocol::{GroupListener, UpdateListener, XdsProtocol};
use crate::xds::resource::{
    ClusterType, ClusterUpdate, EndpointType, EndpointUpdate, ListenerType, ListenerUpdate,
    RouteType, RouteUpdate, VirtualHost,
};

use super::Error;

/// Callback for virtual-host changes of one service.
pub type VirtualHostListener = Arc<dyn Fn(&VirtualHost) + Send + Sync>;

/// Entry point for service discovery. Owns the full resource cascade:
/// listeners name the route tables to fetch, route tables map service
/// domains to clusters, and clusters name the endpoint sets to fetch.
///
/// Consumers only deal in services (virtual hosts) and cluster endpoints;
/// everything else happens internally.
pub struct Exchanger {
    observer: AdsObserver,
    listeners: Arc<XdsProtocol<ListenerType>>,
    routes: Arc<XdsProtocol<RouteType>>,
    clusters: Arc<XdsProtocol<ClusterType>>,
    endpoints: Arc<XdsProtocol<EndpointType>>,

    /// Route config names each listener currently references.
    listener_routes: RwLock<HashMap<String, BTreeSet<String>>>,
    /// The currently subscribed route configs and their hooks, so a dropped
    /// reference can be unsubscribed by listener identity.
    route_hooks: RwLock<HashMap<String, UpdateListener<RouteUpdate>>>,
    /// Service keys each route config currently contributes, so dropping a
    /// route config watch also evicts its virtual hosts.
    route_services: RwLock<HashMap<String, BTreeSet<String>>>,

    /// Virtual hosts indexed by service key, the first DNS label of any
    /// domain they serve.
    virtual_hosts: RwLock<HashMap<String, VirtualHost>>,
    service_listeners: RwLock<HashMap<String, Vec<VirtualHostListener>>>,

    /// Endpoint watches keyed by cluster name. The wire resource name is
    /// resolved once at subscribe time and follows the cluster's EDS config
    /// thereafter, so unsubscribe always matches.
    endpoint_watches: RwLock<HashMap<String, EndpointWatch>>,
}

struct EndpointWatch {
    resource: String,
    hook: UpdateListener<EndpointUpdate>,
    listeners: Vec<UpdateListener<EndpointUpdate>>,
}

impl Exchanger {
    /// Connects, bootstraps the wildcard listener and cluster watches, and
    /// returns once both have delivered their first snapshot. Fails with
    /// [`Error::BootstrapTimeout`] if the server stays silent past the
    /// configured deadline.
    pub async fn new(config: Arc<Config>, registry: &mut Registry) -> Result<Arc<Self>, Error> {
        let metrics = Metrics::new(registry);
        let (block_ready, mut ready) = watch::channel(());
        let (observer, worker) = AdsObserver::new(config.clone(), metrics, block_ready);

        // Wildcard watches registered before the worker starts, so readiness
        // waits for both initial snapshots.
        let listeners = observer.register::<ListenerType>(true);
        let clusters = observer.register::<ClusterType>(true);
        let routes = observer.register::<RouteType>(false);
        let endpoints = observer.register::<EndpointType>(false);

        let exchanger = Arc::new(Exchanger {
            observer,
            listeners,
            routes,
            clusters,
            endpoints,
            listener_routes: Default::default(),
            route_hooks: Default::default(),
            route_services: Default::default(),
            virtual_hosts: Default::default(),
            service_listeners: Default::default(),
            endpoint_watches: Default::default(),
        });

        let weak = Arc::downgrade(&exchanger);
        let hook: GroupListener<ListenerUpdate> = Arc::new(
            move |changed: &HashMap<String, ListenerUpdate>, removed: &BTreeSet<String>| {
                if let Some(exchanger) = weak.upgrade() {
                    exchanger.reconcile_route_configs(changed, removed);
                }
            },
        );
        // Empty set: every listener in the mesh feeds the route union.
        exchanger.listeners.subscribe_group(BTreeSet::new(), hook);

        let weak = Arc::downgrade(&exchanger);
        let hook: GroupListener<ClusterUpdate> = Arc::new(
            move |changed: &HashMap<String, ClusterUpdate>, removed: &BTreeSet<String>| {
                if let Some(exchanger) = weak.upgrade() {
                    exchanger.reconcile_endpoint_watches(changed, removed);
                }
            },
        );
        exchanger.clusters.subscribe_group(BTreeSet::new(), hook);

        let bootstrap = config.bootstrap_timeout;
        tokio::spawn(worker.run());

        // Readiness drops the sender; both branches of changed() mean ready.
        if timeout(bootstrap, ready.changed()).await.is_err() {
            exchanger.shutdown();
            return Err(Error::BootstrapTimeout);
        }
        info!("discovery bootstrap complete");
        Ok(exchanger)
    }

    /// Looks up the virtual host currently serving `service`, keyed by the
    /// first DNS label of its domains.
    pub fn virtual_host(&self, service: &str) -> Option<VirtualHost> {
        self.virtual_hosts
            .read()
            .expect("virtual host lock poisoned")
            .get(service)
            .cloned()
    }

    /// Watches a service's virtual host. If one is already known it is
    /// replayed before this returns.
    pub fn subscribe_service(&self, service: &str, listener: VirtualHostListener) {
        let cached = {
            let mut listeners = self
                .service_listeners
                .write()
                .expect("service listener lock poisoned");
            listeners
                .entry(service.to_string())
                .or_default()
                .push(listener.clone());
            self.virtual_host(service)
        };
        if let Some(vh) = cached {
            listener(&vh);
        }
    }

    pub fn unsubscribe_service(&self, service: &str, listener: &VirtualHostListener) {
        let mut listeners = self
            .service_listeners
            .write()
            .expect("service listener lock poisoned");
        if let Some(entry) = listeners.get_mut(service) {
            entry.retain(|l| !Arc::ptr_eq(l, listener));
            if entry.is_empty() {
                listeners.remove(service);
            }
        }
    }

    pub fn cluster(&self, name: &str) -> Option<ClusterUpdate> {
        self.clusters.cached(name)
    }

    /// Watches the endpoint set of a cluster. The wire-level resource name
    /// comes from the cluster's EDS config, falling back to the cluster name
    /// for clusters not yet pushed; if the cluster later arrives with a
    /// different EDS service name the watch follows it.
    pub fn subscribe_endpoints(
        self: &Arc<Self>,
        cluster: &str,
        listener: UpdateListener<EndpointUpdate>,
    ) {
        let (resource, created) = {
            let mut watches = self
                .endpoint_watches
                .write()
                .expect("endpoint watch lock poisoned");
            match watches.get_mut(cluster) {
                Some(watch) => {
                    watch.listeners.push(listener.clone());
                    (watch.resource.clone(), None)
                }
                None => {
                    let resource = self.resolve_endpoint_resource(cluster);
                    let weak = Arc::downgrade(self);
                    let name = cluster.to_string();
                    let hook: UpdateListener<EndpointUpdate> =
                        Arc::new(move |update: &EndpointUpdate| {
                            if let Some(exchanger) = weak.upgrade() {
                                exchanger.notify_endpoint_listeners(&name, update);
                            }
                        });
                    watches.insert(
                        cluster.to_string(),
                        EndpointWatch {
                            resource: resource.clone(),
                            hook: hook.clone(),
                            listeners: vec![listener.clone()],
                        },
                    );
                    (resource, Some(hook))
                }
            }
        };
        debug!(cluster, resource, "subscribing to endpoints");
        match created {
            // First watcher for this cluster; the adapter's replay reaches
            // it through the fan-out hook.
            Some(hook) => self.endpoints.subscribe(&resource, hook),
            None => {
                if let Some(cached) = self.endpoints.cached(&resource) {
                    listener(&cached);
                }
            }
        }
    }

    /// Removes a listener registered with `subscribe_endpoints`, matched by
    /// `Arc` identity. The wire subscription goes with the last listener.
    pub fn unsubscribe_endpoints(&self, cluster: &str, listener: &UpdateListener<EndpointUpdate>) {
        let dropped = {
            let mut watches = self
                .endpoint_watches
                .write()
                .expect("endpoint watch lock poisoned");
            let Some(watch) = watches.get_mut(cluster) else {
                return;
            };
            watch.listeners.retain(|l| !Arc::ptr_eq(l, listener));
            if watch.listeners.is_empty() {
                watches.remove(cluster)
            } else {
                None
            }
        };
        if let Some(watch) = dropped {
            self.endpoints.unsubscribe(&watch.resource, &watch.hook);
        }
    }

    pub fn endpoints(&self, cluster: &str) -> Option<EndpointUpdate> {
        let watched = self
            .endpoint_watches
            .read()
            .expect("endpoint watch lock poisoned")
            .get(cluster)
            .map(|w| w.resource.clone());
        let resource = watched.unwrap_or_else(|| self.resolve_endpoint_resource(cluster));
        self.endpoints.cached(&resource)
    }

    /// Closes the stream for good. Cached data stays readable; no further
    /// updates arrive.
    pub fn shutdown(&self) {
        self.observer.destroy();
    }

    fn resolve_endpoint_resource(&self, cluster: &str) -> String {
        self.clusters
            .cached(cluster)
            .map(|c| c.endpoint_resource().to_string())
            .unwrap_or_else(|| cluster.to_string())
    }

    fn notify_endpoint_listeners(&self, cluster: &str, update: &EndpointUpdate) {
        let listeners = {
            let watches = self
                .endpoint_watches
                .read()
                .expect("endpoint watch lock poisoned");
            match watches.get(cluster) {
                Some(watch) => watch.listeners.clone(),
                None => return,
            }
        };
        debug!(cluster, "endpoints updated");
        for listener in &listeners {
            listener(update);
        }
    }

    /// Moves endpoint watches whose cluster changed its EDS service name
    /// over to the new wire resource. A removed cluster falls back to its
    /// own name.
    fn reconcile_endpoint_watches(
        self: &Arc<Self>,
        changed: &HashMap<String, ClusterUpdate>,
        removed: &BTreeSet<String>,
    ) {
        let mut migrations = Vec::new();
        {
            let mut watches = self
                .endpoint_watches
                .write()
                .expect("endpoint watch lock poisoned");
            for cluster in changed.keys().chain(removed.iter()) {
                let Some(watch) = watches.get_mut(cluster) else {
                    continue;
                };
                let resource = changed
                    .get(cluster)
                    .map(|c| c.endpoint_resource().to_string())
                    .unwrap_or_else(|| cluster.clone());
                if resource != watch.resource {
                    let old = std::mem::replace(&mut watch.resource, resource.clone());
                    migrations.push((old, resource, watch.hook.clone()));
                }
            }
        }
        for (old, new, hook) in migrations {
            debug!(from = old, to = new, "endpoint watch follows cluster");
            self.endpoints.unsubscribe(&old, &hook);
            self.endpoints.subscribe(&new, hook);
        }
    }

    /// Applies a batch of listener changes: recompute the union of route
    /// config names and grow/shrink the route watches to match. Dropped
    /// route configs take their virtual hosts with them.
    fn reconcile_route_configs(
        self: &Arc<Self>,
        changed: &HashMap<String, ListenerUpdate>,
        removed: &BTreeSet<String>,
    ) {
        let union: BTreeSet<String> = {
            let mut listener_routes = self
                .listener_routes
                .write()
                .expect("listener route lock poisoned");
            for (name, update) in changed {
                listener_routes.insert(name.clone(), update.route_configs.clone());
            }
            for name in removed {
                listener_routes.remove(name);
            }
            listener_routes.values().flatten().cloned().collect()
        };

        let mut hooks = self.route_hooks.write().expect("route hook lock poisoned");
        let current: BTreeSet<String> = hooks.keys().cloned().collect();

        for name in union.difference(&current) {
            debug!(route_config = name, "watching route config");
            let weak = Arc::downgrade(self);
            let hook: UpdateListener<RouteUpdate> = Arc::new(move |update: &RouteUpdate| {
                if let Some(exchanger) = weak.upgrade() {
                    exchanger.apply_route_update(update);
                }
            });
            hooks.insert(name.clone(), hook.clone());
            self.routes.subscribe(name, hook);
        }
        for name in current.difference(&union) {
            debug!(route_config = name, "dropping route config watch");
            if let Some(hook) = hooks.remove(name) {
                self.routes.unsubscribe(name, &hook);
            }
            let served = self
                .route_services
                .write()
                .expect("route service lock poisoned")
                .remove(name)
                .unwrap_or_default();
            if !served.is_empty() {
                let mut virtual_hosts = self
                    .virtual_hosts
                    .write()
                    .expect("virtual host lock poisoned");
                for service in &served {
                    debug!(service, "service no longer routed");
                    virtual_hosts.remove(service);
                }
            }
        }
    }

    /// Indexes a route table's virtual hosts by service key and notifies
    /// service watchers.
    fn apply_route_update(self: &Arc<Self>, update: &RouteUpdate) {
        let mut keys: BTreeSet<String> = BTreeSet::new();
        let mut notify: Vec<(String, VirtualHost)> = Vec::new();
        {
            let mut virtual_hosts = self
                .virtual_hosts
                .write()
                .expect("virtual host lock poisoned");
            for vh in &update.virtual_hosts {
                for domain in &vh.domains {
                    let Some(service) = service_key(domain) else {
                        continue;
                    };
                    keys.insert(service.to_string());
                    let changed = virtual_hosts.get(service) != Some(vh);
                    virtual_hosts.insert(service.to_string(), vh.clone());
                    if changed {
                        notify.push((service.to_string(), vh.clone()));
                    }
                }
            }
            // Service keys this route config stopped serving are evicted.
            let stale: Vec<String> = {
                let mut route_services = self
                    .route_services
                    .write()
                    .expect("route service lock poisoned");
                let previous = route_services
                    .insert(update.name.clone(), keys.clone())
                    .unwrap_or_default();
                previous.difference(&keys).cloned().collect()
            };
            for service in &stale {
                debug!(service, "service no longer routed");
                virtual_hosts.remove(service);
            }
        }

        if notify.is_empty() {
            return;
        }
        let listeners = self
            .service_listeners
            .read()
            .expect("service listener lock poisoned");
        for (service, vh) in &notify {
            if let Some(entry) = listeners.get(service) {
                debug!(service, "virtual host updated");
                for listener in entry {
                    listener(vh);
                }
            }
        }
    }
}

impl Drop for Exchanger {
    fn drop(&mut self) {
        if !self.observer.is_destroyed() {
            warn!("exchanger dropped without shutdown, closing stream");
            self.observer.destroy();
        }
    }
}

/// A service is addressed by the first DNS label of a domain:
/// `greeter.default.svc.cluster.local` and `greeter:8080` both key as
/// `greeter`. The wildcard domain matches no service.
fn service_key(domain: &str) -> Option<&str> {
    let label = domain.split(['.', ':']).next().unwrap_or(domain);
    if label.is_empty() || label == "*" {
        None
    } else {
        Some(label)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::test_helpers::helpers::initialize_telemetry;
    use crate::test_helpers::xds::AdsServer;
    use crate::test_helpers::xds_resources::{
        cluster_any, endpoints_any, listener_any, route_any,
    };
    use crate::xds::resource::{CLUSTER_TYPE, ENDPOINT_TYPE, LISTENER_TYPE, ROUTE_TYPE};

    const TEST_TIMEOUT: Duration = Duration::from_secs(2);

    #[test]
    fn service_keys() {
        assert_eq!(
            service_key("greeter.default.svc.cluster.local"),
            Some("greeter")
        );
        assert_eq!(service_key("greeter:8080"), Some("greeter"));
        assert_eq!(service_key("greeter"), Some("greeter"));
        assert_eq!(service_key("*"), None);
        assert_eq!(service_key(""), None);
    }

    #[tokio::test]
    async fn full_cascade_from_listener_to_endpoints() {
        initialize_telemetry();
        let server = AdsServer::bind().await;
        let config = Arc::new(server.config());

        let exchanger_task =
            tokio::spawn(async move { Exchanger::new(config, &mut Registry::default()).await });

        let mut conn = server.next_connection(TEST_TIMEOUT).await;
        // Wildcard bootstrap: one request per snapshot type.
        let mut initial = BTreeSet::new();
        initial.insert(conn.next_request(TEST_TIMEOUT).await.type_url);
        initial.insert(conn.next_request(TEST_TIMEOUT).await.type_url);
        assert_eq!(
            initial,
            BTreeSet::from([LISTENER_TYPE.to_string(), CLUSTER_TYPE.to_string()])
        );

        conn.push(
            LISTENER_TYPE,
            "l1",
            "n1",
            vec![listener_any("outbound", &["greeter-routes"])],
        )
        .await;
        conn.push(CLUSTER_TYPE, "c1", "n2", vec![cluster_any("greeter", None)])
            .await;

        // Both acks plus the cascaded route subscription, in whatever order
        // the worker interleaves them.
        let mut reqs = Vec::new();
        for _ in 0..3 {
            reqs.push(conn.next_request(TEST_TIMEOUT).await);
        }
        assert!(
            reqs.iter()
                .any(|r| r.type_url == LISTENER_TYPE && r.version_info == "l1")
        );
        assert!(
            reqs.iter()
                .any(|r| r.type_url == CLUSTER_TYPE && r.version_info == "c1")
        );
        let rds_req = reqs
            .iter()
            .find(|r| r.type_url == ROUTE_TYPE)
            .expect("route subscription");
        assert_eq!(rds_req.resource_names, vec!["greeter-routes".to_string()]);

        let exchanger = exchanger_task.await.unwrap().unwrap();
        conn.push(
            ROUTE_TYPE,
            "r1",
            "n3",
            vec![route_any(
                "greeter-routes",
                &[("vh", &["greeter.default.svc.cluster.local"], "greeter")],
            )],
        )
        .await;
        conn.next_request(TEST_TIMEOUT).await; // RDS ack

        // Virtual hosts are keyed by the first domain label.
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        exchanger.subscribe_service(
            "greeter",
            Arc::new(move |vh: &VirtualHost| {
                s.lock().unwrap().push(vh.name.clone());
            }),
        );
        assert_eq!(seen.lock().unwrap().clone(), vec!["vh".to_string()]);

        // Endpoint subscription resolves through the cluster's EDS config.
        exchanger.subscribe_endpoints("greeter", Arc::new(|_: &EndpointUpdate| {}));
        let eds_req = conn.next_request(TEST_TIMEOUT).await;
        assert_eq!(eds_req.type_url, ENDPOINT_TYPE);
        assert_eq!(eds_req.resource_names, vec!["greeter".to_string()]);
        conn.push(
            ENDPOINT_TYPE,
            "e1",
            "n4",
            vec![endpoints_any("greeter", &[("10.0.0.1", 8080, true)])],
        )
        .await;
        conn.next_request(TEST_TIMEOUT).await; // EDS ack

        let endpoints = exchanger.endpoints("greeter").expect("endpoints cached");
        assert_eq!(endpoints.endpoints.len(), 1);
        assert_eq!(endpoints.endpoints[0].address, "10.0.0.1");

        exchanger.shutdown();
    }

    #[tokio::test]
    async fn removed_listener_drops_route_watch() {
        initialize_telemetry();
        let server = AdsServer::bind().await;
        let config = Arc::new(server.config());
        let exchanger_task =
            tokio::spawn(async move { Exchanger::new(config, &mut Registry::default()).await });

        let mut conn = server.next_connection(TEST_TIMEOUT).await;
        conn.next_request(TEST_TIMEOUT).await;
        conn.next_request(TEST_TIMEOUT).await;
        conn.push(
            LISTENER_TYPE,
            "l1",
            "n1",
            vec![listener_any("outbound", &["rc1"])],
        )
        .await;
        conn.push(CLUSTER_TYPE, "c1", "n2", vec![]).await;

        let mut reqs = Vec::new();
        for _ in 0..3 {
            reqs.push(conn.next_request(TEST_TIMEOUT).await);
        }
        let rds = reqs
            .iter()
            .find(|r| r.type_url == ROUTE_TYPE)
            .expect("route subscription");
        assert_eq!(rds.resource_names, vec!["rc1".to_string()]);

        let exchanger = exchanger_task.await.unwrap().unwrap();
        conn.push(
            ROUTE_TYPE,
            "r1",
            "n3",
            vec![route_any(
                "rc1",
                &[("vh", &["greeter.default.svc.cluster.local"], "greeter")],
            )],
        )
        .await;
        conn.next_request(TEST_TIMEOUT).await; // RDS ack
        assert!(exchanger.virtual_host("greeter").is_some());

        // The listener disappears from the next wildcard snapshot; its
        // route config goes off the wire and its services out of the index.
        conn.push(LISTENER_TYPE, "l2", "n4", vec![]).await;
        let mut reqs = Vec::new();
        for _ in 0..2 {
            reqs.push(conn.next_request(TEST_TIMEOUT).await);
        }
        assert!(
            reqs.iter()
                .any(|r| r.type_url == LISTENER_TYPE && r.version_info == "l2")
        );
        let rds = reqs
            .iter()
            .find(|r| r.type_url == ROUTE_TYPE)
            .expect("route unsubscription");
        assert!(rds.resource_names.is_empty());
        assert!(exchanger.virtual_host("greeter").is_none());

        exchanger.shutdown();
    }

    #[tokio::test]
    async fn endpoint_watch_follows_eds_service_name() {
        initialize_telemetry();
        let server = AdsServer::bind().await;
        let config = Arc::new(server.config());
        let exchanger_task =
            tokio::spawn(async move { Exchanger::new(config, &mut Registry::default()).await });

        let mut conn = server.next_connection(TEST_TIMEOUT).await;
        conn.next_request(TEST_TIMEOUT).await;
        conn.next_request(TEST_TIMEOUT).await;
        conn.push(LISTENER_TYPE, "l1", "n1", vec![]).await;
        conn.push(CLUSTER_TYPE, "c1", "n2", vec![]).await;
        conn.next_request(TEST_TIMEOUT).await;
        conn.next_request(TEST_TIMEOUT).await;
        let exchanger = exchanger_task.await.unwrap().unwrap();

        // Subscribing before the cluster is known falls back to its name.
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let listener: UpdateListener<EndpointUpdate> = Arc::new(move |u: &EndpointUpdate| {
            s.lock().unwrap().push(u.cluster_name.clone());
        });
        exchanger.subscribe_endpoints("greeter", listener.clone());
        let req = conn.next_request(TEST_TIMEOUT).await;
        assert_eq!(req.type_url, ENDPOINT_TYPE);
        assert_eq!(req.resource_names, vec!["greeter".to_string()]);

        // The cluster arrives with an EDS override; the watch migrates.
        conn.push(
            CLUSTER_TYPE,
            "c2",
            "n3",
            vec![cluster_any("greeter", Some("greeter-eds"))],
        )
        .await;
        let mut reqs = Vec::new();
        for _ in 0..2 {
            reqs.push(conn.next_request(TEST_TIMEOUT).await);
        }
        assert!(
            reqs.iter()
                .any(|r| r.type_url == CLUSTER_TYPE && r.version_info == "c2")
        );
        let eds = reqs
            .iter()
            .find(|r| r.type_url == ENDPOINT_TYPE)
            .expect("migrated subscription");
        assert_eq!(eds.resource_names, vec!["greeter-eds".to_string()]);

        conn.push(
            ENDPOINT_TYPE,
            "e1",
            "n4",
            vec![endpoints_any("greeter-eds", &[("10.0.0.1", 8080, true)])],
        )
        .await;
        conn.next_request(TEST_TIMEOUT).await; // EDS ack
        assert_eq!(seen.lock().unwrap().clone(), vec!["greeter-eds".to_string()]);
        assert!(exchanger.endpoints("greeter").is_some());

        // Unsubscribe resolves through the recorded watch, not a re-lookup.
        exchanger.unsubscribe_endpoints("greeter", &listener);
        let req = conn.next_request(TEST_TIMEOUT).await;
        assert_eq!(req.type_url, ENDPOINT_TYPE);
        assert!(req.resource_names.is_empty());

        exchanger.shutdown();
    }

    #[tokio::test]
    async fn bootstrap_times_out_on_silent_server() {
        initialize_telemetry();
        let server = AdsServer::bind().await;
        let mut config = server.config();
        config.bootstrap_timeout = Duration::from_millis(50);
        let mut registry = Registry::default();
        let result = Exchanger::new(Arc::new(config), &mut registry).await;
        assert!(matches!(result, Err(Error::BootstrapTimeout)));
    }
}
