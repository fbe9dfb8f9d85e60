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

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{self, Display, Formatter};
use std::mem;
use std::sync::{Arc, RwLock};

use prost_types::value::Kind;
use prost_types::{Struct, Value};
use tokio::sync::{mpsc, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::Config;
use crate::metrics::{IncrementRecorder, Recorder};
use crate::xds::channel::DiscoveryChannel;
use crate::xds::metrics::{ConnectionTerminationReason, Metrics};
use crate::xds::proto::config::core::v3::{Locality, Node};
use crate::xds::proto::rpc::Status;
use crate::xds::proto::service::discovery::v3::{DiscoveryRequest, DiscoveryResponse};
use crate::xds::protocol::{RawProtocol, SubscriptionDriver, XdsProtocol};
use crate::xds::resource::{ResourceKind, XdsResourceType};

use super::Error;

const INSTANCE_IP: &str = "INSTANCE_IP";
const DEFAULT_IP: &str = "127.0.0.1";
const POD_NAME: &str = "POD_NAME";
const POD_NAMESPACE: &str = "POD_NAMESPACE";
const NODE_NAME: &str = "NODE_NAME";
const EMPTY_STR: &str = "";
const XDS_METAJSON_PREFIX: &str = "XDS_METAJSON_";

#[derive(Debug)]
enum XdsSignal {
    Ack,
    Nack,
}

impl Display for XdsSignal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            XdsSignal::Ack => "ACK",
            XdsSignal::Nack => "NACK",
        })
    }
}

#[derive(Debug)]
enum ObserverEvent {
    /// The subscription set of a type changed; re-send its request.
    Resubscribe(ResourceKind),
    Shutdown,
}

struct Registered {
    raw: Arc<dyn RawProtocol>,
    // The same adapter behind its concrete type, for typed lookups.
    typed: Arc<dyn Any + Send + Sync>,
}

/// All per-type adapters, keyed by resource kind. One adapter exists per
/// kind no matter how many callers asked for it.
#[derive(Default)]
struct ProtocolRegistry {
    entries: RwLock<HashMap<ResourceKind, Registered>>,
}

impl ProtocolRegistry {
    fn get_or_create<R: XdsResourceType>(
        &self,
        wildcard: bool,
        driver: Arc<dyn SubscriptionDriver>,
    ) -> Arc<XdsProtocol<R>> {
        {
            let entries = self.entries.read().expect("registry lock poisoned");
            if let Some(existing) = entries.get(&R::KIND) {
                return existing
                    .typed
                    .clone()
                    .downcast::<XdsProtocol<R>>()
                    .expect("adapter registered under the wrong kind");
            }
        }
        let mut entries = self.entries.write().expect("registry lock poisoned");
        // Someone else may have won the race between the two locks.
        if let Some(existing) = entries.get(&R::KIND) {
            return existing
                .typed
                .clone()
                .downcast::<XdsProtocol<R>>()
                .expect("adapter registered under the wrong kind");
        }
        let protocol = Arc::new(XdsProtocol::<R>::new(wildcard, driver));
        entries.insert(
            R::KIND,
            Registered {
                raw: protocol.clone(),
                typed: protocol.clone(),
            },
        );
        protocol
    }

    fn raw(&self, kind: ResourceKind) -> Option<Arc<dyn RawProtocol>> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(&kind)
            .map(|e| e.raw.clone())
    }

    fn wildcard_kinds(&self) -> HashSet<ResourceKind> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .values()
            .filter(|e| e.raw.is_wildcard())
            .map(|e| e.raw.kind())
            .collect()
    }

    /// Kinds that should carry a request on the wire right now: wildcard
    /// types always, named types once something subscribed.
    fn active_kinds(&self) -> Vec<(ResourceKind, Vec<String>)> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .values()
            .filter_map(|e| {
                let names = e.raw.subscribed_names();
                if e.raw.is_wildcard() || !names.is_empty() {
                    Some((e.raw.kind(), names))
                } else {
                    None
                }
            })
            .collect()
    }

    fn names(&self, kind: ResourceKind) -> Vec<String> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(&kind)
            .map(|e| e.raw.subscribed_names())
            .unwrap_or_default()
    }
}

struct ObserverDriver {
    // Weak: the worker owns the registry, which owns this driver, so a
    // strong sender here would keep an abandoned worker alive forever.
    events: mpsc::WeakSender<ObserverEvent>,
}

impl SubscriptionDriver for ObserverDriver {
    fn adjust(&self, kind: ResourceKind) {
        let Some(events) = self.events.upgrade() else {
            debug!(%kind, "subscription change after shutdown, ignored");
            return;
        };
        // Coalesced best-effort: a full set snapshot goes out per event, so a
        // dropped duplicate is covered by the one already queued.
        if let Err(mpsc::error::TrySendError::Closed(_)) =
            events.try_send(ObserverEvent::Resubscribe(kind))
        {
            debug!(%kind, "subscription change after shutdown, ignored");
        }
    }
}

/// Shared handle to the discovery machinery. Hands out per-type adapters and
/// controls the lifecycle of the stream worker.
#[derive(Clone)]
pub struct AdsObserver {
    registry: Arc<ProtocolRegistry>,
    channel: Arc<DiscoveryChannel>,
    events: mpsc::Sender<ObserverEvent>,
    driver: Arc<ObserverDriver>,
}

impl AdsObserver {
    pub fn new(
        config: Arc<Config>,
        metrics: Metrics,
        block_ready: watch::Sender<()>,
    ) -> (AdsObserver, AdsWorker) {
        let (events_tx, events_rx) = mpsc::channel(100);
        let channel = Arc::new(DiscoveryChannel::new(
            config.xds_address.clone(),
            config.max_grpc_message_size,
        ));
        let registry = Arc::new(ProtocolRegistry::default());
        let driver = Arc::new(ObserverDriver {
            events: events_tx.downgrade(),
        });
        let observer = AdsObserver {
            registry: registry.clone(),
            channel: channel.clone(),
            events: events_tx,
            driver,
        };
        let worker = AdsWorker {
            config,
            channel,
            registry,
            events: events_rx,
            metrics,
            block_ready: Some(block_ready),
            connection_id: 0,
            last_acked: HashMap::new(),
            types_to_expect: HashSet::new(),
        };
        (observer, worker)
    }

    /// Returns the adapter for `R`, creating it on first call. Concurrent
    /// callers for the same kind all get the same adapter; `wildcard` only
    /// takes effect for the call that creates it.
    pub fn register<R: XdsResourceType>(&self, wildcard: bool) -> Arc<XdsProtocol<R>> {
        let protocol = self
            .registry
            .get_or_create::<R>(wildcard, self.driver.clone());
        if wildcard {
            // A wildcard type goes on the wire even with no listeners yet.
            self.driver.adjust(R::KIND);
        }
        protocol
    }

    /// Tears the client down: the stream closes, and no reconnect follows.
    /// Idempotent.
    pub fn destroy(&self) {
        self.channel.close();
        let _ = self.events.try_send(ObserverEvent::Shutdown);
    }

    pub fn is_destroyed(&self) -> bool {
        self.channel.is_closed()
    }
}

/// Owns the ADS stream: connects, sends requests, dispatches responses to
/// the per-type adapters, and acks. Reconnects with a fixed backoff until
/// destroyed.
pub struct AdsWorker {
    config: Arc<Config>,
    channel: Arc<DiscoveryChannel>,
    registry: Arc<ProtocolRegistry>,
    events: mpsc::Receiver<ObserverEvent>,

    pub(crate) metrics: Metrics,
    block_ready: Option<watch::Sender<()>>,

    connection_id: u32,
    /// Last version acked per type. Survives reconnects so a recovered
    /// stream can tell the server what it already holds.
    last_acked: HashMap<ResourceKind, String>,
    types_to_expect: HashSet<ResourceKind>,
}

impl AdsWorker {
    pub async fn run(mut self) -> Result<(), Error> {
        self.types_to_expect = self.registry.wildcard_kinds();
        loop {
            self.connection_id += 1;
            let id = self.connection_id;
            self.run_loop().instrument(info_span!("xds", id)).await;
            if self.channel.is_closed() {
                info!("xds client destroyed");
                return Ok(());
            }
            tokio::time::sleep(self.config.reconnect_backoff).await;
        }
    }

    async fn run_loop(&mut self) {
        match self.run_internal().await {
            Err(e @ Error::Connection(_, _)) => {
                warn!(
                    "xds client connection error: {}, retrying in {:?}",
                    e, self.config.reconnect_backoff
                );
                self.metrics
                    .increment(&ConnectionTerminationReason::ConnectionError);
            }
            Err(Error::GrpcStatus(status)) => {
                warn!(
                    "xds client error: {}, retrying in {:?}",
                    status, self.config.reconnect_backoff
                );
                self.metrics.increment(&ConnectionTerminationReason::Error);
            }
            Err(e) => {
                warn!("xds client error: {}, retrying", e);
                self.metrics.increment(&ConnectionTerminationReason::Error);
            }
            Ok(_) => {
                self.metrics
                    .increment(&ConnectionTerminationReason::Complete);
                debug!("xds client stream complete");
            }
        }
    }

    async fn run_internal(&mut self) -> Result<(), Error> {
        let (discovery_req_tx, mut discovery_req_rx) = mpsc::channel::<DiscoveryRequest>(100);
        let node = self.node();

        // One request per active type. Resuming with the last acked version
        // lets an unchanged server skip the re-push.
        let active = self.registry.active_kinds();
        // Last name set sent per kind on this stream. Subscription events
        // queued while the set was unchanged get dropped instead of echoed.
        let mut sent_names: HashMap<ResourceKind, Vec<String>> = active
            .iter()
            .map(|(kind, names)| (*kind, names.clone()))
            .collect();
        let initial_requests: Vec<DiscoveryRequest> = active
            .into_iter()
            .map(|(kind, names)| DiscoveryRequest {
                type_url: kind.type_url().to_string(),
                node: Some(node.clone()),
                resource_names: names,
                version_info: self.last_acked.get(&kind).cloned().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        let outbound = async_stream::stream! {
            for initial in initial_requests {
                debug!(resources=initial.resource_names.len(), type_url=initial.type_url, "sending initial request");
                yield initial;
            }
            while let Some(message) = discovery_req_rx.recv().await {
                debug!(type_url=message.type_url, "sending request");
                yield message
            }
            warn!("outbound stream complete");
        };

        let mut response_stream = self.channel.open(outbound).await?;
        info!("stream established");

        // Nonces are scoped to this stream; never resumed across reconnects.
        let mut nonces: HashMap<ResourceKind, String> = HashMap::new();
        loop {
            tokio::select! {
                event = self.events.recv() => {
                    match event {
                        Some(ObserverEvent::Resubscribe(kind)) => {
                            self.handle_resubscribe(kind, &nonces, &mut sent_names, &discovery_req_tx).await?;
                        }
                        Some(ObserverEvent::Shutdown) => return Ok(()),
                        None => {
                            // Every observer handle is gone; nothing can
                            // subscribe or destroy anymore.
                            self.channel.close();
                            return Ok(());
                        }
                    }
                }
                msg = response_stream.message() => {
                    let Some(msg) = msg? else {
                        // Stream ended cleanly; reconnect unless destroyed.
                        return Ok(());
                    };
                    let received = ResourceKind::from_type_url(&msg.type_url).ok();
                    if let XdsSignal::Ack = self.handle_stream_event(msg, &mut nonces, &mut sent_names, &discovery_req_tx).await? {
                        if let Some(kind) = received {
                            self.mark_synced(kind);
                        }
                    }
                }
            }
        }
    }

    /// First clean ack of every wildcard type unblocks readiness.
    fn mark_synced(&mut self, kind: ResourceKind) {
        if self.types_to_expect.remove(&kind) && self.types_to_expect.is_empty() {
            mem::drop(mem::take(&mut self.block_ready));
        }
    }

    async fn handle_resubscribe(
        &mut self,
        kind: ResourceKind,
        nonces: &HashMap<ResourceKind, String>,
        sent_names: &mut HashMap<ResourceKind, Vec<String>>,
        send: &mpsc::Sender<DiscoveryRequest>,
    ) -> Result<(), Error> {
        let names = self.registry.names(kind);
        if sent_names.get(&kind) == Some(&names) {
            debug!(type_url=%kind, "subscription unchanged");
            return Ok(());
        }
        sent_names.insert(kind, names.clone());
        debug!(type_url=%kind, resources=names.len(), "subscription change");
        send.send(DiscoveryRequest {
            type_url: kind.type_url().to_string(),
            resource_names: names,
            version_info: self.last_acked.get(&kind).cloned().unwrap_or_default(),
            response_nonce: nonces.get(&kind).cloned().unwrap_or_default(),
            ..Default::default()
        })
        .await
        .map_err(|e| Error::RequestFailure(Box::new(e)))?;
        Ok(())
    }

    async fn handle_stream_event(
        &mut self,
        response: DiscoveryResponse,
        nonces: &mut HashMap<ResourceKind, String>,
        sent_names: &mut HashMap<ResourceKind, Vec<String>>,
        send: &mpsc::Sender<DiscoveryRequest>,
    ) -> Result<XdsSignal, Error> {
        let Ok(kind) = ResourceKind::from_type_url(&response.type_url) else {
            // Not a type we model; drop it without acking.
            error!(type_url = response.type_url, "unknown type");
            return Ok(XdsSignal::Nack);
        };
        self.metrics.record(&response, ());
        info!(
            type_url = %kind,
            size = response.resources.len(),
            "received response"
        );

        let rejects = match self.registry.raw(kind) {
            Some(handler) => handler.handle_snapshot(&response.resources),
            None => {
                // Nothing registered for a known type: server pushed
                // something we never asked for. Ack it to stay in sync.
                warn!(type_url = %kind, "response for unregistered type");
                Vec::new()
            }
        };

        let nonce = response.nonce.clone();
        nonces.insert(kind, nonce.clone());

        let (response_type, error) = if rejects.is_empty() {
            (XdsSignal::Ack, None)
        } else {
            let error = rejects
                .into_iter()
                .map(|reject| reject.to_string())
                .collect::<Vec<String>>()
                .join("; ");
            (XdsSignal::Nack, Some(error))
        };

        // Ack moves our version forward; nack repeats the last good one.
        let version_info = match response_type {
            XdsSignal::Ack => {
                self.last_acked.insert(kind, response.version_info.clone());
                response.version_info
            }
            XdsSignal::Nack => self.last_acked.get(&kind).cloned().unwrap_or_default(),
        };

        match response_type {
            XdsSignal::Nack => error!(
                type_url=%kind,
                nonce,
                "type"=?response_type,
                error,
                "sending response",
            ),
            _ => debug!(
                type_url=%kind,
                nonce,
                "type"=?response_type,
                "sending response",
            ),
        };

        let names = self.registry.names(kind);
        sent_names.insert(kind, names.clone());
        send.send(DiscoveryRequest {
            type_url: kind.type_url().to_string(),
            version_info,
            response_nonce: nonce,
            resource_names: names,
            error_detail: error.map(|msg| Status {
                message: msg,
                ..Default::default()
            }),
            ..Default::default()
        })
        .await
        .map_err(|e| Error::RequestFailure(Box::new(e)))
        .map(|_| response_type)
    }

    fn build_struct<T: IntoIterator<Item = (S, S)>, S: ToString>(a: T) -> Struct {
        let fields = BTreeMap::from_iter(a.into_iter().map(|(k, v)| {
            (
                k.to_string(),
                Value {
                    kind: Some(Kind::StringValue(v.to_string())),
                },
            )
        }));
        Struct { fields }
    }

    fn json_to_struct(json: serde_json::Map<String, serde_json::Value>) -> prost_types::Struct {
        prost_types::Struct {
            fields: json
                .into_iter()
                .map(|(k, v)| (k, Self::json_to_value(v)))
                .collect(),
        }
    }

    fn json_to_value(json: serde_json::Value) -> prost_types::Value {
        use prost_types::value::Kind::*;
        use serde_json::Value::*;

        prost_types::Value {
            kind: Some(match json {
                Null => NullValue(0),
                Bool(v) => BoolValue(v),
                Number(n) => NumberValue(n.as_f64().unwrap_or_else(|| {
                    error!("error parsing JSON number: {}", n);
                    0f64
                })),
                String(s) => StringValue(s),
                Array(v) => ListValue(prost_types::ListValue {
                    values: v.into_iter().map(Self::json_to_value).collect(),
                }),
                Object(v) => StructValue(Self::json_to_struct(v)),
            }),
        }
    }

    fn node(&self) -> Node {
        let ip = std::env::var(INSTANCE_IP);
        let ip = ip.as_deref().unwrap_or(DEFAULT_IP);
        let pod_name = std::env::var(POD_NAME);
        let pod_name = pod_name.as_deref().unwrap_or(EMPTY_STR);
        let ns = std::env::var(POD_NAMESPACE);
        let ns = ns.as_deref().unwrap_or(EMPTY_STR);
        let node_name = std::env::var(NODE_NAME);
        let node_name = node_name.as_deref().unwrap_or(EMPTY_STR);
        let mut metadata = Self::build_struct([
            ("NAME", pod_name),
            ("NAMESPACE", ns),
            ("INSTANCE_IPS", ip),
            ("NODE_NAME", node_name),
        ]);
        metadata
            .fields
            .append(&mut Self::build_struct(self.config.node_metadata.clone()).fields);

        // XDS_METAJSON_* environment variables merge into the node metadata
        // as parsed JSON values.
        for (key, val) in std::env::vars().filter(|(key, _)| key.starts_with(XDS_METAJSON_PREFIX)) {
            if let Ok(v) = serde_json::from_str(&val) {
                metadata.fields.insert(
                    key.trim_start_matches(XDS_METAJSON_PREFIX).to_string(),
                    Self::json_to_value(v),
                );
            } else {
                error!("failed to parse {}={}", key, val);
            }
        }

        Node {
            id: format!("sidecar~{ip}~{pod_name}.{ns}~{ns}.svc.cluster.local"),
            cluster: self.config.cluster.clone(),
            metadata: Some(metadata),
            locality: self.config.locality.as_ref().map(|l| Locality {
                region: l.region.clone(),
                zone: l.zone.clone(),
                sub_zone: l.sub_zone.clone(),
            }),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use prost_types::value::Kind;

    use super::*;
    use crate::test_helpers::helpers::initialize_telemetry;
    use crate::test_helpers::xds::AdsServer;
    use crate::test_helpers::xds_resources::{cluster_any, listener_any};
    use crate::xds::resource::{
        CLUSTER_TYPE, ClusterType, LISTENER_TYPE, ListenerType, ListenerUpdate,
    };

    const TEST_TIMEOUT: Duration = Duration::from_secs(2);

    fn value_of(s: &str) -> serde_json::Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn test_json_to_value() {
        let value = AdsWorker::json_to_value(value_of(r#"{"a":[1,"b",{"c":null}]}"#));
        let Some(Kind::StructValue(s)) = value.kind else {
            panic!("expected struct, got {value:?}");
        };
        let Some(Kind::ListValue(list)) = s.fields.get("a").and_then(|v| v.kind.clone()) else {
            panic!("expected list");
        };
        assert_eq!(list.values.len(), 3);
        assert_eq!(list.values[0].kind, Some(Kind::NumberValue(1.0)));
        assert_eq!(
            list.values[1].kind,
            Some(Kind::StringValue("b".to_string()))
        );
    }

    #[tokio::test]
    async fn concurrent_registration_yields_one_adapter() {
        initialize_telemetry();
        let (observer, _worker) = AdsObserver::new(
            Arc::new(crate::test_helpers::test_config("http://127.0.0.1:1")),
            Metrics::new(&mut prometheus_client::registry::Registry::default()),
            watch::channel(()).0,
        );

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let observer = observer.clone();
            tasks.push(tokio::spawn(async move {
                observer.register::<ClusterType>(true)
            }));
        }
        let mut adapters = Vec::new();
        for t in tasks {
            adapters.push(t.await.unwrap());
        }
        for a in &adapters[1..] {
            assert!(Arc::ptr_eq(a, &adapters[0]));
        }
    }

    #[tokio::test]
    async fn acks_carry_version_and_nonce() {
        initialize_telemetry();
        let (server, observer, _worker_handle) = AdsServer::spawn().await;
        observer.register::<ListenerType>(true);

        let mut conn = server.next_connection(TEST_TIMEOUT).await;
        let req = conn.next_request(TEST_TIMEOUT).await;
        assert_eq!(req.type_url, LISTENER_TYPE);
        assert_eq!(req.version_info, "");

        conn.push(LISTENER_TYPE, "v1", "n1", vec![listener_any("lds", &["routes"])])
            .await;
        let ack = conn.next_request(TEST_TIMEOUT).await;
        assert_eq!(ack.type_url, LISTENER_TYPE);
        assert_eq!(ack.version_info, "v1");
        assert_eq!(ack.response_nonce, "n1");
        assert!(ack.error_detail.is_none());

        observer.destroy();
    }

    #[tokio::test]
    async fn rejected_resources_nack_with_last_good_version() {
        initialize_telemetry();
        let (server, observer, _worker_handle) = AdsServer::spawn().await;
        observer.register::<ClusterType>(true);

        let mut conn = server.next_connection(TEST_TIMEOUT).await;
        conn.next_request(TEST_TIMEOUT).await;

        conn.push(CLUSTER_TYPE, "v1", "n1", vec![cluster_any("good", None)])
            .await;
        let ack = conn.next_request(TEST_TIMEOUT).await;
        assert_eq!(ack.version_info, "v1");

        conn.push(
            CLUSTER_TYPE,
            "v2",
            "n2",
            vec![prost_types::Any {
                type_url: CLUSTER_TYPE.to_string(),
                value: vec![0xff, 0xff],
            }],
        )
        .await;
        let nack = conn.next_request(TEST_TIMEOUT).await;
        assert_eq!(nack.response_nonce, "n2");
        // Version stays at the last accepted snapshot.
        assert_eq!(nack.version_info, "v1");
        assert!(nack.error_detail.is_some());

        observer.destroy();
    }

    #[tokio::test]
    async fn reconnects_after_fixed_backoff_and_resubscribes() {
        initialize_telemetry();
        let (server, observer, _worker_handle) = AdsServer::spawn().await;
        let listeners = observer.register::<ListenerType>(true);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let s = seen.clone();
        listeners.subscribe(
            "lds",
            Arc::new(move |u: &ListenerUpdate| {
                s.lock().unwrap().push(u.route_configs.len());
            }),
        );

        let mut conn = server.next_connection(TEST_TIMEOUT).await;
        conn.next_request(TEST_TIMEOUT).await;
        conn.push(LISTENER_TYPE, "v1", "n1", vec![listener_any("lds", &["routes"])])
            .await;
        conn.next_request(TEST_TIMEOUT).await;
        drop(conn);

        // The next connection only arrives after the fixed backoff elapses.
        let mut conn = server.next_connection(TEST_TIMEOUT).await;
        let req = conn.next_request(TEST_TIMEOUT).await;
        assert_eq!(req.type_url, LISTENER_TYPE);
        // The new stream resumes from the acked version with a fresh nonce.
        assert_eq!(req.version_info, "v1");
        assert_eq!(req.response_nonce, "");

        // Cached data survived the outage.
        assert!(listeners.cached("lds").is_some());
        observer.destroy();
    }

    #[tokio::test]
    async fn destroy_stops_reconnecting() {
        initialize_telemetry();
        let (server, observer, worker_handle) = AdsServer::spawn().await;
        observer.register::<ListenerType>(true);
        let mut conn = server.next_connection(TEST_TIMEOUT).await;
        conn.next_request(TEST_TIMEOUT).await;

        observer.destroy();
        assert!(observer.is_destroyed());
        // The worker task winds down instead of backing off and retrying.
        tokio::time::timeout(TEST_TIMEOUT, worker_handle)
            .await
            .expect("worker should exit after destroy")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn dropped_last_handle_stops_worker() {
        initialize_telemetry();
        let (server, observer, worker_handle) = AdsServer::spawn().await;
        observer.register::<ListenerType>(true);
        let mut conn = server.next_connection(TEST_TIMEOUT).await;
        conn.next_request(TEST_TIMEOUT).await;

        // The registry's hold on the driver must not count as ownership.
        drop(observer);
        tokio::time::timeout(TEST_TIMEOUT, worker_handle)
            .await
            .expect("worker should exit once every handle is gone")
            .unwrap()
            .unwrap();
    }
}
