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
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, RwLock};

use prost_types::Any;
use tracing::{debug, error};

use super::resource::{ResourceKind, XdsResourceType};

/// Per-resource callback. Invoked synchronously on the stream task, so it
/// must not block.
pub type UpdateListener<U> = Arc<dyn Fn(&U) + Send + Sync>;

/// Group callback: fires once per response with the map of changed members
/// and the names a wildcard snapshot removed.
pub type GroupListener<U> = Arc<dyn Fn(&HashMap<String, U>, &BTreeSet<String>) + Send + Sync>;

#[derive(Debug)]
pub struct RejectedConfig {
    name: String,
    reason: anyhow::Error,
}

impl RejectedConfig {
    pub fn new(name: String, reason: anyhow::Error) -> Self {
        Self { name, reason }
    }
}

impl Display for RejectedConfig {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.reason)
    }
}

/// Requests a wire-level re-snapshot of a type's subscription set. The
/// observer implements this; tests substitute a recording driver.
pub(crate) trait SubscriptionDriver: Send + Sync + 'static {
    fn adjust(&self, kind: ResourceKind);
}

/// Type-erased view of an adapter, used by the stream worker which only sees
/// the wire type URL of a response.
pub(crate) trait RawProtocol: Send + Sync + 'static {
    fn kind(&self) -> ResourceKind;
    fn is_wildcard(&self) -> bool;
    /// Union of resource names that currently have at least one listener.
    fn subscribed_names(&self) -> Vec<String>;
    fn handle_snapshot(&self, resources: &[Any]) -> Vec<RejectedConfig>;
}

/// Bridges raw per-type responses to application-level consumers: parses,
/// caches, detects value-level changes, and fans out.
///
/// Listener registries are behind read/write locks; dispatch takes read
/// locks so concurrent reads proceed, subscribe/unsubscribe are exclusive.
pub struct XdsProtocol<R: XdsResourceType> {
    wildcard: bool,
    driver: Arc<dyn SubscriptionDriver>,
    cache: RwLock<HashMap<String, R::Update>>,
    listeners: RwLock<HashMap<String, Vec<UpdateListener<R::Update>>>>,
    /// Group listeners keyed by their name set; an empty set means every name.
    groups: RwLock<Vec<(BTreeSet<String>, GroupListener<R::Update>)>>,
}

impl<R: XdsResourceType> XdsProtocol<R> {
    pub(crate) fn new(wildcard: bool, driver: Arc<dyn SubscriptionDriver>) -> Self {
        Self {
            wildcard,
            driver,
            cache: Default::default(),
            listeners: Default::default(),
            groups: Default::default(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        R::KIND
    }

    /// Registers interest in `name`. The first listener for a name grows the
    /// wire-level subscription set; a cached value is replayed synchronously
    /// before this returns, with no wire request.
    pub fn subscribe(&self, name: &str, listener: UpdateListener<R::Update>) {
        let first = {
            let mut listeners = self.listeners.write().expect("listener lock poisoned");
            let entry = listeners.entry(name.to_string()).or_default();
            let first = entry.is_empty();
            entry.push(listener.clone());
            // Replay happens under the registration lock. A concurrent
            // snapshot dispatches either before or after it, never both.
            if let Some(cached) = self.cached(name) {
                listener(&cached);
            }
            first
        };
        if first && !self.wildcard {
            self.driver.adjust(R::KIND);
        }
    }

    /// Removes a listener previously passed to `subscribe`, matched by `Arc`
    /// identity. Dropping the last listener for a name shrinks the wire-level
    /// subscription set on the next request; it does not cancel in-flight ones.
    pub fn unsubscribe(&self, name: &str, listener: &UpdateListener<R::Update>) {
        let emptied = {
            let mut listeners = self.listeners.write().expect("listener lock poisoned");
            let Some(entry) = listeners.get_mut(name) else {
                return;
            };
            entry.retain(|l| !Arc::ptr_eq(l, listener));
            if entry.is_empty() {
                listeners.remove(name);
                true
            } else {
                false
            }
        };
        if emptied && !self.wildcard {
            self.driver.adjust(R::KIND);
        }
    }

    /// Registers a callback against a set of names, fired once with the map
    /// of changed members whenever any of them changes. An empty set watches
    /// every name of this type.
    pub fn subscribe_group(&self, names: BTreeSet<String>, listener: GroupListener<R::Update>) {
        let named = !names.is_empty();
        self.groups
            .write()
            .expect("group lock poisoned")
            .push((names, listener));
        if named && !self.wildcard {
            self.driver.adjust(R::KIND);
        }
    }

    pub fn cached(&self, name: &str) -> Option<R::Update> {
        self.cache
            .read()
            .expect("cache lock poisoned")
            .get(name)
            .cloned()
    }

    fn names(&self) -> Vec<String> {
        if self.wildcard {
            return vec![];
        }
        let listeners = self.listeners.read().expect("listener lock poisoned");
        let groups = self.groups.read().expect("group lock poisoned");
        let names: BTreeSet<String> = listeners
            .keys()
            .cloned()
            .chain(groups.iter().flat_map(|(names, _)| names.iter().cloned()))
            .collect();
        names.into_iter().collect()
    }

    /// Applies one response snapshot: parse everything, keep going past
    /// individual failures, update the cache, and notify only on genuine
    /// change.
    fn apply_snapshot(&self, resources: &[Any]) -> Vec<RejectedConfig> {
        let mut rejects = Vec::new();
        let mut parsed = Vec::with_capacity(resources.len());
        for raw in resources {
            match R::parse(raw) {
                Ok(update) => parsed.push(update),
                Err(e) => rejects.push(RejectedConfig::new(
                    // The payload may be too mangled to even carry a name.
                    short_name(raw),
                    e.into(),
                )),
            }
        }

        // The per-name listener set is pinned across the cache update and
        // dispatch, so a listener subscribing mid-snapshot sees either the
        // replay or the dispatch, never both.
        let listeners = self.listeners.read().expect("listener lock poisoned");
        let mut changed: HashMap<String, R::Update> = HashMap::new();
        let mut removed: BTreeSet<String> = BTreeSet::new();
        {
            let mut cache = self.cache.write().expect("cache lock poisoned");
            let mut seen = BTreeSet::new();
            for update in parsed {
                let name = R::name(&update).to_string();
                seen.insert(name.clone());
                if cache.get(&name) == Some(&update) {
                    debug!(name, "resource unchanged");
                    continue;
                }
                cache.insert(name.clone(), update.clone());
                changed.insert(name, update);
            }
            // Wildcard responses are full snapshots: anything missing from
            // them is gone. Named subscriptions keep last-known values.
            if self.wildcard {
                cache.retain(|name, _| {
                    let keep = seen.contains(name);
                    if !keep {
                        debug!(name, "resource removed from snapshot");
                        removed.insert(name.clone());
                    }
                    keep
                });
            }
        }

        for (name, update) in &changed {
            if let Some(entry) = listeners.get(name) {
                for listener in entry {
                    listener(update);
                }
            }
        }
        drop(listeners);

        if !changed.is_empty() || !removed.is_empty() {
            let groups = self.groups.read().expect("group lock poisoned");
            for (names, listener) in groups.iter() {
                let matched: HashMap<String, R::Update> = changed
                    .iter()
                    .filter(|(name, _)| names.is_empty() || names.contains(*name))
                    .map(|(name, update)| (name.clone(), update.clone()))
                    .collect();
                let dropped: BTreeSet<String> = removed
                    .iter()
                    .filter(|name| names.is_empty() || names.contains(*name))
                    .cloned()
                    .collect();
                if !matched.is_empty() || !dropped.is_empty() {
                    listener(&matched, &dropped);
                }
            }
        }
        rejects
    }
}

fn short_name(raw: &Any) -> String {
    if raw.type_url.is_empty() {
        "<unnamed>".to_string()
    } else {
        raw.type_url.clone()
    }
}

impl<R: XdsResourceType> RawProtocol for XdsProtocol<R> {
    fn kind(&self) -> ResourceKind {
        R::KIND
    }

    fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    fn subscribed_names(&self) -> Vec<String> {
        self.names()
    }

    fn handle_snapshot(&self, resources: &[Any]) -> Vec<RejectedConfig> {
        let rejects = self.apply_snapshot(resources);
        for reject in &rejects {
            error!(%reject, "rejected resource");
        }
        rejects
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::test_helpers::xds_resources::*;
    use crate::xds::resource::{ClusterType, ClusterUpdate, EndpointType};

    #[derive(Default)]
    struct RecordingDriver {
        adjusted: Mutex<Vec<ResourceKind>>,
    }

    impl SubscriptionDriver for Arc<RecordingDriver> {
        fn adjust(&self, kind: ResourceKind) {
            self.adjusted.lock().unwrap().push(kind);
        }
    }

    fn cluster_protocol() -> (Arc<XdsProtocol<ClusterType>>, Arc<RecordingDriver>) {
        let driver = Arc::new(RecordingDriver::default());
        let protocol = Arc::new(XdsProtocol::<ClusterType>::new(
            false,
            Arc::new(driver.clone()),
        ));
        (protocol, driver)
    }

    fn counting_listener() -> (UpdateListener<ClusterUpdate>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let listener: UpdateListener<ClusterUpdate> = Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (listener, count)
    }

    #[test]
    fn identical_value_notifies_once() {
        let (protocol, _) = cluster_protocol();
        let (listener, count) = counting_listener();
        protocol.subscribe("svc-a", listener);

        let snapshot = vec![cluster_any("svc-a", None)];
        protocol.handle_snapshot(&snapshot);
        protocol.handle_snapshot(&snapshot);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // A genuinely new value fires again.
        protocol.handle_snapshot(&[cluster_any("svc-a", Some("svc-a-eds"))]);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscription_set_tracks_listener_union() {
        let (protocol, driver) = cluster_protocol();
        let (la, _) = counting_listener();
        let (lb, _) = counting_listener();
        protocol.subscribe("svc-a", la.clone());
        protocol.subscribe("svc-b", lb);
        assert_eq!(
            protocol.subscribed_names(),
            vec!["svc-a".to_string(), "svc-b".to_string()]
        );

        protocol.unsubscribe("svc-a", &la);
        assert_eq!(protocol.subscribed_names(), vec!["svc-b".to_string()]);
        // Two grows and one shrink, each a full re-snapshot request.
        assert_eq!(driver.adjusted.lock().unwrap().len(), 3);
    }

    #[test]
    fn second_listener_for_same_name_does_not_readjust() {
        let (protocol, driver) = cluster_protocol();
        let (la, _) = counting_listener();
        let (lb, _) = counting_listener();
        protocol.subscribe("svc-a", la);
        protocol.subscribe("svc-a", lb);
        assert_eq!(driver.adjusted.lock().unwrap().len(), 1);
    }

    #[test]
    fn malformed_resource_does_not_block_siblings() {
        let driver = Arc::new(RecordingDriver::default());
        let protocol = XdsProtocol::<EndpointType>::new(false, Arc::new(driver));
        let seen = Arc::new(Mutex::new(Vec::new()));
        for name in ["svc-a", "svc-b"] {
            let seen = seen.clone();
            protocol.subscribe(
                name,
                Arc::new(move |u: &crate::xds::resource::EndpointUpdate| {
                    seen.lock().unwrap().push(u.cluster_name.clone());
                }),
            );
        }

        let mut snapshot = vec![
            endpoints_any("svc-a", &[("10.0.0.1", 8080, true)]),
            endpoints_any("svc-b", &[("10.0.0.2", 8080, true)]),
        ];
        snapshot.insert(
            1,
            prost_types::Any {
                type_url: crate::xds::resource::ENDPOINT_TYPE.to_string(),
                value: vec![0xde, 0xad, 0xbe, 0xef],
            },
        );
        let rejects = protocol.handle_snapshot(&snapshot);
        assert_eq!(rejects.len(), 1);
        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["svc-a".to_string(), "svc-b".to_string()]);
    }

    #[test]
    fn cached_value_replays_on_subscribe() {
        let (protocol, driver) = cluster_protocol();
        let (la, _) = counting_listener();
        protocol.subscribe("svc-a", la);
        protocol.handle_snapshot(&[cluster_any("svc-a", None)]);

        let requests_before = driver.adjusted.lock().unwrap().len();
        let (lb, count) = counting_listener();
        protocol.subscribe("svc-a", lb);
        // Replayed synchronously, and no new wire request for an
        // already-subscribed name.
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(driver.adjusted.lock().unwrap().len(), requests_before);
    }

    #[test]
    fn group_listener_fires_once_with_changed_members() {
        let (protocol, _) = cluster_protocol();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let c = calls.clone();
        protocol.subscribe_group(
            BTreeSet::from(["svc-a".to_string(), "svc-b".to_string()]),
            Arc::new(
                move |changed: &HashMap<String, ClusterUpdate>, _removed: &BTreeSet<String>| {
                    let mut names: Vec<String> = changed.keys().cloned().collect();
                    names.sort();
                    c.lock().unwrap().push(names);
                },
            ),
        );

        protocol.handle_snapshot(&[
            cluster_any("svc-a", None),
            cluster_any("svc-b", None),
            cluster_any("svc-c", None),
        ]);
        // One invocation covering both changed members; svc-c is outside the group.
        assert_eq!(
            calls.lock().unwrap().clone(),
            vec![vec!["svc-a".to_string(), "svc-b".to_string()]]
        );
    }

    #[test]
    fn wildcard_snapshot_drops_absent_resources() {
        let driver = Arc::new(RecordingDriver::default());
        let protocol = XdsProtocol::<ClusterType>::new(true, Arc::new(driver));
        let removals = Arc::new(Mutex::new(Vec::new()));
        let r = removals.clone();
        protocol.subscribe_group(
            BTreeSet::new(),
            Arc::new(
                move |_changed: &HashMap<String, ClusterUpdate>, removed: &BTreeSet<String>| {
                    if !removed.is_empty() {
                        r.lock().unwrap().push(removed.clone());
                    }
                },
            ),
        );

        protocol.handle_snapshot(&[cluster_any("svc-a", None), cluster_any("svc-b", None)]);
        assert!(protocol.cached("svc-b").is_some());
        assert!(removals.lock().unwrap().is_empty());

        protocol.handle_snapshot(&[cluster_any("svc-a", None)]);
        assert!(protocol.cached("svc-b").is_none());
        assert!(protocol.cached("svc-a").is_some());
        // The group hears about what the snapshot dropped.
        assert_eq!(
            removals.lock().unwrap().clone(),
            vec![BTreeSet::from(["svc-b".to_string()])]
        );
    }

    #[test]
    fn replay_not_duplicated_by_concurrent_snapshot() {
        for _ in 0..64 {
            let (protocol, _) = cluster_protocol();
            let (listener, count) = counting_listener();
            let p = protocol.clone();
            let snapshot = std::thread::spawn(move || {
                p.handle_snapshot(&[cluster_any("svc-a", None)]);
            });
            protocol.subscribe("svc-a", listener);
            snapshot.join().unwrap();
            // Exactly one delivery: the replay, or the dispatch, never both.
            assert_eq!(count.load(Ordering::SeqCst), 1);
        }
    }
}
