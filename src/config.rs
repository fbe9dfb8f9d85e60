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

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

const XDS_ADDRESS: &str = "XDS_ADDRESS";
const CLUSTER_ID: &str = "CLUSTER_ID";
const LOCALITY: &str = "LOCALITY";
const XDS_RECONNECT_BACKOFF: &str = "XDS_RECONNECT_BACKOFF";
const XDS_BOOTSTRAP_TIMEOUT: &str = "XDS_BOOTSTRAP_TIMEOUT";

const DEFAULT_XDS_ADDRESS: &str = "http://localhost:15010";
const DEFAULT_CLUSTER: &str = "Kubernetes";
const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(3);
const DEFAULT_BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_MAX_GRPC_MESSAGE_SIZE: usize = 200 * 1024 * 1024;

#[derive(serde::Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Locality {
    pub region: String,
    pub zone: String,
    pub sub_zone: String,
}

impl FromStr for Locality {
    type Err = String;

    /// Parses `region/zone/subzone`; trailing parts may be omitted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        let region = parts.next().unwrap_or_default().to_string();
        if region.is_empty() {
            return Err(format!("locality must name a region: {s:?}"));
        }
        Ok(Locality {
            region,
            zone: parts.next().unwrap_or_default().to_string(),
            sub_zone: parts.next().unwrap_or_default().to_string(),
        })
    }
}

#[derive(serde::Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Control plane address, in tonic endpoint form (scheme://host:port).
    pub xds_address: String,

    /// Cluster the node reports in its identity.
    pub cluster: String,
    pub locality: Option<Locality>,
    /// Extra string metadata carried on the node, merged under the
    /// `XDS_METAJSON_*` environment overrides.
    pub node_metadata: HashMap<String, String>,

    /// Fixed delay between reconnect attempts.
    pub reconnect_backoff: Duration,
    /// How long to wait for the first snapshot of every wildcard type.
    pub bootstrap_timeout: Duration,

    pub max_grpc_message_size: usize,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid env var {0}={1}")]
    EnvVar(String, String),
}

/// Wraps a Duration to parse human-friendly forms like "3s" or "10m".
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        duration_str::parse(s)
            .map(HumanDuration)
            .map_err(|e| e.to_string())
    }
}

fn parse<T: FromStr>(env: &str) -> Result<Option<T>, Error> {
    match std::env::var(env) {
        Ok(val) => val
            .parse()
            .map(|v| Some(v))
            .map_err(|_| Error::EnvVar(env.to_string(), val)),
        Err(_) => Ok(None),
    }
}

fn parse_default<T: FromStr>(env: &str, default: T) -> Result<T, Error> {
    parse(env).map(|v| v.unwrap_or(default))
}

pub fn parse_config() -> Result<Config, Error> {
    Ok(Config {
        xds_address: parse_default(XDS_ADDRESS, DEFAULT_XDS_ADDRESS.to_string())?,
        cluster: parse_default(CLUSTER_ID, DEFAULT_CLUSTER.to_string())?,
        locality: parse(LOCALITY)?,
        node_metadata: Default::default(),
        reconnect_backoff: parse(XDS_RECONNECT_BACKOFF)?
            .map(|d: HumanDuration| d.0)
            .unwrap_or(DEFAULT_RECONNECT_BACKOFF),
        bootstrap_timeout: parse(XDS_BOOTSTRAP_TIMEOUT)?
            .map(|d: HumanDuration| d.0)
            .unwrap_or(DEFAULT_BOOTSTRAP_TIMEOUT),
        max_grpc_message_size: DEFAULT_MAX_GRPC_MESSAGE_SIZE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locality_parsing() {
        let l: Locality = "us-east/zone-1/rack-2".parse().unwrap();
        assert_eq!(l.region, "us-east");
        assert_eq!(l.zone, "zone-1");
        assert_eq!(l.sub_zone, "rack-2");

        let l: Locality = "us-east".parse().unwrap();
        assert_eq!(l.region, "us-east");
        assert_eq!(l.zone, "");

        assert!("".parse::<Locality>().is_err());
    }
}
