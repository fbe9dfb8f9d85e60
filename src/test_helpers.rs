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

use std::time::Duration;

use crate::config;

pub mod helpers;
pub mod xds;
pub mod xds_resources;

/// A config pointed at `address` with timings tight enough for tests.
pub fn test_config(address: &str) -> config::Config {
    config::Config {
        xds_address: address.to_string(),
        cluster: "Kubernetes".to_string(),
        locality: None,
        node_metadata: Default::default(),
        reconnect_backoff: Duration::from_millis(100),
        bootstrap_timeout: Duration::from_secs(5),
        max_grpc_message_size: 4 * 1024 * 1024,
    }
}
