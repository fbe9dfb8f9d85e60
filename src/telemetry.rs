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

use std::env;
use std::time::Instant;

use once_cell::sync::Lazy;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format;
use tracing_subscriber::{Layer, Registry, prelude::*};

pub static APPLICATION_START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

pub fn setup_logging() {
    Lazy::force(&APPLICATION_START_TIME);
    tracing_subscriber::registry()
        .with(fmt_layer().with_filter(env_filter()))
        .init();
}

fn json_fmt() -> Box<dyn Layer<Registry> + Send + Sync + 'static> {
    let format = tracing_subscriber::fmt::format().json().flatten_event(true);
    let format = tracing_subscriber::fmt::layer()
        .event_format(format)
        .fmt_fields(format::JsonFields::default());
    Box::new(format)
}

fn plain_fmt() -> Box<dyn Layer<Registry> + Send + Sync + 'static> {
    Box::new(tracing_subscriber::fmt::layer())
}

fn fmt_layer() -> Box<dyn Layer<Registry> + Send + Sync + 'static> {
    if env::var("LOG_FORMAT").unwrap_or("plain".to_string()) == "json" {
        json_fmt()
    } else {
        plain_fmt()
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_regex(false)
        .parse(env::var(EnvFilter::DEFAULT_ENV).unwrap_or("info".to_string()))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
