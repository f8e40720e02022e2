// Copyright 2025 Lablup Inc. and Jeongkyu Shin
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

//! Configuration file support.
//!
//! hostmap reads an optional YAML config from
//! `~/.config/hostmap/config.yaml`:
//!
//! ```yaml
//! defaults:
//!   jobs: 65
//!   timeout: 60
//! haproxy:
//!   default:
//!     user: lbadmin
//!     timeout: 2
//!   lb1.example.com:
//!     user: haproxy
//! ```
//!
//! A missing or unreadable file falls back to built-in defaults; settings
//! under `haproxy` are keyed by balancer hostname with a `default` section
//! applied first.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub defaults: RunDefaults,

    #[serde(default)]
    pub haproxy: HashMap<String, HaproxySettings>,
}

/// Default run options applied when the command line leaves them unset.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RunDefaults {
    pub jobs: Option<usize>,
    pub timeout: Option<u64>,
}

/// Per-balancer settings for the haproxy resolver.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HaproxySettings {
    pub user: Option<String>,
    pub timeout: Option<u64>,
}

static CONFIG: Lazy<Config> = Lazy::new(Config::load);

impl Config {
    /// The process-wide config, loaded once on first use.
    pub fn global() -> &'static Config {
        &CONFIG
    }

    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "hostmap")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Load the config file, falling back to defaults when absent or broken.
    pub fn load() -> Config {
        let Some(path) = Self::default_path() else {
            return Config::default();
        };
        Self::load_from(&path)
    }

    /// Load a specific config file, falling back to defaults.
    pub fn load_from(path: &std::path::Path) -> Config {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("ignoring malformed config {}: {e}", path.display());
                    Config::default()
                }
            },
            Err(_) => {
                tracing::debug!("no config file at {}, using defaults", path.display());
                Config::default()
            }
        }
    }

    /// Effective haproxy settings for a balancer: the `default` section
    /// overlaid with the balancer-specific one.
    pub fn haproxy_settings(&self, server: &str) -> HaproxySettings {
        let mut settings = self.haproxy.get("default").cloned().unwrap_or_default();
        if let Some(specific) = self.haproxy.get(server) {
            if specific.user.is_some() {
                settings.user = specific.user.clone();
            }
            if specific.timeout.is_some() {
                settings.timeout = specific.timeout;
            }
        }
        settings
    }
}
