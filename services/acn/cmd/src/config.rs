//! Configuration handling for the ACN node.
//!
//! Settings come from the YAML config file, then environment variables, then
//! the command line (applied in `main`).

use acn_wire::{Cid, VECTOR_ROOT_E131_DATA};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Which widget protocol the serial device speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    /// Generic USB Pro
    #[default]
    #[value(name = "usbpro")]
    UsbPro,
    /// Arduino DMX USB
    Arduino,
}

/// Serial widget configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Serial device path
    pub device: PathBuf,
    /// Widget protocol
    #[serde(default)]
    pub kind: WidgetKind,
}

/// ACN node configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Component identifier, generated at startup when unset
    pub cid: Option<Cid>,
    /// UDP listen address
    pub listen: SocketAddr,
    /// Destinations for the periodic test payload
    pub destinations: Vec<SocketAddr>,
    /// Interval of the periodic test payload
    pub send_interval: Duration,
    /// Root vector of sent and logged PDUs
    pub vector: u32,
    /// Optional serial widget
    pub widget: Option<WidgetConfig>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            cid: None,
            listen: SocketAddr::from(([0, 0, 0, 0], acn_root::ACN_PORT)),
            destinations: Vec::new(),
            send_interval: Duration::from_secs(1),
            vector: VECTOR_ROOT_E131_DATA,
            widget: None,
        }
    }
}

/// Root of the config file
#[derive(Debug, Deserialize)]
struct RootConfig {
    acn: Option<FileConfig>,
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    cid: Option<Cid>,
    listen: Option<SocketAddr>,
    destinations: Option<Vec<SocketAddr>>,
    send_interval: Option<String>,
    vector: Option<u32>,
    widget: Option<WidgetConfig>,
}

impl NodeConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let mut config = Self::default();

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root_config) => {
                    config.apply_root_config(root_config);
                    info!("Loaded configuration from {:?}", path);
                }
                Err(e) => warn!("Failed to parse config file {:?}, using defaults: {}", path, e),
            },
            Err(_) => warn!("Config file {:?} not found, using defaults", path),
        }

        config.apply_environment_overrides(|key| std::env::var(key).ok());

        info!(
            "Final node configuration: listen={}, destinations={}, vector={:#x}, widget={}",
            config.listen,
            config.destinations.len(),
            config.vector,
            config
                .widget
                .as_ref()
                .map_or_else(|| "none".to_string(), |w| w.device.display().to_string())
        );

        Ok(config)
    }

    fn apply_root_config(&mut self, root_config: RootConfig) {
        let Some(file) = root_config.acn else {
            return;
        };

        if let Some(cid) = file.cid {
            self.cid = Some(cid);
        }
        if let Some(listen) = file.listen {
            self.listen = listen;
        }
        if let Some(destinations) = file.destinations {
            self.destinations = destinations;
        }
        if let Some(interval) = file.send_interval {
            match humantime::parse_duration(&interval) {
                Ok(interval) => self.send_interval = interval,
                Err(e) => warn!("Ignoring send_interval {:?}: {}", interval, e),
            }
        }
        if let Some(vector) = file.vector {
            self.vector = vector;
        }
        if file.widget.is_some() {
            self.widget = file.widget;
        }
    }

    /// Apply overrides from `ACN_*` variables looked up through `var`
    fn apply_environment_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(cid) = var("ACN_CID") {
            match cid.parse::<Cid>() {
                Ok(cid) => {
                    self.cid = Some(cid);
                    info!("CID overridden by environment: {}", cid);
                }
                Err(e) => warn!("Ignoring ACN_CID: {}", e),
            }
        }

        if let Some(listen) = var("ACN_LISTEN") {
            match listen.parse::<SocketAddr>() {
                Ok(addr) => {
                    self.listen = addr;
                    info!("Listen address overridden by environment: {}", addr);
                }
                Err(e) => warn!("Ignoring ACN_LISTEN: {}", e),
            }
        }

        if let Some(destinations) = var("ACN_DESTINATIONS") {
            let parsed: Result<Vec<SocketAddr>, _> = destinations
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse)
                .collect();
            match parsed {
                Ok(addrs) => {
                    info!("Destinations overridden by environment: {:?}", addrs);
                    self.destinations = addrs;
                }
                Err(e) => warn!("Ignoring ACN_DESTINATIONS: {}", e),
            }
        }

        if let Some(device) = var("ACN_WIDGET") {
            let kind = self.widget.as_ref().map(|w| w.kind).unwrap_or_default();
            info!("Widget device overridden by environment: {}", device);
            self.widget = Some(WidgetConfig {
                device: PathBuf::from(device),
                kind,
            });
        }
    }
}
