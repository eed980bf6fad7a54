//! Reconciler configuration.
//!
//! The host binary flattens [`NetworkArgs`] into its own CLI and converts it
//! into a [`ReconcilerConfig`] once at startup.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::waiter::WaitOptions;

pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid network provider {0:?}, expected one of: NAMED, VSPHERE_NETWORK, NSXT")]
    UnknownProvider(String),

    #[error("network poll interval must be greater than zero")]
    ZeroPollInterval,
}

/// Network provider the control plane runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NetworkEnvironment {
    /// Networks that already exist in the inventory.
    #[default]
    Named,
    /// vSphere Distributed Switch through net-operator.
    Vds,
    /// NSX-T overlay through NCP.
    Nsxt,
}

impl NetworkEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkEnvironment::Named => "NAMED",
            NetworkEnvironment::Vds => "VSPHERE_NETWORK",
            NetworkEnvironment::Nsxt => "NSXT",
        }
    }
}

impl FromStr for NetworkEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "NAMED" => Ok(NetworkEnvironment::Named),
            "VSPHERE_NETWORK" => Ok(NetworkEnvironment::Vds),
            "NSXT" => Ok(NetworkEnvironment::Nsxt),
            _ => Err(ConfigError::UnknownProvider(s.to_string())),
        }
    }
}

impl fmt::Display for NetworkEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for NetworkEnvironment {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<NetworkEnvironment> for String {
    fn from(env: NetworkEnvironment) -> Self {
        env.as_str().to_string()
    }
}

/// Command-line and environment options for network provisioning.
#[derive(clap::Args, Debug, Clone)]
pub struct NetworkArgs {
    /// Network provider: NAMED, VSPHERE_NETWORK or NSXT (empty selects NAMED)
    #[arg(long, env = "NETWORK_PROVIDER", default_value = "")]
    pub network_provider: String,

    /// Seconds to wait for a network interface to become ready
    #[arg(long, env = "NETWORK_RETRY_TIMEOUT", default_value = "15")]
    pub network_retry_timeout: u64,

    /// Milliseconds between readiness checks
    #[arg(long, env = "NETWORK_POLL_INTERVAL_MS", default_value = "100")]
    pub network_poll_interval_ms: u64,
}

/// Settings injected into the reconciler at construction.
///
/// Every constructor rejects a zero poll interval, so fields are read
/// through accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ReconcilerConfigFile", rename_all = "camelCase")]
pub struct ReconcilerConfig {
    pub(crate) environment: NetworkEnvironment,
    #[serde(with = "humantime_serde")]
    retry_timeout: Duration,
    #[serde(with = "humantime_serde")]
    poll_interval: Duration,
}

/// Unvalidated serde form of [`ReconcilerConfig`], e.g.
/// `{"environment": "NSXT", "retryTimeout": "30s", "pollInterval": "100ms"}`.
#[derive(Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ReconcilerConfigFile {
    environment: NetworkEnvironment,
    #[serde(with = "humantime_serde")]
    retry_timeout: Duration,
    #[serde(with = "humantime_serde")]
    poll_interval: Duration,
}

impl Default for ReconcilerConfigFile {
    fn default() -> Self {
        Self {
            environment: NetworkEnvironment::Named,
            retry_timeout: DEFAULT_RETRY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl TryFrom<ReconcilerConfigFile> for ReconcilerConfig {
    type Error = ConfigError;

    fn try_from(file: ReconcilerConfigFile) -> Result<Self, Self::Error> {
        ReconcilerConfig::new(file.environment)
            .with_retry_timeout(file.retry_timeout)
            .with_poll_interval(file.poll_interval)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            environment: NetworkEnvironment::Named,
            retry_timeout: DEFAULT_RETRY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ReconcilerConfig {
    pub fn new(environment: NetworkEnvironment) -> Self {
        Self {
            environment,
            ..Default::default()
        }
    }

    /// Zero means a single readiness check. A timeout too large for the
    /// clock never expires.
    pub fn with_retry_timeout(mut self, timeout: Duration) -> Self {
        self.retry_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        self.poll_interval = interval;
        Ok(self)
    }

    pub fn environment(&self) -> NetworkEnvironment {
        self.environment
    }

    pub fn retry_timeout(&self) -> Duration {
        self.retry_timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout: self.retry_timeout,
            interval: self.poll_interval,
        }
    }
}

impl TryFrom<NetworkArgs> for ReconcilerConfig {
    type Error = ConfigError;

    fn try_from(args: NetworkArgs) -> Result<Self, Self::Error> {
        ReconcilerConfig::new(args.network_provider.parse()?)
            .with_retry_timeout(Duration::from_secs(args.network_retry_timeout))
            .with_poll_interval(Duration::from_millis(args.network_poll_interval_ms))
    }
}
