//! Interface reconciler - provisions all network interfaces of a VM.
//!
//! Request objects are resolved (found or created) sequentially in input
//! order, then every interface is waited on concurrently. The call returns
//! either all results, in input order, or a single error.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::backend::{Backend, BackendClients, NetworkBackend, RequestRef};
use crate::config::{NetworkEnvironment, ReconcilerConfig};
use crate::error::{NetworkError, Result};
use crate::types::{
    ClusterRef, DesiredInterfaceSpec, NetworkInterfaceResult, NetworkInterfaceResults, VmContext,
};
use crate::waiter::{wait_until_ready, WaitOptions};

/// Progress of one interface through a reconcile call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfacePhase {
    Resolving,
    Waiting,
    Ready,
    Normalized,
    Failed,
}

impl fmt::Display for InterfacePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InterfacePhase::Resolving => "resolving",
            InterfacePhase::Waiting => "waiting",
            InterfacePhase::Ready => "ready",
            InterfacePhase::Normalized => "normalized",
            InterfacePhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Provisions VM network interfaces against the configured backend.
pub struct InterfaceReconciler {
    config: ReconcilerConfig,
    backend: Arc<Backend>,
}

impl InterfaceReconciler {
    pub fn new(config: ReconcilerConfig, clients: BackendClients) -> Self {
        let backend = Backend::new(config.environment, clients);
        Self::with_backend(config, backend)
    }

    /// Uses a prebuilt backend. Its environment takes precedence over the one
    /// in `config`.
    pub fn with_backend(mut config: ReconcilerConfig, backend: Backend) -> Self {
        config.environment = backend.environment();
        Self {
            config,
            backend: Arc::new(backend),
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn environment(&self) -> NetworkEnvironment {
        self.config.environment
    }

    /// Creates (or finds) the backend request for every interface in `specs`
    /// and waits until all of them are ready.
    ///
    /// `cluster` scopes backing resolution for NSX-T; without it NSX-T
    /// results carry no backing. On failure no partial results are returned;
    /// the error is the one of the first failing interface in input order.
    pub async fn create_and_wait_for_network_interfaces(
        &self,
        vm: &VmContext,
        specs: &[DesiredInterfaceSpec],
        cluster: Option<&ClusterRef>,
        cancel: &CancellationToken,
    ) -> Result<NetworkInterfaceResults> {
        if specs.is_empty() {
            return Ok(NetworkInterfaceResults::default());
        }

        let span = info_span!(
            "network_interfaces",
            vm = %vm.name,
            namespace = %vm.namespace,
            environment = %self.config.environment,
        );
        self.reconcile(vm, specs, cluster, cancel)
            .instrument(span)
            .await
    }

    async fn reconcile(
        &self,
        vm: &VmContext,
        specs: &[DesiredInterfaceSpec],
        cluster: Option<&ClusterRef>,
        cancel: &CancellationToken,
    ) -> Result<NetworkInterfaceResults> {
        validate_specs(specs)?;

        let mut requests = Vec::with_capacity(specs.len());
        for spec in specs {
            if cancel.is_cancelled() {
                return Err(NetworkError::Cancelled {
                    interface: spec.name.clone(),
                });
            }
            debug!(interface = %spec.name, network = %spec.network.name, phase = %InterfacePhase::Resolving, "Resolving network interface");
            match self.backend.resolve(vm, spec).await {
                Ok(request) => requests.push(request),
                Err(e) => {
                    warn!(interface = %spec.name, phase = %InterfacePhase::Failed, error = %e, "Failed to resolve network interface");
                    return Err(e);
                }
            }
        }

        let opts = self.config.wait_options();
        let mut tasks = JoinSet::new();
        for (index, (spec, request)) in specs.iter().cloned().zip(requests).enumerate() {
            let backend = Arc::clone(&self.backend);
            let cluster = cluster.cloned();
            let cancel = cancel.clone();
            tasks.spawn(
                async move {
                    let outcome = wait_for_interface(
                        &backend,
                        &spec,
                        &request,
                        cluster.as_ref(),
                        opts,
                        &cancel,
                    )
                    .await;
                    (index, outcome)
                }
                .in_current_span(),
            );
        }

        let mut outcomes: Vec<Option<Result<NetworkInterfaceResult>>> =
            std::iter::repeat_with(|| None).take(specs.len()).collect();
        let mut next = 0;
        let mut lost = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    if let Err(e) = &outcome {
                        warn!(interface = %specs[index].name, phase = %InterfacePhase::Failed, error = %e, "Network interface not provisioned");
                    }
                    outcomes[index] = Some(outcome);
                }
                Err(e) => {
                    warn!(error = %e, "Network interface wait task failed");
                    lost = Some(e.to_string());
                }
            }

            while matches!(outcomes.get(next), Some(Some(Ok(_)))) {
                next += 1;
            }
            if let Some(Some(Err(e))) = outcomes.get_mut(next).map(Option::take) {
                // Dropping the set aborts the waits still running.
                debug!(pending = tasks.len(), "Aborting remaining network interface waits");
                return Err(e);
            }
        }

        let mut results = Vec::with_capacity(specs.len());
        for (spec, outcome) in specs.iter().zip(outcomes) {
            match outcome {
                Some(Ok(result)) => results.push(result),
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(NetworkError::TaskFailed {
                        interface: spec.name.clone(),
                        reason: lost.unwrap_or_else(|| "no result reported".to_string()),
                    })
                }
            }
        }

        info!(count = results.len(), "All network interfaces ready");
        Ok(NetworkInterfaceResults { results })
    }
}

/// Waits for one resolved interface and completes its result.
async fn wait_for_interface(
    backend: &Backend,
    spec: &DesiredInterfaceSpec,
    request: &RequestRef,
    cluster: Option<&ClusterRef>,
    opts: WaitOptions,
    cancel: &CancellationToken,
) -> Result<NetworkInterfaceResult> {
    debug!(interface = %spec.name, phase = %InterfacePhase::Waiting, "Waiting for network interface");
    let mut result = wait_until_ready(&spec.name, opts, cancel, move || {
        backend.check_ready(spec, request)
    })
    .await?;
    debug!(interface = %spec.name, phase = %InterfacePhase::Ready, ips = result.ip_configs.len(), "Network interface reported ready");

    result.apply_spec(spec);
    result.backing = backend
        .resolve_backing(&spec.name, &result, cluster)
        .await?;

    info!(
        interface = %spec.name,
        phase = %InterfacePhase::Normalized,
        network_id = %result.network_id,
        backing = ?result.backing,
        dhcp4 = result.dhcp4,
        "Network interface ready"
    );
    Ok(result)
}

/// Rejects duplicate interface names and malformed static addresses before
/// anything is created.
fn validate_specs(specs: &[DesiredInterfaceSpec]) -> Result<()> {
    let mut seen = HashSet::with_capacity(specs.len());
    for spec in specs {
        if !seen.insert(spec.name.as_str()) {
            return Err(NetworkError::DuplicateInterface {
                interface: spec.name.clone(),
            });
        }
        spec.static_networks()
            .map_err(|e| NetworkError::invalid_address(&spec.name, e))?;
    }
    Ok(())
}
