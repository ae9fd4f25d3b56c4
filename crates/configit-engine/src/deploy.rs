//! Deployment executor - applies configs wave by wave.

use chrono::{DateTime, Utc};
use configit_core::client::ApiClient;
use configit_core::config::{Identity, NAME_PARAMETER, SCOPE_PARAMETER};
use configit_core::project::{configs_for_environment, environments};
use configit_core::{
    ClientSet, Config, ConfigKind, Coordinate, Payload, Project, RemoteObject, ResolutionContext,
    ResolvedEntity, RunId,
};
use futures::StreamExt;
use futures::stream;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationFlag;
use crate::error::{DeployError, GraphError};
use crate::graph::DependencyGraph;
use crate::sort::{Wave, sort_waves};

/// Default number of configs applied at the same time within a wave.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Why a config was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The config is marked `skip`.
    Explicit,
    /// A config it depends on failed or was skipped because of a failure.
    DependencyFailed { dependency: Coordinate },
}

/// State of a config during a deployment.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConfigState {
    Pending,
    Resolving,
    Deployed { remote_id: String },
    Failed { error: DeployError },
    Skipped { reason: SkipReason },
}

impl ConfigState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConfigState::Deployed { .. } | ConfigState::Failed { .. } | ConfigState::Skipped { .. }
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ConfigState::Deployed { .. })
    }
}

/// Tunables for a deployment.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Maximum number of configs applied concurrently within one wave.
    pub concurrency: usize,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Result of deploying one environment.
#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub run_id: RunId,
    pub environment: String,
    pub waves: Vec<Wave>,
    #[serde(serialize_with = "serialize_states")]
    pub states: BTreeMap<Coordinate, ConfigState>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

fn serialize_states<S: Serializer>(
    states: &BTreeMap<Coordinate, ConfigState>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(states.iter().map(|(c, s)| (c.to_string(), s)))
}

impl DeployReport {
    /// True when every config was deployed or explicitly skipped.
    pub fn is_success(&self) -> bool {
        self.states.values().all(|s| {
            matches!(
                s,
                ConfigState::Deployed { .. }
                    | ConfigState::Skipped {
                        reason: SkipReason::Explicit
                    }
            )
        })
    }

    /// Every config that failed, with its error.
    pub fn failures(&self) -> Vec<(&Coordinate, &DeployError)> {
        self.states
            .iter()
            .filter_map(|(coordinate, state)| match state {
                ConfigState::Failed { error } => Some((coordinate, error)),
                _ => None,
            })
            .collect()
    }

    pub fn state(&self, coordinate: &Coordinate) -> Option<&ConfigState> {
        self.states.get(coordinate)
    }

    pub fn deployed_count(&self) -> usize {
        self.states.values().filter(|s| s.is_success()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| matches!(s, ConfigState::Skipped { .. }))
            .count()
    }
}

/// Per-environment deployment outcome: structural errors stop an
/// environment before anything is applied.
pub type EnvironmentResult = Result<DeployReport, Vec<GraphError>>;

/// Applies configs against the platform.
pub struct Deployer {
    clients: ClientSet,
    options: DeployOptions,
    cancel: CancellationFlag,
}

impl Deployer {
    pub fn new(clients: ClientSet) -> Self {
        Self {
            clients,
            options: DeployOptions::default(),
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_options(mut self, options: DeployOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Deploy the given environments of all projects. Environments are
    /// independent and run concurrently; an empty list means every
    /// environment the projects define configs for.
    pub async fn deploy_projects(
        &self,
        projects: &[Project],
        environment_names: &[String],
    ) -> BTreeMap<String, EnvironmentResult> {
        let names: Vec<String> = if environment_names.is_empty() {
            environments(projects).into_iter().collect()
        } else {
            environment_names.to_vec()
        };

        let runs = names.into_iter().map(|environment| {
            let configs = configs_for_environment(projects, &environment);
            async move {
                let result = self.deploy_environment(&environment, configs).await;
                (environment, result)
            }
        });

        futures::future::join_all(runs).await.into_iter().collect()
    }

    /// Deploy one environment.
    ///
    /// Builds the dependency graph and waves first; structural errors are
    /// returned without touching the platform. Otherwise every config ends
    /// up in a terminal state in the returned report.
    pub async fn deploy_environment(
        &self,
        environment: &str,
        configs: Vec<Config>,
    ) -> EnvironmentResult {
        let run_id = RunId::new();
        let started_at = Utc::now();

        let graph = DependencyGraph::build(configs).inspect_err(|errors| {
            error!(%environment, errors = errors.len(), "Invalid configuration, skipping environment");
        })?;
        let waves = sort_waves(&graph).map_err(|e| vec![e])?;

        info!(%environment, %run_id, configs = graph.len(), waves = waves.len(), "Deploying environment");

        let mut states: BTreeMap<Coordinate, ConfigState> = graph
            .configs()
            .map(|c| (c.coordinate.clone(), ConfigState::Pending))
            .collect();
        let mut ctx = ResolutionContext::new();

        for (wave_idx, wave) in waves.iter().enumerate() {
            let mut runnable = Vec::new();
            for coordinate in wave {
                let Some(config) = graph.config(coordinate) else {
                    continue;
                };
                if config.skip {
                    info!(%coordinate, "Skipping config marked as skipped");
                    states.insert(
                        coordinate.clone(),
                        ConfigState::Skipped {
                            reason: SkipReason::Explicit,
                        },
                    );
                    continue;
                }
                if self.cancel.is_cancelled() {
                    states.insert(
                        coordinate.clone(),
                        ConfigState::Failed {
                            error: DeployError::Cancelled,
                        },
                    );
                    continue;
                }
                if let Some(blocked) = blocked_state(&graph, coordinate, &states) {
                    info!(%coordinate, state = ?blocked, "Not deploying config because of its dependencies");
                    states.insert(coordinate.clone(), blocked);
                    continue;
                }
                states.insert(coordinate.clone(), ConfigState::Resolving);
                runnable.push(config);
            }

            if runnable.is_empty() {
                continue;
            }
            info!(
                %environment,
                wave = wave_idx + 1,
                configs = runnable.len(),
                "Deploying wave"
            );

            // Workers only read the context; results are written after the
            // whole wave has finished.
            let ctx_ref = &ctx;
            let mut results: Vec<(Coordinate, Result<ResolvedEntity, DeployError>)> =
                stream::iter(runnable)
                    .map(|config| async move {
                        let result = self.deploy_config(config, ctx_ref).await;
                        (config.coordinate.clone(), result)
                    })
                    .buffer_unordered(self.options.concurrency.max(1))
                    .collect()
                    .await;
            results.sort_by(|a, b| a.0.cmp(&b.0));

            for (coordinate, result) in results {
                match result {
                    Ok(entity) => {
                        info!(%coordinate, remote_id = %entity.remote_id, "Config deployed");
                        states.insert(
                            coordinate,
                            ConfigState::Deployed {
                                remote_id: entity.remote_id.clone(),
                            },
                        );
                        ctx.insert(entity);
                    }
                    Err(e) => {
                        error!(%coordinate, error = %e, "Config failed");
                        states.insert(coordinate, ConfigState::Failed { error: e });
                    }
                }
            }
        }

        let report = DeployReport {
            run_id,
            environment: environment.to_string(),
            waves,
            states,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            %environment,
            deployed = report.deployed_count(),
            failed = report.failures().len(),
            skipped = report.skipped_count(),
            "Environment finished"
        );
        Ok(report)
    }

    /// Resolve, render and apply a single config.
    async fn deploy_config(
        &self,
        config: &Config,
        ctx: &ResolutionContext,
    ) -> Result<ResolvedEntity, DeployError> {
        if self.cancel.is_cancelled() {
            return Err(DeployError::Cancelled);
        }

        let mut values: BTreeMap<String, Value> = BTreeMap::new();
        for (name, parameter) in &config.parameters {
            let value = parameter
                .resolve(ctx)
                .map_err(|source| DeployError::Parameter {
                    name: name.clone(),
                    source,
                })?;
            values.insert(name.clone(), value);
        }

        let content = config.template.render(&values).map_err(DeployError::Render)?;
        let name = string_value(&values, NAME_PARAMETER);
        let scope = string_value(&values, SCOPE_PARAMETER);

        if config.config_type.kind() == ConfigKind::Settings && scope.is_none() {
            return Err(DeployError::MissingScope);
        }
        if config.config_type.identity() == Identity::Name && name.is_none() {
            return Err(DeployError::MissingName);
        }

        let payload = Payload {
            coordinate: config.coordinate.clone(),
            name,
            external_id: config.coordinate.external_id(),
            scope,
            content,
        };

        debug!(coordinate = %config.coordinate, "Applying config");
        let client = self.clients.client_for(&config.config_type);
        let remote_id = upsert(client.as_ref(), config, &payload).await?;

        Ok(ResolvedEntity::new(config.coordinate.clone(), remote_id).with_properties(values))
    }
}

/// Create-or-update that never creates a second object for the same config.
///
/// An origin object id is updated directly. Otherwise the existing object is
/// found by name or external id and updated, and only created when absent.
async fn upsert(
    client: &dyn ApiClient,
    config: &Config,
    payload: &Payload,
) -> Result<String, DeployError> {
    let config_type = &config.config_type;

    if let Some(origin_id) = &config.origin_object_id {
        match client.update(config_type, origin_id, payload).await {
            Ok(()) => return Ok(origin_id.clone()),
            Err(e) if e.is_not_found() => {
                warn!(
                    coordinate = %config.coordinate,
                    %origin_id,
                    "Origin object no longer exists, looking for a matching object"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    let existing = client.list_existing(config_type).await?;
    let matches: Vec<&RemoteObject> = existing
        .iter()
        .filter(|object| match config_type.identity() {
            Identity::Name => payload.name.is_some() && object.name == payload.name,
            Identity::ExternalId => {
                object.external_id.as_deref() == Some(payload.external_id.as_str())
            }
        })
        .collect();

    match matches.as_slice() {
        [] => Ok(client.create(config_type, payload).await?),
        [object] => {
            client.update(config_type, &object.id, payload).await?;
            Ok(object.id.clone())
        }
        many => Err(DeployError::Ambiguous {
            name: payload.name.clone().unwrap_or_default(),
            count: many.len(),
        }),
    }
}

fn string_value(values: &BTreeMap<String, Value>, key: &str) -> Option<String> {
    match values.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Decide whether a config can run given the states of its dependencies.
///
/// A failed dependency skips the config. A dependency that was skipped on
/// purpose fails it, since the reference can never be satisfied.
fn blocked_state(
    graph: &DependencyGraph,
    coordinate: &Coordinate,
    states: &BTreeMap<Coordinate, ConfigState>,
) -> Option<ConfigState> {
    let mut skipped_dependency = None;
    for dependency in graph.dependencies(coordinate) {
        match states.get(&dependency) {
            Some(ConfigState::Deployed { .. }) => {}
            Some(ConfigState::Skipped {
                reason: SkipReason::Explicit,
            }) => {
                skipped_dependency.get_or_insert(dependency);
            }
            _ => {
                return Some(ConfigState::Skipped {
                    reason: SkipReason::DependencyFailed { dependency },
                });
            }
        }
    }
    skipped_dependency.map(|dependency| ConfigState::Failed {
        error: DeployError::DependsOnSkipped { dependency },
    })
}
