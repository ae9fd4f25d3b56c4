//! Deletion of remote objects listed in a delete file.

use configit_core::{
    ClientSet, ConfigKind, ConfigType, Coordinate, DeleteEntry, Error, RemoteObject, RunId,
};
use futures::StreamExt;
use futures::stream;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::cancel::CancellationFlag;
use crate::deploy::DEFAULT_CONCURRENCY;

/// Tunables for a delete run.
#[derive(Debug, Clone)]
pub struct DeleteOptions {
    /// Maximum number of entries processed concurrently.
    pub concurrency: usize,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// What happened to one delete entry.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// Matching objects were removed.
    Deleted { ids: Vec<String> },
    /// Nothing matched. Reported as a warning.
    NotFound,
    /// The type is not known. Reported as a warning.
    UnknownType,
    Failed {
        #[serde(serialize_with = "serialize_error")]
        error: Error,
    },
}

fn serialize_error<S: Serializer>(error: &Error, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    pub entry: DeleteEntry,
    #[serde(flatten)]
    pub outcome: DeleteOutcome,
}

impl DeleteResult {
    pub fn is_warning(&self) -> bool {
        matches!(
            self.outcome,
            DeleteOutcome::NotFound | DeleteOutcome::UnknownType
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, DeleteOutcome::Failed { .. })
    }
}

/// Results of a delete run, in the order the entries were given.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub run_id: RunId,
    pub results: Vec<DeleteResult>,
}

impl DeleteReport {
    pub fn warnings(&self) -> impl Iterator<Item = &DeleteResult> {
        self.results.iter().filter(|r| r.is_warning())
    }

    pub fn errors(&self) -> impl Iterator<Item = &DeleteResult> {
        self.results.iter().filter(|r| r.is_error())
    }

    pub fn deleted_count(&self) -> usize {
        self.results
            .iter()
            .map(|r| match &r.outcome {
                DeleteOutcome::Deleted { ids } => ids.len(),
                _ => 0,
            })
            .sum()
    }

    /// Warnings do not make a run unsuccessful.
    pub fn is_success(&self) -> bool {
        self.errors().next().is_none()
    }
}

/// Removes remote objects named by delete entries.
pub struct Deleter {
    clients: ClientSet,
    options: DeleteOptions,
    cancel: CancellationFlag,
}

impl Deleter {
    pub fn new(clients: ClientSet) -> Self {
        Self {
            clients,
            options: DeleteOptions::default(),
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_options(mut self, options: DeleteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Delete every object matching the entries.
    ///
    /// Existing objects are listed once per type, then entries are matched
    /// and deleted. Unknown types and entries without a match are warnings.
    pub async fn delete(&self, entries: Vec<DeleteEntry>) -> DeleteReport {
        let run_id = RunId::new();
        let concurrency = self.options.concurrency.max(1);
        info!(%run_id, entries = entries.len(), "Deleting configs");

        let types: BTreeMap<String, ConfigType> = entries
            .iter()
            .filter_map(|e| {
                ConfigType::from_type_name(&e.config_type).map(|t| (e.config_type.clone(), t))
            })
            .collect();

        let listings: BTreeMap<String, Result<Vec<RemoteObject>, Error>> =
            if self.cancel.is_cancelled() {
                BTreeMap::new()
            } else {
                stream::iter(types.iter())
                    .map(|(name, config_type)| async move {
                        let client = self.clients.client_for(config_type);
                        (name.clone(), client.list_existing(config_type).await)
                    })
                    .buffer_unordered(concurrency)
                    .collect()
                    .await
            };

        let listings = &listings;
        let types = &types;
        let results: Vec<DeleteResult> = stream::iter(entries)
            .map(|entry| async move {
                let outcome = match (
                    types.get(&entry.config_type),
                    listings.get(&entry.config_type),
                ) {
                    (Some(config_type), Some(Ok(existing))) => {
                        self.delete_entry(&entry, config_type, existing).await
                    }
                    (Some(_), Some(Err(error))) => DeleteOutcome::Failed {
                        error: error.clone(),
                    },
                    // Not listed because the run was cancelled first.
                    (Some(_), None) => DeleteOutcome::Failed {
                        error: Error::Cancelled,
                    },
                    _ => DeleteOutcome::UnknownType,
                };
                log_outcome(&entry, &outcome);
                DeleteResult { entry, outcome }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let report = DeleteReport { run_id, results };
        info!(
            %run_id,
            deleted = report.deleted_count(),
            warnings = report.warnings().count(),
            errors = report.errors().count(),
            "Delete finished"
        );
        report
    }

    async fn delete_entry(
        &self,
        entry: &DeleteEntry,
        config_type: &ConfigType,
        existing: &[RemoteObject],
    ) -> DeleteOutcome {
        if self.cancel.is_cancelled() {
            return DeleteOutcome::Failed {
                error: Error::Cancelled,
            };
        }

        let ids = matching_ids(entry, config_type, existing);
        if ids.is_empty() {
            return DeleteOutcome::NotFound;
        }

        let client = self.clients.client_for(config_type);
        let mut deleted = Vec::new();
        for id in ids {
            match client.delete(config_type, &id).await {
                Ok(()) => deleted.push(id),
                // Removed by someone else in the meantime.
                Err(e) if e.is_not_found() => debug!(%entry, %id, "Object already gone"),
                Err(error) => return DeleteOutcome::Failed { error },
            }
        }
        if deleted.is_empty() {
            DeleteOutcome::NotFound
        } else {
            DeleteOutcome::Deleted { ids: deleted }
        }
    }
}

/// Remote ids an entry refers to.
///
/// Classic API objects are matched by name or id. Everything else is matched
/// by id, or by the external id derived from the project coordinate when the
/// entry names a project.
fn matching_ids(
    entry: &DeleteEntry,
    config_type: &ConfigType,
    existing: &[RemoteObject],
) -> Vec<String> {
    let external_id = entry.project.as_ref().map(|project| {
        Coordinate::new(project.as_str(), entry.config_type.as_str(), entry.identifier.as_str())
            .external_id()
    });

    let ids: BTreeSet<String> = existing
        .iter()
        .filter(|object| {
            object.id == entry.identifier
                || match config_type.kind() {
                    ConfigKind::ClassicApi => {
                        object.name.as_deref() == Some(entry.identifier.as_str())
                    }
                    _ => external_id.is_some() && object.external_id == external_id,
                }
        })
        .map(|object| object.id.clone())
        .collect();
    ids.into_iter().collect()
}

fn log_outcome(entry: &DeleteEntry, outcome: &DeleteOutcome) {
    match outcome {
        DeleteOutcome::Deleted { ids } => info!(%entry, ?ids, "Deleted"),
        DeleteOutcome::NotFound => warn!(%entry, "No object found to delete"),
        DeleteOutcome::UnknownType => warn!(%entry, "Unknown config type, skipping"),
        DeleteOutcome::Failed { error } => warn!(%entry, %error, "Delete failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use configit_client::InMemoryClient;
    use configit_core::{ApiClient, Payload};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn deleter(client: &Arc<InMemoryClient>) -> Deleter {
        Deleter::new(ClientSet::uniform(client.clone()))
    }

    /// Serves a fixed listing and refuses to delete one id.
    struct FixedClient {
        existing: Vec<RemoteObject>,
        forbidden_id: String,
        list_calls: AtomicUsize,
        delete_calls: AtomicUsize,
    }

    impl FixedClient {
        fn new(existing: Vec<RemoteObject>, forbidden_id: &str) -> Self {
            Self {
                existing,
                forbidden_id: forbidden_id.to_string(),
                list_calls: AtomicUsize::new(0),
                delete_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ApiClient for FixedClient {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn list_existing(
            &self,
            _config_type: &ConfigType,
        ) -> configit_core::Result<Vec<RemoteObject>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.existing.clone())
        }

        async fn create(
            &self,
            _config_type: &ConfigType,
            payload: &Payload,
        ) -> configit_core::Result<String> {
            Err(Error::InvalidInput(format!("unexpected create of {}", payload.coordinate)))
        }

        async fn update(
            &self,
            _config_type: &ConfigType,
            id: &str,
            _payload: &Payload,
        ) -> configit_core::Result<()> {
            Err(Error::InvalidInput(format!("unexpected update of {id}")))
        }

        async fn delete(&self, _config_type: &ConfigType, id: &str) -> configit_core::Result<()> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            if id == self.forbidden_id {
                return Err(Error::Forbidden(format!("cannot delete {id}")));
            }
            Ok(())
        }
    }

    fn named(id: &str, name: &str) -> RemoteObject {
        RemoteObject {
            id: id.to_string(),
            name: Some(name.to_string()),
            external_id: None,
        }
    }

    #[tokio::test]
    async fn test_missing_object_and_unknown_type_are_warnings() {
        let client = Arc::new(InMemoryClient::new());

        let report = deleter(&client)
            .delete(vec![
                DeleteEntry::new("auto-tag", "t1"),
                DeleteEntry::new("unknown-type", "x"),
            ])
            .await;

        assert_eq!(report.warnings().count(), 2);
        assert_eq!(report.errors().count(), 0);
        assert!(report.is_success());
        assert!(matches!(report.results[0].outcome, DeleteOutcome::NotFound));
        assert!(matches!(report.results[1].outcome, DeleteOutcome::UnknownType));
    }

    #[tokio::test]
    async fn test_classic_objects_are_matched_by_name() {
        let client = Arc::new(InMemoryClient::new());
        let auto_tag = ConfigType::from_type_name("auto-tag").unwrap();
        client.seed(&auto_tag, named("id-1", "t1"));
        client.seed(&auto_tag, named("id-2", "t2"));

        let report = deleter(&client)
            .delete(vec![DeleteEntry::new("auto-tag", "t1")])
            .await;

        assert!(matches!(
            &report.results[0].outcome,
            DeleteOutcome::Deleted { ids } if ids == &["id-1".to_string()]
        ));
        assert_eq!(client.delete_count(), 1);
        assert_eq!(client.objects(&auto_tag).len(), 1);
    }

    #[tokio::test]
    async fn test_settings_are_matched_by_project_external_id() {
        let client = Arc::new(InMemoryClient::new());
        let schema = ConfigType::from_type_name("builtin:tagging.auto").unwrap();
        let external_id = Coordinate::new("infra", "builtin:tagging.auto", "tag").external_id();
        client.seed(
            &schema,
            RemoteObject {
                id: "obj-1".to_string(),
                name: None,
                external_id: Some(external_id),
            },
        );

        let report = deleter(&client)
            .delete(vec![
                DeleteEntry::new("builtin:tagging.auto", "tag").with_project("infra"),
                DeleteEntry::new("builtin:tagging.auto", "tag"),
            ])
            .await;

        assert!(matches!(
            &report.results[0].outcome,
            DeleteOutcome::Deleted { ids } if ids == &["obj-1".to_string()]
        ));
        // without a project only the remote id matches
        assert!(matches!(report.results[1].outcome, DeleteOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let client = Arc::new(InMemoryClient::new());
        let dashboard = ConfigType::from_type_name("dashboard").unwrap();
        let entries: Vec<DeleteEntry> = (0..8)
            .map(|i| {
                client.seed(&dashboard, named(&format!("id-{i}"), &format!("d{i}")));
                DeleteEntry::new("dashboard", format!("d{i}"))
            })
            .collect();

        let report = deleter(&client)
            .with_options(DeleteOptions { concurrency: 3 })
            .delete(entries.clone())
            .await;

        let order: Vec<&DeleteEntry> = report.results.iter().map(|r| &r.entry).collect();
        assert_eq!(order, entries.iter().collect::<Vec<_>>());
        assert_eq!(report.deleted_count(), 8);
    }

    #[tokio::test]
    async fn test_cancelled_run_deletes_nothing() {
        let client = Arc::new(InMemoryClient::new());
        let slo = ConfigType::from_type_name("slo").unwrap();
        client.seed(&slo, named("id-1", "s1"));
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let report = deleter(&client)
            .with_cancellation(cancel)
            .delete(vec![DeleteEntry::new("slo", "s1")])
            .await;

        assert_eq!(report.errors().count(), 1);
        assert_eq!(client.delete_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_entry_does_not_block_others() {
        let client = Arc::new(FixedClient::new(
            vec![named("id-1", "d1"), named("id-2", "d2"), named("id-3", "d3")],
            "id-2",
        ));

        let report = Deleter::new(ClientSet::uniform(client.clone()))
            .delete(vec![
                DeleteEntry::new("dashboard", "d1"),
                DeleteEntry::new("dashboard", "d2"),
                DeleteEntry::new("dashboard", "d3"),
            ])
            .await;

        assert!(!report.is_success());
        assert_eq!(report.errors().count(), 1);
        assert!(matches!(
            &report.results[1].outcome,
            DeleteOutcome::Failed { error: Error::Forbidden(_) }
        ));
        assert!(matches!(
            &report.results[0].outcome,
            DeleteOutcome::Deleted { ids } if ids == &["id-1".to_string()]
        ));
        assert!(matches!(
            &report.results[2].outcome,
            DeleteOutcome::Deleted { ids } if ids == &["id-3".to_string()]
        ));
        assert_eq!(report.deleted_count(), 2);
        assert_eq!(client.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.delete_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancelled_run_lists_nothing() {
        let client = Arc::new(FixedClient::new(vec![named("id-1", "s1")], ""));
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let report = Deleter::new(ClientSet::uniform(client.clone()))
            .with_cancellation(cancel)
            .delete(vec![
                DeleteEntry::new("slo", "s1"),
                DeleteEntry::new("unknown-type", "x"),
            ])
            .await;

        assert!(matches!(
            &report.results[0].outcome,
            DeleteOutcome::Failed { error: Error::Cancelled }
        ));
        assert!(matches!(report.results[1].outcome, DeleteOutcome::UnknownType));
        assert_eq!(client.list_calls.load(Ordering::SeqCst), 0);
        assert_eq!(client.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_report_serializes_flat_outcome() {
        let report = DeleteReport {
            run_id: RunId::new(),
            results: vec![DeleteResult {
                entry: DeleteEntry::new("slo", "s1"),
                outcome: DeleteOutcome::Failed {
                    error: Error::Forbidden("no token".to_string()),
                },
            }],
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["results"][0]["outcome"], "failed");
        assert_eq!(json["results"][0]["error"], "forbidden: no token");
        assert_eq!(json["results"][0]["entry"]["identifier"], "s1");
    }
}
