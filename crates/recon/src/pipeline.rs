//! The audit reconciliation pipeline.
//!
//! One pass per run: classify input task ids, discover defective targets,
//! drain their parcel pages, enrich every touched target from two
//! independent lookups, then join everything into output rows. Job-level
//! failures degrade to empty fields; only classification and discovery
//! failures abort the run.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::{info, warn};

use lastmile_client::{drain_pages, run_batch, Endpoints, ResourceFetcher};
use lastmile_core::ids::{classify, IdClass};
use lastmile_core::time::format_epoch;
use lastmile_core::{AuditError, Config, Report};

use crate::model::{
    decode_data, decode_list, AssignmentDetail, AuditRow, AuditTarget, DefectKind, ParcelItem,
    ParcelRow, TargetView, AUDIT_HEADER,
};
use crate::route_cache::RouteCache;

/// Hard cap on validation tasks per run. The paged audit endpoints are
/// slow and rate-sensitive; two tasks is the documented operational limit.
pub const MAX_TASKS: usize = 2;

/// Worker count for the two enrichment fan-outs.
const ENRICH_CONCURRENCY: usize = 4;

/// Enrichment progress is logged every Nth completion.
const ENRICH_LOG_EVERY: usize = 5;

/// Join progress is logged every Nth row.
const JOIN_LOG_EVERY: usize = 120;

/// Orchestrates one audit run. Create, call [`AuditPipeline::run`], drop —
/// the route cache lives and dies with the instance.
pub struct AuditPipeline {
    fetcher: Arc<dyn ResourceFetcher>,
    endpoints: Endpoints,
    config: Config,
    cache: RouteCache,
}

impl AuditPipeline {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, config: Config) -> Self {
        Self {
            fetcher,
            endpoints: Endpoints::new(&config.base_url),
            config,
            cache: RouteCache::new(),
        }
    }

    /// Run the full pipeline over raw pasted input.
    pub async fn run(&mut self, raw: &str) -> Result<Report, AuditError> {
        // 1. Classify: validate, dedup, cap.
        let mut tasks = classify(raw, IdClass::ValidationTask);
        tasks.truncate(MAX_TASKS);
        if tasks.is_empty() {
            return Err(AuditError::NoValidTasks);
        }
        info!(tasks = ?tasks, "audit run started");

        // 2. Discover defective targets per task, 3. drain their parcels.
        let mut parcel_rows: Vec<ParcelRow> = Vec::new();
        let mut target_ids: IndexSet<String> = IndexSet::new();
        let mut target_task: HashMap<String, String> = HashMap::new();

        for task in &tasks {
            let targets = self.discover_targets(task).await?;
            info!(task = %task, targets = targets.len(), "defective targets discovered");

            for target in &targets {
                target_ids.insert(target.target_id.clone());
                target_task.insert(target.target_id.clone(), task.clone());
                self.accumulate_parcels(task, target, &mut parcel_rows).await?;
            }
        }
        info!(parcels = parcel_rows.len(), targets = target_ids.len(), "accumulation finished");

        // 4/5. Enrich every touched target from both lookups.
        let ids: Vec<String> = target_ids.into_iter().collect();
        let assignments = self.enrich_assignments(&ids).await;
        let views = self.enrich_target_views(&ids, &target_task).await;

        // 6. Join into output rows, resolving corrected bindings per row.
        let mut report = Report::new(&AUDIT_HEADER);
        let total = parcel_rows.len();
        for (i, row) in parcel_rows.into_iter().enumerate() {
            if i % JOIN_LOG_EVERY == 0 {
                info!(done = i, total, "joining rows");
            }
            let corrected = self
                .cache
                .resolve(
                    self.fetcher.as_ref(),
                    &self.endpoints,
                    &row.task,
                    &row.shipment,
                    &row.target,
                )
                .await;

            let assignment = assignments.get(&row.target).cloned().unwrap_or_default();
            let view = views.get(&row.target).cloned().unwrap_or_default();

            report.push_row(
                AuditRow {
                    assigned_at: format_epoch(assignment.assigned_time),
                    task: row.task,
                    target: row.target,
                    shipment: row.shipment,
                    observed_binding: view.binding_entity,
                    corrected_binding: corrected,
                    operator: view.validation_operator,
                    driver_id: assignment.driver_id.map(|d| d.to_string()).unwrap_or_default(),
                    driver_name: assignment.driver_name,
                    defect: row.kind.as_str().to_string(),
                }
                .into_fields(),
            );
        }

        info!(rows = report.len(), "audit run complete");
        Ok(report)
    }

    /// Fetch the full target list for one task and keep only targets with
    /// a positive missing or missort count.
    async fn discover_targets(&self, task: &str) -> Result<Vec<AuditTarget>, AuditError> {
        let response = self
            .fetcher
            .fetch_json(&self.endpoints.target_list_by_task(task))
            .await
            .map_err(|e| AuditError::Discovery {
                task: task.to_string(),
                reason: e.to_string(),
            })?;

        let targets: Vec<AuditTarget> = decode_list(&response);
        Ok(targets.into_iter().filter(AuditTarget::has_defects).collect())
    }

    /// Drain the missing and/or missort parcel pages for one target,
    /// appending a [`ParcelRow`] per retained parcel.
    async fn accumulate_parcels(
        &self,
        task: &str,
        target: &AuditTarget,
        rows: &mut Vec<ParcelRow>,
    ) -> Result<(), AuditError> {
        let page_size = self.config.page_size;
        let target_type = target.effective_type();

        if target.missing_qty > 0 {
            info!(target = %target.target_id, qty = target.missing_qty, "draining missing parcels");
            let items = drain_pages(
                self.fetcher.as_ref(),
                |page| {
                    self.endpoints.parcel_list_missing(
                        task,
                        &target.target_id,
                        target_type,
                        page,
                        page_size,
                    )
                },
                |_| true,
            )
            .await
            .map_err(|e| AuditError::Accumulation {
                target: target.target_id.clone(),
                reason: e.to_string(),
            })?;
            Self::push_parcels(rows, task, &target.target_id, DefectKind::Missing, items);
        }

        if target.missort_qty > 0 {
            info!(target = %target.target_id, qty = target.missort_qty, "draining missort parcels");
            let confirmed = self.config.missort_confirmed_status;
            // The server-side scan-status filter over-returns; only parcels
            // whose validation status says "confirmed missort" count.
            let items = drain_pages(
                self.fetcher.as_ref(),
                |page| {
                    self.endpoints.parcel_list_missort(
                        task,
                        &target.target_id,
                        target_type,
                        page,
                        page_size,
                    )
                },
                |item| item["validation_status"].as_i64() == Some(confirmed),
            )
            .await
            .map_err(|e| AuditError::Accumulation {
                target: target.target_id.clone(),
                reason: e.to_string(),
            })?;
            Self::push_parcels(rows, task, &target.target_id, DefectKind::Missort, items);
        }

        Ok(())
    }

    fn push_parcels(
        rows: &mut Vec<ParcelRow>,
        task: &str,
        target: &str,
        kind: DefectKind,
        items: Vec<serde_json::Value>,
    ) {
        for item in items {
            let parcel: ParcelItem = serde_json::from_value(item).unwrap_or_default();
            rows.push(ParcelRow {
                task: task.to_string(),
                target: target.to_string(),
                kind,
                shipment: parcel.shipment_id,
            });
        }
    }

    /// Fan out assignment-detail lookups over the batch executor.
    ///
    /// Failed lookups map to default (empty) details — join degrades those
    /// rows' fields rather than dropping rows.
    async fn enrich_assignments(&self, ids: &[String]) -> HashMap<String, AssignmentDetail> {
        let jobs: Vec<_> = ids.iter().map(|id| self.endpoints.assignment_detail(id)).collect();
        let outcomes = run_batch(
            self.fetcher.as_ref(),
            &jobs,
            ENRICH_CONCURRENCY,
            |done, total, _| {
                if done % ENRICH_LOG_EVERY == 0 {
                    info!(done, total, "assignment lookups");
                }
            },
        )
        .await;

        ids.iter()
            .zip(outcomes)
            .map(|(id, outcome)| {
                let detail = match outcome {
                    Ok(response) => decode_data(&response),
                    Err(err) => {
                        warn!(target = %id, error = %err, "assignment lookup failed");
                        AssignmentDetail::default()
                    }
                };
                (id.clone(), detail)
            })
            .collect()
    }

    /// Fan out target-view lookups over the batch executor.
    async fn enrich_target_views(
        &self,
        ids: &[String],
        target_task: &HashMap<String, String>,
    ) -> HashMap<String, TargetView> {
        let jobs: Vec<_> = ids
            .iter()
            .map(|id| {
                let task = target_task.get(id).map(String::as_str).unwrap_or("");
                self.endpoints.target_view(task, id)
            })
            .collect();
        let outcomes = run_batch(
            self.fetcher.as_ref(),
            &jobs,
            ENRICH_CONCURRENCY,
            |done, total, _| {
                if done % ENRICH_LOG_EVERY == 0 {
                    info!(done, total, "target-view lookups");
                }
            },
        )
        .await;

        ids.iter()
            .zip(outcomes)
            .map(|(id, outcome)| {
                let view = match outcome {
                    Ok(response) => decode_data(&response),
                    Err(err) => {
                        warn!(target = %id, error = %err, "target-view lookup failed");
                        TargetView::default()
                    }
                };
                (id.clone(), view)
            })
            .collect()
    }
}
