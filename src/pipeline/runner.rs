//! Pipeline orchestration: one batch in, one run report out.

use super::aggregator::{AggregateReport, Aggregator};
use super::loader::{fact_reject_to_record, Loader};
use super::raw::RawBatch;
use super::transformer::{DerivationConfig, Transformer};
use super::validator::{RejectedRecord, Validator};
use super::PipelineError;
use crate::warehouse::{DimensionLoadCounts, WarehouseStore};
use anyhow::Result;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every record landed or was an idempotent replay.
    Success,
    /// The batch committed but some records were rejected.
    Partial,
    /// Nothing usable: no record survived, or a stage missed its
    /// deadline. Stages that committed before the failure stay
    /// committed.
    Failed,
}

/// One rejected record as it appears in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct RejectionEntry {
    pub kind: super::validator::RecordKind,
    pub source_id: Option<String>,
    pub code: &'static str,
    pub message: String,
}

impl From<RejectedRecord> for RejectionEntry {
    fn from(record: RejectedRecord) -> Self {
        Self {
            kind: record.kind,
            source_id: record.source_id,
            code: record.reason.code(),
            message: record.reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub customers_valid: usize,
    pub products_valid: usize,
    pub purchases_valid: usize,
    pub dimensions: DimensionLoadCounts,
    pub facts_inserted: u64,
    pub facts_replayed: u64,
    pub aggregate: AggregateReport,
    pub rejections: Vec<RejectionEntry>,
    pub duration_ms: u64,
    /// Set when status is Failed, with the terminal cause.
    pub failure: Option<String>,
}

impl RunReport {
    fn empty() -> Self {
        Self {
            status: RunStatus::Success,
            customers_valid: 0,
            products_valid: 0,
            purchases_valid: 0,
            dimensions: DimensionLoadCounts::default(),
            facts_inserted: 0,
            facts_replayed: 0,
            aggregate: AggregateReport::default(),
            rejections: Vec::new(),
            duration_ms: 0,
            failure: None,
        }
    }
}

pub struct PipelineRunner<'a> {
    store: &'a dyn WarehouseStore,
    validator: Validator,
    transformer: Transformer,
    stage_timeout: Option<Duration>,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(
        store: &'a dyn WarehouseStore,
        validator: Validator,
        derivations: DerivationConfig,
        stage_timeout: Option<Duration>,
    ) -> Self {
        Self {
            store,
            validator,
            transformer: Transformer::new(derivations),
            stage_timeout,
        }
    }

    fn check_deadline(
        &self,
        started: Instant,
        stage: &'static str,
    ) -> Result<(), PipelineError> {
        if let Some(limit) = self.stage_timeout {
            let elapsed = started.elapsed();
            if elapsed > limit {
                return Err(PipelineError::StageTimeout {
                    stage,
                    limit_secs: limit.as_secs(),
                    elapsed_secs: elapsed.as_secs(),
                });
            }
        }
        Ok(())
    }

    /// Run one batch through validate, transform, load and aggregate.
    ///
    /// Every outcome lands in the report: record-level problems as
    /// rejections, and a warehouse failure or stage deadline miss as
    /// status Failed with the terminal cause. Stages that committed
    /// before a failure stay committed.
    pub fn run(&self, batch: &RawBatch) -> Result<RunReport> {
        let started = Instant::now();
        let mut report = RunReport::empty();
        let input_total = batch.customers.len() + batch.products.len() + batch.purchases.len();

        // Validate
        let customers = self.validator.validate_customers(&batch.customers);
        let products = self.validator.validate_products(&batch.products);
        let purchases = self.validator.validate_purchases(&batch.purchases);
        report.customers_valid = customers.valid.len();
        report.products_valid = products.valid.len();
        report.purchases_valid = purchases.valid.len();
        report.rejections.extend(
            customers
                .rejected
                .into_iter()
                .chain(products.rejected)
                .chain(purchases.rejected)
                .map(RejectionEntry::from),
        );
        info!(
            customers = report.customers_valid,
            products = report.products_valid,
            purchases = report.purchases_valid,
            rejected = report.rejections.len(),
            "Validation complete"
        );

        let valid_total = report.customers_valid + report.products_valid + report.purchases_valid;
        if input_total > 0 && valid_total == 0 {
            report.status = RunStatus::Failed;
            report.failure = Some("no valid input: every record was rejected".to_string());
            report.duration_ms = started.elapsed().as_millis() as u64;
            error!("Pipeline run failed: no valid input");
            return Ok(report);
        }
        if let Err(timeout) = self.check_deadline(started, "validate") {
            return Ok(self.fail(report, started, timeout));
        }

        // Transform
        let transformed =
            self.transformer
                .transform_batch(&customers.valid, &products.valid, &purchases.valid);
        if let Err(timeout) = self.check_deadline(started, "transform") {
            return Ok(self.fail(report, started, timeout));
        }

        // Load
        let loaded = match Loader::new(self.store).load(&transformed) {
            Ok(loaded) => loaded,
            Err(cause) => {
                let failure = PipelineError::Warehouse {
                    stage: "load",
                    cause,
                };
                return Ok(self.fail(report, started, failure));
            }
        };
        report.dimensions = loaded.dimensions;
        report.facts_inserted = loaded.facts.inserted;
        report.facts_replayed = loaded.facts.skipped_duplicates;
        report.rejections.extend(
            loaded
                .facts
                .rejected
                .iter()
                .map(|(id, reject)| RejectionEntry::from(fact_reject_to_record(*id, *reject))),
        );
        if let Err(timeout) = self.check_deadline(started, "load") {
            return Ok(self.fail(report, started, timeout));
        }

        // Aggregate
        let refreshed = Aggregator::new(self.store, self.transformer.config())
            .refresh(&loaded.facts);
        match refreshed {
            Ok(aggregate) => report.aggregate = aggregate,
            Err(cause) => {
                let failure = PipelineError::Warehouse {
                    stage: "aggregate",
                    cause,
                };
                return Ok(self.fail(report, started, failure));
            }
        }
        if let Err(timeout) = self.check_deadline(started, "aggregate") {
            return Ok(self.fail(report, started, timeout));
        }

        report.status = if report.rejections.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::Partial
        };
        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            status = ?report.status,
            inserted = report.facts_inserted,
            replayed = report.facts_replayed,
            rejected = report.rejections.len(),
            duration_ms = report.duration_ms,
            "Pipeline run complete"
        );
        Ok(report)
    }

    fn fail(&self, mut report: RunReport, started: Instant, cause: PipelineError) -> RunReport {
        warn!(%cause, "Pipeline run aborted");
        report.status = RunStatus::Failed;
        report.failure = Some(cause.to_string());
        report.duration_ms = started.elapsed().as_millis() as u64;
        report
    }
}
