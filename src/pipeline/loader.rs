//! The Loader stage: lands a transformed batch in the warehouse,
//! dimensions first so the fact referential checks see them.

use super::transformer::TransformedBatch;
use super::validator::{RecordKind, RejectReason, RejectedRecord};
use crate::warehouse::{DimensionLoadCounts, FactLoadOutcome, FactReject, WarehouseStore};
use anyhow::Result;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub dimensions: DimensionLoadCounts,
    pub facts: FactLoadOutcome,
}

pub struct Loader<'a> {
    store: &'a dyn WarehouseStore,
}

impl<'a> Loader<'a> {
    pub fn new(store: &'a dyn WarehouseStore) -> Self {
        Self { store }
    }

    pub fn load(&self, batch: &TransformedBatch) -> Result<LoadReport> {
        let dimensions = self.store.load_dimensions(
            &batch.customers,
            &batch.products,
            &batch.calendar_days,
        )?;
        debug!(
            customers = batch.customers.len(),
            products = batch.products.len(),
            calendar_days = batch.calendar_days.len(),
            "Dimension load committed"
        );

        let facts = self.store.insert_purchases(&batch.purchases)?;
        if !facts.rejected.is_empty() {
            warn!(
                rejected = facts.rejected.len(),
                "Fact rows rejected during load"
            );
        }
        debug!(
            inserted = facts.inserted,
            skipped = facts.skipped_duplicates,
            "Fact load committed"
        );

        Ok(LoadReport { dimensions, facts })
    }
}

/// Translate a store-level fact rejection into the report vocabulary
/// shared with the Validator.
pub fn fact_reject_to_record(purchase_id: i64, reject: FactReject) -> RejectedRecord {
    let reason = match reject {
        FactReject::UnknownCustomer(id) => RejectReason::UnknownCustomer(id),
        FactReject::UnknownProduct(id) => RejectReason::UnknownProduct(id),
        FactReject::UnknownCalendarDay(id) => RejectReason::UnknownCalendarDay(id),
        FactReject::Conflicting => RejectReason::ConflictingPurchase(purchase_id),
    };
    RejectedRecord {
        kind: RecordKind::Purchase,
        source_id: Some(purchase_id.to_string()),
        reason,
    }
}
