//! Attribution service - runs the whole engine for one meme
//!
//! Resolves lineage, picks the attribution pass, normalizes and joins
//! addresses inside a single connection borrow, so all reads see one
//! snapshot of the tables.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::attribution::{
    self, Attribution, AttributionPass, AttributionRecord, DistributionShare,
    DroppedContributor, Lineage, NormalizerPolicy,
};
use crate::db::MemeDb;
use crate::error::AttributionError;

use super::events::{AttributionEvent, EventBus};

/// Everything the distribution emitter needs, plus the audit trail behind it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionReport {
    pub meme_id: String,
    pub pass: Option<AttributionPass>,
    pub total_count: u32,
    /// Raw records, sorted by user id
    pub records: Vec<AttributionRecord>,
    /// Payable shares, by descending units then user id
    pub shares: Vec<DistributionShare>,
    /// Contributors left out for lack of a usable address
    pub dropped_users: Vec<DroppedContributor>,
    pub allocated_units: u64,
    pub pool_units: u64,
}

impl DistributionReport {
    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Parallel address and unit arrays for the contract call
    pub fn contract_arrays(&self) -> (Vec<String>, Vec<u64>) {
        self.shares
            .iter()
            .map(|s| (s.address.clone(), s.units))
            .unzip()
    }
}

/// Lineage together with its raw attribution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawAttribution {
    pub lineage: Lineage,
    pub attribution: Attribution,
}

/// Attribution service for business logic
pub struct AttributionService {
    db: Arc<MemeDb>,
    policy: NormalizerPolicy,
    events: Arc<EventBus>,
}

impl AttributionService {
    /// Create a new attribution service
    pub fn new(db: Arc<MemeDb>, policy: NormalizerPolicy, events: Arc<EventBus>) -> Self {
        Self { db, policy, events }
    }

    pub fn policy(&self) -> &NormalizerPolicy {
        &self.policy
    }

    /// Lineage and raw proportions, for display and audit
    pub fn compute_raw(&self, meme_id: &str) -> Result<RawAttribution, AttributionError> {
        self.db.with_conn(|conn| {
            let lineage = attribution::resolve_lineage(conn, meme_id)?;
            let attribution = attribution::compute_raw_proportions(conn, &lineage)?;
            Ok(RawAttribution { lineage, attribution })
        })
    }

    /// Compute the distribution for a meme.
    ///
    /// Calling this again on unchanged data gives the same report. It does
    /// not guard against distributing twice; that flag belongs to whoever
    /// submits the transaction.
    pub fn compute_distribution(&self, meme_id: &str) -> Result<DistributionReport, AttributionError> {
        let (raw, join) = self.db.with_conn(|conn| {
            let lineage = attribution::resolve_lineage(conn, meme_id)?;
            self.events.emit(AttributionEvent::LineageResolved {
                meme_id: lineage.meme_id.clone(),
                total_count: lineage.total_count,
            });

            let attribution = attribution::compute_raw_proportions(conn, &lineage)?;
            self.events.emit(AttributionEvent::PassSelected {
                meme_id: lineage.meme_id.clone(),
                pass: attribution.pass,
                contributors: attribution.records.len(),
            });

            let normalized = attribution::normalize(&attribution.records, &self.policy);
            let join = attribution::attach_addresses(conn, normalized)?;

            Ok((RawAttribution { lineage, attribution }, join))
        })?;

        for dropped in &join.dropped {
            self.events.emit(AttributionEvent::ContributorDropped {
                meme_id: raw.lineage.meme_id.clone(),
                user_id: dropped.user_id.clone(),
                reason: dropped.reason,
            });
        }

        let allocated_units: u64 = join.shares.iter().map(|s| s.units).sum();
        let pool_units = self.policy.pool_units();

        let report = DistributionReport {
            meme_id: raw.lineage.meme_id,
            pass: raw.attribution.pass,
            total_count: raw.attribution.total_count,
            records: raw.attribution.records,
            shares: join.shares,
            dropped_users: join.dropped,
            allocated_units,
            pool_units,
        };

        info!(
            meme_id = %report.meme_id,
            recipients = report.shares.len(),
            dropped = report.dropped_users.len(),
            allocated_units,
            pool_units,
            "Attribution complete"
        );

        self.events.emit(AttributionEvent::DistributionComputed {
            meme_id: report.meme_id.clone(),
            pass: report.pass,
            recipients: report.shares.len(),
            allocated_units,
            pool_units,
        });

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memes::{insert_meme, CreateMemeInput};
    use crate::db::users::{upsert_user, CreateUserInput};

    fn service() -> (AttributionService, Arc<MemeDb>, Arc<EventBus>) {
        let db = Arc::new(MemeDb::open_in_memory().unwrap());
        let events = Arc::new(EventBus::new());
        let service = AttributionService::new(Arc::clone(&db), NormalizerPolicy::default(), Arc::clone(&events));
        (service, db, events)
    }

    #[test]
    fn test_missing_meme_surfaces_not_found() {
        let (service, _db, _events) = service();
        let err = service.compute_distribution("nope").unwrap_err();
        assert!(matches!(err, AttributionError::NotFound(_)));
    }

    #[test]
    fn test_empty_lineage_gives_empty_report() {
        let (service, db, events) = service();
        let mut rx = events.subscribe();

        db.with_conn(|conn| {
            insert_meme(
                conn,
                &CreateMemeInput {
                    id: "lonely".into(),
                    created_at: "2024-05-01T00:00:00Z".parse().unwrap(),
                    positive_contributing_ids: vec![],
                    negative_contributing_ids: vec![],
                },
            )?;
            upsert_user(conn, &CreateUserInput { id: "u".into(), address: None })?;
            Ok(())
        })
        .unwrap();

        let report = service.compute_distribution("lonely").unwrap();
        assert!(report.is_empty());
        assert_eq!(report.pass, None);
        assert_eq!(report.allocated_units, 0);
        assert_eq!(report.pool_units, 95);
        assert_eq!(report.contract_arrays(), (vec![], vec![]));

        let mut seen = vec![];
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        assert_eq!(seen.len(), 3);
        assert!(matches!(
            seen.last(),
            Some(AttributionEvent::DistributionComputed { recipients: 0, .. })
        ));
    }
}
