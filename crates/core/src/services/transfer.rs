//! Property subtree transfer between owners.
//!
//! A transfer moves a property's whole folder subtree from one owner to another and brings
//! the metadata store in line with the move. The object store and the metadata store share no
//! transaction, so the transfer runs as a saga of re-runnable steps:
//!
//! 1. ensure the destination owner's properties container,
//! 2. move the subtree (an already-moved subtree counts as moved),
//! 3. rewrite the `stored_path` prefix of every file asset under the old root,
//! 4. close the open ownership leg(s) and open the destination leg,
//! 5. optionally leave a YAML marker in the source owner's dispositions folder,
//! 6. write one audit row.
//!
//! Every step records its own failure in the report and the saga carries on where that is
//! meaningful. Only request validation fails the call. A failed transfer is recovered by
//! running the same request again.

use crate::config::CoreConfig;
use crate::entity::EntityRef;
use crate::paths::{rebase_path, OwnerPaths, PropertyPaths, StorePath};
use crate::records::{
    from_row, to_row, OwnershipLeg, TransferAudit, FILE_ASSETS, OWNERSHIP_PERIODS,
    TRANSFER_AUDIT,
};
use crate::services::provision::FolderProvisioner;
use crate::services::record_best_effort;
use crate::stores::{Filter, Query, Row, Stores, WriteMode};
use crate::{AltusError, AltusResult, StoreError};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// REQUESTS AND REPORTS
// ============================================================================

/// Move one property from `from_owner` to `to_owner` as of `cutoff_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub property: EntityRef,
    pub from_owner: EntityRef,
    pub to_owner: EntityRef,
    pub cutoff_date: NaiveDate,
    #[serde(default)]
    pub leave_marker: bool,
    /// Resolve paths only; touch neither store.
    #[serde(default)]
    pub dry_run: bool,
}

/// Move several properties between the same pair of owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkTransferRequest {
    pub from_owner: EntityRef,
    pub to_owner: EntityRef,
    pub properties: Vec<EntityRef>,
    pub cutoff_date: NaiveDate,
    #[serde(default)]
    pub leave_marker: bool,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStep {
    PrepareDestination,
    Move,
    Relink,
    OwnershipLegs,
    Marker,
}

impl fmt::Display for TransferStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferStep::PrepareDestination => "prepare_destination",
            TransferStep::Move => "move",
            TransferStep::Relink => "relink",
            TransferStep::OwnershipLegs => "ownership_legs",
            TransferStep::Marker => "marker",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    pub step: TransferStep,
    pub message: String,
}

/// Structured outcome of one transfer. Partial failures are listed in `errors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReport {
    pub property_id: i64,
    pub old_path: String,
    pub new_path: String,
    pub moved: bool,
    pub assets_relinked: u64,
    pub assets_failed: u64,
    pub legs_closed: u64,
    pub leg_opened: bool,
    pub marker_path: Option<String>,
    pub errors: Vec<StepError>,
    pub dry_run: bool,
}

impl TransferReport {
    fn new(request: &TransferRequest, old_root: &StorePath, new_root: &StorePath) -> Self {
        Self {
            property_id: request.property.id,
            old_path: old_root.to_string(),
            new_path: new_root.to_string(),
            moved: false,
            assets_relinked: 0,
            assets_failed: 0,
            legs_closed: 0,
            leg_opened: false,
            marker_path: None,
            errors: Vec::new(),
            dry_run: request.dry_run,
        }
    }

    fn record(&mut self, step: TransferStep, error: impl fmt::Display) {
        let message = error.to_string();
        tracing::warn!(step = %step, error = %message, "transfer step failed");
        self.errors.push(StepError { step, message });
    }

    /// True when every step succeeded.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && (self.moved || self.dry_run)
    }
}

/// Content of the marker file left behind in the source owner's dispositions folder.
#[derive(Debug, Clone, Serialize)]
struct DispositionMarker<'a> {
    property_id: i64,
    property_name: Option<&'a str>,
    from_owner_id: i64,
    to_owner_id: i64,
    cutoff_date: NaiveDate,
    old_path: &'a str,
    new_path: &'a str,
    recorded_at: chrono::DateTime<Utc>,
}

// ============================================================================
// ENGINE
// ============================================================================

/// Runs property transfers.
#[derive(Clone, Debug)]
pub struct TransferEngine {
    cfg: Arc<CoreConfig>,
    stores: Stores,
    provisioner: FolderProvisioner,
}

impl TransferEngine {
    pub fn new(cfg: Arc<CoreConfig>, stores: Stores) -> Self {
        Self {
            provisioner: FolderProvisioner::new(cfg.clone(), stores.clone()),
            cfg,
            stores,
        }
    }

    /// Transfers one property.
    ///
    /// # Errors
    ///
    /// Returns [`AltusError::InvalidInput`] for an invalid request. Every other failure is
    /// reported in [`TransferReport::errors`].
    #[tracing::instrument(skip_all, fields(property_id = request.property.id))]
    pub async fn transfer(&self, request: &TransferRequest) -> AltusResult<TransferReport> {
        let leg_end = validate(request)?;

        let root = self.cfg.taxonomy_root();
        let from_owner = OwnerPaths::new(root, &request.from_owner);
        let to_owner = OwnerPaths::new(root, &request.to_owner);
        let old_root = PropertyPaths::new(&from_owner, &request.property)
            .base()
            .clone();
        let new_root = PropertyPaths::new(&to_owner, &request.property)
            .base()
            .clone();

        let mut report = TransferReport::new(request, &old_root, &new_root);
        if request.dry_run {
            return Ok(report);
        }

        tracing::info!(from = %old_root, to = %new_root, "transferring property");

        match self.provisioner.ensure_tree(&to_owner.properties_dir()).await {
            Ok(_) => self.move_subtree(&old_root, &new_root, &mut report).await,
            Err(e) => report.record(TransferStep::PrepareDestination, e),
        }

        if report.moved {
            self.relink_assets(&old_root, &new_root, &mut report).await;
        } else {
            report.record(
                TransferStep::Relink,
                "skipped because the subtree was not moved",
            );
        }

        self.update_legs(request, leg_end, &mut report).await;

        if request.leave_marker && report.moved {
            self.leave_marker(request, &from_owner, &mut report).await;
        }

        let audit = TransferAudit {
            property_id: request.property.id,
            from_owner_id: request.from_owner.id,
            to_owner_id: request.to_owner.id,
            cutoff_date: request.cutoff_date,
            old_path: report.old_path.clone(),
            new_path: report.new_path.clone(),
            moved: report.moved,
            assets_relinked: report.assets_relinked,
            assets_failed: report.assets_failed,
            errors: report
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.step, e.message))
                .collect(),
            recorded_at: Utc::now(),
        };
        record_best_effort(self.stores.metadata.as_ref(), TRANSFER_AUDIT, &audit).await;

        tracing::info!(
            moved = report.moved,
            relinked = report.assets_relinked,
            failed = report.assets_failed,
            errors = report.errors.len(),
            "transfer finished"
        );
        Ok(report)
    }

    /// Transfers each listed property in turn.
    ///
    /// # Errors
    ///
    /// Returns [`AltusError::InvalidInput`] if the property list is empty or any derived
    /// request is invalid; no property is transferred in that case.
    pub async fn transfer_many(
        &self,
        request: &BulkTransferRequest,
    ) -> AltusResult<Vec<TransferReport>> {
        if request.properties.is_empty() {
            return Err(AltusError::InvalidInput(
                "properties cannot be empty".into(),
            ));
        }

        let requests: Vec<TransferRequest> = request
            .properties
            .iter()
            .map(|property| TransferRequest {
                property: property.clone(),
                from_owner: request.from_owner.clone(),
                to_owner: request.to_owner.clone(),
                cutoff_date: request.cutoff_date,
                leave_marker: request.leave_marker,
                dry_run: request.dry_run,
            })
            .collect();
        for single in &requests {
            validate(single)?;
        }

        let mut reports = Vec::with_capacity(requests.len());
        for single in &requests {
            reports.push(self.transfer(single).await?);
        }
        Ok(reports)
    }

    async fn move_subtree(
        &self,
        old_root: &StorePath,
        new_root: &StorePath,
        report: &mut TransferReport,
    ) {
        let objects = &self.stores.objects;
        match objects.move_path(old_root, new_root).await {
            Ok(_) => report.moved = true,
            Err(StoreError::Conflict(_)) => {
                tracing::info!(path = %new_root, "destination exists; treating as already moved");
                report.moved = true;
            }
            Err(StoreError::NotFound(missing)) => match objects.metadata(new_root).await {
                Ok(Some(_)) => {
                    tracing::info!(path = %new_root, "source gone and destination present; already moved");
                    report.moved = true;
                }
                Ok(None) => report.record(
                    TransferStep::Move,
                    format!("neither source nor destination exists (missing {missing})"),
                ),
                Err(e) => report.record(TransferStep::Move, e),
            },
            Err(e) => report.record(TransferStep::Move, e),
        }
    }

    // Keyset pagination: rows that were just rewritten drop out of the prefix filter, so
    // offset paging would skip rows.
    async fn relink_assets(
        &self,
        old_root: &StorePath,
        new_root: &StorePath,
        report: &mut TransferReport,
    ) {
        let metadata = &self.stores.metadata;
        let page_size = self.cfg.relink_page_size();
        let prefix = format!("{old_root}/");
        let mut last_id = 0i64;

        loop {
            let page_start = last_id;
            let query = Query::new()
                .starts_with("stored_path", prefix.clone())
                .gt("id", last_id)
                .order_by("id")
                .limit(page_size);
            let rows = match metadata.select(FILE_ASSETS, &query).await {
                Ok(rows) => rows,
                Err(e) => {
                    report.record(TransferStep::Relink, e);
                    return;
                }
            };
            let page_len = rows.len();

            for row in rows {
                let Some(id) = row.get("id").and_then(Value::as_i64) else {
                    report.assets_failed += 1;
                    report.record(TransferStep::Relink, "file asset row without an id");
                    continue;
                };
                last_id = last_id.max(id);

                let rewritten = row
                    .get("stored_path")
                    .and_then(Value::as_str)
                    .and_then(|path| rebase_path(path, old_root.as_str(), new_root.as_str()));
                let Some(new_path) = rewritten else {
                    continue;
                };

                let mut fields = Row::new();
                fields.insert("stored_path".into(), Value::from(new_path));
                match metadata
                    .patch(FILE_ASSETS, &[Filter::Eq("id".into(), Value::from(id))], fields)
                    .await
                {
                    Ok(_) => report.assets_relinked += 1,
                    Err(e) => {
                        report.assets_failed += 1;
                        report.record(TransferStep::Relink, format!("asset {id}: {e}"));
                    }
                }
            }

            if page_len < page_size as usize {
                return;
            }
            if last_id == page_start {
                report.record(
                    TransferStep::Relink,
                    format!("relink stopped: a full page of {page_len} rows carried no usable id"),
                );
                return;
            }
        }
    }

    async fn update_legs(
        &self,
        request: &TransferRequest,
        leg_end: NaiveDate,
        report: &mut TransferReport,
    ) {
        let metadata = &self.stores.metadata;
        let property_id = request.property.id;
        let to_owner_id = request.to_owner.id;

        let query = Query::new()
            .eq("property_id", property_id)
            .is_null("end_date")
            .order_by("id");
        let open = match metadata.select(OWNERSHIP_PERIODS, &query).await {
            Ok(rows) => rows,
            Err(e) => {
                report.record(TransferStep::OwnershipLegs, e);
                return;
            }
        };
        if open.is_empty() {
            tracing::info!(property_id, "no open ownership leg to close");
        }

        let mut destination_open = false;
        let mut unclosed = 0usize;
        for row in open {
            let leg: OwnershipLeg = match from_row(row) {
                Ok(leg) => leg,
                Err(e) => {
                    unclosed += 1;
                    report.record(TransferStep::OwnershipLegs, e);
                    continue;
                }
            };
            if leg.owner_id == to_owner_id {
                destination_open = true;
                continue;
            }
            let Some(id) = leg.id else {
                unclosed += 1;
                report.record(TransferStep::OwnershipLegs, "ownership leg without an id");
                continue;
            };

            let mut fields = Row::new();
            fields.insert("end_date".into(), Value::from(leg_end.to_string()));
            match metadata
                .patch(
                    OWNERSHIP_PERIODS,
                    &[Filter::Eq("id".into(), Value::from(id))],
                    fields,
                )
                .await
            {
                Ok(_) => report.legs_closed += 1,
                Err(e) => {
                    unclosed += 1;
                    report.record(TransferStep::OwnershipLegs, format!("leg {id}: {e}"));
                }
            }
        }

        if destination_open {
            return;
        }
        // A property has at most one open leg; a rerun opens the destination leg.
        if unclosed > 0 {
            report.record(
                TransferStep::OwnershipLegs,
                format!("destination leg not opened: {unclosed} open leg(s) could not be closed"),
            );
            return;
        }

        let leg = OwnershipLeg {
            id: None,
            property_id,
            owner_id: to_owner_id,
            start_date: request.cutoff_date,
            end_date: None,
        };
        let inserted = match to_row(&leg) {
            Ok(row) => metadata
                .insert(OWNERSHIP_PERIODS, row)
                .await
                .map_err(AltusError::from),
            Err(e) => Err(e),
        };
        match inserted {
            Ok(_) => report.leg_opened = true,
            Err(e) => report.record(TransferStep::OwnershipLegs, e),
        }
    }

    async fn leave_marker(
        &self,
        request: &TransferRequest,
        from_owner: &OwnerPaths,
        report: &mut TransferReport,
    ) {
        let marker = DispositionMarker {
            property_id: request.property.id,
            property_name: request.property.name.as_deref(),
            from_owner_id: request.from_owner.id,
            to_owner_id: request.to_owner.id,
            cutoff_date: request.cutoff_date,
            old_path: &report.old_path,
            new_path: &report.new_path,
            recorded_at: Utc::now(),
        };
        let yaml = match serde_yaml::to_string(&marker).map_err(AltusError::YamlSerialization) {
            Ok(yaml) => yaml,
            Err(e) => {
                report.record(TransferStep::Marker, e);
                return;
            }
        };

        let folder = from_owner.dispositions_dir();
        let path = folder.join(&format!(
            "{}__{}__transfer.yaml",
            request.cutoff_date,
            request.property.segment()
        ));

        let result = match self.provisioner.ensure_tree(&folder).await {
            Ok(_) => self
                .stores
                .objects
                .upload(&path, yaml.as_bytes(), WriteMode::Overwrite)
                .await
                .map_err(AltusError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => report.marker_path = Some(path.to_string()),
            Err(e) => report.record(TransferStep::Marker, e),
        }
    }
}

/// Checks a request and returns the end date for closed legs (the day before cutoff).
fn validate(request: &TransferRequest) -> AltusResult<NaiveDate> {
    for (role, entity) in [
        ("property", &request.property),
        ("from_owner", &request.from_owner),
        ("to_owner", &request.to_owner),
    ] {
        if entity.id <= 0 {
            return Err(AltusError::InvalidInput(format!(
                "{role} id must be a positive integer, got {}",
                entity.id
            )));
        }
    }
    if request.from_owner.id == request.to_owner.id {
        return Err(AltusError::InvalidInput(
            "from_owner and to_owner must differ".into(),
        ));
    }
    request.cutoff_date.pred_opt().ok_or_else(|| {
        AltusError::InvalidInput(format!(
            "cutoff_date {} has no previous day",
            request.cutoff_date
        ))
    })
}
