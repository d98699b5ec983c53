//! One planning run: fetch measurements, derive and split transfers,
//! allocate the deck, then write the worklist, log and annotations.
//!
//! All planning happens in memory first; a failure anywhere before the
//! final write step leaves the output directory untouched.

use crate::core::deck::{self, SlotSpec};
use crate::core::requirements::{self, BufferSource};
use crate::core::splitter;
use crate::core::worklist::{self, Worklist};
use crate::domain::model::{
    Constraints, LabwareKind, LabwareRef, RunReport, SampleAnnotation, SampleMeasurement,
    SubTransfer, TargetSpec, TransferKind,
};
use crate::domain::ports::{SampleProvider, Storage};
use crate::utils::error::{PlanError, Result};
use std::collections::HashSet;

/// Everything one step invocation plans against.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub method: String,
    pub step_id: String,
    pub target: TargetSpec,
    pub constraints: Constraints,
    pub slots: Vec<SlotSpec>,
    pub buffer_labware: String,
}

/// Paths of the artifacts written by a successful run.
#[derive(Debug)]
pub struct RunArtifacts {
    pub worklist_path: String,
    pub log_path: String,
    pub annotations_path: String,
    pub report: RunReport,
}

pub struct PlanEngine<P: SampleProvider, S: Storage> {
    provider: P,
    storage: S,
    settings: RunSettings,
}

impl<P: SampleProvider, S: Storage> PlanEngine<P, S> {
    pub fn new(provider: P, storage: S, settings: RunSettings) -> Self {
        Self {
            provider,
            storage,
            settings,
        }
    }

    pub fn run(&self) -> Result<RunArtifacts> {
        let samples = self.provider.fetch()?;
        if samples.is_empty() {
            return Err(PlanError::EmptyRun {
                message: "no sample records found".to_string(),
            });
        }
        tracing::info!("planning {} samples", samples.len());

        let (transfers, report) = self.plan_transfers(&samples)?;

        let labware = labware_in_first_use_order(&transfers);
        let layout = deck::allocate(&labware, &self.settings.slots)?;

        let worklist = Worklist {
            transfers,
            comments: vec![format!(
                "This worklist normalizes {} of {} samples via method {}",
                report.planned_samples,
                samples.len(),
                self.settings.method,
            )],
        };

        let stem = self.file_stem();
        let worklist_path = format!("worklist_{stem}.csv");
        let log_path = format!("log_{stem}.txt");
        let annotations_path = format!("annotations_{stem}.json");

        let worklist_text = worklist::render_worklist(
            &worklist,
            &layout,
            self.settings.constraints.precision_ul,
            &worklist_path,
        )?;
        let log_text = worklist::render_log(&report, &layout, &self.settings.method);
        let annotations = serde_json::to_vec_pretty(&report.failed_samples).map_err(|e| {
            PlanError::Config {
                message: format!("cannot serialize annotations: {e}"),
            }
        })?;

        // Planning is done; only now touch the filesystem.
        self.storage.write_file(&worklist_path, worklist_text.as_bytes())?;
        self.storage.write_file(&log_path, log_text.as_bytes())?;
        self.storage.write_file(&annotations_path, &annotations)?;

        tracing::info!(
            "wrote {} ({} transfers), {} and {}",
            worklist_path,
            worklist.transfers.len(),
            log_path,
            annotations_path
        );

        Ok(RunArtifacts {
            worklist_path,
            log_path,
            annotations_path,
            report,
        })
    }

    /// Derive and split per sample, aggregating per-sample failures so one
    /// bad measurement never aborts the plate. A sample enters the output
    /// only when every one of its transfers split cleanly.
    fn plan_transfers(
        &self,
        samples: &[SampleMeasurement],
    ) -> Result<(Vec<SubTransfer>, RunReport)> {
        let buffer = BufferSource {
            labware: self.settings.buffer_labware.clone(),
        };
        let mut report = RunReport::default();
        let mut transfers = Vec::new();

        for sample in samples {
            match self.plan_one(sample, &buffer, &mut report) {
                Ok(subs) => {
                    report.planned_samples += 1;
                    transfers.extend(subs);
                }
                Err(err) if !err.is_fatal() => {
                    tracing::warn!("sample {} skipped: {err}", sample.id);
                    report
                        .failed_samples
                        .push(SampleAnnotation::from_error(&sample.id, &err));
                }
                Err(err) => return Err(err),
            }
        }

        if transfers.is_empty() {
            return Err(PlanError::EmptyRun {
                message: format!("all {} samples failed planning", samples.len()),
            });
        }

        worklist::order_transfers(&mut transfers);
        Ok((transfers, report))
    }

    fn plan_one(
        &self,
        sample: &SampleMeasurement,
        buffer: &BufferSource,
        report: &mut RunReport,
    ) -> Result<Vec<SubTransfer>> {
        let derived = requirements::derive(
            sample,
            &self.settings.target,
            &self.settings.constraints,
            buffer,
        )?;

        let mut subs = Vec::new();
        for request in &derived.requests {
            subs.extend(splitter::split(request, &self.settings.constraints)?);
        }

        // Only commit the sample's notes once all its transfers are valid.
        report.warnings.extend(derived.notes);
        Ok(subs)
    }

    fn file_stem(&self) -> String {
        let ts = chrono::Local::now().format("%y%m%d_%H%M%S");
        format!("{}_{}_{}", self.settings.method, self.settings.step_id, ts)
    }
}

/// Distinct labware in order of first use over the transfer sequence.
/// Buffer transfers aspirate from a reservoir; everything else is a plate.
fn labware_in_first_use_order(transfers: &[SubTransfer]) -> Vec<LabwareRef> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for t in transfers {
        let source_kind = match t.kind {
            TransferKind::Buffer => LabwareKind::Reservoir,
            TransferKind::Sample => LabwareKind::Plate96,
        };
        for (name, kind) in [
            (&t.source_labware, source_kind),
            (&t.dest_labware, LabwareKind::Plate96),
        ] {
            if seen.insert(name.clone()) {
                out.push(LabwareRef {
                    name: name.clone(),
                    kind,
                });
            }
        }
    }
    out
}
