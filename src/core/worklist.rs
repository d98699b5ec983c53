//! Renders the planned transfers into the robot's line-oriented worklist
//! and a companion deck/log text for the operator.
//!
//! The log channel truncates records at the first unescaped comma, so the
//! deck description and every free-text field stay comma-free; semicolons
//! stand in where a list separator is needed.

use crate::core::deck::DeckLayout;
use crate::domain::model::{RunReport, SubTransfer, TransferKind};
use crate::utils::error::{PlanError, Result};

/// Ordered transfers plus everything the serializer needs for one run.
#[derive(Debug)]
pub struct Worklist {
    pub transfers: Vec<SubTransfer>,
    pub comments: Vec<String>,
}

/// Deterministic execution order: down each destination column, buffer
/// into a well before sample, split chunks in sequence.
pub fn order_transfers(transfers: &mut [SubTransfer]) {
    transfers.sort_by(|a, b| {
        let key = |t: &SubTransfer| {
            (
                t.dest_labware.clone(),
                t.dest_well.column_major(),
                match t.kind {
                    TransferKind::Buffer => 0u8,
                    TransferKind::Sample => 1u8,
                },
                t.sample_id.clone(),
                t.seq,
            )
        };
        key(a).cmp(&key(b))
    });
}

fn sanitize(text: &str) -> String {
    text.replace(',', ";")
}

fn decimals(precision_ul: f64) -> usize {
    // 0.1 ul resolution -> 1 decimal, whole-ul resolution -> 0.
    (-precision_ul.log10()).ceil().max(0.0) as usize
}

/// Render the transfer-instruction file consumed by the robot software.
///
/// One line per sub-transfer: source slot, source well, destination slot,
/// destination well, volume at fixed decimals.
pub fn render_worklist(
    worklist: &Worklist,
    layout: &DeckLayout,
    precision_ul: f64,
    filename: &str,
) -> Result<String> {
    let d = decimals(precision_ul);
    let mut out = String::new();
    out.push_str("worklist,\n");
    out.push_str(&format!(
        "COMMENT, This is the worklist {}\n",
        sanitize(filename)
    ));
    for c in &worklist.comments {
        out.push_str(&format!("COMMENT, {}\n", sanitize(c)));
    }

    for t in &worklist.transfers {
        let src_slot = layout.slot_of(&t.source_labware).ok_or_else(|| {
            PlanError::Config {
                message: format!("labware '{}' has no deck slot", t.source_labware),
            }
        })?;
        let dst_slot = layout.slot_of(&t.dest_labware).ok_or_else(|| {
            PlanError::Config {
                message: format!("labware '{}' has no deck slot", t.dest_labware),
            }
        })?;
        out.push_str(&format!(
            "COPY,{},{},{},{},{:.prec$}\n",
            src_slot,
            t.source_well,
            dst_slot,
            t.dest_well,
            t.volume_ul,
            prec = d,
        ));
    }

    out.push_str("COMMENT, Done\n");
    Ok(out)
}

/// Comma-free slot -> labware description for the operator log.
pub fn deck_summary(layout: &DeckLayout) -> String {
    let mut lines = vec!["Deck layout:".to_string()];
    for (slot, labware) in layout.bindings() {
        match labware {
            Some(lw) => lines.push(format!(
                "  position {slot}: {} ({})",
                sanitize(&lw.name),
                lw.kind
            )),
            None => lines.push(format!("  position {slot}: [Empty]")),
        }
    }
    lines.join("\n")
}

/// Operator-facing log text: warnings, per-sample failures, deck summary.
pub fn render_log(report: &RunReport, layout: &DeckLayout, method: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Worklist generation log for method {}\n",
        sanitize(method)
    ));
    out.push_str(&format!(
        "{} sample(s) planned; {} failed\n",
        report.planned_samples,
        report.failed_samples.len()
    ));

    if !report.warnings.is_empty() {
        out.push('\n');
        for w in &report.warnings {
            out.push_str(&format!("WARNING: {}\n", sanitize(w)));
        }
    }
    if !report.failed_samples.is_empty() {
        out.push('\n');
        for f in &report.failed_samples {
            out.push_str(&format!("ERROR [{}]: {}\n", f.kind, sanitize(&f.message)));
        }
    }

    out.push('\n');
    out.push_str(&deck_summary(layout));
    out.push_str("\n\nDone.\n");
    out
}
