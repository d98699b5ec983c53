//! Binds logical labware to physical deck positions.
//!
//! Assignment walks labware in first-use order over the transfer sequence
//! and takes the first compatible free slot, so identical input always
//! produces the identical layout. Running out of compatible slots is fatal
//! for the whole run; labware is never consolidated automatically.

use crate::domain::model::{LabwareKind, LabwareRef};
use crate::utils::error::{PlanError, Result};

/// One physical deck position and the labware kinds it accepts.
#[derive(Debug, Clone)]
pub struct SlotSpec {
    pub id: u8,
    pub accepts: Vec<LabwareKind>,
}

/// Slot -> labware bindings for one run. Immutable once allocated.
#[derive(Debug, Clone)]
pub struct DeckLayout {
    slots: Vec<(SlotSpec, Option<LabwareRef>)>,
}

impl DeckLayout {
    pub fn slot_of(&self, labware_name: &str) -> Option<u8> {
        self.slots
            .iter()
            .find(|(_, lw)| lw.as_ref().is_some_and(|l| l.name == labware_name))
            .map(|(spec, _)| spec.id)
    }

    /// Bindings in slot order, empty positions included.
    pub fn bindings(&self) -> impl Iterator<Item = (u8, Option<&LabwareRef>)> {
        self.slots.iter().map(|(spec, lw)| (spec.id, lw.as_ref()))
    }
}

/// Assign each labware reference to a physical slot.
///
/// `labware` must already be deduplicated and in first-use order; the
/// planner derives it from the ordered transfer sequence.
pub fn allocate(labware: &[LabwareRef], slots: &[SlotSpec]) -> Result<DeckLayout> {
    let mut layout: Vec<(SlotSpec, Option<LabwareRef>)> =
        slots.iter().map(|s| (s.clone(), None)).collect();

    for lw in labware {
        let free = layout
            .iter_mut()
            .find(|(spec, bound)| bound.is_none() && spec.accepts.contains(&lw.kind));
        match free {
            Some((_, bound)) => *bound = Some(lw.clone()),
            None => {
                return Err(PlanError::DeckCapacity {
                    labware: lw.name.clone(),
                    kind: lw.kind.to_string(),
                });
            }
        }
    }

    Ok(DeckLayout { slots: layout })
}
