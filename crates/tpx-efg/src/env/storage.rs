use crate::*;

/// Signal arena, indexed `[infoset][signal]`.
///
/// Allocated once per attach with widths resolved against each infoset's
/// action count; no vector is resized afterwards.
#[derive(Debug)]
pub struct Storage {
    slots: Vec<Vec<Vector>>,
}

impl Storage {
    pub fn new(tree: &GameTree, widths: &[Width]) -> Self {
        Self {
            slots: tree
                .infosets()
                .iter()
                .map(|infoset| {
                    widths
                        .iter()
                        .map(|w| Vector::fill(w.resolve(infoset.actions), 0.0))
                        .collect()
                })
                .collect(),
        }
    }

    pub fn get(&self, at: InfosetId, signal: Signal) -> &Vector {
        &self.slots[at][signal.index()]
    }
    pub fn get_mut(&mut self, at: InfosetId, signal: Signal) -> &mut Vector {
        &mut self.slots[at][signal.index()]
    }
    pub fn put(&mut self, at: InfosetId, signal: Signal, value: Vector) {
        debug_assert_eq!(
            value.width(),
            self.slots[at][signal.index()].width(),
            "signals are never resized"
        );
        self.slots[at][signal.index()] = value;
    }
}
