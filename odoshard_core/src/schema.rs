// odoshard_core/src/schema.rs

//! Window schema and its compiled dispatch table.
//!
//! A schema says which relative frame offsets fill which output windows. It is
//! compiled once into an offset-indexed table so the driver can answer, for a
//! retained frame, every `(row, channel)` it contributes to without re-reading
//! any input.

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// The static window description, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowSchema {
    /// One entry per output window. Each window lists the relative frame
    /// offsets it joins; its position in the list is its history slot.
    pub data: Vec<Vec<usize>>,
    /// One relative offset per odometry batch slot.
    pub odometry: Vec<usize>,
}

impl Default for WindowSchema {
    fn default() -> Self {
        Self {
            data: vec![
                vec![3, 0],
                vec![4, 1],
                vec![5, 2],
                vec![6, 3],
                //
                vec![3, 1],
                vec![4, 2],
                vec![5, 3],
                vec![6, 4],
                //
                vec![3, 2],
                vec![4, 3],
                vec![5, 4],
                vec![6, 5],
            ],
            odometry: vec![3, 4, 5, 6],
        }
    }
}

impl WindowSchema {
    pub fn compile(&self) -> Result<CompiledSchema, SchemaError> {
        CompiledSchema::new(self)
    }
}

// --- Compiled Table ---

/// Where one occurrence of an offset lands inside the data schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSlot {
    /// Index of the window in the data schema.
    pub window: usize,
    /// Position of the offset inside that window.
    pub position: usize,
}

/// A data-stream write produced by [`CompiledSchema::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataTarget {
    pub row: usize,
    pub position: usize,
}

/// Every output location one retained frame contributes to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    pub data: Vec<DataTarget>,
    pub odometry_rows: Vec<usize>,
}

/// Immutable, validated form of a [`WindowSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSchema {
    batch_size: usize,
    join_depth: usize,
    history_size: usize,
    max_offset: usize,
    // Both tables are indexed by offset, `0..=max_offset`.
    data_index: Vec<Vec<DataSlot>>,
    odometry_index: Vec<Vec<usize>>,
}

impl CompiledSchema {
    pub fn new(schema: &WindowSchema) -> Result<Self, SchemaError> {
        let join_depth = schema.data.first().ok_or(SchemaError::EmptyData)?.len();
        if join_depth == 0 {
            return Err(SchemaError::RaggedWindow {
                window: 0,
                expected: 1,
                found: 0,
            });
        }
        if let Some((window, found)) = schema
            .data
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|&(_, len)| len != join_depth)
        {
            return Err(SchemaError::RaggedWindow {
                window,
                expected: join_depth,
                found,
            });
        }

        let batch_size = schema.odometry.len();
        if batch_size == 0 {
            return Err(SchemaError::EmptyOdometry);
        }
        if schema.data.len() % batch_size != 0 {
            return Err(SchemaError::IndivisibleHistory {
                windows: schema.data.len(),
                batch_size,
            });
        }

        let max_offset = schema
            .data
            .iter()
            .flatten()
            .chain(schema.odometry.iter())
            .copied()
            .max()
            .unwrap_or(0);

        let mut data_index = vec![Vec::new(); max_offset + 1];
        for (window, offsets) in schema.data.iter().enumerate() {
            for (position, &offset) in offsets.iter().enumerate() {
                data_index[offset].push(DataSlot { window, position });
            }
        }

        let mut odometry_index = vec![Vec::new(); max_offset + 1];
        for (slot, &offset) in schema.odometry.iter().enumerate() {
            odometry_index[offset].push(slot);
        }

        Ok(Self {
            batch_size,
            join_depth,
            history_size: schema.data.len() / batch_size,
            max_offset,
            data_index,
            odometry_index,
        })
    }

    /// Number of odometry rows produced per schema application.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of frames joined into one window.
    pub fn join_depth(&self) -> usize {
        self.join_depth
    }

    /// Data rows per odometry row.
    pub fn history_size(&self) -> usize {
        self.history_size
    }

    /// Largest offset named by either table. An odometry offset past the last
    /// data offset therefore also shortens [`CompiledSchema::usable_frames`].
    pub fn max_offset(&self) -> usize {
        self.max_offset
    }

    /// Frames too close to the end to have full window context are excluded.
    pub fn usable_frames(&self, retained_frames: usize) -> usize {
        retained_frames.saturating_sub(self.max_offset)
    }

    pub fn data_slots(&self, offset: usize) -> &[DataSlot] {
        self.data_index.get(offset).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn odometry_slots(&self, offset: usize) -> &[usize] {
        self.odometry_index.get(offset).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All writes the retained frame at `index` contributes.
    ///
    /// The schema is applied at every bias `0, B, 2B, ...` (B = batch size)
    /// not exceeding `index`, with `index - bias` as the offset key. A data
    /// slot lands on row `window + bias * history_size`, an odometry slot on
    /// row `slot + bias`. Biases that leave the key above `max_offset` can
    /// never match and are skipped.
    pub fn dispatch(&self, index: usize) -> Dispatch {
        let mut out = Dispatch::default();

        let lowest_key = index.saturating_sub(self.max_offset);
        let first_bias = lowest_key.div_ceil(self.batch_size) * self.batch_size;

        for bias in (first_bias..=index).step_by(self.batch_size) {
            let key = index - bias;
            for slot in self.data_slots(key) {
                out.data.push(DataTarget {
                    row: slot.window + bias * self.history_size,
                    position: slot.position,
                });
            }
            for &slot in self.odometry_slots(key) {
                out.odometry_rows.push(slot + bias);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn compiled() -> CompiledSchema {
        WindowSchema::default().compile().unwrap()
    }

    #[test]
    fn default_schema_geometry() {
        let schema = compiled();
        assert_eq!(schema.batch_size(), 4);
        assert_eq!(schema.join_depth(), 2);
        assert_eq!(schema.history_size(), 3);
        assert_eq!(schema.max_offset(), 6);
    }

    #[test]
    fn reverse_lookup_lists_every_occurrence() {
        let schema = compiled();
        assert_eq!(schema.data_slots(0), &[DataSlot { window: 0, position: 1 }]);
        assert_eq!(
            schema.data_slots(3),
            &[
                DataSlot { window: 0, position: 0 },
                DataSlot { window: 3, position: 1 },
                DataSlot { window: 4, position: 0 },
                DataSlot { window: 6, position: 1 },
                DataSlot { window: 8, position: 0 },
                DataSlot { window: 9, position: 1 },
            ]
        );
        assert_eq!(schema.odometry_slots(5), &[2]);
        assert!(schema.odometry_slots(0).is_empty());
        assert!(schema.data_slots(99).is_empty());
    }

    #[test]
    fn rejects_malformed_schemas() {
        let empty = WindowSchema {
            data: vec![],
            odometry: vec![0],
        };
        assert_eq!(empty.compile(), Err(SchemaError::EmptyData));

        let ragged = WindowSchema {
            data: vec![vec![1, 0], vec![2]],
            odometry: vec![0, 1],
        };
        assert_eq!(
            ragged.compile(),
            Err(SchemaError::RaggedWindow {
                window: 1,
                expected: 2,
                found: 1
            })
        );

        let no_odometry = WindowSchema {
            data: vec![vec![0]],
            odometry: vec![],
        };
        assert_eq!(no_odometry.compile(), Err(SchemaError::EmptyOdometry));

        let indivisible = WindowSchema {
            data: vec![vec![0], vec![1], vec![2]],
            odometry: vec![0, 1],
        };
        assert_eq!(
            indivisible.compile(),
            Err(SchemaError::IndivisibleHistory {
                windows: 3,
                batch_size: 2
            })
        );
    }

    #[test]
    fn dispatch_of_first_frame() {
        let d = compiled().dispatch(0);
        assert_eq!(d.data, vec![DataTarget { row: 0, position: 1 }]);
        assert!(d.odometry_rows.is_empty());
    }

    #[test]
    fn dispatch_staggers_rows_across_biases() {
        // Frame 7 is offset 3 at bias 4 and offset 7 (unused) at bias 0.
        let d = compiled().dispatch(7);
        let rows: Vec<usize> = d.data.iter().map(|t| t.row).collect();
        assert_eq!(rows, vec![12, 15, 16, 18, 20, 21]);
        assert_eq!(d.odometry_rows, vec![4]);
    }

    #[test]
    fn dispatch_matches_exhaustive_bias_walk() {
        let schema = compiled();
        for index in 0..60 {
            let mut expected = Dispatch::default();
            let mut bias = 0;
            while bias <= index {
                let key = index - bias;
                for slot in schema.data_slots(key) {
                    expected.data.push(DataTarget {
                        row: slot.window + bias * schema.history_size(),
                        position: slot.position,
                    });
                }
                for &slot in schema.odometry_slots(key) {
                    expected.odometry_rows.push(slot + bias);
                }
                bias += schema.batch_size();
            }
            // The naive walk visits biases in increasing order, as does dispatch.
            assert_eq!(schema.dispatch(index), expected, "index {}", index);
        }
    }

    #[test]
    fn every_usable_cell_is_written_exactly_once() {
        let schema = compiled();
        let retained = 57;
        let usable = schema.usable_frames(retained);

        let mut data_cells = HashSet::new();
        let mut odometry_rows = HashSet::new();
        for index in 0..retained {
            let d = schema.dispatch(index);
            for t in d.data {
                if t.row < usable * schema.history_size() {
                    assert!(data_cells.insert((t.row, t.position)), "cell written twice");
                }
            }
            for row in d.odometry_rows {
                if row < usable {
                    assert!(odometry_rows.insert(row), "odometry row written twice");
                }
            }
        }

        assert_eq!(
            data_cells.len(),
            usable * schema.history_size() * schema.join_depth()
        );
        assert_eq!(odometry_rows.len(), usable);
    }

    #[test]
    fn odometry_offsets_count_towards_max_offset() {
        let schema = WindowSchema {
            data: vec![vec![1, 0], vec![2, 1]],
            odometry: vec![2, 5],
        }
        .compile()
        .unwrap();
        assert_eq!(schema.max_offset(), 5);
        assert_eq!(schema.usable_frames(8), 3);
        assert_eq!(schema.odometry_slots(5), &[1]);
    }

    #[test]
    fn usable_frames_saturates() {
        let schema = compiled();
        assert_eq!(schema.usable_frames(5), 0);
        assert_eq!(schema.usable_frames(6), 0);
        assert_eq!(schema.usable_frames(7), 1);
    }
}
