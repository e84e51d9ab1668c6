// odoshard_core/src/shard.rs

use tracing::{debug, warn};

use crate::error::ShardError;
use crate::store::{ShardId, ShardShape, Stream, TensorStore};

// =========================================================================
// == Pure Index Arithmetic ==
// =========================================================================

/// Frame capacity of every shard needed to hold `frames` frames when each
/// shard holds at most `capacity`. All shards are full except possibly the
/// last one, which gets the remainder.
///
/// Panics if `capacity` is zero; [`ShardWriter::new`] rejects that geometry.
pub fn shard_sizes(frames: usize, capacity: usize) -> Vec<usize> {
    assert!(capacity > 0, "shard capacity must be positive");
    let full = frames / capacity;
    let mut sizes = vec![capacity; full];
    if frames % capacity > 0 {
        sizes.push(frames % capacity);
    }
    sizes
}

/// Maps a sweep-global row to `(shard index, row inside that shard)`.
/// `capacity` must be non-zero.
pub fn locate(row: usize, capacity: usize) -> (usize, usize) {
    (row / capacity, row % capacity)
}

// =========================================================================
// == Shard Writer ==
// =========================================================================

/// Fixed per-run geometry of every shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardGeometry {
    pub max_frames_per_shard: usize,
    /// Data rows per frame.
    pub history_size: usize,
    /// Data channels per row (features times join depth).
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl ShardGeometry {
    /// Rows of `stream` held by a full shard.
    pub fn capacity(&self, stream: Stream) -> usize {
        self.max_frames_per_shard * self.multiplier(stream)
    }

    pub fn multiplier(&self, stream: Stream) -> usize {
        match stream {
            Stream::Data => self.history_size,
            Stream::Odometry => 1,
        }
    }

    fn shape(&self, frames: usize) -> ShardShape {
        ShardShape {
            frames,
            history_size: self.history_size,
            channels: self.channels,
            height: self.height,
            width: self.width,
        }
    }
}

/// Result of a single [`ShardWriter::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The row lies past the sweep's usable frames; nothing was written.
    OutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum WriterState {
    Unopened,
    Active {
        sweep: usize,
        usable_frames: usize,
        shards: Vec<ShardId>,
    },
    Closed,
}

/// Public view of the writer's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterPhase {
    Unopened,
    Active,
    Closed,
}

/// Spreads one sweep's rows over a bounded number of fixed-size shards.
///
/// Lifecycle: `Unopened -> Active -> Closed`, and back to `Active` with each
/// new sequence. Sweep indices count up from 0 across sequences.
#[derive(Debug)]
pub struct ShardWriter<S: TensorStore> {
    store: S,
    geometry: ShardGeometry,
    state: WriterState,
    next_sweep: usize,
}

impl<S: TensorStore> ShardWriter<S> {
    pub fn new(store: S, geometry: ShardGeometry) -> Result<Self, ShardError> {
        if geometry.max_frames_per_shard == 0 {
            return Err(ShardError::ZeroCapacity);
        }
        Ok(Self {
            store,
            geometry,
            state: WriterState::Unopened,
            next_sweep: 0,
        })
    }

    pub fn geometry(&self) -> &ShardGeometry {
        &self.geometry
    }

    /// Index the next [`ShardWriter::new_sequence`] will assign.
    pub fn next_sweep(&self) -> usize {
        self.next_sweep
    }

    pub fn phase(&self) -> WriterPhase {
        match self.state {
            WriterState::Unopened => WriterPhase::Unopened,
            WriterState::Active { .. } => WriterPhase::Active,
            WriterState::Closed => WriterPhase::Closed,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Allocates the shard set for a sweep with `usable_frames` output frames
    /// and returns the ids of the new shards. A still-active sequence is
    /// closed first.
    pub fn new_sequence(&mut self, usable_frames: usize) -> Result<Vec<ShardId>, ShardError> {
        if matches!(self.state, WriterState::Active { .. }) {
            self.close()?;
        }

        let sweep = self.next_sweep;
        self.next_sweep += 1;

        let sizes = shard_sizes(usable_frames, self.geometry.max_frames_per_shard);
        let mut shards = Vec::with_capacity(sizes.len());
        for (shard, frames) in sizes.into_iter().enumerate() {
            let id = ShardId { sweep, shard };
            self.store.create(id, self.geometry.shape(frames))?;
            debug!("Allocated {} with {} frames", id, frames);
            shards.push(id);
        }

        self.state = WriterState::Active {
            sweep,
            usable_frames,
            shards: shards.clone(),
        };
        Ok(shards)
    }

    /// Writes one cell addressed by its sweep-global row.
    ///
    /// Rows at or past `usable_frames * multiplier` are reported and dropped.
    pub fn put(
        &mut self,
        stream: Stream,
        row: usize,
        channel: usize,
        values: &[f32],
    ) -> Result<WriteOutcome, ShardError> {
        let WriterState::Active {
            sweep,
            usable_frames,
            shards,
        } = &self.state
        else {
            return Err(ShardError::NotActive);
        };

        if row >= usable_frames * self.geometry.multiplier(stream) {
            warn!("Sweep {}: {} row {} out of the scope", sweep, stream, row);
            return Ok(WriteOutcome::OutOfRange);
        }

        let (shard_index, local_row) = locate(row, self.geometry.capacity(stream));
        let id = shards[shard_index];
        self.store.write_cell(id, stream, local_row, channel, values)?;
        Ok(WriteOutcome::Written)
    }

    /// Releases every shard of the active sequence. Each shard gets its close
    /// call even if an earlier one fails; the first failure is returned.
    pub fn close(&mut self) -> Result<(), ShardError> {
        if !matches!(self.state, WriterState::Active { .. }) {
            return Err(ShardError::NotActive);
        }
        let mut first_error = None;
        if let WriterState::Active { sweep, shards, .. } =
            std::mem::replace(&mut self.state, WriterState::Closed)
        {
            debug!("Closing sweep {} ({} shards)", sweep, shards.len());
            for id in shards {
                if let Err(e) = self.store.close(id) {
                    warn!("Failed to close {}: {}", id, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;

    fn geometry(max_frames_per_shard: usize) -> ShardGeometry {
        ShardGeometry {
            max_frames_per_shard,
            history_size: 3,
            channels: 2,
            height: 1,
            width: 2,
        }
    }

    #[test]
    fn shard_sizes_cover_frames_exactly() {
        for frames in 0..50 {
            for capacity in 1..12 {
                let sizes = shard_sizes(frames, capacity);
                assert_eq!(sizes.len(), frames.div_ceil(capacity));
                assert_eq!(sizes.iter().sum::<usize>(), frames);
                let (last, full) = match sizes.split_last() {
                    Some(split) => split,
                    None => continue,
                };
                assert!(full.iter().all(|&s| s == capacity));
                let expected_last = if frames % capacity == 0 {
                    capacity
                } else {
                    frames % capacity
                };
                assert_eq!(*last, expected_last);
            }
        }
    }

    #[test]
    fn locate_splits_rows() {
        assert_eq!(locate(0, 200), (0, 0));
        assert_eq!(locate(199, 200), (0, 199));
        assert_eq!(locate(200, 200), (1, 0));
        assert_eq!(locate(1234, 600), (2, 34));
    }

    #[test]
    fn new_sequence_allocates_exact_shapes() {
        let mut writer = ShardWriter::new(MemoryStore::new(), geometry(4)).unwrap();
        assert_eq!(writer.phase(), WriterPhase::Unopened);

        let ids = writer.new_sequence(10).unwrap();
        assert_eq!(writer.phase(), WriterPhase::Active);
        assert_eq!(ids.len(), 3);

        let frames: Vec<usize> = ids
            .iter()
            .map(|id| writer.store().shard(*id).unwrap().shape.frames)
            .collect();
        assert_eq!(frames, vec![4, 4, 2]);
    }

    #[test]
    fn put_routes_rows_to_shards() {
        let mut writer = ShardWriter::new(MemoryStore::new(), geometry(4)).unwrap();
        writer.new_sequence(10).unwrap();

        // Data capacity is 4 * 3 = 12 rows per shard.
        assert_eq!(
            writer.put(Stream::Data, 13, 1, &[7.0, 8.0]).unwrap(),
            WriteOutcome::Written
        );
        assert_eq!(
            writer.put(Stream::Odometry, 9, 5, &[3.5]).unwrap(),
            WriteOutcome::Written
        );

        let store = writer.store();
        let second = store.shard(ShardId { sweep: 0, shard: 1 }).unwrap();
        assert_eq!(second.cell(Stream::Data, 1, 1), &[7.0, 8.0]);
        let third = store.shard(ShardId { sweep: 0, shard: 2 }).unwrap();
        assert_eq!(third.cell(Stream::Odometry, 1, 5), &[3.5]);
    }

    #[test]
    fn out_of_range_rows_are_dropped() {
        let mut writer = ShardWriter::new(MemoryStore::new(), geometry(4)).unwrap();
        writer.new_sequence(10).unwrap();
        assert_eq!(
            writer.put(Stream::Data, 30, 0, &[1.0, 1.0]).unwrap(),
            WriteOutcome::OutOfRange
        );
        assert_eq!(
            writer.put(Stream::Odometry, 10, 0, &[1.0]).unwrap(),
            WriteOutcome::OutOfRange
        );
        let writes: usize = writer
            .store()
            .shards()
            .map(|(_, s)| s.data_writes + s.odometry_writes)
            .sum();
        assert_eq!(writes, 0);
    }

    #[test]
    fn zero_usable_frames_allocates_nothing() {
        let mut writer = ShardWriter::new(MemoryStore::new(), geometry(4)).unwrap();
        assert!(writer.new_sequence(0).unwrap().is_empty());
        assert!(writer.store().is_empty());
        assert_eq!(
            writer.put(Stream::Odometry, 0, 0, &[1.0]).unwrap(),
            WriteOutcome::OutOfRange
        );
        writer.close().unwrap();
    }

    /// Delegates to a [`MemoryStore`] but refuses to close the first shard.
    struct StuckFirstShard(MemoryStore);

    impl TensorStore for StuckFirstShard {
        fn create(&mut self, id: ShardId, shape: ShardShape) -> Result<(), StoreError> {
            self.0.create(id, shape)
        }

        fn write_cell(
            &mut self,
            id: ShardId,
            stream: Stream,
            row: usize,
            channel: usize,
            values: &[f32],
        ) -> Result<(), StoreError> {
            self.0.write_cell(id, stream, row, channel, values)
        }

        fn close(&mut self, id: ShardId) -> Result<(), StoreError> {
            if id.shard == 0 {
                return Err(StoreError::UnknownShard(id));
            }
            self.0.close(id)
        }
    }

    #[test]
    fn failed_close_still_releases_remaining_shards() {
        let mut writer = ShardWriter::new(StuckFirstShard(MemoryStore::new()), geometry(2)).unwrap();
        writer.new_sequence(6).unwrap();

        assert!(matches!(
            writer.close(),
            Err(ShardError::Store(StoreError::UnknownShard(ShardId { sweep: 0, shard: 0 })))
        ));
        assert_eq!(writer.phase(), WriterPhase::Closed);

        let closed: Vec<bool> = writer.store().0.shards().map(|(_, s)| s.closed).collect();
        assert_eq!(closed, vec![false, true, true]);
    }

    #[test]
    fn zero_capacity_geometry_is_rejected() {
        assert!(matches!(
            ShardWriter::new(MemoryStore::new(), geometry(0)),
            Err(ShardError::ZeroCapacity)
        ));
    }

    #[test]
    fn lifecycle_and_sweep_numbering() {
        let mut writer = ShardWriter::new(MemoryStore::new(), geometry(4)).unwrap();
        assert!(matches!(
            writer.put(Stream::Odometry, 0, 0, &[1.0]),
            Err(ShardError::NotActive)
        ));
        assert!(matches!(writer.close(), Err(ShardError::NotActive)));

        writer.new_sequence(3).unwrap();
        writer.close().unwrap();
        assert_eq!(writer.phase(), WriterPhase::Closed);
        assert!(writer.store().shard(ShardId { sweep: 0, shard: 0 }).unwrap().closed);

        assert_eq!(writer.next_sweep(), 1);
        let ids = writer.new_sequence(5).unwrap();
        assert_eq!(ids[0], ShardId { sweep: 1, shard: 0 });
        // Opening another sequence closes the active one.
        writer.new_sequence(1).unwrap();
        assert!(writer.store().shard(ShardId { sweep: 1, shard: 1 }).unwrap().closed);
        assert_eq!(writer.into_store().len(), 1 + 2 + 1);
    }
}
