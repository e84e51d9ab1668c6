// odoshard_core/src/store.rs

use std::collections::BTreeMap;
use std::fmt;

use crate::error::StoreError;

/// Width of one odometry row: `[tx, ty, tz, rx, ry, rz]`.
pub const ODOMETRY_WIDTH: usize = 6;

// =========================================================================
// == Identifiers and Shapes ==
// =========================================================================

/// The two tensors every shard carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stream {
    /// `[rows, channels, height, width]` image stack.
    Data,
    /// `[rows, 6]` motion deltas.
    Odometry,
}

impl Stream {
    pub fn name(&self) -> &'static str {
        match self {
            Stream::Data => "data",
            Stream::Odometry => "odometry",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Names one container: the sweep that produced it and its position in the
/// sweep's shard list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId {
    pub sweep: usize,
    pub shard: usize,
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard {}.{}", self.sweep, self.shard)
    }
}

/// Exact dimensions of one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardShape {
    /// Odometry rows (frames) held by this shard.
    pub frames: usize,
    /// Data rows per frame.
    pub history_size: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl ShardShape {
    pub fn rows(&self, stream: Stream) -> usize {
        match stream {
            Stream::Data => self.frames * self.history_size,
            Stream::Odometry => self.frames,
        }
    }

    pub fn channels(&self, stream: Stream) -> usize {
        match stream {
            Stream::Data => self.channels,
            Stream::Odometry => ODOMETRY_WIDTH,
        }
    }

    /// Number of values in one `(row, channel)` cell.
    pub fn cell_len(&self, stream: Stream) -> usize {
        match stream {
            Stream::Data => self.height * self.width,
            Stream::Odometry => 1,
        }
    }

    pub fn check_cell(
        &self,
        id: ShardId,
        stream: Stream,
        row: usize,
        channel: usize,
        values: &[f32],
    ) -> Result<(), StoreError> {
        if row >= self.rows(stream) || channel >= self.channels(stream) {
            return Err(StoreError::CellOutOfBounds {
                id,
                stream,
                row,
                channel,
            });
        }
        if values.len() != self.cell_len(stream) {
            return Err(StoreError::CellShape {
                stream,
                expected: self.cell_len(stream),
                found: values.len(),
            });
        }
        Ok(())
    }
}

// =========================================================================
// == The Tensor Store Contract ==
// =========================================================================

/// A backend that owns fixed-shape containers addressable by `(row, channel)`.
///
/// The shard writer decides what goes where; the store only knows how to
/// allocate, fill and release containers.
pub trait TensorStore {
    /// Allocates a zero-filled container.
    fn create(&mut self, id: ShardId, shape: ShardShape) -> Result<(), StoreError>;

    /// Overwrites one cell. `values` holds `shape.cell_len(stream)` entries in
    /// row-major order.
    fn write_cell(
        &mut self,
        id: ShardId,
        stream: Stream,
        row: usize,
        channel: usize,
        values: &[f32],
    ) -> Result<(), StoreError>;

    /// Flushes and releases a container.
    fn close(&mut self, id: ShardId) -> Result<(), StoreError>;
}

// --- In-Memory Implementation ---

/// Contents of one in-memory shard.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryShard {
    pub shape: ShardShape,
    pub data: Vec<f32>,
    pub odometry: Vec<f32>,
    /// Number of `write_cell` calls received, per stream.
    pub data_writes: usize,
    pub odometry_writes: usize,
    pub closed: bool,
}

impl MemoryShard {
    fn new(shape: ShardShape) -> Self {
        let data_len =
            shape.rows(Stream::Data) * shape.channels(Stream::Data) * shape.cell_len(Stream::Data);
        Self {
            shape,
            data: vec![0.0; data_len],
            odometry: vec![0.0; shape.rows(Stream::Odometry) * ODOMETRY_WIDTH],
            data_writes: 0,
            odometry_writes: 0,
            closed: false,
        }
    }

    /// The values of one cell.
    pub fn cell(&self, stream: Stream, row: usize, channel: usize) -> &[f32] {
        let len = self.shape.cell_len(stream);
        let start = (row * self.shape.channels(stream) + channel) * len;
        match stream {
            Stream::Data => &self.data[start..start + len],
            Stream::Odometry => &self.odometry[start..start + len],
        }
    }
}

/// Keeps every container in memory. Closed shards stay inspectable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    shards: BTreeMap<ShardId, MemoryShard>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shard(&self, id: ShardId) -> Option<&MemoryShard> {
        self.shards.get(&id)
    }

    pub fn shards(&self) -> impl Iterator<Item = (&ShardId, &MemoryShard)> {
        self.shards.iter()
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}

impl TensorStore for MemoryStore {
    fn create(&mut self, id: ShardId, shape: ShardShape) -> Result<(), StoreError> {
        self.shards.insert(id, MemoryShard::new(shape));
        Ok(())
    }

    fn write_cell(
        &mut self,
        id: ShardId,
        stream: Stream,
        row: usize,
        channel: usize,
        values: &[f32],
    ) -> Result<(), StoreError> {
        let shard = self
            .shards
            .get_mut(&id)
            .filter(|s| !s.closed)
            .ok_or(StoreError::UnknownShard(id))?;
        shard.shape.check_cell(id, stream, row, channel, values)?;

        let len = values.len();
        let start = (row * shard.shape.channels(stream) + channel) * len;
        let target = match stream {
            Stream::Data => {
                shard.data_writes += 1;
                &mut shard.data
            }
            Stream::Odometry => {
                shard.odometry_writes += 1;
                &mut shard.odometry
            }
        };
        target[start..start + len].copy_from_slice(values);
        Ok(())
    }

    fn close(&mut self, id: ShardId) -> Result<(), StoreError> {
        let shard = self
            .shards
            .get_mut(&id)
            .ok_or(StoreError::UnknownShard(id))?;
        shard.closed = true;
        Ok(())
    }
}
