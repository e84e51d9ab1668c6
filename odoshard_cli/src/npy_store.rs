// odoshard_cli/src/npy_store.rs

//! On-disk tensor store: every shard is a pair of zero-filled `.npy` files
//! written cell by cell in place, so memory use stays at one frame.

use ndarray::{Ix2, Ix4};
use ndarray_npy::write_zeroed_npy;
use odoshard_core::prelude::{ShardId, ShardShape, Stream, StoreError, TensorStore};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ELEMENT_BYTES: u64 = std::mem::size_of::<f32>() as u64;

/// `<prefix>.<sweep>.<shard>.<stream>.npy`
pub fn shard_path(prefix: &Path, id: ShardId, stream: Stream) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!(".{}.{}.{}.npy", id.sweep, id.shard, stream.name()));
    PathBuf::from(name)
}

/// One pre-allocated `.npy` file.
#[derive(Debug)]
struct NpyFile {
    path: PathBuf,
    file: File,
    /// Byte offset of the first element, just past the header.
    data_start: u64,
}

impl NpyFile {
    fn create(path: PathBuf, shape: &ShardShape, stream: Stream) -> Result<Self, StoreError> {
        let create_error = |reason: String| StoreError::Create {
            path: path.clone(),
            reason,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| create_error(e.to_string()))?;

        let rows = shape.rows(stream);
        let elements = match stream {
            Stream::Data => {
                write_zeroed_npy::<f32, _>(
                    &file,
                    Ix4(rows, shape.channels(stream), shape.height, shape.width),
                )
                .map_err(|e| create_error(e.to_string()))?;
                rows * shape.channels(stream) * shape.cell_len(stream)
            }
            Stream::Odometry => {
                write_zeroed_npy::<f32, _>(&file, Ix2(rows, shape.channels(stream)))
                    .map_err(|e| create_error(e.to_string()))?;
                rows * shape.channels(stream)
            }
        };

        let file_len = file
            .metadata()
            .map_err(|e| create_error(e.to_string()))?
            .len();
        let data_start = file_len - elements as u64 * ELEMENT_BYTES;

        Ok(Self {
            path,
            file,
            data_start,
        })
    }
}

#[derive(Debug)]
struct OpenShard {
    shape: ShardShape,
    data: NpyFile,
    odometry: NpyFile,
}

/// Writes shards as `.npy` pairs next to a common path prefix.
#[derive(Debug)]
pub struct NpyShardStore {
    prefix: PathBuf,
    open: HashMap<ShardId, OpenShard>,
}

impl NpyShardStore {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            open: HashMap::new(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }
}

impl TensorStore for NpyShardStore {
    fn create(&mut self, id: ShardId, shape: ShardShape) -> Result<(), StoreError> {
        let data = NpyFile::create(shard_path(&self.prefix, id, Stream::Data), &shape, Stream::Data)?;
        let odometry = NpyFile::create(
            shard_path(&self.prefix, id, Stream::Odometry),
            &shape,
            Stream::Odometry,
        )?;
        info!(
            "Created {:?} ({} frames x {} history)",
            data.path, shape.frames, shape.history_size
        );
        self.open.insert(
            id,
            OpenShard {
                shape,
                data,
                odometry,
            },
        );
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
        let shard = self.open.get_mut(&id).ok_or(StoreError::UnknownShard(id))?;
        shard.shape.check_cell(id, stream, row, channel, values)?;

        let cell = (row * shard.shape.channels(stream) + channel) * values.len();
        let target = match stream {
            Stream::Data => &mut shard.data,
            Stream::Odometry => &mut shard.odometry,
        };
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();

        let write_error = |source| StoreError::Write {
            id,
            stream,
            row,
            channel,
            source,
        };
        target
            .file
            .seek(SeekFrom::Start(target.data_start + cell as u64 * ELEMENT_BYTES))
            .map_err(write_error)?;
        target.file.write_all(&bytes).map_err(write_error)?;
        Ok(())
    }

    fn close(&mut self, id: ShardId) -> Result<(), StoreError> {
        let shard = self.open.remove(&id).ok_or(StoreError::UnknownShard(id))?;
        for npy in [&shard.data, &shard.odometry] {
            npy.file
                .sync_all()
                .map_err(|source| StoreError::Flush { id, source })?;
            debug!("Closed {:?}", npy.path);
        }
        Ok(())
    }
}
