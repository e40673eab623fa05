use crate::octree::types::OctreeError;
use bytemuck::Pod;
use memmap2::{Mmap, MmapMut};
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

enum Storage<T> {
    Memory(Vec<T>),
    Writable { file: File, map: MmapMut },
    ReadOnly(Mmap),
}

///####################################################################################
/// RecordStore
///####################################################################################

/// Append-only array of fixed size records, addressed by index.
/// Records either live in memory or inside a memory mapped file; in the latter case
/// the file is grown by `growth_records` records whenever it fills up, which re-maps it.
/// References into the store are only handed out for the duration of a call,
/// so growing never invalidates anything held by the caller.
pub(crate) struct RecordStore<T: Pod> {
    path: Option<PathBuf>,
    storage: Storage<T>,
    len: usize,
    growth_records: usize,
}

impl<T: Pod> RecordStore<T> {
    const RECORD_SIZE: usize = std::mem::size_of::<T>();

    pub(crate) fn in_memory(growth_records: usize) -> Self {
        Self {
            path: None,
            storage: Storage::Memory(Vec::with_capacity(growth_records)),
            len: 0,
            growth_records: growth_records.max(1),
        }
    }

    /// Creates (or truncates) the file at the given path, zero initialized,
    /// with room for `growth_records` records
    pub(crate) fn create(path: &Path, growth_records: usize) -> Result<Self, OctreeError> {
        let growth_records = growth_records.max(1);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(OctreeError::io(path))?;
        file.set_len((growth_records * Self::RECORD_SIZE) as u64)
            .map_err(OctreeError::io(path))?;
        // SAFETY: the file was just created by this store and is not shared with other mappings
        let map = unsafe { MmapMut::map_mut(&file) }.map_err(OctreeError::io(path))?;
        tracing::debug!(
            "Created store {} with capacity of {} records",
            path.display(),
            growth_records
        );
        Ok(Self {
            path: Some(path.to_path_buf()),
            storage: Storage::Writable { file, map },
            len: 0,
            growth_records,
        })
    }

    /// Maps the file at the given path for reading. Every record in the file is considered live;
    /// use [`RecordStore::limit`] to narrow the view.
    pub(crate) fn open_read_only(path: &Path) -> Result<Self, OctreeError> {
        let file = File::open(path).map_err(OctreeError::io(path))?;
        let file_size = file.metadata().map_err(OctreeError::io(path))?.len() as usize;
        if 0 == file_size {
            return Err(OctreeError::corrupt(path, "empty file"));
        }
        if 0 != file_size % Self::RECORD_SIZE {
            return Err(OctreeError::corrupt(
                path,
                format!(
                    "size {} is not a multiple of the record size {}",
                    file_size,
                    Self::RECORD_SIZE
                ),
            ));
        }
        // SAFETY: the store is only read after a finished build; writers are not expected
        // to modify the file while it is mapped for queries
        let map = unsafe { Mmap::map(&file) }.map_err(OctreeError::io(path))?;
        tracing::debug!(
            "Opened store {} with {} records",
            path.display(),
            file_size / Self::RECORD_SIZE
        );
        Ok(Self {
            path: Some(path.to_path_buf()),
            storage: Storage::ReadOnly(map),
            len: file_size / Self::RECORD_SIZE,
            growth_records: 1,
        })
    }

    /// Narrows the number of live records to at most `len`
    pub(crate) fn limit(&mut self, len: usize) {
        self.len = self.len.min(len);
        if let Storage::Memory(records) = &mut self.storage {
            records.truncate(len);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_read_only(&self) -> bool {
        matches!(self.storage, Storage::ReadOnly(_))
    }

    /// The number of records the store can hold before it needs to grow
    pub(crate) fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Memory(records) => records.capacity(),
            Storage::Writable { map, .. } => map.len() / Self::RECORD_SIZE,
            Storage::ReadOnly(map) => map.len() / Self::RECORD_SIZE,
        }
    }

    /// The live records; mappings are page aligned, so the bytes can be cast in place
    pub(crate) fn records(&self) -> &[T] {
        let byte_len = self.len * Self::RECORD_SIZE;
        match &self.storage {
            Storage::Memory(records) => &records[..self.len],
            Storage::Writable { map, .. } => bytemuck::cast_slice(&map[..byte_len]),
            Storage::ReadOnly(map) => bytemuck::cast_slice(&map[..byte_len]),
        }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        self.records().get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Result<&mut T, OctreeError> {
        if index >= self.len {
            return Err(OctreeError::InvalidHandle(index as i64));
        }
        let byte_range = index * Self::RECORD_SIZE..(index + 1) * Self::RECORD_SIZE;
        match &mut self.storage {
            Storage::Memory(records) => Ok(&mut records[index]),
            Storage::Writable { map, .. } => Ok(bytemuck::from_bytes_mut(&mut map[byte_range])),
            Storage::ReadOnly(_) => Err(OctreeError::ReadOnlyStore),
        }
    }

    /// Appends the record to the end of the store, growing the backing file if needed
    /// * Returns with the index of the new record
    pub(crate) fn push(&mut self, record: T) -> Result<usize, OctreeError> {
        let index = self.len;
        if let Storage::Writable { file, map } = &mut self.storage {
            if (index + 1) * Self::RECORD_SIZE > map.len() {
                let path = self.path.as_deref().unwrap_or(Path::new(""));
                let new_capacity = map.len() / Self::RECORD_SIZE + self.growth_records;
                map.flush().map_err(OctreeError::io(path))?;
                file.set_len((new_capacity * Self::RECORD_SIZE) as u64)
                    .map_err(OctreeError::io(path))?;
                // SAFETY: the previous mapping is replaced here, and no reference into it
                // outlives a call on the store
                *map = unsafe { MmapMut::map_mut(&*file) }.map_err(OctreeError::io(path))?;
                tracing::debug!(
                    "Grew store {} to {} records",
                    path.display(),
                    new_capacity
                );
            }
        }
        match &mut self.storage {
            Storage::Memory(records) => {
                if records.len() == records.capacity() {
                    records.reserve(self.growth_records);
                }
                records.push(record);
            }
            Storage::Writable { map, .. } => {
                map[index * Self::RECORD_SIZE..(index + 1) * Self::RECORD_SIZE]
                    .copy_from_slice(bytemuck::bytes_of(&record));
            }
            Storage::ReadOnly(_) => return Err(OctreeError::ReadOnlyStore),
        }
        self.len += 1;
        Ok(index)
    }

    pub(crate) fn flush(&self) -> Result<(), OctreeError> {
        if let (Storage::Writable { map, .. }, Some(path)) = (&self.storage, &self.path) {
            map.flush().map_err(OctreeError::io(path))?;
        }
        Ok(())
    }

    /// Flushes the records to disk, truncates the file to the live records
    /// and re-opens it read-only. In-memory stores are left untouched.
    pub(crate) fn finish(&mut self) -> Result<(), OctreeError> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        if !matches!(self.storage, Storage::Writable { .. }) {
            return Ok(());
        }
        let len = self.len;
        tracing::debug!(
            "Finishing store {} at {} of {} records",
            path.display(),
            len,
            self.capacity()
        );
        let Storage::Writable { file, map } =
            std::mem::replace(&mut self.storage, Storage::Memory(Vec::new()))
        else {
            return Ok(());
        };
        map.flush().map_err(OctreeError::io(&path))?;
        drop(map);
        file.set_len((len * Self::RECORD_SIZE) as u64)
            .map_err(OctreeError::io(&path))?;
        file.sync_all().map_err(OctreeError::io(&path))?;
        drop(file);
        *self = Self::open_read_only(&path)?;
        self.limit(len);
        Ok(())
    }
}
