//! Dictionary storage
//!
//! A dictionary is a dense array indexed by the nine sweep indices, each entry
//! holding one sample vector. The generator talks to storage only through the
//! [`DictionaryStore`] trait:
//!
//! ```text
//! init(shape, sample_length)      once, before any entry
//! record_axes(grid)               once, optional
//! store_entry(index, samples)     per combination, odometer order
//! progress() -> last index        resume point
//! flush()                         at checkpoints and at the end
//! ```
//!
//! Two implementations ship with the crate: [`MemoryStore`] keeps an
//! `ndarray` tensor and [`JsonStore`] writes versioned snapshots to disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, ArrayView1, ArrayViewD, Axis, Ix1, IxDyn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sweep::{IndexTuple, SweepGrid};

/// Snapshot format written by [`JsonStore`].
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store used before init")]
    NotInitialized,

    #[error("store was created for shape {found:?}, sweep has shape {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("sample vector has {actual} values, store expects {expected}")]
    SampleLength { expected: usize, actual: usize },

    #[error("index {index:?} is outside store shape {shape:?}")]
    IndexOutOfBounds { index: Vec<usize>, shape: Vec<usize> },

    #[error("unsupported snapshot version {0} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Write-side contract between the generator and a dictionary backend.
pub trait DictionaryStore {
    /// Declare the index shape and the sample vector length.
    ///
    /// Called again on resume; implementations must then check that the
    /// layout matches what they already hold.
    fn init(&mut self, shape: IndexTuple, sample_length: usize) -> Result<(), StoreError>;

    /// Keep the parameter values next to the data.
    fn record_axes(&mut self, _grid: &SweepGrid) -> Result<(), StoreError> {
        Ok(())
    }

    fn store_entry(&mut self, index: IndexTuple, samples: &[f64]) -> Result<(), StoreError>;

    /// Index of the last entry written, if any.
    fn progress(&self) -> Option<IndexTuple>;

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Shape and vector length agreed at `init`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Layout {
    shape: IndexTuple,
    sample_length: usize,
}

impl Layout {
    fn accept(current: &mut Option<Layout>, shape: IndexTuple, sample_length: usize) -> Result<(), StoreError> {
        let requested = Layout { shape, sample_length };
        match current {
            Some(layout) if layout.shape != shape => Err(StoreError::ShapeMismatch {
                expected: shape.to_vec(),
                found: layout.shape.to_vec(),
            }),
            Some(layout) if layout.sample_length != sample_length => Err(StoreError::SampleLength {
                expected: layout.sample_length,
                actual: sample_length,
            }),
            Some(_) => Ok(()),
            None => {
                *current = Some(requested);
                Ok(())
            }
        }
    }

    fn check(&self, index: &IndexTuple, samples: &[f64]) -> Result<(), StoreError> {
        if index.iter().zip(&self.shape).any(|(i, n)| i >= n) {
            return Err(StoreError::IndexOutOfBounds {
                index: index.to_vec(),
                shape: self.shape.to_vec(),
            });
        }
        if samples.len() != self.sample_length {
            return Err(StoreError::SampleLength {
                expected: self.sample_length,
                actual: samples.len(),
            });
        }
        Ok(())
    }
}

// =================================================================================================
// In-memory tensor
// =================================================================================================

/// Dense in-memory dictionary of shape `[shape..., sample_length]`.
///
/// Unwritten entries hold NaN.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    layout: Option<Layout>,
    data: Option<ArrayD<f64>>,
    axes: Option<SweepGrid>,
    last: Option<IndexTuple>,
    written: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whole tensor, `None` before `init`.
    pub fn data(&self) -> Option<&ArrayD<f64>> {
        self.data.as_ref()
    }

    pub fn axes(&self) -> Option<&SweepGrid> {
        self.axes.as_ref()
    }

    /// Sample vector at `index`.
    pub fn entry(&self, index: IndexTuple) -> Option<ArrayView1<'_, f64>> {
        let layout = self.layout?;
        if index.iter().zip(&layout.shape).any(|(i, n)| i >= n) {
            return None;
        }

        let mut view: ArrayViewD<'_, f64> = self.data.as_ref()?.view();
        for &i in &index {
            view = view.index_axis_move(Axis(0), i);
        }
        view.into_dimensionality::<Ix1>().ok()
    }

    /// Entries stored since creation.
    pub fn written(&self) -> usize {
        self.written
    }
}

impl DictionaryStore for MemoryStore {
    fn init(&mut self, shape: IndexTuple, sample_length: usize) -> Result<(), StoreError> {
        Layout::accept(&mut self.layout, shape, sample_length)?;
        if self.data.is_none() {
            let mut dims = shape.to_vec();
            dims.push(sample_length);
            self.data = Some(ArrayD::from_elem(IxDyn(&dims), f64::NAN));
        }
        Ok(())
    }

    fn record_axes(&mut self, grid: &SweepGrid) -> Result<(), StoreError> {
        self.axes = Some(grid.clone());
        Ok(())
    }

    fn store_entry(&mut self, index: IndexTuple, samples: &[f64]) -> Result<(), StoreError> {
        let layout = self.layout.ok_or(StoreError::NotInitialized)?;
        layout.check(&index, samples)?;
        let data = self.data.as_mut().ok_or(StoreError::NotInitialized)?;

        let mut view = data.view_mut();
        for &i in &index {
            view = view.index_axis_move(Axis(0), i);
        }
        for (dst, &src) in view.iter_mut().zip(samples) {
            *dst = src;
        }

        self.last = Some(index);
        self.written += 1;
        Ok(())
    }

    fn progress(&self) -> Option<IndexTuple> {
        self.last
    }
}

// =================================================================================================
// JSON snapshot file
// =================================================================================================

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    created: String,
    updated: String,
    layout: Option<Layout>,
    #[serde(default)]
    axes: Option<SweepGrid>,
    last_index: Option<IndexTuple>,
    entries: Vec<StoredEntry>,
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    index: IndexTuple,
    samples: Vec<f64>,
}

/// Dictionary persisted as a single JSON snapshot.
///
/// Entries accumulate in memory and reach disk on [`flush`](DictionaryStore::flush),
/// which replaces the file atomically (temporary file, then rename). Reopening
/// the same path restores the entries and the progress index.
///
/// # Example
///
/// ```rust,ignore
/// let mut store = JsonStore::open("dictionary.json")?;
/// generator.generate(&mut sequence, &mut sweep, &mut store)?;
/// ```
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    created: String,
    layout: Option<Layout>,
    axes: Option<SweepGrid>,
    entries: BTreeMap<IndexTuple, Vec<f64>>,
    last: Option<IndexTuple>,
    dirty: bool,
}

impl JsonStore {
    /// Empty store that will overwrite `path` on the first flush.
    pub fn create(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            created: chrono::Utc::now().to_rfc3339(),
            layout: None,
            axes: None,
            entries: BTreeMap::new(),
            last: None,
            dirty: true,
        }
    }

    /// Load `path` if it exists, otherwise start empty.
    ///
    /// # Errors
    ///
    /// Unreadable file, malformed JSON or an unknown snapshot version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::create(path));
        }

        let snapshot: Snapshot = serde_json::from_str(&fs::read_to_string(path)?)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::UnsupportedVersion(snapshot.version));
        }

        log::debug!(
            "loaded {} dictionary entries from {}",
            snapshot.entries.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            created: snapshot.created,
            layout: snapshot.layout,
            axes: snapshot.axes,
            entries: snapshot
                .entries
                .into_iter()
                .map(|entry| (entry.index, entry.samples))
                .collect(),
            last: snapshot.last_index,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry(&self, index: IndexTuple) -> Option<&[f64]> {
        self.entries.get(&index).map(Vec::as_slice)
    }

    pub fn axes(&self) -> Option<&SweepGrid> {
        self.axes.as_ref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn temporary_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl DictionaryStore for JsonStore {
    fn init(&mut self, shape: IndexTuple, sample_length: usize) -> Result<(), StoreError> {
        Layout::accept(&mut self.layout, shape, sample_length)
    }

    fn record_axes(&mut self, grid: &SweepGrid) -> Result<(), StoreError> {
        if self.axes.as_ref() != Some(grid) {
            self.axes = Some(grid.clone());
            self.dirty = true;
        }
        Ok(())
    }

    fn store_entry(&mut self, index: IndexTuple, samples: &[f64]) -> Result<(), StoreError> {
        let layout = self.layout.ok_or(StoreError::NotInitialized)?;
        layout.check(&index, samples)?;

        self.entries.insert(index, samples.to_vec());
        self.last = Some(index);
        self.dirty = true;
        Ok(())
    }

    fn progress(&self) -> Option<IndexTuple> {
        self.last
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            created: self.created.clone(),
            updated: chrono::Utc::now().to_rfc3339(),
            layout: self.layout,
            axes: self.axes.clone(),
            last_index: self.last,
            entries: self
                .entries
                .iter()
                .map(|(index, samples)| StoredEntry {
                    index: *index,
                    samples: samples.clone(),
                })
                .collect(),
        };

        let temporary = self.temporary_path();
        fs::write(&temporary, serde_json::to_string(&snapshot)?)?;
        fs::rename(&temporary, &self.path)?;
        self.dirty = false;

        log::debug!("flushed {} entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SHAPE: IndexTuple = [2, 1, 1, 1, 1, 1, 1, 1, 3];

    fn index(cbv: usize, bat: usize) -> IndexTuple {
        let mut index = [0; 9];
        index[0] = cbv;
        index[8] = bat;
        index
    }

    #[test]
    fn test_memory_store_layout() {
        let mut store = MemoryStore::new();
        store.init(SHAPE, 4).unwrap();

        let data = store.data().unwrap();
        assert_eq!(data.shape(), &[2, 1, 1, 1, 1, 1, 1, 1, 3, 4]);
        assert!(data.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_memory_store_writes_entry() {
        let mut store = MemoryStore::new();
        store.init(SHAPE, 3).unwrap();
        store.store_entry(index(1, 2), &[0.1, 0.2, 0.3]).unwrap();

        let entry = store.entry(index(1, 2)).unwrap();
        assert_eq!(entry.to_vec(), vec![0.1, 0.2, 0.3]);
        assert!(store.entry(index(0, 2)).unwrap().iter().all(|v| v.is_nan()));
        assert_eq!(store.progress(), Some(index(1, 2)));
        assert_eq!(store.written(), 1);
    }

    #[test]
    fn test_memory_store_rejects_bad_entries() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.store_entry(index(0, 0), &[1.0]),
            Err(StoreError::NotInitialized)
        ));

        store.init(SHAPE, 2).unwrap();
        assert!(matches!(
            store.store_entry(index(2, 0), &[1.0, 2.0]),
            Err(StoreError::IndexOutOfBounds { .. })
        ));
        assert!(matches!(
            store.store_entry(index(0, 0), &[1.0]),
            Err(StoreError::SampleLength { expected: 2, actual: 1 })
        ));
        assert!(store.entry(index(5, 0)).is_none());
    }

    #[test]
    fn test_reinit_with_other_shape_fails() {
        let mut store = MemoryStore::new();
        store.init(SHAPE, 2).unwrap();
        store.init(SHAPE, 2).unwrap();
        assert!(matches!(
            store.init([1; 9], 2),
            Err(StoreError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_json_store_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dictionary.json");

        let mut store = JsonStore::open(&path).unwrap();
        store.init(SHAPE, 2).unwrap();
        store.store_entry(index(0, 0), &[0.25, 0.5]).unwrap();
        store.store_entry(index(1, 0), &[1.0 / 3.0, 0.75]).unwrap();
        store.flush().unwrap();
        assert!(path.exists());

        let reopened = JsonStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.progress(), Some(index(1, 0)));
        assert_eq!(reopened.entry(index(1, 0)).unwrap(), &[1.0 / 3.0, 0.75]);
    }

    #[test]
    fn test_json_store_rejects_unknown_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dictionary.json");

        let mut store = JsonStore::create(&path);
        store.init(SHAPE, 1).unwrap();
        store.flush().unwrap();

        let text = fs::read_to_string(&path).unwrap().replacen("\"version\":1", "\"version\":99", 1);
        fs::write(&path, text).unwrap();

        assert!(matches!(
            JsonStore::open(&path),
            Err(StoreError::UnsupportedVersion(99))
        ));
    }
}
