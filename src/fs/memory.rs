/*!
 A scripted, in-memory [`DirectorySource`] for tests.

 Directories are registered up front; every open and close is counted so leaks and
 double closes are observable, and failures can be injected at open or at any fetch.

 ```
 use findop::fs::MemorySource;
 use findop::FindOperation;

 let source = MemorySource::new();
 source.add_file("/root/a.txt", 3);
 source.add_file("/root/sub/b.txt", 5);

 let names: Vec<_> = FindOperation::new("/root")
     .recursive(true)
     .source(source.clone())
     .enumerate_with(findop::transforms::to_file_name)
     .unwrap()
     .collect::<Result<_, _>>()
     .unwrap();

 assert_eq!(names, ["a.txt", "sub", "b.txt"]);
 assert_eq!(source.open_handles(), 0);
 ```
*/
use crate::FindError;
use crate::fs::record::{EntryMetadata, RecordWriter, encode_name};
use crate::fs::source::{DirectoryQuery, DirectorySource, QueryStatus};
use crate::fs::{FileAttributes, Result};
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct MemoryEntry {
    name: Vec<u16>,
    metadata: EntryMetadata,
}

#[derive(Debug, Default)]
struct State {
    directories: HashMap<PathBuf, Vec<MemoryEntry>>,
    denied: Vec<PathBuf>,
    failures: HashMap<PathBuf, (usize, FindError)>,
    batch_limit: Option<usize>,
    required_buffer: usize,
    opened: usize,
    closed: usize,
    redundant_closes: usize,
    queries: usize,
    insufficient: usize,
    open_log: Vec<PathBuf>,
}

/// An in-memory directory tree, cheap to clone (clones share the same tree and counters).
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    state: Arc<Mutex<State>>,
}

fn entry(name: &OsStr, attributes: FileAttributes, size: u64) -> MemoryEntry {
    MemoryEntry {
        name: encode_name(name),
        metadata: EntryMetadata {
            attributes,
            end_of_file: size,
            allocation_size: size.next_multiple_of(4096),
            ..EntryMetadata::default()
        },
    }
}

impl State {
    fn ensure_dir(&mut self, path: &Path) {
        if self.directories.contains_key(path) {
            return;
        }
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            self.ensure_dir(parent);
            self.push(parent, entry(name, FileAttributes::DIRECTORY, 0));
        }
        self.directories.insert(
            path.to_path_buf(),
            vec![
                entry(OsStr::new("."), FileAttributes::DIRECTORY, 0),
                entry(OsStr::new(".."), FileAttributes::DIRECTORY, 0),
            ],
        );
    }

    fn push(&mut self, parent: &Path, child: MemoryEntry) {
        if let Some(entries) = self.directories.get_mut(parent) {
            entries.push(child);
        }
    }
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a directory, and any missing ancestors, each listed in its parent.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.lock().ensure_dir(path.as_ref());
    }

    /// Registers a file of `size` bytes, creating its parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, size: u64) {
        let path = path.as_ref();
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return;
        };
        let mut state = self.lock();
        state.ensure_dir(parent);
        state.push(parent, entry(name, FileAttributes::ARCHIVE, size));
    }

    /// Registers a reparse point that resolves to an (initially empty) directory.
    pub fn add_link(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return;
        };
        let mut state = self.lock();
        state.ensure_dir(parent);
        state.push(
            parent,
            entry(name, FileAttributes::DIRECTORY | FileAttributes::REPARSE_POINT, 0),
        );
        state.directories.insert(
            path.to_path_buf(),
            vec![
                entry(OsStr::new("."), FileAttributes::DIRECTORY, 0),
                entry(OsStr::new(".."), FileAttributes::DIRECTORY, 0),
            ],
        );
    }

    /// Appends a raw entry to `parent`'s listing without registering anything openable.
    pub fn add_entry(&self, parent: impl AsRef<Path>, name: impl Into<OsString>, metadata: EntryMetadata) {
        let parent = parent.as_ref();
        let mut state = self.lock();
        state.ensure_dir(parent);
        state.push(
            parent,
            MemoryEntry {
                name: encode_name(&name.into()),
                metadata,
            },
        );
    }

    /// Opening `path` fails with [`FindError::AccessDenied`].
    pub fn deny(&self, path: impl AsRef<Path>) {
        self.lock().denied.push(path.as_ref().to_path_buf());
    }

    /// The query on `path` after `after_batches` successful fetches fails with `error`.
    pub fn fail_query(&self, path: impl AsRef<Path>, after_batches: usize, error: FindError) {
        self.lock()
            .failures
            .insert(path.as_ref().to_path_buf(), (after_batches, error));
    }

    /// Caps how many records one query returns, to force many fetches.
    pub fn set_batch_limit(&self, limit: usize) {
        self.lock().batch_limit = Some(limit.max(1));
    }

    /// Every query against a buffer smaller than `bytes` reports an insufficient buffer,
    /// the way a platform that insists on a minimum size would.
    pub fn require_buffer(&self, bytes: usize) {
        self.lock().required_buffer = bytes;
    }

    /// Number of successful opens.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    #[must_use]
    pub fn closed(&self) -> usize {
        self.lock().closed
    }

    /// Opens not yet matched by a close.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        let state = self.lock();
        state.opened - state.closed
    }

    /// Closes issued against an already closed handle.
    #[must_use]
    pub fn redundant_closes(&self) -> usize {
        self.lock().redundant_closes
    }

    /// Total queries issued, including the ones that reported an insufficient buffer.
    #[must_use]
    pub fn queries(&self) -> usize {
        self.lock().queries
    }

    /// How many queries answered with [`QueryStatus::InsufficientBuffer`].
    #[must_use]
    pub fn insufficient_buffer_reports(&self) -> usize {
        self.lock().insufficient
    }

    /// Every successfully opened path, in order.
    #[must_use]
    pub fn open_log(&self) -> Vec<PathBuf> {
        self.lock().open_log.clone()
    }
}

/// An open in-memory directory.
///
/// Unlike the native handles it does not close itself on drop, so a handle that the
/// enumerator forgets shows up in [`MemorySource::open_handles`].
#[derive(Debug)]
pub struct MemoryHandle {
    state: Arc<Mutex<State>>,
    path: PathBuf,
    entries: Vec<MemoryEntry>,
    position: usize,
    batches: usize,
    open: bool,
}

impl MemoryHandle {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DirectoryQuery for MemoryHandle {
    fn query(&mut self, buffer: &mut [u8]) -> QueryStatus {
        let (failure, limit, required_buffer) = {
            let mut state = self.lock();
            state.queries += 1;
            let failure = state
                .failures
                .get(&self.path)
                .filter(|(after, _)| *after == self.batches)
                .map(|(_, error)| error.clone());
            (
                failure,
                state.batch_limit.unwrap_or(usize::MAX),
                state.required_buffer,
            )
        };

        if let Some(error) = failure {
            return QueryStatus::Error(error);
        }
        if !self.open || self.position >= self.entries.len() {
            return QueryStatus::NoMoreEntries;
        }
        if buffer.len() < required_buffer {
            self.lock().insufficient += 1;
            return QueryStatus::InsufficientBuffer {
                required: Some(required_buffer),
            };
        }

        let mut writer = RecordWriter::new(buffer);
        for candidate in self.entries[self.position..].iter().take(limit) {
            if !writer.push(&candidate.metadata, &candidate.name) {
                break;
            }
        }

        if writer.is_empty() {
            self.lock().insufficient += 1;
            let required = RecordWriter::record_size(self.entries[self.position].name.len());
            return QueryStatus::InsufficientBuffer {
                required: Some(required),
            };
        }

        self.position += writer.count();
        self.batches += 1;
        QueryStatus::Records {
            filled: writer.filled(),
        }
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if self.open {
            self.open = false;
            state.closed += 1;
        } else {
            state.redundant_closes += 1;
        }
    }
}

impl DirectorySource for MemorySource {
    type Handle = MemoryHandle;

    fn open_directory(&self, path: &Path, _follow_reparse_points: bool) -> Result<MemoryHandle> {
        let mut state = self.lock();
        if state.denied.iter().any(|denied| denied == path) {
            return Err(FindError::AccessDenied);
        }
        let entries = state
            .directories
            .get(path)
            .cloned()
            .ok_or(FindError::NotFound)?;

        state.opened += 1;
        state.open_log.push(path.to_path_buf());
        Ok(MemoryHandle {
            state: Arc::clone(&self.state),
            path: path.to_path_buf(),
            entries,
            position: 0,
            batches: 0,
            open: true,
        })
    }
}
