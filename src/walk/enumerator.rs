use crate::filters::{FindFilter, NamePattern};
use crate::fs::{
    BufferPool, DirectoryHandle, DirectoryQuery, DirectorySource, GrowableBuffer, MIN_BUFFER_SIZE,
    NativeSource, QueryStatus, Result, decode_entry,
};
use crate::walk::{FindTransform, RawEntry};
use crate::FindError;
use core::iter::FusedIterator;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

/// Where an enumeration currently is, as reported by [`FindIter::state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnumerationState {
    /// Nothing opened yet.
    Initial,
    /// The next advance queries the current directory.
    Fetching,
    /// Decoded records are waiting in the current directory's buffer.
    HasBuffered,
    /// The next advance opens a subdirectory, the parent is kept on the stack.
    Recursing,
    Exhausted,
    Faulted,
}

#[derive(Debug)]
enum State {
    Initial,
    Fetching,
    HasBuffered,
    Recursing { name: OsString, path: PathBuf },
    Exhausted,
    Faulted { error: FindError, reported: bool },
}

/// One open directory: its handle, its records and how far into them we are.
struct Frame<H: DirectoryQuery> {
    handle: DirectoryHandle<H>,
    path: PathBuf,
    buffer: GrowableBuffer,
    filled: usize,
    cursor: Option<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct EnumerationOptions {
    pub(crate) recursive: bool,
    pub(crate) follow_reparse_points: bool,
    pub(crate) initial_buffer_size: usize,
    pub(crate) pool: Option<Arc<BufferPool>>,
}

/**
 A lazy, forward-only, single-pass enumeration of a directory tree.

 Built by [`FindOperation`](crate::FindOperation). Every advance runs the state machine until
 it has an item to yield, runs out of entries, or hits an error:

 - the root is opened on the first advance, not at construction
 - "." and ".." are never yielded
 - with recursion, a directory's own entry comes first, then its contents, then its later siblings
 - the name pattern and filter only decide what is yielded, every directory is still descended into
 - a buffer too small for the next record is grown and the fetch retried, callers never see it

 After the end, [`advance`](Self::advance) keeps returning `Ok(None)`; after an error it keeps
 returning that same error. As an [`Iterator`] the error is yielded once, then `None`.

 Every directory handle, including the parents kept while recursing, is closed exactly once:
 when its directory is finished, when the enumeration faults, or when the iterator is dropped.
*/
pub struct FindIter<T, S: DirectorySource = NativeSource> {
    source: S,
    root: PathBuf,
    options: EnumerationOptions,
    pattern: NamePattern,
    filter: FindFilter,
    transform: FindTransform<T>,
    state: State,
    current: Option<Frame<S::Handle>>,
    stack: Vec<Frame<S::Handle>>,
}

impl<T, S: DirectorySource> FindIter<T, S> {
    pub(crate) const fn new(
        source: S,
        root: PathBuf,
        options: EnumerationOptions,
        pattern: NamePattern,
        filter: FindFilter,
        transform: FindTransform<T>,
    ) -> Self {
        Self {
            source,
            root,
            options,
            pattern,
            filter,
            transform,
            state: State::Initial,
            current: None,
            stack: Vec::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> EnumerationState {
        match self.state {
            State::Initial => EnumerationState::Initial,
            State::Fetching => EnumerationState::Fetching,
            State::HasBuffered => EnumerationState::HasBuffered,
            State::Recursing { .. } => EnumerationState::Recursing,
            State::Exhausted => EnumerationState::Exhausted,
            State::Faulted { .. } => EnumerationState::Faulted,
        }
    }

    /// Number of parent directories held open while recursing.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The directory currently being read.
    #[must_use]
    pub fn current_directory(&self) -> Option<&std::path::Path> {
        self.current.as_ref().map(|frame| frame.path.as_path())
    }

    /**
     Produces the next item.

     # Errors
     The error that ended the enumeration: `NotFound`/`AccessDenied`/`Io` from opening or
     reading a directory, `CorruptData` from decoding, `OutOfMemory` from growing a buffer.
     Once returned, every later call returns it again.
    */
    pub fn advance(&mut self) -> Result<Option<T>> {
        match self.state {
            State::Exhausted => return Ok(None),
            State::Faulted { ref error, .. } => return Err(error.clone()),
            _ => {}
        }

        self.drive().map_err(|error| self.fault(error))
    }

    fn drive(&mut self) -> Result<Option<T>> {
        loop {
            match self.state {
                State::Initial => self.open_root()?,
                State::Fetching => self.fetch()?,
                State::HasBuffered => {
                    if let Some(item) = self.step()? {
                        return Ok(Some(item));
                    }
                }
                State::Recursing { .. } => self.descend()?,
                State::Exhausted => return Ok(None),
                State::Faulted { ref error, .. } => return Err(error.clone()),
            }
        }
    }

    fn acquire_buffer(&self) -> Result<GrowableBuffer> {
        let size = self.options.initial_buffer_size.max(MIN_BUFFER_SIZE);
        match &self.options.pool {
            Some(pool) => pool.acquire(size),
            None => GrowableBuffer::with_capacity(size),
        }
    }

    fn open_root(&mut self) -> Result<()> {
        // the root itself is always resolved, the flag only governs what is descended into
        let handle = DirectoryHandle::new(self.source.open_directory(&self.root, true)?);
        let buffer = self.acquire_buffer()?;
        tracing::debug!(root = %self.root.display(), recursive = self.options.recursive, "enumeration started");

        self.current = Some(Frame {
            handle,
            path: self.root.clone(),
            buffer,
            filled: 0,
            cursor: None,
        });
        self.state = State::Fetching;
        Ok(())
    }

    fn fetch(&mut self) -> Result<()> {
        let Some(frame) = self.current.as_mut() else {
            self.state = State::Exhausted;
            return Ok(());
        };

        loop {
            match frame.handle.query(frame.buffer.as_bytes_mut()) {
                QueryStatus::Records { filled } if filled > 0 => {
                    frame.filled = filled;
                    frame.cursor = Some(0);
                    self.state = State::HasBuffered;
                    return Ok(());
                }
                QueryStatus::Records { .. } | QueryStatus::NoMoreEntries => {
                    self.finish_directory();
                    return Ok(());
                }
                QueryStatus::InsufficientBuffer { required } => {
                    frame.buffer.grow_for(required)?;
                    tracing::debug!(
                        directory = %frame.path.display(),
                        capacity = frame.buffer.capacity(),
                        "record buffer grown"
                    );
                }
                QueryStatus::Error(error) => return Err(error),
            }
        }
    }

    fn step(&mut self) -> Result<Option<T>> {
        let Some(frame) = self.current.as_mut() else {
            self.state = State::Exhausted;
            return Ok(None);
        };

        loop {
            let Some(offset) = frame.cursor else {
                self.state = State::Fetching;
                return Ok(None);
            };
            let (record, next) = decode_entry(frame.buffer.as_bytes(), frame.filled, offset)?;
            frame.cursor = next;

            skip_dot_or_dot_dot_entries!(record, continue);

            let entry = RawEntry::new(&frame.path, record);
            let item = (self.pattern.matches(&entry) && (self.filter)(&entry))
                .then(|| (self.transform)(&entry));

            let attributes = entry.attributes();
            if self.options.recursive
                && attributes.is_directory()
                && (self.options.follow_reparse_points || !attributes.is_reparse_point())
            {
                self.state = State::Recursing {
                    name: entry.file_name_os(),
                    path: entry.full_path(),
                };
                return Ok(item);
            }

            if item.is_some() {
                return Ok(item);
            }
        }
    }

    fn descend(&mut self) -> Result<()> {
        let State::Recursing { name, path } = core::mem::replace(&mut self.state, State::Fetching)
        else {
            return Ok(());
        };
        let Some(parent) = self.current.as_ref() else {
            return Ok(());
        };

        let child = self.source.open_child(
            parent.handle.get_ref(),
            &name,
            &path,
            self.options.follow_reparse_points,
        )?;
        let handle = DirectoryHandle::new(child);
        let buffer = self.acquire_buffer()?;
        tracing::trace!(directory = %path.display(), depth = self.stack.len() + 1, "descending");

        let child = Frame {
            handle,
            path,
            buffer,
            filled: 0,
            cursor: None,
        };
        if let Some(parent) = self.current.replace(child) {
            self.stack.push(parent);
        }
        Ok(())
    }

    fn retire(&self, mut frame: Frame<S::Handle>) {
        frame.handle.close();
        if let Some(pool) = &self.options.pool {
            pool.release(frame.buffer);
        }
    }

    /// Closes the current directory and resumes its parent.
    fn finish_directory(&mut self) {
        if let Some(frame) = self.current.take() {
            self.retire(frame);
        }
        match self.stack.pop() {
            Some(parent) => {
                tracing::trace!(directory = %parent.path.display(), "resuming parent");
                self.current = Some(parent);
                self.state = State::HasBuffered;
            }
            None => {
                tracing::debug!(root = %self.root.display(), "enumeration exhausted");
                self.state = State::Exhausted;
            }
        }
    }

    /// Closes every open directory, innermost first.
    fn release_all(&mut self) {
        if let Some(frame) = self.current.take() {
            self.retire(frame);
        }
        while let Some(frame) = self.stack.pop() {
            self.retire(frame);
        }
    }

    fn fault(&mut self, error: FindError) -> FindError {
        tracing::debug!(root = %self.root.display(), %error, "enumeration faulted");
        self.release_all();
        self.state = State::Faulted {
            error: error.clone(),
            reported: false,
        };
        error
    }
}

impl<T, S: DirectorySource> Iterator for FindIter<T, S> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if let State::Faulted { reported: true, .. } = self.state {
            return None;
        }
        match self.advance() {
            Ok(item) => item.map(Ok),
            Err(error) => {
                if let State::Faulted { ref mut reported, .. } = self.state {
                    *reported = true;
                }
                Some(Err(error))
            }
        }
    }
}

impl<T, S: DirectorySource> FusedIterator for FindIter<T, S> {}

impl<T, S: DirectorySource> core::fmt::Debug for FindIter<T, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FindIter")
            .field("root", &self.root)
            .field("options", &self.options)
            .field("pattern", &self.pattern)
            .field("state", &self.state)
            .field("current", &self.current_directory())
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}

impl<T, S: DirectorySource> Drop for FindIter<T, S> {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FindOperation;
    use crate::filters;
    use crate::fs::{EntryMetadata, FileAttributes, MemorySource, RecordWriter};
    use crate::walk::transforms;
    use std::path::Path;

    fn tree() -> MemorySource {
        let source = MemorySource::new();
        source.add_file("/root/a.txt", 1);
        source.add_file("/root/sub/b.txt", 2);
        source.add_file("/root/sub/c.dat", 3);
        source.add_file("/root/z.txt", 4);
        source
    }

    fn paths(operation: FindOperation<MemorySource>) -> Vec<PathBuf> {
        operation
            .enumerate_with(transforms::to_full_path)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn non_recursive_skips_dots_and_stays_put() {
        let source = tree();
        let listed = paths(FindOperation::new("/root").source(source.clone()));
        assert_eq!(
            listed,
            [
                Path::new("/root/a.txt"),
                Path::new("/root/sub"),
                Path::new("/root/z.txt")
            ]
        );
        assert_eq!(source.opened(), 1);
        assert_eq!(source.open_handles(), 0);
    }

    #[test]
    fn recursion_is_pre_order() {
        let source = tree();
        let listed = paths(FindOperation::new("/root").recursive(true).source(source.clone()));
        assert_eq!(
            listed,
            [
                Path::new("/root/a.txt"),
                Path::new("/root/sub"),
                Path::new("/root/sub/b.txt"),
                Path::new("/root/sub/c.dat"),
                Path::new("/root/z.txt"),
            ]
        );
        assert_eq!(source.open_handles(), 0);
        assert_eq!(source.redundant_closes(), 0);
    }

    #[test]
    fn pattern_restricts_yield_not_traversal() {
        let source = tree();
        let listed = paths(
            FindOperation::new("/root")
                .recursive(true)
                .pattern("*.txt")
                .source(source.clone()),
        );
        assert_eq!(
            listed,
            [
                Path::new("/root/a.txt"),
                Path::new("/root/sub/b.txt"),
                Path::new("/root/z.txt")
            ]
        );
        assert_eq!(source.open_log(), [Path::new("/root"), Path::new("/root/sub")]);
    }

    #[test]
    fn filter_restricts_yield_not_traversal() {
        let source = tree();
        source.add_dir("/root/sub/deeper");
        let listed = paths(
            FindOperation::new("/root")
                .recursive(true)
                .filter(filters::directories_only)
                .source(source.clone()),
        );
        assert_eq!(
            listed,
            [Path::new("/root/sub"), Path::new("/root/sub/deeper")]
        );
    }

    #[test]
    fn many_fetches_yield_every_entry_in_order() {
        let source = MemorySource::new();
        let expected: Vec<String> = (0..300)
            .map(|i| format!("{i:03}_{}", "n".repeat(i % 200)))
            .collect();
        for name in &expected {
            source.add_file(Path::new("/big").join(name), 0);
        }

        let listed: Vec<String> = FindOperation::new("/big")
            .initial_buffer_size(0)
            .source(source.clone())
            .enumerate_with(transforms::to_file_name)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(listed, expected);
        assert!(source.queries() > 2);
    }

    #[test]
    fn growth_is_transparent() {
        let source = tree();
        let small = paths(FindOperation::new("/root").recursive(true).source(source.clone()));

        let demanding = tree();
        demanding.require_buffer(64 * 1024);
        let grown = paths(
            FindOperation::new("/root")
                .recursive(true)
                .source(demanding.clone()),
        );

        assert_eq!(grown, small);
        // once per directory, each frame grows its own buffer
        assert_eq!(demanding.insufficient_buffer_reports(), 2);
        assert_eq!(demanding.open_handles(), 0);
    }

    #[test]
    fn tiny_batches_yield_the_same_sequence() {
        let source = tree();
        source.set_batch_limit(1);
        let listed = paths(FindOperation::new("/root").recursive(true).source(source.clone()));
        assert_eq!(listed.len(), 5);
        assert_eq!(listed[2], Path::new("/root/sub/b.txt"));
    }

    #[test]
    fn early_drop_closes_every_open_directory() {
        let source = MemorySource::new();
        source.add_file("/r/a/b/c/leaf", 0);
        source.add_file("/r/a/b/c/other", 0);

        let mut iter = FindOperation::new("/r")
            .recursive(true)
            .source(source.clone())
            .enumerate_with(transforms::to_file_name)
            .unwrap();
        assert_eq!(iter.state(), EnumerationState::Initial);
        let mut seen = Vec::new();
        while seen.last().map(String::as_str) != Some("leaf") {
            seen.push(iter.next().unwrap().unwrap());
        }
        assert_eq!(iter.depth(), 3);
        assert_eq!(source.open_handles(), 4);
        drop(iter);

        assert_eq!(source.opened(), 4);
        assert_eq!(source.closed(), 4);
        assert_eq!(source.redundant_closes(), 0);
    }

    #[test]
    fn fault_mid_walk_releases_and_repeats() {
        let source = tree();
        source.fail_query("/root/sub", 0, FindError::Io(5));

        let mut iter = FindOperation::new("/root")
            .recursive(true)
            .source(source.clone())
            .enumerate_with(transforms::to_file_name)
            .unwrap();

        assert_eq!(iter.advance().unwrap().as_deref(), Some("a.txt"));
        assert_eq!(iter.advance().unwrap().as_deref(), Some("sub"));
        assert!(matches!(iter.advance(), Err(FindError::Io(5))));
        assert_eq!(iter.state(), EnumerationState::Faulted);
        assert_eq!(source.open_handles(), 0);
        assert!(matches!(iter.advance(), Err(FindError::Io(5))));
        assert!(matches!(iter.advance(), Err(FindError::Io(5))));
        assert_eq!(source.closed(), 2);
        assert_eq!(source.redundant_closes(), 0);
    }

    #[test]
    fn iterator_reports_fault_once() {
        let source = tree();
        source.deny("/root/sub");

        let results: Vec<_> = FindOperation::new("/root")
            .recursive(true)
            .source(source.clone())
            .enumerate_with(transforms::to_file_name)
            .unwrap()
            .collect();

        // the directory entry itself is yielded before its open fails
        assert_eq!(results.len(), 3);
        assert_eq!(results[1].as_deref().ok(), Some("sub"));
        assert!(matches!(results[2], Err(FindError::AccessDenied)));
        assert_eq!(source.open_handles(), 0);
    }

    #[test]
    fn exhaustion_is_idempotent() {
        let source = tree();
        let mut iter = FindOperation::new("/root")
            .source(source.clone())
            .enumerate()
            .unwrap();
        while iter.advance().unwrap().is_some() {}
        assert_eq!(iter.state(), EnumerationState::Exhausted);
        for _ in 0..3 {
            assert!(iter.advance().unwrap().is_none());
            assert!(iter.next().is_none());
        }
        assert_eq!(source.closed(), 1);
    }

    #[test]
    fn missing_root_fails_on_first_advance() {
        let source = MemorySource::new();
        let mut iter = FindOperation::new("/missing")
            .source(source.clone())
            .enumerate()
            .unwrap();
        assert!(matches!(iter.advance(), Err(FindError::NotFound)));
        assert!(matches!(iter.advance(), Err(FindError::NotFound)));
        assert_eq!(source.opened(), 0);
    }

    #[test]
    fn reparse_points_followed_only_on_request() {
        let source = tree();
        source.add_link("/root/link");
        source.add_file("/root/link/inside", 0);

        let plain = paths(FindOperation::new("/root").recursive(true).source(source.clone()));
        assert!(plain.contains(&PathBuf::from("/root/link")));
        assert!(!plain.contains(&PathBuf::from("/root/link/inside")));

        let followed = paths(
            FindOperation::new("/root")
                .recursive(true)
                .follow_reparse_points(true)
                .source(source.clone()),
        );
        assert!(followed.contains(&PathBuf::from("/root/link/inside")));
    }

    #[test]
    fn pooled_buffers_are_returned() {
        let pool = Arc::new(BufferPool::new(4));
        let source = tree();
        let count = FindOperation::new("/root")
            .recursive(true)
            .buffer_pool(Arc::clone(&pool))
            .source(source)
            .enumerate()
            .unwrap()
            .count();
        assert_eq!(count, 5);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn raw_entries_expose_attributes() {
        let source = MemorySource::new();
        source.add_entry(
            "/attrs",
            "ro.txt",
            EntryMetadata {
                attributes: FileAttributes::READONLY | FileAttributes::HIDDEN,
                end_of_file: 9,
                ..EntryMetadata::default()
            },
        );
        let results: Vec<_> = FindOperation::new("/attrs")
            .source(source)
            .enumerate()
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].attributes.is_readonly());
        assert_eq!(results[0].size, 9);
        assert_eq!(results[0].full_path(), Path::new("/attrs/ro.txt"));
    }

    #[test]
    fn dot_entries_are_skipped_by_name_alone() {
        let source = MemorySource::new();
        let plain = EntryMetadata {
            attributes: FileAttributes::NORMAL,
            ..EntryMetadata::default()
        };
        source.add_entry("/plain", ".", plain);
        source.add_entry("/plain", "..", plain);
        source.add_entry("/plain", "real", plain);
        source.add_entry("/plain", "..hidden", plain);

        let names: Vec<String> = FindOperation::new("/plain")
            .source(source)
            .enumerate_with(transforms::to_file_name)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(names, ["real", "..hidden"]);
    }

    /// A source whose single fill claims a record that runs past the end.
    struct Corrupt;
    struct CorruptHandle(bool);

    impl DirectoryQuery for CorruptHandle {
        fn query(&mut self, buffer: &mut [u8]) -> QueryStatus {
            if core::mem::replace(&mut self.0, true) {
                return QueryStatus::NoMoreEntries;
            }
            let mut writer = RecordWriter::new(buffer);
            let name: Vec<u16> = "truncated".encode_utf16().collect();
            assert!(writer.push(&EntryMetadata::default(), &name));
            QueryStatus::Records {
                filled: writer.filled() - 8,
            }
        }

        fn close(&mut self) {}
    }

    impl DirectorySource for Corrupt {
        type Handle = CorruptHandle;

        fn open_directory(&self, _path: &Path, _follow: bool) -> Result<CorruptHandle> {
            Ok(CorruptHandle(false))
        }
    }

    #[test]
    fn corrupt_records_fault() {
        let mut iter = FindOperation::new("/anything")
            .source(Corrupt)
            .enumerate()
            .unwrap();
        assert!(matches!(
            iter.advance(),
            Err(FindError::CorruptData { offset: 0, .. })
        ));
    }
}
