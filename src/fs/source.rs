use crate::FindError;
use crate::fs::Result;
use std::ffi::OsStr;
use std::path::Path;

/// What one directory query produced.
#[derive(Debug)]
pub enum QueryStatus {
    /// The first `filled` bytes of the buffer hold a chain of records.
    Records { filled: usize },
    /// The directory has nothing more to give.
    NoMoreEntries,
    /// Not even one record fits, retry with a larger buffer.
    /// `required` is the size needed when the platform says so.
    InsufficientBuffer { required: Option<usize> },
    Error(FindError),
}

/**
 An open directory that can be read a buffer at a time.

 Implementations are positioned streams: each `query` continues where the previous one stopped.
 A query that reports [`QueryStatus::InsufficientBuffer`] must not consume anything,
 the same records are expected on the retry.
*/
pub trait DirectoryQuery {
    /// Fills `buffer` with as many whole records as fit.
    fn query(&mut self, buffer: &mut [u8]) -> QueryStatus;

    /// Releases the native resource. Calling it on an already closed directory does nothing.
    fn close(&mut self);
}

/**
 Opens directories for the enumerator.

 This is the seam between the enumeration engine and the platform: the native backends
 implement it over the real filesystem, `MemorySource` implements it over a scripted tree.
*/
pub trait DirectorySource {
    type Handle: DirectoryQuery;

    /// Opens the directory at `path`.
    ///
    /// With `follow_reparse_points` false, a path whose last component is a symlink or
    /// junction is not resolved.
    ///
    /// # Errors
    /// `NotFound`, `AccessDenied` or `Io` from the platform.
    fn open_directory(&self, path: &Path, follow_reparse_points: bool) -> Result<Self::Handle>;

    /// Opens the child directory `name` of an already open `parent`; `path` is the full path of the child.
    ///
    /// Backends that can open relative to a handle (`openat`) override this, the default opens by path.
    ///
    /// # Errors
    /// As [`open_directory`](Self::open_directory).
    fn open_child(
        &self,
        parent: &Self::Handle,
        name: &OsStr,
        path: &Path,
        follow_reparse_points: bool,
    ) -> Result<Self::Handle> {
        let _ = (parent, name);
        self.open_directory(path, follow_reparse_points)
    }
}

/**
 Owns one open directory and closes it exactly once.

 Closing happens either explicitly through [`close`](Self::close) or when the guard drops,
 so every exit path (exhaustion, error, abandoned iteration, unwinding) releases the handle.
*/
#[derive(Debug)]
pub struct DirectoryHandle<H: DirectoryQuery> {
    inner: H,
    open: bool,
}

impl<H: DirectoryQuery> DirectoryHandle<H> {
    #[inline]
    #[must_use]
    pub const fn new(inner: H) -> Self {
        Self { inner, open: true }
    }

    #[inline]
    pub fn query(&mut self, buffer: &mut [u8]) -> QueryStatus {
        if self.open {
            self.inner.query(buffer)
        } else {
            QueryStatus::NoMoreEntries
        }
    }

    #[inline]
    #[must_use]
    pub const fn get_ref(&self) -> &H {
        &self.inner
    }

    #[inline]
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Closes the directory now, later calls (and the drop) do nothing.
    #[inline]
    pub fn close(&mut self) {
        if core::mem::replace(&mut self.open, false) {
            self.inner.close();
        }
    }
}

impl<H: DirectoryQuery> Drop for DirectoryHandle<H> {
    #[inline]
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counting(Rc<Cell<u32>>);

    impl DirectoryQuery for Counting {
        fn query(&mut self, _buffer: &mut [u8]) -> QueryStatus {
            QueryStatus::Records { filled: 0 }
        }

        fn close(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn guard_closes_once() {
        let closes = Rc::new(Cell::new(0));
        let mut handle = DirectoryHandle::new(Counting(Rc::clone(&closes)));
        handle.close();
        handle.close();
        assert!(!handle.is_open());
        assert!(matches!(handle.query(&mut []), QueryStatus::NoMoreEntries));
        drop(handle);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn drop_closes_an_open_handle() {
        let closes = Rc::new(Cell::new(0));
        {
            let _handle = DirectoryHandle::new(Counting(Rc::clone(&closes)));
        }
        assert_eq!(closes.get(), 1);
    }
}
