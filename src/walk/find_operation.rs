use crate::filters::{self, FindFilter, NamePattern};
use crate::fs::{BufferPool, DEFAULT_BUFFER_SIZE, DirectorySource, NativeSource, Result};
use crate::walk::enumerator::EnumerationOptions;
use crate::walk::{FindIter, FindResult, FindTransform, transforms};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/**
 A builder for directory enumerations.

 Defaults: not recursive, every name matches, reparse points are listed but not descended
 into, a 4096 byte record buffer per open directory, no buffer pool, the native directory source.

 Nothing touches the filesystem until the returned [`FindIter`] is first advanced.

 # Examples
 ```no_run
 use findop::FindOperation;

 let sources = FindOperation::new("/usr/src")
     .recursive(true)
     .pattern("*.rs")
     .enumerate()
     .unwrap();

 for entry in sources {
     let entry = entry.unwrap();
     println!("{} ({} bytes)", entry.full_path().display(), entry.size);
 }
 ```
*/
#[derive(Debug, Clone)]
pub struct FindOperation<S: DirectorySource = NativeSource> {
    root: PathBuf,
    recursive: bool,
    pattern: String,
    follow_reparse_points: bool,
    filter: FindFilter,
    initial_buffer_size: usize,
    pool: Option<Arc<BufferPool>>,
    source: S,
}

impl FindOperation<NativeSource> {
    /**
      Creates a new `FindOperation` over the native filesystem.

      # Arguments
      `root` - The directory to enumerate
    */
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            recursive: false,
            pattern: String::from("*"),
            follow_reparse_points: false,
            filter: filters::all,
            initial_buffer_size: DEFAULT_BUFFER_SIZE,
            pool: None,
            source: NativeSource::default(),
        }
    }
}

impl<S: DirectorySource> FindOperation<S> {
    /// Set whether to descend into subdirectories, defaults to false
    #[must_use]
    pub const fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Set the wildcard pattern names must match to be yielded, defaults to `*`
    #[must_use]
    pub fn pattern<P: AsRef<str>>(mut self, pattern: P) -> Self {
        self.pattern = pattern.as_ref().into();
        self
    }

    /// Sets whether to descend into symlinks and junctions (default: false).
    ///
    /// There is no cycle detection, a link back to an ancestor recurses until the
    /// platform refuses to open another directory.
    #[must_use]
    pub const fn follow_reparse_points(mut self, follow: bool) -> Self {
        self.follow_reparse_points = follow;
        self
    }

    /// Set a custom filter, applied after the name pattern
    #[must_use]
    pub const fn filter(mut self, filter: FindFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Initial record buffer size in bytes, raised to [`MIN_BUFFER_SIZE`](crate::fs::MIN_BUFFER_SIZE) if smaller
    #[must_use]
    pub const fn initial_buffer_size(mut self, bytes: usize) -> Self {
        self.initial_buffer_size = bytes;
        self
    }

    /// Take record buffers from (and return them to) a shared pool
    #[must_use]
    pub fn buffer_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Enumerate through a different directory source.
    #[must_use]
    pub fn source<S2: DirectorySource>(self, source: S2) -> FindOperation<S2> {
        FindOperation {
            root: self.root,
            recursive: self.recursive,
            pattern: self.pattern,
            follow_reparse_points: self.follow_reparse_points,
            filter: self.filter,
            initial_buffer_size: self.initial_buffer_size,
            pool: self.pool,
            source,
        }
    }

    /**
     Starts an enumeration yielding full [`FindResult`]s.

     # Errors
     [`crate::FindError::RegexError`] if the pattern cannot be compiled. Filesystem errors
     surface from the iterator, starting with the first advance.
    */
    pub fn enumerate(self) -> Result<FindIter<FindResult, S>> {
        self.enumerate_with(transforms::to_find_result)
    }

    /**
     Starts an enumeration yielding `transform(entry)` for every matching entry.

     # Errors
     As [`enumerate`](Self::enumerate).
    */
    pub fn enumerate_with<T>(self, transform: FindTransform<T>) -> Result<FindIter<T, S>> {
        let pattern = NamePattern::new(&self.pattern)?;
        let options = EnumerationOptions {
            recursive: self.recursive,
            follow_reparse_points: self.follow_reparse_points,
            initial_buffer_size: self.initial_buffer_size,
            pool: self.pool,
        };
        Ok(FindIter::new(
            self.source,
            self.root,
            options,
            pattern,
            self.filter,
            transform,
        ))
    }
}

/**
 Enumerates `root` on the native filesystem.

 `pattern` of `None` matches every name.

 # Errors
 [`crate::FindError::RegexError`] if the pattern cannot be compiled.
*/
pub fn enumerate<P: AsRef<Path>>(
    root: P,
    recursive: bool,
    pattern: Option<&str>,
    follow_reparse_points: bool,
) -> Result<FindIter<FindResult>> {
    FindOperation::new(root)
        .recursive(recursive)
        .pattern(pattern.unwrap_or("*"))
        .follow_reparse_points(follow_reparse_points)
        .enumerate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemorySource;

    #[test]
    fn source_swap_keeps_settings() {
        let source = MemorySource::new();
        source.add_file("/root/a.TXT", 1);
        source.add_file("/root/sub/b.txt", 2);
        source.add_file("/root/sub/c.dat", 3);

        let names: Vec<String> = FindOperation::new("/root")
            .recursive(true)
            .pattern("*.txt")
            .filter(filters::files_only)
            .source(source)
            .enumerate_with(transforms::to_file_name)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(names, ["a.TXT", "b.txt"]);
    }

    #[test]
    fn construction_does_not_open() {
        let source = MemorySource::new();
        source.add_dir("/root");
        let iter = FindOperation::new("/root")
            .source(source.clone())
            .enumerate()
            .unwrap();
        assert_eq!(source.opened(), 0);
        drop(iter);
        assert_eq!(source.opened(), 0);
    }
}
