/*!
 # findop

 A lazy, resumable directory enumerator that reads whole batches of native directory
 records into a buffer and decodes them one at a time.

 - Pre-order depth first traversal, one open handle per directory on the current path
 - Case-insensitive wildcard names (`*`, `?`) plus an arbitrary predicate, neither of which
   stops a directory from being descended into
 - Buffers grow on demand, handles close on exhaustion, error or drop
 - Backends for Linux/Android (`getdents64`), Windows (`GetFileInformationByHandleEx`) and
   a portable `read_dir` fallback, all behind [`fs::DirectorySource`]

 ```no_run
 use findop::{FindOperation, transforms};

 let headers: Vec<_> = FindOperation::new("/usr/include")
     .recursive(true)
     .pattern("*.h")
     .enumerate_with(transforms::to_full_path)
     .unwrap()
     .collect::<findop::Result<_>>()
     .unwrap();

 println!("{} headers", headers.len());
 ```
*/
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
mod macros;

mod error;
pub mod filters;
pub mod fs;
pub mod walk;

pub use error::{ErrorKind, FindError};
pub use fs::Result;
pub use walk::{
    EnumerationState, FindIter, FindOperation, FindResult, FindTransform, RawEntry, enumerate,
    read_directory_entries, read_directory_names, read_directory_with, transforms,
};

#[cfg(test)]
mod test;
