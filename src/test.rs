#[cfg(test)]
mod tests {
    use crate::fs::{FileAttributes, FileTime};
    use crate::{
        EnumerationState, ErrorKind, FindOperation, FindResult, filters, read_directory_entries,
        read_directory_names, transforms,
    };
    use filetime::FileTime as StampTime;
    use std::fs;
    use std::path::{Path, PathBuf};

    /// A scratch directory under the system temp dir, removed on drop.
    struct Scratch(PathBuf);

    impl Scratch {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "findop_test_{name}_{}",
                std::process::id()
            ));
            let _ = fs::remove_dir_all(&path);
            fs::create_dir_all(&path).unwrap();
            Self(path)
        }

        fn file(&self, relative: &str, contents: &[u8]) -> PathBuf {
            let path = self.0.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, contents).unwrap();
            path
        }

        fn dir(&self, relative: &str) -> PathBuf {
            let path = self.0.join(relative);
            fs::create_dir_all(&path).unwrap();
            path
        }

        fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn relative_paths(scratch: &Scratch, operation: FindOperation) -> Vec<PathBuf> {
        operation
            .enumerate_with(transforms::to_full_path)
            .unwrap()
            .map(|path| path.unwrap().strip_prefix(scratch.path()).unwrap().to_path_buf())
            .collect()
    }

    fn position(paths: &[PathBuf], wanted: &str) -> usize {
        paths
            .iter()
            .position(|path| path == Path::new(wanted))
            .unwrap_or_else(|| panic!("{wanted} missing from {paths:?}"))
    }

    #[test]
    fn lists_one_level_without_dots() {
        let scratch = Scratch::new("one_level");
        scratch.file("a.txt", b"a");
        scratch.file("b.dat", b"b");
        scratch.file("sub/inner.txt", b"inner");

        let mut names: Vec<String> = FindOperation::new(scratch.path())
            .enumerate_with(transforms::to_file_name)
            .unwrap()
            .collect::<crate::Result<_>>()
            .unwrap();
        names.sort();
        assert_eq!(names, ["a.txt", "b.dat", "sub"]);
    }

    #[test]
    fn recursion_yields_directories_before_their_contents() {
        let scratch = Scratch::new("pre_order");
        scratch.file("top.txt", b"");
        scratch.file("sub/mid.txt", b"");
        scratch.file("sub/deeper/leaf.txt", b"");

        let paths = relative_paths(&scratch, FindOperation::new(scratch.path()).recursive(true));
        assert_eq!(paths.len(), 5);
        let sub = position(&paths, "sub");
        let deeper = position(&paths, "sub/deeper");
        assert!(sub < position(&paths, "sub/mid.txt"));
        assert!(sub < deeper);
        assert!(deeper < position(&paths, "sub/deeper/leaf.txt"));
    }

    #[test]
    fn pattern_is_case_insensitive_and_does_not_stop_descent() {
        let scratch = Scratch::new("pattern");
        scratch.file("a.txt", b"");
        scratch.file("b.dat", b"");
        scratch.file("sub/c.TXT", b"");

        let mut paths = relative_paths(
            &scratch,
            FindOperation::new(scratch.path())
                .recursive(true)
                .pattern("*.txt"),
        );
        paths.sort();
        assert_eq!(paths, [PathBuf::from("a.txt"), PathBuf::from("sub/c.TXT")]);
    }

    #[test]
    fn filter_selects_directories() {
        let scratch = Scratch::new("filter");
        scratch.file("a.txt", b"");
        scratch.file("one/two/b.txt", b"");

        let mut paths = relative_paths(
            &scratch,
            FindOperation::new(scratch.path())
                .recursive(true)
                .filter(filters::directories_only),
        );
        paths.sort();
        assert_eq!(paths, [PathBuf::from("one"), PathBuf::from("one/two")]);
    }

    #[test]
    fn large_directory_spans_many_fetches() {
        let scratch = Scratch::new("large");
        for i in 0..1500 {
            scratch.file(&format!("a_reasonably_long_file_name_number_{i:05}.bin"), b"");
        }

        let mut names: Vec<String> = FindOperation::new(scratch.path())
            .initial_buffer_size(0)
            .enumerate_with(transforms::to_file_name)
            .unwrap()
            .collect::<crate::Result<_>>()
            .unwrap();
        assert_eq!(names.len(), 1500);
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 1500);
        assert_eq!(names[0], "a_reasonably_long_file_name_number_00000.bin");
    }

    #[test]
    fn maximum_length_name_round_trips() {
        let scratch = Scratch::new("long_name");
        let name = format!("{}.txt", "n".repeat(251));
        assert_eq!(name.len(), 255);
        scratch.file(&name, b"12345");

        let results: Vec<FindResult> = FindOperation::new(scratch.path())
            .enumerate()
            .unwrap()
            .collect::<crate::Result<_>>()
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_name, name.as_str());
        assert_eq!(results[0].size, 5);
        assert_eq!(results[0].directory, scratch.path());
    }

    #[test]
    fn timestamps_come_from_the_filesystem() {
        let scratch = Scratch::new("times");
        let path = scratch.file("dated.txt", b"x");
        filetime::set_file_mtime(&path, StampTime::from_unix_time(1_600_000_000, 0)).unwrap();

        let result = FindOperation::new(scratch.path())
            .enumerate()
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(result.last_write_time.to_unix(), (1_600_000_000, 0));
        assert_eq!(
            result.last_write_time,
            FileTime::from_unix(1_600_000_000, 0)
        );
        assert_eq!(
            result.modified(),
            Some(std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_600_000_000))
        );
    }

    #[test]
    fn missing_root_faults_on_first_advance() {
        let scratch = Scratch::new("missing");
        let mut iter = FindOperation::new(scratch.path().join("nope"))
            .enumerate()
            .unwrap();
        assert_eq!(iter.state(), EnumerationState::Initial);

        let error = iter.next().unwrap().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(iter.state(), EnumerationState::Faulted);
        assert!(iter.next().is_none());
    }

    #[test]
    fn exhaustion_is_sticky() {
        let scratch = Scratch::new("exhausted");
        scratch.file("only.txt", b"");

        let mut iter = FindOperation::new(scratch.path()).enumerate().unwrap();
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        assert_eq!(iter.state(), EnumerationState::Exhausted);
        assert!(iter.next().is_none());
        assert!(iter.advance().unwrap().is_none());
    }

    #[test]
    fn early_drop_mid_walk() {
        let scratch = Scratch::new("early_drop");
        scratch.file("d1/d2/d3/leaf.txt", b"");

        let mut iter = FindOperation::new(scratch.path())
            .recursive(true)
            .enumerate()
            .unwrap();
        let first = iter.next().unwrap().unwrap();
        assert!(first.is_directory());
        let second = iter.next().unwrap().unwrap();
        assert_eq!(second.file_name, "d2");
        assert_eq!(iter.depth(), 1);
        assert_eq!(
            iter.current_directory(),
            Some(scratch.path().join("d1").as_path())
        );
        drop(iter);

        // nothing holds the tree open any more
        fs::remove_dir_all(scratch.path().join("d1")).unwrap();
    }

    #[test]
    fn single_directory_listing_keeps_dots() {
        let scratch = Scratch::new("listing");
        scratch.file("a.txt", b"abc");
        scratch.dir("sub");

        let mut names = read_directory_names(scratch.path()).unwrap();
        names.sort();
        assert_eq!(names, [".", "..", "a.txt", "sub"]);

        let entries = read_directory_entries(scratch.path()).unwrap();
        let file = entries.iter().find(|entry| entry.file_name == "a.txt").unwrap();
        assert_eq!(file.size, 3);
        assert!(!file.is_directory());
        let dot = entries.iter().find(|entry| entry.file_name == ".").unwrap();
        assert!(dot.is_directory());
    }

    #[test]
    fn single_directory_listing_missing() {
        let scratch = Scratch::new("listing_missing");
        let error = read_directory_names(scratch.path().join("gone")).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn dot_files_are_hidden() {
        let scratch = Scratch::new("hidden");
        scratch.file(".secret", b"");
        scratch.file("plain", b"");

        let hidden: Vec<String> = FindOperation::new(scratch.path())
            .filter(filters::hidden_only)
            .enumerate_with(transforms::to_file_name)
            .unwrap()
            .collect::<crate::Result<_>>()
            .unwrap();
        assert_eq!(hidden, [".secret"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_followed_only_on_request() {
        let scratch = Scratch::new("symlinks");
        scratch.file("target/inside.txt", b"");
        scratch.dir("walk");
        std::os::unix::fs::symlink(scratch.path().join("target"), scratch.path().join("walk/link"))
            .unwrap();

        let root = scratch.path().join("walk");
        let link = FindOperation::new(&root)
            .recursive(true)
            .enumerate()
            .unwrap()
            .collect::<crate::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(link.len(), 1);
        assert!(link[0].attributes.contains(FileAttributes::REPARSE_POINT));
        assert!(link[0].is_directory());

        let followed: Vec<PathBuf> = FindOperation::new(&root)
            .recursive(true)
            .follow_reparse_points(true)
            .enumerate_with(transforms::to_full_path)
            .unwrap()
            .collect::<crate::Result<_>>()
            .unwrap();
        assert_eq!(followed, [root.join("link"), root.join("link/inside.txt")]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_root_is_resolved() {
        let scratch = Scratch::new("symlink_root");
        scratch.file("real/a.txt", b"");
        std::os::unix::fs::symlink(scratch.path().join("real"), scratch.path().join("alias"))
            .unwrap();

        let names: Vec<String> = crate::enumerate(scratch.path().join("alias"), false, None, false)
            .unwrap()
            .map(|result| result.map(|entry| entry.file_name.to_string_lossy().into_owned()))
            .collect::<crate::Result<_>>()
            .unwrap();
        assert_eq!(names, ["a.txt"]);
    }
}
