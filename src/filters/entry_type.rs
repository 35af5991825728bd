use crate::filters::FindFilter;
use clap::{
    Arg, Command, Error,
    builder::{PossibleValue, TypedValueParser},
    error::{ContextKind, ContextValue, ErrorKind},
};
use std::ffi::OsStr;

/// Entry type filter, selected on the command line with `-t`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryTypeFilter {
    /// Anything that is not a directory
    File,
    Directory,
    /// Symlinks and junctions
    ReparsePoint,
    /// Entries with the hidden attribute
    Hidden,
    /// Files of zero length
    Empty,
}

impl EntryTypeFilter {
    /**
     Parses a single character into an `EntryTypeFilter`

     # Examples
     ```
     # use findop::filters::EntryTypeFilter;
     assert_eq!(EntryTypeFilter::from_char('d'), Ok(EntryTypeFilter::Directory));
     assert!(EntryTypeFilter::from_char('z').is_err());
     ```

     # Errors
     Returns a message naming the invalid character.
    */
    pub fn from_char(c: char) -> core::result::Result<Self, String> {
        match c {
            'f' => Ok(Self::File),
            'd' => Ok(Self::Directory),
            'l' => Ok(Self::ReparsePoint),
            'h' => Ok(Self::Hidden),
            'e' => Ok(Self::Empty),
            _ => Err(format!(
                "Invalid entry type: '{c}'. See --help for valid types."
            )),
        }
    }

    /// The predicate this filter stands for.
    #[must_use]
    pub const fn as_filter(self) -> FindFilter {
        match self {
            Self::File => crate::filters::files_only,
            Self::Directory => crate::filters::directories_only,
            Self::ReparsePoint => crate::filters::reparse_points_only,
            Self::Hidden => crate::filters::hidden_only,
            Self::Empty => crate::filters::empty_files_only,
        }
    }
}

/// Parses `-t` values for clap, with completions
#[derive(Clone, Debug)]
pub struct EntryTypeFilterParser;

impl TypedValueParser for EntryTypeFilterParser {
    type Value = EntryTypeFilter;

    fn parse_ref(
        &self,
        cmd: &Command,
        _arg: Option<&Arg>,
        value: &OsStr,
    ) -> Result<Self::Value, Error> {
        let value_str = value
            .to_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidUtf8).with_cmd(cmd))?;

        match value_str.to_lowercase().as_str() {
            "f" | "file" => Ok(EntryTypeFilter::File),
            "d" | "dir" | "directory" => Ok(EntryTypeFilter::Directory),
            "l" | "link" | "symlink" | "reparse" => Ok(EntryTypeFilter::ReparsePoint),
            "h" | "hidden" => Ok(EntryTypeFilter::Hidden),
            "e" | "empty" => Ok(EntryTypeFilter::Empty),
            _ => {
                let mut error = Error::new(ErrorKind::InvalidValue).with_cmd(cmd);
                error.insert(
                    ContextKind::InvalidValue,
                    ContextValue::String(format!("invalid entry type: '{value_str}'")),
                );
                error.insert(
                    ContextKind::ValidValue,
                    ContextValue::Strings(vec![
                        "f, file".into(),
                        "d, dir, directory".into(),
                        "l, link, symlink, reparse".into(),
                        "h, hidden".into(),
                        "e, empty".into(),
                    ]),
                );
                Err(error)
            }
        }
    }

    fn possible_values(&self) -> Option<Box<dyn Iterator<Item = PossibleValue> + '_>> {
        Some(Box::new(
            [
                PossibleValue::new("f").aliases(["file"]).help("Non-directory entry"),
                PossibleValue::new("d")
                    .aliases(["dir", "directory"])
                    .help("Directory"),
                PossibleValue::new("l")
                    .aliases(["link", "symlink", "reparse"])
                    .help("Symlink or junction"),
                PossibleValue::new("h").aliases(["hidden"]).help("Hidden entry"),
                PossibleValue::new("e").aliases(["empty"]).help("Empty file"),
            ]
            .into_iter(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_accepts_aliases() {
        let cmd = Command::new("findop");
        let parser = EntryTypeFilterParser;
        let parsed = parser.parse_ref(&cmd, None, OsStr::new("DIR")).unwrap();
        assert_eq!(parsed, EntryTypeFilter::Directory);
        let parsed = parser.parse_ref(&cmd, None, OsStr::new("symlink")).unwrap();
        assert_eq!(parsed, EntryTypeFilter::ReparsePoint);
        assert!(parser.parse_ref(&cmd, None, OsStr::new("socket")).is_err());
    }
}
