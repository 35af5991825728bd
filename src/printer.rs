use compile_time_ls_colours::file_type_colour;
use findop::fs::FileAttributes;
use findop::{FindError, FindResult};
use std::io::{self, BufWriter, IsTerminal as _, Write, stdout};

const RESET: &[u8] = b"\x1b[0m";

const NEWLINE: &[u8] = b"\n";
const NEWLINE_SLASH: &[u8] = b"/\n";
const NULL_TERMINATED: &[u8] = b"\0";
const NULL_TERMINATED_SLASH: &[u8] = b"/\0";
// indexed by `is_directory`
const NEWLINES: [&[u8]; 2] = [NEWLINE, NEWLINE_SLASH];
const NULLS: [&[u8]; 2] = [NULL_TERMINATED, NULL_TERMINATED_SLASH];

#[allow(clippy::struct_excessive_bools)]
pub struct PrinterBuilder<I>
where
    I: Iterator<Item = Result<FindResult, FindError>>,
{
    limit: usize,
    nocolour: bool,
    sort: bool,
    long: bool,
    null_terminated: bool,
    results: I,
}

impl<I> PrinterBuilder<I>
where
    I: Iterator<Item = Result<FindResult, FindError>>,
{
    #[inline]
    pub const fn new(results: I) -> Self {
        Self {
            limit: usize::MAX,
            nocolour: false,
            sort: false,
            long: false,
            null_terminated: false,
            results,
        }
    }

    #[must_use]
    /// Limit the values to print to `limit`
    pub const fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = match limit {
            Some(lim) => lim,
            None => usize::MAX,
        };
        self
    }

    #[must_use]
    /// Print with no colour (always disabled with "`NO_COLOUR`" or "`NO_COLOR`" set)
    pub const fn nocolour(mut self, nocolour: bool) -> Self {
        self.nocolour = nocolour;
        self
    }

    #[must_use]
    /// Sort results by path, this collects everything first
    pub const fn sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    /// Prefix every path with its size, modification time and attributes
    pub const fn long(mut self, long: bool) -> Self {
        self.long = long;
        self
    }

    #[must_use]
    /// Terminate results with NUL instead of newline (for xargs -0)
    pub const fn null_terminated(mut self, null_terminated: bool) -> Self {
        self.null_terminated = null_terminated;
        self
    }

    /**
     Prints every result, stopping at the first enumeration error.

     A closed stdout (e.g. piping into `head`) ends printing quietly.

     # Errors
     The enumeration error, or an I/O error writing to stdout.
    */
    pub fn print(self) -> Result<(), FindError> {
        let std_out = stdout();
        let is_terminal = std_out.is_terminal();
        let use_colour = is_terminal && !self.null_terminated && !colour_disabled(self.nocolour);

        let mut writer = if is_terminal {
            BufWriter::new(std_out.lock())
        } else {
            BufWriter::with_capacity(16 * 4096, std_out.lock())
        };

        let style = Style {
            colour: use_colour,
            long: self.long,
            terminators: if self.null_terminated { NULLS } else { NEWLINES },
        };

        let outcome = write_results(&mut writer, self.results, &style, self.limit, self.sort);
        let fault = match outcome.and_then(|fault| writer.flush().map(|()| fault)) {
            Ok(fault) => fault,
            Err(error) if error.kind() == io::ErrorKind::BrokenPipe => None,
            Err(error) => return Err(FindError::from(error)),
        };
        fault.map_or(Ok(()), Err)
    }
}

/// Writes results until the limit, the end, or a fault. Entries yielded before a fault are
/// still written (sorted, when sorting) and the fault is handed back.
fn write_results<W, I>(
    writer: &mut W,
    results: I,
    style: &Style,
    limit: usize,
    sort: bool,
) -> io::Result<Option<FindError>>
where
    W: Write,
    I: Iterator<Item = Result<FindResult, FindError>>,
{
    if sort {
        let mut collected = Vec::new();
        let mut fault = None;
        for result in results {
            match result {
                Ok(result) => collected.push(result),
                Err(error) => {
                    fault = Some(error);
                    break;
                }
            }
        }
        collected.sort_by_key(FindResult::full_path);
        for result in collected.iter().take(limit) {
            style.write(writer, result)?;
        }
        return Ok(fault);
    }

    for result in results.take(limit) {
        match result {
            Ok(result) => style.write(writer, &result)?,
            Err(error) => return Ok(Some(error)),
        }
    }
    Ok(None)
}

fn colour_disabled(nocolour: bool) -> bool {
    nocolour
        || std::env::var_os("NO_COLOUR").is_some_and(|x| !x.is_empty())
        || std::env::var_os("NO_COLOR").is_some_and(|x| !x.is_empty())
}

struct Style {
    colour: bool,
    long: bool,
    terminators: [&'static [u8]; 2],
}

impl Style {
    fn write<W: Write>(&self, writer: &mut W, result: &FindResult) -> io::Result<()> {
        if self.long {
            write_long_prefix(writer, result)?;
        }
        if self.colour {
            writer.write_all(entry_colour(result))?;
        }
        writer.write_all(result.full_path().as_os_str().as_encoded_bytes())?;
        if self.colour {
            writer.write_all(RESET)?;
        }
        writer.write_all(self.terminators[usize::from(result.is_directory())])
    }
}

#[inline]
fn entry_colour(result: &FindResult) -> &[u8] {
    let attributes = result.attributes;
    if attributes.is_reparse_point() {
        if attributes.is_directory() {
            file_type_colour!(directory)
        } else {
            file_type_colour!(symlink)
        }
    } else if attributes.is_directory() {
        file_type_colour!(directory)
    } else if attributes.contains(FileAttributes::DEVICE) {
        file_type_colour!(block_device)
    } else {
        let name = result.file_name.as_encoded_bytes();
        match name.iter().rposition(|&b| b == b'.') {
            Some(dot) if dot > 0 && dot + 1 < name.len() => {
                let extension = &name[dot + 1..];
                file_type_colour!(extension)
            }
            _ => RESET,
        }
    }
}

/// `drhsal` style attribute letters, `-` where a flag is clear.
fn attribute_letters(attributes: FileAttributes) -> [u8; 6] {
    let flag = |set: bool, letter: u8| if set { letter } else { b'-' };
    [
        flag(attributes.is_directory(), b'd'),
        flag(attributes.is_readonly(), b'r'),
        flag(attributes.is_hidden(), b'h'),
        flag(attributes.contains(FileAttributes::SYSTEM), b's'),
        flag(attributes.contains(FileAttributes::ARCHIVE), b'a'),
        flag(attributes.is_reparse_point(), b'l'),
    ]
}

fn write_long_prefix<W: Write>(writer: &mut W, result: &FindResult) -> io::Result<()> {
    writer.write_all(&attribute_letters(result.attributes))?;
    let modified = result.last_write_time.to_datetime().map_or_else(
        || String::from("-                  "),
        |time| time.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    write!(writer, " {:>12} {modified} ", result.size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use findop::FindOperation;
    use findop::fs::MemorySource;

    const PLAIN: Style = Style {
        colour: false,
        long: false,
        terminators: NEWLINES,
    };

    fn faulting_walk() -> findop::FindIter<FindResult, MemorySource> {
        let source = MemorySource::new();
        source.add_file("/root/b.txt", 1);
        source.add_file("/root/a.txt", 1);
        source.add_dir("/root/locked");
        source.deny("/root/locked");
        FindOperation::new("/root")
            .recursive(true)
            .source(source)
            .enumerate()
            .unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn sorted_output_keeps_entries_before_a_fault() {
        let mut out = Vec::new();
        let fault = write_results(&mut out, faulting_walk(), &PLAIN, usize::MAX, true).unwrap();
        assert!(matches!(fault, Some(FindError::AccessDenied)));
        assert_eq!(out, b"/root/a.txt\n/root/b.txt\n/root/locked/\n");
    }

    #[cfg(unix)]
    #[test]
    fn unsorted_output_keeps_entries_before_a_fault() {
        let mut out = Vec::new();
        let fault = write_results(&mut out, faulting_walk(), &PLAIN, usize::MAX, false).unwrap();
        assert!(matches!(fault, Some(FindError::AccessDenied)));
        assert_eq!(out, b"/root/b.txt\n/root/a.txt\n/root/locked/\n");
    }

    #[test]
    fn attribute_letters_follow_flags() {
        let letters = attribute_letters(FileAttributes::DIRECTORY | FileAttributes::HIDDEN);
        assert_eq!(&letters, b"d-h---");
        let letters = attribute_letters(FileAttributes::ARCHIVE | FileAttributes::REPARSE_POINT);
        assert_eq!(&letters, b"----al");
    }
}
