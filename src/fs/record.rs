//! The directory record layout shared by every backend.
//!
//! A filled buffer is a chain of records, each one a fixed 68 byte header followed by
//! the UTF-16LE file name. The first header field is the byte distance to the next record,
//! zero on the last record of the fill.
//!
//! ```text
//!  0  next_entry_offset  u32      40  end_of_file       i64
//!  4  file_index         u32      48  allocation_size   i64
//!  8  creation_time      i64      56  file_attributes   u32
//! 16  last_access_time   i64      60  file_name_length  u32 (bytes)
//! 24  last_write_time    i64      64  ea_size           u32
//! 32  change_time        i64      68  file_name         [u16]
//! ```
use crate::FindError;
use crate::fs::{FileAttributes, FileTime, Result};
use std::ffi::{OsStr, OsString};

const NEXT_ENTRY_OFFSET: usize = 0;
const FILE_INDEX: usize = 4;
const CREATION_TIME: usize = 8;
const LAST_ACCESS_TIME: usize = 16;
const LAST_WRITE_TIME: usize = 24;
const CHANGE_TIME: usize = 32;
const END_OF_FILE: usize = 40;
const ALLOCATION_SIZE: usize = 48;
const FILE_ATTRIBUTES: usize = 56;
const FILE_NAME_LENGTH: usize = 60;
const EA_SIZE: usize = 64;

/// Size of the fixed part of a record, the name starts here.
pub const HEADER_SIZE: usize = 68;
/// Alignment of every record within a fill.
pub const RECORD_ALIGN: usize = 8;
/// The longest file name a record can carry, in UTF-16 code units.
pub const MAX_FILE_NAME_UNITS: usize = 255;
/// The size of the largest possible record, padding included.
pub const MAX_RECORD_SIZE: usize = align_up(HEADER_SIZE + MAX_FILE_NAME_UNITS * 2);

const_assert!(EA_SIZE + 4 == HEADER_SIZE, "the name must directly follow the header");
const_assert!(HEADER_SIZE % 4 == 0, "names must stay 2 byte aligned");
const_assert!(MAX_RECORD_SIZE == 584);

#[inline]
const fn align_up(size: usize) -> usize {
    (size + RECORD_ALIGN - 1) & !(RECORD_ALIGN - 1)
}

#[inline]
fn read_u32(header: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&header[at..at + 4]);
    u32::from_le_bytes(raw)
}

#[inline]
fn read_i64(header: &[u8], at: usize) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&header[at..at + 8]);
    i64::from_le_bytes(raw)
}

/// The fixed header fields of a record, everything except the name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub file_index: u32,
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
    /// Logical file size in bytes.
    pub end_of_file: u64,
    pub allocation_size: u64,
    pub attributes: FileAttributes,
    pub ea_size: u32,
}

impl EntryMetadata {
    #[allow(clippy::cast_sign_loss)]
    fn read(header: &[u8]) -> Self {
        Self {
            file_index: read_u32(header, FILE_INDEX),
            creation_time: FileTime::from_ticks(read_i64(header, CREATION_TIME)),
            last_access_time: FileTime::from_ticks(read_i64(header, LAST_ACCESS_TIME)),
            last_write_time: FileTime::from_ticks(read_i64(header, LAST_WRITE_TIME)),
            change_time: FileTime::from_ticks(read_i64(header, CHANGE_TIME)),
            end_of_file: read_i64(header, END_OF_FILE).max(0) as u64,
            allocation_size: read_i64(header, ALLOCATION_SIZE).max(0) as u64,
            attributes: FileAttributes(read_u32(header, FILE_ATTRIBUTES)),
            ea_size: read_u32(header, EA_SIZE),
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    fn write(&self, header: &mut [u8]) {
        let mut put = |at: usize, bytes: &[u8]| header[at..at + bytes.len()].copy_from_slice(bytes);
        put(FILE_INDEX, &self.file_index.to_le_bytes());
        put(CREATION_TIME, &self.creation_time.ticks().to_le_bytes());
        put(LAST_ACCESS_TIME, &self.last_access_time.ticks().to_le_bytes());
        put(LAST_WRITE_TIME, &self.last_write_time.ticks().to_le_bytes());
        put(CHANGE_TIME, &self.change_time.ticks().to_le_bytes());
        put(END_OF_FILE, &(self.end_of_file as i64).to_le_bytes());
        put(ALLOCATION_SIZE, &(self.allocation_size as i64).to_le_bytes());
        put(FILE_ATTRIBUTES, &self.attributes.bits().to_le_bytes());
        put(EA_SIZE, &self.ea_size.to_le_bytes());
    }
}

/**
 One decoded record, borrowing its name from the buffer it was decoded from.

 The borrow ties the record to the buffer, so it cannot outlive the next fetch;
 anything that has to survive is copied out by a projection (see `walk::transforms`).
*/
#[derive(Clone, Copy, Debug)]
pub struct DirectoryRecord<'a> {
    metadata: EntryMetadata,
    name: &'a [u8],
}

impl<'a> DirectoryRecord<'a> {
    #[inline]
    #[must_use]
    pub const fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    #[inline]
    #[must_use]
    pub const fn attributes(&self) -> FileAttributes {
        self.metadata.attributes
    }

    /// Logical size in bytes
    #[inline]
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.metadata.end_of_file
    }

    /// The raw UTF-16LE name bytes, exactly as stored in the record.
    #[inline]
    #[must_use]
    pub const fn name_bytes(&self) -> &'a [u8] {
        self.name
    }

    /// Name length in UTF-16 code units
    #[inline]
    #[must_use]
    pub const fn name_len(&self) -> usize {
        self.name.len() / 2
    }

    #[inline]
    pub fn name_units(&self) -> impl Iterator<Item = u16> + 'a {
        self.name
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
    }

    /// The name as a `String`, unpaired surrogates become U+FFFD.
    #[must_use]
    pub fn file_name(&self) -> String {
        char::decode_utf16(self.name_units())
            .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }

    /// The name as an `OsString`, lossless for anything a backend encoded.
    #[must_use]
    pub fn file_name_os(&self) -> OsString {
        let units: Vec<u16> = self.name_units().collect();
        decode_name(&units)
    }
}

/**
 Decodes the record starting at `offset` in the first `filled` bytes of `buffer`.

 Returns the record and the offset of the next one, `None` when this is the last record of the fill.
 Every field that positions something (name length, next entry offset) is checked against
 `filled` before it is used.

 # Errors
 [`FindError::CorruptData`] when the record geometry does not fit the filled region.
*/
pub fn decode_entry(
    buffer: &[u8],
    filled: usize,
    offset: usize,
) -> Result<(DirectoryRecord<'_>, Option<usize>)> {
    let filled_region = buffer
        .get(..filled)
        .ok_or(FindError::corrupt(offset, "filled length exceeds the buffer"))?;

    let header = offset
        .checked_add(HEADER_SIZE)
        .and_then(|end| filled_region.get(offset..end))
        .ok_or(FindError::corrupt(offset, "record header runs past the filled region"))?;

    let name_length = read_u32(header, FILE_NAME_LENGTH) as usize;
    if name_length % 2 != 0 {
        return Err(FindError::corrupt(offset, "odd name length"));
    }

    let name_start = offset + HEADER_SIZE;
    let name = name_start
        .checked_add(name_length)
        .and_then(|end| filled_region.get(name_start..end))
        .ok_or(FindError::corrupt(offset, "name runs past the filled region"))?;

    let next = match read_u32(header, NEXT_ENTRY_OFFSET) as usize {
        0 => None,
        step if step < HEADER_SIZE + name_length => {
            return Err(FindError::corrupt(offset, "next entry offset overlaps the record"));
        }
        step => match offset.checked_add(step) {
            Some(next) if next < filled => Some(next),
            _ => return Err(FindError::corrupt(offset, "next entry offset past the filled region")),
        },
    };

    let record = DirectoryRecord {
        metadata: EntryMetadata::read(header),
        name,
    };
    Ok((record, next))
}

/**
 Encodes records into a caller's buffer in the native layout.

 Each push pads the record to [`RECORD_ALIGN`] and patches the previous record's
 next entry offset, so the buffer is a valid chain after every successful push.
*/
#[derive(Debug)]
pub struct RecordWriter<'a> {
    buffer: &'a mut [u8],
    len: usize,
    last: Option<usize>,
    count: usize,
}

impl<'a> RecordWriter<'a> {
    #[inline]
    #[must_use]
    pub const fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            len: 0,
            last: None,
            count: 0,
        }
    }

    /// Bytes a record with a name of `name_units` code units occupies, padding included.
    #[inline]
    #[must_use]
    pub const fn record_size(name_units: usize) -> usize {
        align_up(HEADER_SIZE + name_units * 2)
    }

    /// Appends one record, returns false (writing nothing) when it does not fit.
    pub fn push(&mut self, metadata: &EntryMetadata, name: &[u16]) -> bool {
        let Ok(name_length) = u32::try_from(name.len() * 2) else {
            return false;
        };
        let start = self.len;
        let size = Self::record_size(name.len());
        let Some(record) = self.buffer.get_mut(start..start + size) else {
            return false;
        };

        record.fill(0);
        metadata.write(record);
        record[FILE_NAME_LENGTH..FILE_NAME_LENGTH + 4].copy_from_slice(&name_length.to_le_bytes());
        for (slot, unit) in record[HEADER_SIZE..].chunks_exact_mut(2).zip(name) {
            slot.copy_from_slice(&unit.to_le_bytes());
        }

        if let Some(previous) = self.last {
            #[allow(clippy::cast_possible_truncation)] // bounded by the buffer length
            let step = (start - previous) as u32;
            self.buffer[previous..previous + 4].copy_from_slice(&step.to_le_bytes());
        }

        self.last = Some(start);
        self.len = start + size;
        self.count += 1;
        true
    }

    /// Bytes written so far, the `filled` length to decode with.
    #[inline]
    #[must_use]
    pub const fn filled(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}

// Unix names are arbitrary bytes. Bytes that are not valid UTF-8 are carried as the lone
// surrogates U+DC80..=U+DCFF, which no valid UTF-16 name can contain, so they come back intact.
#[cfg(unix)]
const ESCAPE_BASE: u16 = 0xDC00;

/// Converts an OS file name into the UTF-16 code units a record stores.
#[cfg(unix)]
#[must_use]
pub fn encode_name(name: &OsStr) -> Vec<u16> {
    use std::os::unix::ffi::OsStrExt;

    let mut units = Vec::with_capacity(name.len());
    for chunk in name.as_bytes().utf8_chunks() {
        units.extend(chunk.valid().encode_utf16());
        units.extend(chunk.invalid().iter().map(|&byte| ESCAPE_BASE | u16::from(byte)));
    }
    units
}

/// Converts stored UTF-16 code units back into an OS file name.
#[cfg(unix)]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn decode_name(units: &[u16]) -> OsString {
    use std::os::unix::ffi::OsStringExt;

    let mut bytes = Vec::with_capacity(units.len());
    let mut utf8 = [0u8; 4];
    for unit in char::decode_utf16(units.iter().copied()) {
        match unit {
            Ok(ch) => bytes.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes()),
            Err(lone) => match lone.unpaired_surrogate() {
                escaped @ 0xDC80..=0xDCFF => bytes.push((escaped & 0xFF) as u8),
                _ => bytes.extend_from_slice(
                    char::REPLACEMENT_CHARACTER.encode_utf8(&mut utf8).as_bytes(),
                ),
            },
        }
    }
    OsString::from_vec(bytes)
}

/// Converts an OS file name into the UTF-16 code units a record stores.
#[cfg(windows)]
#[must_use]
pub fn encode_name(name: &OsStr) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    name.encode_wide().collect()
}

/// Converts stored UTF-16 code units back into an OS file name.
#[cfg(windows)]
#[must_use]
pub fn decode_name(units: &[u16]) -> OsString {
    use std::os::windows::ffi::OsStringExt;
    OsString::from_wide(units)
}

#[cfg(not(any(unix, windows)))]
#[must_use]
pub fn encode_name(name: &OsStr) -> Vec<u16> {
    name.to_string_lossy().encode_utf16().collect()
}

#[cfg(not(any(unix, windows)))]
#[must_use]
pub fn decode_name(units: &[u16]) -> OsString {
    OsString::from(String::from_utf16_lossy(units))
}
