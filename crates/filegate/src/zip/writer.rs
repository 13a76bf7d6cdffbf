//! Forward-only zip32 container writer.
//!
//! Archives are produced against a plain [`Write`] sink, so bytes can go
//! straight to a pipe or socket without ever seeking back. Entry sizes and
//! checksums are therefore recorded in data descriptors after each entry
//! (general purpose flag bit 3) instead of in the local file header, and
//! names are marked UTF-8 (bit 11). Entries are deflate-compressed.
//!
//! The zip32 format caps the entry count at 65535 and every size and
//! offset field at `u32::MAX`. The writer refuses to overflow those fields
//! rather than producing a corrupt archive.

use std::io::{self, Write};

use chrono::{DateTime, Datelike, Timelike, Utc};
use flate2::write::DeflateEncoder;
use flate2::Compression;

/// Most entries a zip32 central directory can describe.
pub const MAX_ENTRIES: u32 = 65535;

/// Most bytes a zip32 archive can address.
pub const MAX_TOTAL_BYTES: u64 = u32::MAX as u64;

const LOCAL_HEADER_SIG: u32 = 0x04034b50;
const DATA_DESCRIPTOR_SIG: u32 = 0x08074b50;
const CENTRAL_HEADER_SIG: u32 = 0x02014b50;
const END_OF_CENTRAL_DIR_SIG: u32 = 0x06054b50;

/// Deflate requires zip version 2.0.
const VERSION_NEEDED: u16 = 20;
/// Unix attributes (3) and version 2.0.
const VERSION_MADE_BY: u16 = 0x0314;
/// Bit 3: sizes in a trailing data descriptor. Bit 11: UTF-8 names.
const FLAGS: u16 = 0x0808;
const METHOD_DEFLATE: u16 = 8;

/// Streams a zip archive into `sink`, one entry at a time.
///
/// Call [`begin_entry`](Self::begin_entry), feed chunks with
/// [`entry_chunk`](Self::entry_chunk), then close the entry with
/// [`finish_entry`](Self::finish_entry) or drop it from the index with
/// [`abandon_entry`](Self::abandon_entry). [`finish`](Self::finish) writes
/// the central directory and returns the sink.
pub struct ZipWriter<W: Write> {
    sink: W,
    offset: u64,
    entries: Vec<CentralRecord>,
    current: Option<EntryState>,
}

struct EntryState {
    name: String,
    header_offset: u64,
    crc: crc32fast::Hasher,
    uncompressed: u64,
    compressed: u64,
    encoder: DeflateEncoder<Vec<u8>>,
    dos_time: u16,
    dos_date: u16,
    mode: u32,
}

struct CentralRecord {
    name: String,
    header_offset: u64,
    crc: u32,
    uncompressed: u32,
    compressed: u32,
    dos_time: u16,
    dos_date: u16,
    mode: u32,
}

impl<W: Write> ZipWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            offset: 0,
            entries: Vec::new(),
            current: None,
        }
    }

    /// Total bytes written to the sink so far.
    pub fn bytes_written(&self) -> u64 {
        self.offset
    }

    /// Opens a new entry and writes its local header.
    ///
    /// A leading `/` in the name is stripped; archive members are always
    /// relative. The modification time falls back to now and is clamped to
    /// the DOS calendar (1980..=2107).
    pub fn begin_entry(
        &mut self,
        name: &str,
        modified: Option<DateTime<Utc>>,
        mode: u32,
    ) -> io::Result<()> {
        if self.current.is_some() {
            return Err(io::Error::other("previous entry is still open"));
        }
        if self.entries.len() >= MAX_ENTRIES as usize {
            return Err(io::Error::other(format!(
                "archive cannot hold more than {} entries",
                MAX_ENTRIES
            )));
        }
        if self.offset > MAX_TOTAL_BYTES {
            return Err(io::Error::other("archive exceeds the zip32 offset range"));
        }

        let name = name.trim_start_matches('/').to_string();
        let (dos_time, dos_date) = dos_date_time(modified.unwrap_or_else(Utc::now));
        let header_offset = self.offset;

        self.put_u32(LOCAL_HEADER_SIG)?;
        self.put_u16(VERSION_NEEDED)?;
        self.put_u16(FLAGS)?;
        self.put_u16(METHOD_DEFLATE)?;
        self.put_u16(dos_time)?;
        self.put_u16(dos_date)?;
        // CRC and sizes are zero here; the data descriptor carries them.
        self.put_u32(0)?;
        self.put_u32(0)?;
        self.put_u32(0)?;
        self.put_u16(name.len() as u16)?;
        self.put_u16(0)?;
        self.put(name.as_bytes())?;

        self.current = Some(EntryState {
            name,
            header_offset,
            crc: crc32fast::Hasher::new(),
            uncompressed: 0,
            compressed: 0,
            encoder: DeflateEncoder::new(Vec::new(), Compression::default()),
            dos_time,
            dos_date,
            mode,
        });
        Ok(())
    }

    /// Appends bytes to the open entry.
    pub fn entry_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        let state = self
            .current
            .as_mut()
            .ok_or_else(|| io::Error::other("no entry is open"))?;
        state.crc.update(chunk);
        state.uncompressed += chunk.len() as u64;
        state.encoder.write_all(chunk)?;

        let buffered = std::mem::take(state.encoder.get_mut());
        if !buffered.is_empty() {
            let len = buffered.len() as u64;
            self.put(&buffered)?;
            if let Some(state) = self.current.as_mut() {
                state.compressed += len;
            }
        }
        Ok(())
    }

    /// Closes the open entry: flushes the compressor, writes the data
    /// descriptor, and records the entry for the central directory.
    pub fn finish_entry(&mut self) -> io::Result<()> {
        let state = self.close_current()?;
        let crc = state.crc;
        let compressed = state.compressed;

        if state.uncompressed > MAX_TOTAL_BYTES || compressed > MAX_TOTAL_BYTES {
            return Err(io::Error::other("entry exceeds the zip32 size range"));
        }

        self.put_u32(DATA_DESCRIPTOR_SIG)?;
        self.put_u32(crc)?;
        self.put_u32(compressed as u32)?;
        self.put_u32(state.uncompressed as u32)?;

        self.entries.push(CentralRecord {
            name: state.name,
            header_offset: state.header_offset,
            crc,
            uncompressed: state.uncompressed as u32,
            compressed: compressed as u32,
            dos_time: state.dos_time,
            dos_date: state.dos_date,
            mode: state.mode,
        });
        Ok(())
    }

    /// Closes the open entry but leaves it out of the central directory.
    ///
    /// The bytes already sunk stay in the stream, but readers that walk
    /// the central directory never see the member. Used when a source
    /// fails partway through an entry.
    pub fn abandon_entry(&mut self) -> io::Result<()> {
        let state = self.close_current()?;
        self.put_u32(DATA_DESCRIPTOR_SIG)?;
        self.put_u32(state.crc)?;
        self.put_u32(state.compressed.min(MAX_TOTAL_BYTES) as u32)?;
        self.put_u32(state.uncompressed.min(MAX_TOTAL_BYTES) as u32)?;
        Ok(())
    }

    /// Writes the central directory and the end record, then returns the
    /// sink. Fails if an entry is still open.
    pub fn finish(mut self) -> io::Result<W> {
        if self.current.is_some() {
            return Err(io::Error::other("an entry is still open"));
        }

        let central_offset = self.offset;
        if central_offset > MAX_TOTAL_BYTES {
            return Err(io::Error::other("archive exceeds the zip32 offset range"));
        }

        let entries = std::mem::take(&mut self.entries);
        for record in &entries {
            self.put_u32(CENTRAL_HEADER_SIG)?;
            self.put_u16(VERSION_MADE_BY)?;
            self.put_u16(VERSION_NEEDED)?;
            self.put_u16(FLAGS)?;
            self.put_u16(METHOD_DEFLATE)?;
            self.put_u16(record.dos_time)?;
            self.put_u16(record.dos_date)?;
            self.put_u32(record.crc)?;
            self.put_u32(record.compressed)?;
            self.put_u32(record.uncompressed)?;
            self.put_u16(record.name.len() as u16)?;
            self.put_u16(0)?; // extra field
            self.put_u16(0)?; // comment
            self.put_u16(0)?; // disk number start
            self.put_u16(0)?; // internal attributes
            self.put_u32(record.mode << 16)?;
            self.put_u32(record.header_offset as u32)?;
            self.put(record.name.as_bytes())?;
        }

        let central_size = self.offset - central_offset;
        self.put_u32(END_OF_CENTRAL_DIR_SIG)?;
        self.put_u16(0)?; // this disk
        self.put_u16(0)?; // central directory disk
        self.put_u16(entries.len() as u16)?;
        self.put_u16(entries.len() as u16)?;
        self.put_u32(central_size as u32)?;
        self.put_u32(central_offset as u32)?;
        self.put_u16(0)?; // comment length

        self.sink.flush()?;
        Ok(self.sink)
    }

    /// Flushes the compressor for the open entry and takes its state.
    fn close_current(&mut self) -> io::Result<ClosedEntry> {
        let state = self
            .current
            .take()
            .ok_or_else(|| io::Error::other("no entry is open"))?;
        let tail = state.encoder.finish()?;
        let mut compressed = state.compressed;
        if !tail.is_empty() {
            self.put(&tail)?;
            compressed += tail.len() as u64;
        }
        Ok(ClosedEntry {
            name: state.name,
            header_offset: state.header_offset,
            crc: state.crc.finalize(),
            uncompressed: state.uncompressed,
            compressed,
            dos_time: state.dos_time,
            dos_date: state.dos_date,
            mode: state.mode,
        })
    }

    fn put(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.sink.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    fn put_u16(&mut self, value: u16) -> io::Result<()> {
        self.put(&value.to_le_bytes())
    }

    fn put_u32(&mut self, value: u32) -> io::Result<()> {
        self.put(&value.to_le_bytes())
    }
}

struct ClosedEntry {
    name: String,
    header_offset: u64,
    crc: u32,
    uncompressed: u64,
    compressed: u64,
    dos_time: u16,
    dos_date: u16,
    mode: u32,
}

/// Converts a timestamp to DOS (time, date) words, clamping to the
/// representable range 1980-01-01..=2107-12-31.
fn dos_date_time(when: DateTime<Utc>) -> (u16, u16) {
    let year = when.year();
    if year < 1980 {
        return (0, (1 << 5) | 1);
    }
    if year > 2107 {
        return ((23 << 11) | (59 << 5) | 29, (127 << 9) | (12 << 5) | 31);
    }
    let date = (((year - 1980) as u16) << 9) | ((when.month() as u16) << 5) | (when.day() as u16);
    let time = ((when.hour() as u16) << 11)
        | ((when.minute() as u16) << 5)
        | ((when.second() as u16) / 2);
    (time, date)
}
