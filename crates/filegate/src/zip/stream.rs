//! Archive streaming over enumerated entries.
//!
//! The streamer walks the entries of a [`ZipJob`] and feeds each file's
//! bytes through the container writer. Sources that cannot be opened, or
//! that die partway through, are skipped so one bad file never sinks a
//! whole download. Sink failures abort the archive, since nothing useful
//! can be written past a dead sink.

use std::io::{self, Read, Write};

use tracing::{info, warn};

use crate::error::{FsError, Result};
use crate::fs::{FileEntry, FsPath, LocalPath, RemotePath};
use crate::zip::writer::ZipWriter;

/// Chunk size for pulling local file bytes into the archive.
const COPY_CHUNK_SIZE: usize = 32 * 1024;

/// Permission bits recorded for archive members.
const ENTRY_MODE: u32 = 0o644;

/// A directory to archive and the file entries to include, as produced by
/// [`FsPath::files_to_zip`].
#[derive(Debug, Clone)]
pub struct ZipJob {
    pub root: FsPath,
    pub entries: Vec<FileEntry>,
}

/// Outcome of streaming one archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipSummary {
    /// Entries fully written into the archive.
    pub written: u32,
    /// Entries dropped because their source failed.
    pub skipped: u32,
}

/// Streams zip archives from enumerated directory entries.
#[derive(Debug, Default)]
pub struct ZipStreamer;

impl ZipStreamer {
    pub fn new() -> Self {
        Self
    }

    /// Streams the job's entries into `sink` as a zip archive.
    ///
    /// Directory rows are skipped outright. The archive is finalized even
    /// when every entry was dropped; an empty but valid archive is still a
    /// valid answer.
    pub async fn stream<W: Write>(&self, job: &ZipJob, sink: W) -> Result<ZipSummary> {
        let mut writer = ZipWriter::new(sink);
        let mut written = 0u32;
        let mut skipped = 0u32;

        for entry in &job.entries {
            if entry.is_dir {
                continue;
            }
            let stored = match &job.root {
                FsPath::Local(local) => stream_local(&mut writer, local, entry)?,
                FsPath::Remote(remote) => stream_remote(&mut writer, remote, entry).await?,
            };
            if stored {
                written += 1;
            } else {
                skipped += 1;
            }
        }

        writer.finish().map_err(abort)?;
        info!(written, skipped, "archive complete");
        Ok(ZipSummary { written, skipped })
    }
}

/// Copies one local file into the archive. Returns false when the entry
/// was skipped.
fn stream_local<W: Write>(
    writer: &mut ZipWriter<W>,
    root: &LocalPath,
    entry: &FileEntry,
) -> Result<bool> {
    // The source is opened before the entry's header goes out, so a file
    // that vanished since enumeration skips without touching the archive.
    let mut file = match root.child(&entry.path).open() {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %entry.path, error = %e, "skipping unreadable file");
            return Ok(false);
        }
    };

    writer
        .begin_entry(&entry.path, entry.modified, ENTRY_MODE)
        .map_err(abort)?;
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    loop {
        match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => writer.entry_chunk(&buf[..n]).map_err(abort)?,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(path = %entry.path, error = %e, "source failed mid-entry, dropping it");
                writer.abandon_entry().map_err(abort)?;
                return Ok(false);
            }
        }
    }
    writer.finish_entry().map_err(abort)?;
    Ok(true)
}

/// Copies one remote file into the archive. Returns false when the entry
/// was skipped.
async fn stream_remote<W: Write>(
    writer: &mut ZipWriter<W>,
    root: &RemotePath,
    entry: &FileEntry,
) -> Result<bool> {
    let mut source = match root.child(&entry.path).read_stream().await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(path = %entry.path, error = %e, "skipping unreadable file");
            return Ok(false);
        }
    };

    writer
        .begin_entry(&entry.path, entry.modified, ENTRY_MODE)
        .map_err(abort)?;
    loop {
        match source.next_chunk().await {
            Ok(Some(chunk)) => writer.entry_chunk(&chunk).map_err(abort)?,
            Ok(None) => break,
            Err(e) => {
                warn!(path = %entry.path, error = %e, "source failed mid-entry, dropping it");
                writer.abandon_entry().map_err(abort)?;
                return Ok(false);
            }
        }
    }

    // A clean EOF is not enough: the transfer only counts once the tool
    // exits zero with a silent stderr.
    match source.finish().await {
        Ok(()) => {
            writer.finish_entry().map_err(abort)?;
            Ok(true)
        }
        Err(e) => {
            warn!(path = %entry.path, error = %e, "transfer reported failure, dropping entry");
            writer.abandon_entry().map_err(abort)?;
            Ok(false)
        }
    }
}

fn abort(e: io::Error) -> FsError {
    FsError::ArchiveAborted(e.to_string())
}
