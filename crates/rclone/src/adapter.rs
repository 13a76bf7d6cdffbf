//! Asynchronous wrapper around the rclone command line tool.
//!
//! Every invocation goes through [`Rclone`], which pins down the binary to
//! run and the flags shared by all commands. Output is either captured
//! whole ([`Rclone::invoke`]) or pulled incrementally through an
//! [`RcloneStream`], which is how file contents are transferred without
//! buffering them in memory.

use std::path::PathBuf;
use std::process::Stdio;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{RcloneError, Result};
use crate::types::{parse_lsf, parse_lsjson, parse_listremotes, LsJsonEntry, RemoteDescriptor};

/// Binary invoked when no explicit command is configured.
pub const DEFAULT_COMMAND: &str = "rclone";

/// Size of each chunk pulled from a streaming invocation.
pub const STREAM_CHUNK_SIZE: usize = 32 * 1024;

/// Low-level retries passed to every invocation. Overrides rclone's
/// built-in default of 10.
pub const DEFAULT_LOW_LEVEL_RETRIES: u32 = 1;

/// Handle for invoking a fixed rclone binary with shared flags.
///
/// Cloning is cheap; handles carry configuration only and no process state.
#[derive(Debug, Clone)]
pub struct Rclone {
    command: PathBuf,
    low_level_retries: u32,
}

impl Rclone {
    /// Creates a handle that invokes `rclone` from PATH.
    pub fn new() -> Self {
        Self::with_command(DEFAULT_COMMAND)
    }

    /// Creates a handle that invokes the given binary instead of `rclone`.
    pub fn with_command(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            low_level_retries: DEFAULT_LOW_LEVEL_RETRIES,
        }
    }

    /// Sets the number of low-level retries appended to every invocation.
    pub fn low_level_retries(mut self, retries: u32) -> Self {
        self.low_level_retries = retries;
        self
    }

    fn command_for(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(args);
        cmd.arg(format!("--low-level-retries={}", self.low_level_retries));
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // An abandoned invocation must not keep transferring in the
        // background.
        cmd.kill_on_drop(true);
        cmd
    }

    /// Runs rclone and captures its full standard output.
    ///
    /// Fails when the process exits non-zero; standard error is folded into
    /// the error for diagnosis.
    pub async fn invoke(&self, args: &[&str]) -> Result<Vec<u8>> {
        debug!(command = %self.command.display(), ?args, "invoking rclone");
        let output = self.command_for(args).output().await?;
        if !output.status.success() {
            return Err(RcloneError::CommandFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// Starts rclone and returns a handle that yields standard output in
    /// [`STREAM_CHUNK_SIZE`] chunks.
    ///
    /// Standard error is drained on a separate task for the lifetime of the
    /// process, so a chatty or failing rclone can never fill the stderr
    /// pipe and stall the transfer.
    pub fn stream(&self, args: &[&str]) -> Result<RcloneStream> {
        debug!(command = %self.command.display(), ?args, "streaming from rclone");
        let mut child = self.command_for(args).spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RcloneError::Io("child stdout was not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| RcloneError::Io("child stderr was not captured".to_string()))?;
        let stderr_task = tokio::spawn(async move {
            let mut captured = Vec::new();
            let _ = stderr.read_to_end(&mut captured).await;
            captured
        });
        Ok(RcloneStream {
            child,
            stdout,
            stderr_task,
        })
    }

    /// Lists a remote path, one entry per file or directory.
    pub async fn lsjson(&self, target: &str) -> Result<Vec<LsJsonEntry>> {
        let output = self.invoke(&["lsjson", target]).await?;
        parse_lsjson(&output)
    }

    /// Recursively lists every entry below a remote path.
    pub async fn lsjson_recursive(&self, target: &str) -> Result<Vec<LsJsonEntry>> {
        let output = self.invoke(&["lsjson", "--recursive", target]).await?;
        parse_lsjson(&output)
    }

    /// Lists the names of the immediate child directories of a remote path.
    pub async fn lsf_dirs(&self, target: &str) -> Result<Vec<String>> {
        let output = self
            .invoke(&["lsf", target, "--dirs-only", "--dir-slash=false"])
            .await?;
        Ok(parse_lsf(&String::from_utf8_lossy(&output)))
    }

    /// Reads the full contents of a remote file.
    pub async fn cat_all(&self, target: &str) -> Result<Vec<u8>> {
        self.invoke(&["cat", target]).await
    }

    /// Streams the contents of a remote file.
    pub fn cat(&self, target: &str) -> Result<RcloneStream> {
        self.stream(&["cat", target])
    }

    /// Lists the remotes configured in rclone.
    pub async fn remotes(&self) -> Result<Vec<RemoteDescriptor>> {
        let output = self.invoke(&["listremotes", "--long"]).await?;
        Ok(parse_listremotes(&String::from_utf8_lossy(&output)))
    }
}

impl Default for Rclone {
    fn default() -> Self {
        Self::new()
    }
}

/// Incremental reader over a running rclone process's standard output.
///
/// Chunks are filled to [`STREAM_CHUNK_SIZE`] bytes except for the last one
/// before end of stream. After the final chunk, [`finish`](Self::finish)
/// must be called to observe the exit status and anything written to
/// standard error. Dropping the stream without finishing kills the process.
#[derive(Debug)]
pub struct RcloneStream {
    child: Child,
    stdout: ChildStdout,
    stderr_task: JoinHandle<Vec<u8>>,
}

impl RcloneStream {
    /// Reads the next chunk, returning `None` at end of stream.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        let mut filled = 0;
        while filled < STREAM_CHUNK_SIZE {
            let n = self.stdout.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(Bytes::from(buf)))
    }

    /// Waits for the process to exit and verifies it succeeded.
    ///
    /// A transfer counts as successful only when rclone exits zero and its
    /// standard error is empty. Anything else means the bytes already
    /// yielded may be an incomplete file.
    pub async fn finish(mut self) -> Result<()> {
        // Drain whatever stdout the caller did not consume so the child
        // cannot block on a full pipe while exiting.
        let mut rest = Vec::new();
        let _ = self.stdout.read_to_end(&mut rest).await;

        let captured = self
            .stderr_task
            .await
            .map_err(|err| RcloneError::Io(err.to_string()))?;
        let status = self.child.wait().await?;
        let stderr = String::from_utf8_lossy(&captured).trim().to_string();

        if !status.success() {
            return Err(RcloneError::CommandFailed {
                code: status.code().unwrap_or(-1),
                stderr,
            });
        }
        if !stderr.is_empty() {
            return Err(RcloneError::StderrOutput(stderr));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;
    use std::time::Duration;

    use tempfile::TempDir;

    #[test]
    fn test_default_command_and_retries() {
        let rclone = Rclone::new();
        assert_eq!(rclone.command, PathBuf::from("rclone"));
        assert_eq!(rclone.low_level_retries, DEFAULT_LOW_LEVEL_RETRIES);
    }

    #[test]
    fn test_with_command_and_retries_builder() {
        let rclone = Rclone::with_command("/opt/bin/rclone").low_level_retries(5);
        assert_eq!(rclone.command, PathBuf::from("/opt/bin/rclone"));
        assert_eq!(rclone.low_level_retries, 5);
    }

    /// Writes an executable shell script standing in for the rclone binary.
    #[cfg(unix)]
    fn fake_rclone(dir: &TempDir, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join("rclone");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_captures_stdout() {
        let dir = TempDir::new().unwrap();
        let rclone = Rclone::with_command(fake_rclone(&dir, "echo hello"));
        let output = rclone.invoke(&["version"]).await.unwrap();
        assert_eq!(output, b"hello\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_nonzero_exit_includes_stderr() {
        let dir = TempDir::new().unwrap();
        let rclone = Rclone::with_command(fake_rclone(
            &dir,
            "echo '2024/01/01 ERROR : directory not found' >&2\nexit 3",
        ));
        let err = rclone.invoke(&["lsjson", "remote:/missing"]).await.unwrap_err();
        match err {
            RcloneError::CommandFailed { code, stderr } => {
                assert_eq!(code, 3);
                assert!(stderr.contains("directory not found"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_tolerates_stderr_on_success() {
        let dir = TempDir::new().unwrap();
        let rclone = Rclone::with_command(fake_rclone(
            &dir,
            "echo data\necho 'NOTICE: config not found' >&2\nexit 0",
        ));
        let output = rclone.invoke(&["version"]).await.unwrap();
        assert_eq!(output, b"data\n");
    }

    #[tokio::test]
    async fn test_invoke_missing_binary_is_not_installed() {
        let rclone = Rclone::with_command("/nonexistent/rclone-missing");
        let err = rclone.invoke(&["version"]).await.unwrap_err();
        assert!(matches!(err, RcloneError::NotInstalled));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_appends_low_level_retries() {
        let dir = TempDir::new().unwrap();
        let argfile = dir.path().join("args.txt");
        let rclone = Rclone::with_command(fake_rclone(
            &dir,
            &format!("printf '%s\\n' \"$@\" > \"{}\"", argfile.display()),
        ));
        rclone.invoke(&["lsjson", "remote:/docs"]).await.unwrap();
        let args = std::fs::read_to_string(&argfile).unwrap();
        assert_eq!(args, "lsjson\nremote:/docs\n--low-level-retries=1\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_custom_retries_reach_the_command_line() {
        let dir = TempDir::new().unwrap();
        let argfile = dir.path().join("args.txt");
        let rclone = Rclone::with_command(fake_rclone(
            &dir,
            &format!("printf '%s\\n' \"$@\" > \"{}\"", argfile.display()),
        ))
        .low_level_retries(4);
        rclone.cat_all("remote:/file.bin").await.unwrap();
        let args = std::fs::read_to_string(&argfile).unwrap();
        assert!(args.ends_with("--low-level-retries=4\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stream_chunks_fill_to_chunk_size() {
        let dir = TempDir::new().unwrap();
        let rclone = Rclone::with_command(fake_rclone(&dir, "head -c 100000 /dev/zero"));
        let mut stream = rclone.cat("remote:/big.bin").unwrap();
        let mut sizes = Vec::new();
        while let Some(chunk) = stream.next_chunk().await.unwrap() {
            sizes.push(chunk.len());
        }
        stream.finish().await.unwrap();
        assert_eq!(sizes, vec![32768, 32768, 32768, 1696]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stream_empty_output() {
        let dir = TempDir::new().unwrap();
        let rclone = Rclone::with_command(fake_rclone(&dir, "exit 0"));
        let mut stream = rclone.cat("remote:/empty.bin").unwrap();
        assert!(stream.next_chunk().await.unwrap().is_none());
        stream.finish().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stream_reports_stderr_despite_success() {
        let dir = TempDir::new().unwrap();
        let rclone = Rclone::with_command(fake_rclone(
            &dir,
            "echo data\necho 'Failed to copy: unexpected EOF' >&2\nexit 0",
        ));
        let mut stream = rclone.cat("remote:/cut-short.bin").unwrap();
        let mut total = 0;
        while let Some(chunk) = stream.next_chunk().await.unwrap() {
            total += chunk.len();
        }
        assert_eq!(total, 5);
        let err = stream.finish().await.unwrap_err();
        match err {
            RcloneError::StderrOutput(msg) => assert!(msg.contains("unexpected EOF")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stream_nonzero_exit_fails_finish() {
        let dir = TempDir::new().unwrap();
        let rclone = Rclone::with_command(fake_rclone(&dir, "echo partial\nexit 1"));
        let mut stream = rclone.cat("remote:/file.bin").unwrap();
        while stream.next_chunk().await.unwrap().is_some() {}
        let err = stream.finish().await.unwrap_err();
        assert!(matches!(err, RcloneError::CommandFailed { code: 1, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stream_large_stderr_does_not_deadlock() {
        let dir = TempDir::new().unwrap();
        // 256 KiB of stderr before any stdout; without a concurrent drain
        // the child blocks on a full stderr pipe and never produces output.
        let rclone = Rclone::with_command(fake_rclone(
            &dir,
            "head -c 262144 /dev/zero | tr '\\0' e >&2\necho done",
        ));
        let result = tokio::time::timeout(Duration::from_secs(30), async {
            let mut stream = rclone.cat("remote:/noisy.bin").unwrap();
            let mut data = Vec::new();
            while let Some(chunk) = stream.next_chunk().await.unwrap() {
                data.extend_from_slice(&chunk);
            }
            (data, stream.finish().await)
        })
        .await
        .expect("stream deadlocked on stderr");
        assert_eq!(result.0, b"done\n");
        assert!(matches!(result.1, Err(RcloneError::StderrOutput(_))));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_dropped_stream_kills_process() {
        let dir = TempDir::new().unwrap();
        let pidfile = dir.path().join("pid");
        let rclone = Rclone::with_command(fake_rclone(
            &dir,
            &format!("echo $$ > \"{}\"\nexec sleep 30", pidfile.display()),
        ));
        let stream = rclone.cat("remote:/endless.bin").unwrap();

        let mut pid = String::new();
        for _ in 0..100 {
            if let Ok(contents) = std::fs::read_to_string(&pidfile) {
                if contents.ends_with('\n') {
                    pid = contents.trim().to_string();
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!pid.is_empty(), "fake rclone never started");
        assert!(Path::new(&format!("/proc/{}", pid)).exists());

        drop(stream);

        let mut killed = false;
        for _ in 0..200 {
            let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid));
            match stat {
                Ok(contents) if !contents.contains(") Z ") => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                // Either reaped (gone) or a zombie awaiting reaping; in both
                // cases the transfer itself has stopped.
                _ => {
                    killed = true;
                    break;
                }
            }
        }
        assert!(killed, "process survived stream drop");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_lsjson_helper_parses_entries() {
        let dir = TempDir::new().unwrap();
        let rclone = Rclone::with_command(fake_rclone(
            &dir,
            r#"echo '[{"Path":"notes.txt","Name":"notes.txt","Size":12,"MimeType":"text/plain","ModTime":"2024-01-05T10:00:00Z","IsDir":false}]'"#,
        ));
        let entries = rclone.lsjson("remote:/docs").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "notes.txt");
        assert_eq!(entries[0].size_bytes(), 12);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_lsf_dirs_passes_directory_flags() {
        let dir = TempDir::new().unwrap();
        let argfile = dir.path().join("args.txt");
        let rclone = Rclone::with_command(fake_rclone(
            &dir,
            &format!(
                "printf '%s\\n' \"$@\" > \"{}\"\nprintf 'docs\\nphotos\\n'",
                argfile.display()
            ),
        ));
        let dirs = rclone.lsf_dirs("remote:/").await.unwrap();
        assert_eq!(dirs, vec!["docs", "photos"]);
        let args = std::fs::read_to_string(&argfile).unwrap();
        assert_eq!(
            args,
            "lsf\nremote:/\n--dirs-only\n--dir-slash=false\n--low-level-retries=1\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cat_all_returns_raw_bytes() {
        let dir = TempDir::new().unwrap();
        let rclone = Rclone::with_command(fake_rclone(&dir, "printf 'raw bytes'"));
        let output = rclone.cat_all("remote:/file.bin").await.unwrap();
        assert_eq!(output, b"raw bytes");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_remotes_parses_listremotes_output() {
        let dir = TempDir::new().unwrap();
        let rclone = Rclone::with_command(fake_rclone(
            &dir,
            "printf 'gdrive:             drive\\ns3backup:           s3\\n'",
        ));
        let remotes = rclone.remotes().await.unwrap();
        assert_eq!(remotes.len(), 2);
        assert_eq!(remotes[0].name, "gdrive");
        assert_eq!(remotes[0].kind, "drive");
        assert_eq!(remotes[1].name, "s3backup");
        assert_eq!(remotes[1].kind, "s3");
    }
}
