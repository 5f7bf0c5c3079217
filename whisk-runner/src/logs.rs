//! Task log tailing
//!
//! A tailer returns the complete lines appended to a log location since the
//! previous call. Partial trailing lines are held back until they are
//! terminated or the tailer is drained.

use async_trait::async_trait;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Incremental reader over one log location
#[async_trait]
pub trait LogTailer: Send {
    /// Complete lines appended since the last call
    async fn tail(&mut self) -> io::Result<Vec<String>>;

    /// Remaining lines, including an unterminated last line
    async fn drain(&mut self) -> io::Result<Vec<String>> {
        self.tail().await
    }
}

/// Tailer for locations that are not readable from this process
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogTailer;

#[async_trait]
impl LogTailer for NullLogTailer {
    async fn tail(&mut self) -> io::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Tails a file on a locally mounted path
///
/// A file that does not exist yet reads as empty.
#[derive(Debug)]
pub struct FileLogTailer {
    path: PathBuf,
    offset: u64,
    /// Bytes after the last newline; may end inside a UTF-8 sequence
    partial: Vec<u8>,
}

impl FileLogTailer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            partial: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_new(&mut self) -> io::Result<()> {
        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        // Truncated or rotated; start over
        if file.metadata().await?.len() < self.offset {
            self.offset = 0;
            self.partial.clear();
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let read = file.read_to_end(&mut self.partial).await?;
        self.offset += read as u64;
        Ok(())
    }
}

#[async_trait]
impl LogTailer for FileLogTailer {
    async fn tail(&mut self) -> io::Result<Vec<String>> {
        self.read_new().await?;

        let Some(end) = self.partial.iter().rposition(|&b| b == b'\n') else {
            return Ok(Vec::new());
        };
        let rest = self.partial.split_off(end + 1);
        let complete = std::mem::replace(&mut self.partial, rest);

        Ok(String::from_utf8_lossy(&complete)
            .lines()
            .map(str::to_string)
            .collect())
    }

    async fn drain(&mut self) -> io::Result<Vec<String>> {
        let mut lines = self.tail().await?;
        if !self.partial.is_empty() {
            let rest = std::mem::take(&mut self.partial);
            lines.push(String::from_utf8_lossy(&rest).into_owned());
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut tailer = FileLogTailer::new(dir.path().join("stdout.log"));

        assert!(tailer.tail().await.unwrap().is_empty());
        assert!(tailer.drain().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tails_only_new_complete_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stdout.log");
        let mut file = std::fs::File::create(&path).unwrap();
        let mut tailer = FileLogTailer::new(&path);

        write!(file, "first\nsecond\nthi").unwrap();
        file.flush().unwrap();
        assert_eq!(tailer.tail().await.unwrap(), vec!["first", "second"]);

        write!(file, "rd\nfourth").unwrap();
        file.flush().unwrap();
        assert_eq!(tailer.tail().await.unwrap(), vec!["third"]);
        assert!(tailer.tail().await.unwrap().is_empty());

        assert_eq!(tailer.drain().await.unwrap(), vec!["fourth"]);
        assert!(tailer.drain().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_character_split_across_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stdout.log");
        let mut file = std::fs::File::create(&path).unwrap();
        let mut tailer = FileLogTailer::new(&path);

        let line = "loss: 0.5 \u{2192} 0.1\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xE2).unwrap() + 1;

        file.write_all(&line[..split]).unwrap();
        file.flush().unwrap();
        assert!(tailer.tail().await.unwrap().is_empty());

        file.write_all(&line[split..]).unwrap();
        file.flush().unwrap();
        assert_eq!(tailer.tail().await.unwrap(), vec!["loss: 0.5 \u{2192} 0.1"]);
    }

    #[tokio::test]
    async fn test_truncated_file_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stderr.log");
        std::fs::write(&path, "a long first line\n").unwrap();

        let mut tailer = FileLogTailer::new(&path);
        assert_eq!(tailer.tail().await.unwrap(), vec!["a long first line"]);

        std::fs::write(&path, "new\n").unwrap();
        assert_eq!(tailer.tail().await.unwrap(), vec!["new"]);
    }

    #[tokio::test]
    async fn test_null_tailer() {
        let mut tailer = NullLogTailer;
        assert!(tailer.tail().await.unwrap().is_empty());
        assert!(tailer.drain().await.unwrap().is_empty());
    }
}
