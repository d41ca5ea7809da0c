//! Log tailing for `kvctl logs`

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, SeekFrom};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

const FOLLOW_INTERVAL: Duration = Duration::from_millis(500);

/// Last `count` lines of the file plus the byte length that was read, so a
/// follower can continue from there. Invalid UTF-8 is replaced, not rejected.
pub fn last_lines(path: &Path, count: usize) -> io::Result<(Vec<String>, u64)> {
    let file = std::fs::File::open(path)?;
    let len = file.metadata()?.len();

    let mut window = VecDeque::with_capacity(count.min(1024));
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        if count == 0 {
            continue;
        }
        if window.len() == count {
            window.pop_front();
        }
        let line = String::from_utf8_lossy(&buf);
        window.push_back(line.trim_end_matches(['\n', '\r']).to_string());
    }

    Ok((window.into(), len))
}

/// Copy bytes appended after `offset` to `out` until the future is dropped.
///
/// A file that shrinks (truncated or rotated in place) is read again from the start.
pub async fn follow<W>(path: &Path, mut offset: u64, out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut chunk = vec![0u8; 8192];
    loop {
        match tokio::fs::File::open(path).await {
            Ok(mut file) => {
                let len = file.metadata().await?.len();
                if len < offset {
                    offset = 0;
                }
                if len > offset {
                    file.seek(SeekFrom::Start(offset)).await?;
                    loop {
                        let read = file.read(&mut chunk).await?;
                        if read == 0 {
                            break;
                        }
                        out.write_all(&chunk[..read]).await?;
                        offset += read as u64;
                    }
                    out.flush().await?;
                }
            }
            // not created yet, keep waiting
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        tokio::time::sleep(FOLLOW_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn keeps_only_the_requested_tail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let body: String = (1..=120).map(|i| format!("line {i}\n")).collect();
        fs::write(&path, &body).unwrap();

        let (lines, len) = last_lines(&path, 50).unwrap();
        assert_eq!(lines.len(), 50);
        assert_eq!(lines.first().unwrap(), "line 71");
        assert_eq!(lines.last().unwrap(), "line 120");
        assert_eq!(len, body.len() as u64);
    }

    #[test]
    fn short_file_and_missing_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "first\r\nsecond").unwrap();

        let (lines, _) = last_lines(&path, 10).unwrap();
        assert_eq!(lines, vec!["first", "second"]);

        let (none, _) = last_lines(&path, 0).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = last_lines(&dir.path().join("absent.log"), 5).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn follow_streams_appended_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "old\n").unwrap();
        let (_, offset) = last_lines(&path, 1).unwrap();

        let writer_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let mut file = fs::OpenOptions::new().append(true).open(writer_path).unwrap();
            std::io::Write::write_all(&mut file, b"new\n").unwrap();
        });

        let mut out = Vec::new();
        let _ = tokio::time::timeout(Duration::from_millis(1500), follow(&path, offset, &mut out)).await;
        assert_eq!(String::from_utf8(out).unwrap(), "new\n");
    }
}
