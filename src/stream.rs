use std::{
    collections::VecDeque,
    io::SeekFrom,
    path::{Path, PathBuf},
    time::Duration,
};

use futures::{Stream, stream};
use serde::{Deserialize, Serialize};
use tokio::{
    fs,
    io::{AsyncReadExt, AsyncSeekExt},
};
use tracing::{debug, warn};

use crate::{error::TailError, types::SessionId};

/// Incremental reader of an append-only, newline-delimited event stream.
///
/// The cursor is the offset of the next byte to read. Every [`Tailer::poll`]
/// reads exactly the bytes appended since the previous one, so no byte range
/// is ever delivered twice. Content after the last newline is kept until the
/// line is completed by a later write.
#[derive(Debug)]
pub struct Tailer {
    path: PathBuf,
    cursor: u64,
    pending: Vec<u8>,
    store: Option<CursorStore>,
}

impl Tailer {
    /// Opens the stream at `path`.
    ///
    /// Resumes from the checkpoint in `store` if there is one, otherwise
    /// starts at the current end of the stream so that historical events are
    /// skipped, or at 0 when the stream does not exist yet. An undecodable
    /// checkpoint counts as no checkpoint.
    pub async fn open(
        path: impl Into<PathBuf>,
        store: Option<CursorStore>,
    ) -> Result<Self, TailError> {
        let path = path.into();
        let len = stream_len(&path).await?;
        let saved = match &store {
            Some(store) => match store.load().await {
                Ok(saved) => saved,
                Err(TailError::Checkpoint(err)) => {
                    warn!(path = %path.display(), %err, "Ignoring corrupt cursor checkpoint");
                    None
                }
                Err(err) => return Err(err),
            },
            None => None,
        };
        let cursor = match (saved, len) {
            (Some(saved), Some(len)) => saved.min(len),
            (None, Some(len)) => len,
            (_, None) => 0,
        };
        debug!(path = %path.display(), cursor, resumed = saved.is_some(), "Event stream opened");
        Ok(Self {
            path,
            cursor,
            pending: Vec::new(),
            store,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset of the next byte to read.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Reads everything appended since the last poll and returns the
    /// completed lines, or `None` if the stream does not exist.
    ///
    /// A stream shorter than the cursor has been truncated or rotated and is
    /// read again from its start. Failing to save the checkpoint does not
    /// hold back the lines already read.
    pub async fn poll(&mut self) -> Result<Option<Vec<String>>, TailError> {
        let mut file = match fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let len = file.metadata().await?.len();
        if len < self.cursor {
            warn!(
                path = %self.path.display(),
                cursor = self.cursor,
                len,
                "Event stream shrank, reading it from the start"
            );
            self.cursor = 0;
            self.pending.clear();
        }
        if len == self.cursor {
            return Ok(Some(Vec::new()));
        }

        file.seek(SeekFrom::Start(self.cursor)).await?;
        let mut buf = Vec::with_capacity((len - self.cursor) as usize);
        file.take(len - self.cursor).read_to_end(&mut buf).await?;
        self.cursor += buf.len() as u64;
        self.pending.extend_from_slice(&buf);

        let lines = self.take_lines();
        if let Some(store) = &self.store
            && let Err(err) = store.save(self.cursor - self.pending.len() as u64).await
        {
            warn!(path = %self.path.display(), %err, "Cursor checkpoint not saved");
        }
        Ok(Some(lines))
    }

    fn take_lines(&mut self) -> Vec<String> {
        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        complete
            .split(|b| *b == b'\n')
            .map(|line| String::from_utf8_lossy(line).trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Returns the lazy, unbounded sequence of lines appended to the stream,
    /// polling every `interval`.
    ///
    /// Missing stream and read errors are logged and retried on the next
    /// poll, the sequence never ends on its own.
    pub fn into_lines<S, SFut>(self, interval: Duration, sleep: S) -> impl Stream<Item = String>
    where
        S: Fn(Duration) -> SFut + Copy,
        SFut: Future<Output = ()>,
    {
        stream::unfold(
            (self, VecDeque::new()),
            move |(mut tailer, mut ready)| async move {
                loop {
                    if let Some(line) = ready.pop_front() {
                        return Some((line, (tailer, ready)));
                    }
                    match tailer.poll().await {
                        Ok(Some(lines)) if !lines.is_empty() => {
                            ready.extend(lines);
                            continue;
                        }
                        Ok(Some(_)) => {}
                        Ok(None) => {
                            debug!(path = %tailer.path.display(), "Event stream does not exist yet")
                        }
                        Err(err) => {
                            warn!(path = %tailer.path.display(), %err, "Event stream poll failed")
                        }
                    }
                    sleep(interval).await;
                }
            },
        )
    }
}

async fn stream_len(path: &Path) -> Result<Option<u64>, TailError> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta.len())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[derive(Serialize, Deserialize)]
struct Checkpoint {
    cursor: u64,
}

/// Per-session cursor checkpoint, a small JSON file replaced atomically.
#[derive(Clone, Debug)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(dir: impl AsRef<Path>, session: SessionId) -> Self {
        Self {
            path: dir.as_ref().join(format!("cursor-{session}.json")),
        }
    }

    pub async fn load(&self) -> Result<Option<u64>, TailError> {
        match fs::read(&self.path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice::<Checkpoint>(&raw)?.cursor)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn save(&self, cursor: u64) -> Result<(), TailError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&Checkpoint { cursor })?).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
