use std::os::unix::fs::FileExt;
use std::path::Path;

use bytes::Bytes;
use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Buffer size for positional reads off the log file.
const READ_BUF_SIZE: usize = 16 * 1024;

/// Capacity of the chunk channel handed to the consumer.
const CHANNEL_CAPACITY: usize = 16;

/// Follow `path` like `tail -f`, emitting raw chunks as bytes are appended.
///
/// The stream starts at offset zero, so content written before the call is
/// delivered too. Chunk boundaries are arbitrary; order and completeness are
/// guaranteed. After `cancel` fires the file is drained to EOF one final
/// time and the channel closes. Fails if the file cannot be opened or
/// watched.
pub fn tail_file(path: &Path, cancel: CancellationToken) -> Result<mpsc::Receiver<Bytes>> {
    let file = std::fs::File::open(path)?;

    // Bridge watcher callbacks into the async loop. Bursts coalesce on the
    // capacity-1 channel; every wakeup reads to EOF regardless. Watcher
    // errors are absorbed, the tail keeps going.
    let (event_tx, mut event_rx) = mpsc::channel::<()>(1);
    let mut watcher =
        notify::recommended_watcher(move |result: notify::Result<Event>| match result {
            Ok(event) => {
                if event.kind.is_modify() {
                    let _ = event_tx.try_send(());
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "file watcher error");
            }
        })?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;

    let (chunk_tx, chunk_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let path = path.to_path_buf();
    tokio::spawn(async move {
        // The watcher must stay registered for as long as we tail.
        let _watcher = watcher;
        let mut offset = 0u64;

        // Deliver content written before the watch was in place.
        offset = match send_until_eof(&file, offset, &chunk_tx).await {
            Some(offset) => offset,
            None => return,
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = event_rx.recv() => {
                    offset = match send_until_eof(&file, offset, &chunk_tx).await {
                        Some(offset) => offset,
                        None => return,
                    };
                }
            }
        }

        // Final drain to EOF after cancel, then the channel closes.
        if send_until_eof(&file, offset, &chunk_tx).await.is_none() {
            tracing::debug!(path = %path.display(), "log tail ended early");
        }
    });

    Ok(chunk_rx)
}

/// Read from `offset` to EOF, forwarding each non-empty chunk. Returns the
/// advanced offset, or `None` if the consumer went away or the file could
/// not be read.
async fn send_until_eof(
    file: &std::fs::File,
    mut offset: u64,
    chunks: &mpsc::Sender<Bytes>,
) -> Option<u64> {
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let read = match file.read_at(&mut buf, offset) {
            Ok(0) => return Some(offset),
            Ok(read) => read,
            Err(error) => {
                tracing::error!(error = %error, "unable to read log file");
                return None;
            }
        };

        offset += read as u64;
        if chunks
            .send(Bytes::copy_from_slice(&buf[..read]))
            .await
            .is_err()
        {
            return None;
        }
    }
}
