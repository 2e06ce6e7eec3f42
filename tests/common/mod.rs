// Shared helpers for the HTTP integration tests.

use std::io::Write;
use tempfile::NamedTempFile;

/// Run blocking client code off the async test runtime.
pub async fn blocking<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .expect("blocking task panicked")
}

/// Byte at `offset` in files produced by [`video_file`].
pub fn byte_at(offset: usize) -> u8 {
    (offset % 251) as u8
}

/// Temporary `.mp4` file of `len` bytes with a position-dependent pattern.
pub fn video_file(len: usize) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".mp4")
        .tempfile()
        .expect("create temp video");
    let data: Vec<u8> = (0..len).map(byte_at).collect();
    file.write_all(&data).expect("write temp video");
    file.flush().expect("flush temp video");
    file
}
