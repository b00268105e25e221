//! Buffered stream integration tests.
//!
//! Tests verify:
//! - Buffered reads over a real file equal the file contents
//! - The opportunistic read-ahead window sizes underlying requests
//! - Write/read coherence through a shared stream handle
//! - Sharing a buffered stream across threads

use std::sync::atomic::Ordering;
use std::sync::Arc;

use raster_blocks::{BufferedStream, FileStream, MemoryStream, RandomAccessStream, StreamConfig};

use super::test_utils::{init_tracing, pattern, TrackingStream};

#[test]
fn test_buffered_file_reads_match_contents() {
    init_tracing();
    let path = std::env::temp_dir().join("raster-blocks-buffered-file-test.bin");
    let content = pattern(10_000, 13);
    {
        let mut file = FileStream::create(&path).unwrap();
        file.write(&content).unwrap();
    }

    let file = FileStream::open(&path, false).unwrap();
    let stream = BufferedStream::new(file, false);

    let mut out = Vec::new();
    let mut chunk = 17;
    loop {
        let mut buf = vec![0u8; chunk];
        let n = stream.read(&mut buf).unwrap();
        out.extend_from_slice(&buf[..n]);
        if n < buf.len() {
            break;
        }
        chunk = chunk % 900 + 61;
    }
    assert_eq!(out, content);
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_opportunistic_window_sizes_requests() {
    init_tracing();
    let tracking = TrackingStream::new(pattern(256 * 1024, 3));
    let sizes = tracking.request_sizes();
    let stream = BufferedStream::with_config(
        tracking,
        false,
        StreamConfig {
            buffer_limit: 64 * 1024,
            ratio_alloc: 50,
            ratio_delete: 10,
        },
    );

    let mut buf = vec![0u8; 4096];
    stream.read(&mut buf).unwrap();

    // One request, sized to 50% of the free 64KB budget
    let sizes = sizes.lock().unwrap();
    assert_eq!(sizes.as_slice(), &[32 * 1024]);
}

#[test]
fn test_write_then_read_coherent_through_shared_handle() {
    init_tracing();
    let tracking = TrackingStream::new(pattern(16 * 1024, 29));
    let writes = tracking.write_counter();
    let mut stream = Arc::new(BufferedStream::new(tracking, true));

    // Warm the buffers
    let mut buf = vec![0u8; 2048];
    stream.read(&mut buf).unwrap();

    // Another handle overwrites part of the buffered range
    let mut writer = Arc::clone(&stream);
    writer.seek_to(1000).unwrap();
    writer.write(&[0x5A; 100]).unwrap();

    stream.seek_to(1000).unwrap();
    let mut after = vec![0u8; 100];
    stream.read(&mut after).unwrap();
    assert!(after.iter().all(|b| *b == 0x5A));
    assert_eq!(writes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_shared_stream_across_threads() {
    init_tracing();
    let content = pattern(8192, 101);
    let tracking = TrackingStream::new(content.clone());
    let mut stream = Arc::new(BufferedStream::new(tracking, false));

    // A worker thread reads the first half through the shared handle
    let mut worker = Arc::clone(&stream);
    let first_half = std::thread::spawn(move || {
        worker.seek_to(0).unwrap();
        let mut buf = vec![0u8; 4096];
        let n = worker.read(&mut buf).unwrap();
        buf.truncate(n);
        buf
    })
    .join()
    .unwrap();
    assert_eq!(first_half, &content[..4096]);

    // The main thread continues with the second half
    stream.seek_to(4096).unwrap();
    let mut second_half = vec![0u8; 4096];
    let n = stream.read(&mut second_half).unwrap();
    assert_eq!(n, 4096);
    assert_eq!(second_half, &content[4096..]);
}

#[test]
fn test_clean_buffers_forces_reload() {
    init_tracing();
    let tracking = TrackingStream::new(pattern(8192, 71));
    let reads = tracking.read_counter();
    let stream = BufferedStream::new(tracking, false);

    let mut buf = vec![0u8; 1024];
    stream.read(&mut buf).unwrap();
    stream.seek_to(0).unwrap();
    stream.read(&mut buf).unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), 1);

    stream.clean_buffers();
    stream.seek_to(0).unwrap();
    stream.read(&mut buf).unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), 2);
}

#[test]
fn test_buffered_over_memory_stream_write_extends() {
    init_tracing();
    let stream = BufferedStream::new(MemoryStream::new("mem://extend"), true);

    stream.seek_to(100).unwrap();
    stream.write(&[1, 2, 3]).unwrap();
    assert_eq!(stream.size(), 103);

    stream.seek_to(0).unwrap();
    let mut head = vec![0xFFu8; 4];
    stream.read(&mut head).unwrap();
    assert_eq!(head, [0, 0, 0, 0]);

    stream.seek_to(100).unwrap();
    let mut tail = vec![0u8; 3];
    stream.read(&mut tail).unwrap();
    assert_eq!(tail, [1, 2, 3]);
}
