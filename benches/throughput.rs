use criterion::{black_box, BatchSize, BenchmarkId, Criterion, Throughput};
use criterion::{criterion_group, criterion_main};
use tempfile::tempdir;

use queuefile::{ByteFile, MemFile, QueueFileConfig, ReadAheadFile, StdFile, WriteBehindFile};

const SOURCE_BYTES: usize = 8 << 20;
const CHUNK: usize = 16 * 1024;

fn bench_read_ahead(c: &mut Criterion) {
    let data = vec![b'A'; SOURCE_BYTES];
    let mut group = c.benchmark_group("read_ahead");
    group.throughput(Throughput::Bytes(SOURCE_BYTES as u64));
    for &block in &[4096_usize, 64 * 1024, 1 << 20] {
        group.bench_with_input(BenchmarkId::from_parameter(block), &block, |b, &block| {
            b.iter_batched(
                || {
                    let src = MemFile::from_bytes(data.clone());
                    ReadAheadFile::new(src, 0, QueueFileConfig::blocks(8, block)).expect("open")
                },
                |mut file| {
                    let mut buf = vec![0u8; CHUNK];
                    let mut pos = 0u64;
                    loop {
                        let n = file.read_at(pos, black_box(&mut buf)).expect("read");
                        if n == 0 {
                            break;
                        }
                        pos += n as u64;
                    }
                    file.close().expect("close");
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_write_behind(c: &mut Criterion) {
    let payload = vec![b'C'; CHUNK];
    let mut group = c.benchmark_group("write_behind");
    group.throughput(Throughput::Bytes(SOURCE_BYTES as u64));
    for &block in &[4096_usize, 64 * 1024, 1 << 20] {
        group.bench_with_input(BenchmarkId::from_parameter(block), &block, |b, &block| {
            b.iter_batched(
                || {
                    let dir = tempdir().expect("tempdir");
                    let dst = StdFile::create(dir.path().join("bench_out")).expect("create");
                    let file =
                        WriteBehindFile::new(dst, QueueFileConfig::blocks(8, block)).expect("open");
                    (dir, file)
                },
                |(_dir, mut file)| {
                    let mut pos = 0u64;
                    while (pos as usize) < SOURCE_BYTES {
                        pos += file.write_all_at(pos, black_box(&payload)).expect("write") as u64;
                    }
                    file.close().expect("close");
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_read_ahead, bench_write_behind);
criterion_main!(benches);
