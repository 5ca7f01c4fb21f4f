use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use squashpack_core::{
    BlockProcessor, FileBlockWriter, FragTable, Lz4Compressor, ProcessorConfig,
};

fn build_fixture(bytes: usize) -> Vec<u8> {
    let line = b"block processor throughput fixture line\n";
    let mut data = Vec::with_capacity(bytes);
    while data.len() < bytes {
        let remaining = bytes - data.len();
        let take = remaining.min(line.len());
        data.extend_from_slice(&line[..take]);
    }
    data
}

fn archive_fixture(data: &[u8], num_workers: usize) {
    let config = ProcessorConfig {
        block_size: 128 * 1024,
        num_workers,
        max_backlog: 32,
    };
    let writer =
        FileBlockWriter::new(Cursor::new(Vec::new()), 0).expect("writer over cursor");
    let mut proc = BlockProcessor::new(
        config,
        Box::new(Lz4Compressor::new()),
        writer,
        FragTable::new(),
    )
    .expect("processor construction");

    proc.begin_file(0).expect("begin_file");
    proc.append(data).expect("append");
    proc.end_file().expect("end_file");
    proc.finish().expect("finish");
}

fn bench_block_processor(c: &mut Criterion) {
    let data = build_fixture(8 * 1024 * 1024);

    let mut group = c.benchmark_group("block_processor");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for workers in [1usize, 2, 4] {
        group.bench_function(format!("archive_8mb_workers_{workers}"), |b| {
            b.iter(|| archive_fixture(black_box(&data), workers))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_block_processor);
criterion_main!(benches);
