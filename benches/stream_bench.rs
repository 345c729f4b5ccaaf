use criterion::{black_box, criterion_group, criterion_main, Criterion};
use bundlefs::block::{BlockInfoTable, CompressedBlockSpan};
use bundlefs::byte_source::{ByteSource, SliceSource};
use bundlefs::codec::{self, CompressionType};
use bundlefs::virtual_stream::VirtualBlockStream;
use std::io::SeekFrom;
use std::sync::Arc;

const BLOCK: usize = 128 * 1024;

fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 61) as u8 ^ (i / 4096) as u8).collect()
}

fn lz4_stream(blocks: usize) -> VirtualBlockStream<SliceSource> {
    let mut physical = Vec::new();
    let mut spans = Vec::new();
    for i in 0..blocks {
        let plain = sample(BLOCK + i);
        let stored = lz4_flex::block::compress(&plain);
        spans.push(CompressedBlockSpan {
            uncompressed_size: plain.len() as u32,
            compressed_size:   stored.len() as u32,
            flags:             CompressionType::Lz4Hc.id() as u16,
        });
        physical.extend_from_slice(&stored);
    }
    VirtualBlockStream::new(SliceSource::new(physical), 0, Arc::new(BlockInfoTable::new(spans)))
}

fn bench_decode(c: &mut Criterion) {
    let plain = sample(BLOCK);
    let packed = lz4_flex::block::compress(&plain);
    let id = CompressionType::Lz4.id();

    c.bench_function("lz4_decode_128k", |b| {
        b.iter(|| codec::decode(id, black_box(&packed), packed.len(), plain.len()).unwrap())
    });
}

fn bench_sequential_read(c: &mut Criterion) {
    c.bench_function("stream_sequential_8x128k", |b| {
        b.iter(|| {
            let mut s = lz4_stream(8);
            while !s.read_bytes(black_box(4096)).unwrap().is_empty() {}
        })
    });
}

fn bench_random_seek(c: &mut Criterion) {
    let mut s = lz4_stream(8);
    let len = s.len();
    c.bench_function("stream_seek_scattered", |b| {
        b.iter(|| {
            for k in 0..64u64 {
                s.seek(SeekFrom::Start((k * 7919 * 131) % len)).unwrap();
                black_box(s.read_u32().unwrap());
            }
        })
    });
}

criterion_group!(benches, bench_decode, bench_sequential_read, bench_random_seek);
criterion_main!(benches);
