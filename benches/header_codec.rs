//! Benchmarks for header encoding, decoding and checksums

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ustar_rs::core::header;
use ustar_rs::Header;

fn sample_header() -> Header {
    let mut header = Header::new("some/directory/with/a/reasonably_long_file_name.txt");
    header.mode = 0o100644;
    header.uid = 1000;
    header.gid = 1000;
    header.size = 123_456;
    header.mtime = 1_700_000_000;
    header.uname = "builder".to_string();
    header.gname = "staff".to_string();
    header
}

fn benchmark_encode(c: &mut Criterion) {
    let header = sample_header();
    c.bench_function("header_encode", |b| {
        b.iter(|| black_box(black_box(&header).encode().unwrap()));
    });
}

fn benchmark_decode(c: &mut Criterion) {
    let record = sample_header().encode().unwrap();
    c.bench_function("header_decode", |b| {
        b.iter(|| black_box(Header::decode(black_box(&record)).unwrap()));
    });
}

fn benchmark_checksum(c: &mut Criterion) {
    let record = sample_header().encode().unwrap();
    c.bench_function("header_checksum_verify", |b| {
        b.iter(|| black_box(header::verify_checksum(black_box(&record)).is_ok()));
    });
}

criterion_group!(benches, benchmark_encode, benchmark_decode, benchmark_checksum);
criterion_main!(benches);
