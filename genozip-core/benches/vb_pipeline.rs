use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use genozip_core::datatype::Generic;
use genozip_core::{piz_from_bytes, zip_to_writer, PizOptions, ZipOptions};

fn make_input(num_lines: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    for i in 0..num_lines {
        buf.extend_from_slice(format!("chr1\t{}\tACGT\tsample{}\n", i * 100, i % 7).as_bytes());
    }
    buf
}

fn bench_zip(c: &mut Criterion) {
    let input = make_input(50_000);
    let mut group = c.benchmark_group("zip");
    group.throughput(Throughput::Bytes(input.len() as u64));
    group.bench_function("zip_to_writer", |b| {
        b.iter(|| {
            let opts = ZipOptions {
                vblock_lines: 5_000,
                threads: 4,
                ..Default::default()
            };
            zip_to_writer(&input, &Generic, &opts).unwrap()
        })
    });
    group.finish();
}

fn bench_piz(c: &mut Criterion) {
    let input = make_input(50_000);
    let opts = ZipOptions {
        vblock_lines: 5_000,
        threads: 4,
        ..Default::default()
    };
    let file_bytes = zip_to_writer(&input, &Generic, &opts).unwrap();

    let mut group = c.benchmark_group("piz");
    group.throughput(Throughput::Bytes(input.len() as u64));
    group.bench_function("piz_from_bytes", |b| {
        b.iter(|| {
            let piz_opts = PizOptions {
                threads: 4,
                ..Default::default()
            };
            piz_from_bytes(&file_bytes, &Generic, &piz_opts).unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_zip, bench_piz);
criterion_main!(benches);
