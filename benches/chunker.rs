//! Benchmarks for text chunking and extraction of plain text uploads.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use docqa::services::{ExtractorRegistry, TextChunker};
use std::io::Write;
use tempfile::tempdir;

const SAMPLE_PARAGRAPH: &str = "Refund requests must be submitted within thirty days of purchase. \
Items returned after that window are eligible for store credit only. Customers outside the \
European Union pay return shipping unless the item arrived damaged. Größe und Farbe können \
nach Absprache getauscht werden.\n\n";

fn generate_content(size_kb: usize) -> String {
    let repetitions = (size_kb * 1024) / SAMPLE_PARAGRAPH.len() + 1;
    SAMPLE_PARAGRAPH.repeat(repetitions)
}

fn chunking_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunking");

    for size_kb in [10, 100, 1000] {
        let content = generate_content(size_kb);
        group.throughput(Throughput::Bytes(content.len() as u64));

        for (size, overlap) in [(1000, 100), (500, 50)] {
            let chunker = TextChunker::new(size, overlap).unwrap();
            group.bench_with_input(
                BenchmarkId::new(format!("{}_{}", size, overlap), size_kb),
                &content,
                |b, content| b.iter(|| chunker.split(black_box(content))),
            );
        }
    }

    group.finish();
}

fn extraction_benchmark(c: &mut Criterion) {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("policy.txt");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(generate_content(100).as_bytes()).unwrap();

    let registry = ExtractorRegistry::with_defaults();

    let mut group = c.benchmark_group("extraction");
    group.bench_function("txt_100kb", |b| {
        b.iter(|| registry.extract(black_box(&path), "txt").unwrap())
    });
    group.finish();
}

criterion_group!(benches, chunking_benchmark, extraction_benchmark);
criterion_main!(benches);
