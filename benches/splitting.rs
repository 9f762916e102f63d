use criterion::{Criterion, criterion_group, criterion_main};
use rag_chatbot::ingestion::loader::PageDocument;
use rag_chatbot::ingestion::splitter::{ChunkingConfig, TokenTextSplitter};
use std::hint::black_box;

fn sample_pages() -> Vec<PageDocument> {
    let paragraph = "Retrieval-augmented generation pairs a language model with a document \
                     index. Each question is embedded, the nearest passages are fetched, and \
                     the model answers from them. ";
    (0..20)
        .map(|page| PageDocument {
            text: paragraph.repeat(40),
            source: "bench.pdf".to_string(),
            page,
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let pages = sample_pages();
    let splitter =
        TokenTextSplitter::from_config(&ChunkingConfig::default()).expect("default config is valid");

    c.bench_function("split_documents", |b| {
        b.iter(|| splitter.split_documents(black_box(&pages)))
    });
    c.bench_function("split_text", |b| {
        b.iter(|| splitter.split_text(black_box(&pages[0].text)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
