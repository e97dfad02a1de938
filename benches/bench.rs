//! Criterion benchmarks for Augur.
//!
//! Covers the hot paths of the learning loop:
//! - Query analysis and TF-IDF vectorization
//! - Naive Bayes training and prediction
//! - Batched serving through the predictor

use std::hint::black_box;

use augur::analysis::{Analyzer, AnalyzerCleaner, EnglishAnalyzer, TextCleaner};
use augur::config::{AugurConfig, FeatureConfig};
use augur::corpus::TrainingCorpus;
use augur::ml::{ArtifactPaths, ArtifactSet, FeatureEngineer, IntentPredictor, ModelTrainer};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};

const TOPICS: &[(&str, &[&str])] = &[
    ("greeting", &["hello", "hi", "morning", "hey", "welcome"]),
    ("farewell", &["bye", "goodbye", "later", "farewell", "night"]),
    ("fees", &["fee", "tuition", "cost", "pay", "amount"]),
    ("admission", &["admission", "apply", "application", "enroll", "form"]),
    ("hostel", &["hostel", "room", "dorm", "accommodation", "mess"]),
    ("exam", &["exam", "test", "schedule", "result", "grade"]),
];

const FILLER: &[&str] = &["please", "tell", "about", "college", "today", "details", "need"];

/// Generate a synthetic corpus with `per_intent` patterns per intent.
fn generate_corpus(per_intent: usize) -> TrainingCorpus {
    let pairs = TOPICS.iter().map(|(intent, words)| {
        let patterns = (0..per_intent)
            .map(|i| {
                format!(
                    "{} {} {} {}",
                    FILLER[i % FILLER.len()],
                    words[i % words.len()],
                    words[(i / words.len() + 1) % words.len()],
                    FILLER[(i * 3 + 1) % FILLER.len()]
                )
            })
            .collect::<Vec<String>>();
        (*intent, patterns)
    });
    TrainingCorpus::from_pairs(pairs).unwrap()
}

fn generate_queries(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let (_, words) = TOPICS[i % TOPICS.len()];
            format!(
                "{} {} {}",
                FILLER[i % FILLER.len()],
                words[i % words.len()],
                FILLER[(i + 2) % FILLER.len()]
            )
        })
        .collect()
}

/// Benchmark analysis and vectorization.
fn bench_vectorization(c: &mut Criterion) {
    let mut group = c.benchmark_group("vectorization");

    let analyzer = EnglishAnalyzer::new().unwrap();
    let corpus = generate_corpus(50);
    let texts: Vec<String> = corpus.examples().into_iter().map(|e| e.text).collect();
    let queries = generate_queries(100);

    group.bench_function("analyze_query", |b| {
        b.iter(|| black_box(analyzer.terms(black_box(&queries[0]))))
    });

    group.throughput(Throughput::Elements(texts.len() as u64));
    group.bench_function("fit_vocabulary", |b| {
        b.iter(|| {
            let mut features = FeatureEngineer::new(FeatureConfig::default()).unwrap();
            features.fit(black_box(&texts)).unwrap();
            black_box(features.vector_dimensions())
        })
    });

    let mut features = FeatureEngineer::new(FeatureConfig::default()).unwrap();
    features.fit(&texts).unwrap();
    group.throughput(Throughput::Elements(queries.len() as u64));
    group.bench_function("transform_batch", |b| {
        b.iter(|| black_box(features.transform(black_box(&queries)).unwrap()))
    });

    group.finish();
}

/// Benchmark training and prediction.
fn bench_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification");
    group.sample_size(20);

    let config = AugurConfig::default();
    let trainer = ModelTrainer::from_config(&config).unwrap();
    let corpus = generate_corpus(50);

    group.throughput(Throughput::Elements(corpus.pattern_count() as u64));
    group.bench_function("train_from_scratch", |b| {
        b.iter(|| black_box(trainer.train(black_box(&corpus)).unwrap()))
    });

    let model = trainer.train(&corpus).unwrap();
    let cleaner = AnalyzerCleaner::simple().unwrap();
    let queries: Vec<String> = generate_queries(100)
        .iter()
        .map(|q| cleaner.clean(q))
        .collect();
    let vectors = model.features.transform(&queries).unwrap();

    group.throughput(Throughput::Elements(vectors.len() as u64));
    group.bench_function("predict_proba_batch", |b| {
        b.iter(|| black_box(model.classifier.predict_proba(black_box(&vectors)).unwrap()))
    });

    group.finish();
}

/// Benchmark serving through the predictor.
fn bench_serving(c: &mut Criterion) {
    let mut group = c.benchmark_group("serving");

    let dir = tempfile::TempDir::new().unwrap();
    let artifacts = ArtifactSet::new(ArtifactPaths::in_dir(dir.path()));
    let trainer = ModelTrainer::from_config(&AugurConfig::default()).unwrap();
    trainer
        .train(&generate_corpus(50))
        .unwrap()
        .publish(&artifacts)
        .unwrap();

    let predictor = IntentPredictor::new(artifacts, trainer.cleaner());
    predictor.load().unwrap();
    let queries = generate_queries(1000);

    group.bench_function("predict_single", |b| {
        b.iter(|| black_box(predictor.predict_intent(black_box(&queries[0]))))
    });

    group.throughput(Throughput::Elements(queries.len() as u64));
    group.bench_function("predict_batch_parallel", |b| {
        b.iter(|| black_box(predictor.predict_batch(black_box(&queries))))
    });

    group.finish();
}

criterion_group!(benches, bench_vectorization, bench_classification, bench_serving);

criterion_main!(benches);
