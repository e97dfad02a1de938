//! Integration tests for the harvest, augment, retrain and verify loop.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use augur::config::AugurConfig;
use augur::corpus::TrainingCorpus;
use augur::error::Result;
use augur::ml::records::{LowConfidenceRecord, LowConfidenceStore, SqliteRecordStore};
use augur::ml::*;
use tempfile::TempDir;

fn config_in(dir: &Path) -> AugurConfig {
    let mut config = AugurConfig::default();
    config.paths.corpus = dir.join("data/intents.json");
    config.paths.model = dir.join("models/intent_model.bin");
    config.paths.vectorizer = dir.join("models/vectorizer.bin");
    config.paths.label_encoder = dir.join("models/label_encoder.bin");
    config.paths.history = dir.join("logs/retraining_history.json");
    config.paths.evaluation_report = dir.join("logs/model_evaluation_report.json");
    config.paths.record_store = dir.join("data/augur.db");
    config
}

fn write_corpus(config: &AugurConfig) {
    TrainingCorpus::from_pairs(vec![
        ("greeting", vec!["hello", "hi there", "good morning"]),
        ("farewell", vec!["bye", "goodbye", "see you later"]),
        ("fees", vec!["fee structure", "tuition fees", "fees amount"]),
    ])
    .unwrap()
    .save(&config.paths.corpus)
    .unwrap();
}

struct Fixture {
    _dir: TempDir,
    config: AugurConfig,
    store: Arc<SqliteRecordStore>,
    retrainer: ModelRetrainer,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    write_corpus(&config);
    let store = Arc::new(SqliteRecordStore::open(&config.paths.record_store).unwrap());
    let retrainer = ModelRetrainer::new(
        &config,
        ArtifactSet::new(config.artifact_paths()),
        store.clone(),
        Arc::new(ConfidenceChecker::new(config.confidence_threshold).unwrap()),
    )
    .unwrap();
    Fixture {
        _dir: dir,
        config,
        store,
        retrainer,
    }
}

#[test]
fn test_pipeline_without_records_still_retrains() -> Result<()> {
    let fx = fixture();
    assert!(!fx.config.artifact_paths().exist());

    let summary = fx.retrainer.full_pipeline()?;
    assert_eq!(summary.harvested, 0);
    assert_eq!(summary.outcome.augmented, 0);
    assert_eq!(summary.outcome.samples_count, 9);
    assert!(summary.outcome.verification.is_some());
    assert!(fx.config.artifact_paths().exist());

    let status = fx.retrainer.status()?;
    assert_eq!(status.retraining_count, 1);
    assert_eq!(status.successful_retrainings, 1);
    assert!(status.recent_events[0].success);
    assert_eq!(status.recent_events[0].samples_count, 9);

    Ok(())
}

#[test]
fn test_stored_queries_augment_the_corpus_once() -> Result<()> {
    let fx = fixture();
    for (query, intent, confidence) in [
        ("how much is tuition", "fees", 0.35),
        ("how much is tuition", "fees", 0.32),
        ("catch you later", "farewell", 0.41),
        ("hello", "greeting", 0.45),
        ("confident query", "greeting", 0.95),
    ] {
        fx.store.record(&LowConfidenceRecord::new(
            query,
            intent,
            confidence,
            BTreeMap::new(),
        ))?;
    }

    let harvest = fx.retrainer.collect_low_confidence();
    assert_eq!(harvest.total_low_confidence, 4);
    assert_eq!(harvest.queries[0].confidence, 0.32);

    let summary = fx.retrainer.full_pipeline()?;
    assert_eq!(summary.harvested, 4);
    // "hello" is already a greeting pattern; the duplicate tuition query adds once.
    assert_eq!(summary.outcome.augmented, 2);
    assert_eq!(summary.outcome.samples_count, 11);

    let corpus = TrainingCorpus::load(&fx.config.paths.corpus)?;
    let fees = corpus.patterns("fees").unwrap();
    assert_eq!(fees.iter().filter(|p| *p == "how much is tuition").count(), 1);
    assert!(corpus.patterns("farewell").unwrap().contains(&"catch you later".to_string()));

    let summary = fx.retrainer.full_pipeline()?;
    assert_eq!(summary.outcome.augmented, 0);
    assert_eq!(summary.status.retraining_count, 2);

    Ok(())
}

#[test]
fn test_empty_corpus_fails_without_success_event() -> Result<()> {
    let fx = fixture();
    fx.retrainer.full_pipeline()?;

    std::fs::write(&fx.config.paths.corpus, "[]")?;
    assert!(fx.retrainer.full_pipeline().is_err());
    assert!(fx.retrainer.retrain(false).is_err());

    let status = fx.retrainer.status()?;
    assert_eq!(status.retraining_count, 3);
    assert_eq!(status.successful_retrainings, 1);
    assert_eq!(status.failed_retrainings, 2);
    assert!(!status.recent_events[2].success);

    // The artifacts from the successful run are still intact.
    let (features, classifier) = ArtifactSet::new(fx.config.artifact_paths()).load()?;
    assert_eq!(classifier.intent_classes().len(), 3);
    assert!(features.is_fitted());

    Ok(())
}

#[test]
fn test_retrain_swaps_the_serving_model() -> Result<()> {
    let fx = fixture();
    let artifacts = ArtifactSet::new(fx.config.artifact_paths());
    let trainer = ModelTrainer::from_config(&fx.config)?;
    let predictor = Arc::new(IntentPredictor::new(artifacts, trainer.cleaner()));

    let retrainer = ModelRetrainer::new(
        &fx.config,
        ArtifactSet::new(fx.config.artifact_paths()),
        fx.store.clone(),
        Arc::new(ConfidenceChecker::default()),
    )?
    .with_predictor(predictor.clone());

    assert!(!predictor.is_loaded());
    retrainer.retrain(false)?;
    assert!(predictor.is_loaded());
    let before = predictor.current().unwrap();
    assert_eq!(predictor.predict_intent("tuition fees").intent, "fees");

    retrainer.retrain(false)?;
    let after = predictor.current().unwrap();
    assert!(!Arc::ptr_eq(&before, &after));

    Ok(())
}

#[test]
fn test_config_file_drives_the_loop() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    write_corpus(&config);

    let mut raw = serde_json::to_value(&config)?;
    raw["retrain"]["adaptive_threshold"] = serde_json::Value::Bool(true);
    raw["confidence_threshold"] = serde_json::json!(0.65);
    let config_path = dir.path().join("augur.json");
    std::fs::write(&config_path, serde_json::to_string_pretty(&raw)?)?;

    let config = AugurConfig::from_file(&config_path)?;
    assert!(config.retrain.adaptive_threshold);
    let checker = Arc::new(ConfidenceChecker::new(config.confidence_threshold)?);
    assert_eq!(checker.threshold(), 0.65);

    let store: Arc<dyn LowConfidenceStore> =
        Arc::new(SqliteRecordStore::open(&config.paths.record_store)?);
    let retrainer = ModelRetrainer::new(
        &config,
        ArtifactSet::new(config.artifact_paths()),
        store,
        checker.clone(),
    )?;

    let outcome = retrainer.retrain(true)?;
    let accuracy = outcome.verification.unwrap().new_model_accuracy;
    let expected = if accuracy < 0.6 {
        0.7
    } else if accuracy < 0.75 {
        0.6
    } else if accuracy > 0.95 {
        0.4
    } else {
        0.5
    };
    assert_eq!(checker.threshold(), expected);
    assert_eq!(outcome.threshold, expected);

    Ok(())
}
