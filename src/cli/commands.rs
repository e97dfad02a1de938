//! Command implementations for the Augur CLI.

use std::sync::Arc;
use std::time::Instant;

use crate::analysis::cleaner::TextCleaner;
use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::AugurConfig;
use crate::corpus::TrainingCorpus;
use crate::error::{AugurError, Result};
use crate::ml::artifacts::ArtifactSet;
use crate::ml::confidence::ConfidenceChecker;
use crate::ml::evaluator::ModelEvaluator;
use crate::ml::predictor::IntentPredictor;
use crate::ml::records::{LowConfidenceStore, SqliteRecordStore};
use crate::ml::retrainer::ModelRetrainer;
use crate::ml::trainer::ModelTrainer;

/// Everything a command needs, built once from the configuration.
struct Context {
    config: AugurConfig,
    artifacts: ArtifactSet,
    trainer: ModelTrainer,
    checker: Arc<ConfidenceChecker>,
}

impl Context {
    fn new(args: &AugurArgs) -> Result<Self> {
        let config = match &args.config {
            Some(path) => {
                log::debug!("Loading configuration from {}", path.display());
                AugurConfig::from_file(path)?
            }
            None => {
                let config = AugurConfig::default();
                config.validate()?;
                config
            }
        };
        Ok(Self {
            artifacts: ArtifactSet::new(config.artifact_paths()),
            trainer: ModelTrainer::from_config(&config)?,
            checker: Arc::new(ConfidenceChecker::new(config.confidence_threshold)?),
            config,
        })
    }

    fn cleaner(&self) -> Arc<dyn TextCleaner> {
        self.trainer.cleaner()
    }

    fn predictor(&self) -> Result<IntentPredictor> {
        let predictor = IntentPredictor::new(self.artifacts.clone(), self.cleaner());
        predictor.load()?;
        Ok(predictor)
    }

    fn store(&self) -> Result<Arc<SqliteRecordStore>> {
        Ok(Arc::new(SqliteRecordStore::open(
            &self.config.paths.record_store,
        )?))
    }

    fn retrainer(&self) -> Result<ModelRetrainer> {
        let store: Arc<dyn LowConfidenceStore> = self.store()?;
        ModelRetrainer::new(
            &self.config,
            self.artifacts.clone(),
            store,
            Arc::clone(&self.checker),
        )
    }
}

/// Execute a CLI command.
pub fn execute_command(args: AugurArgs) -> Result<()> {
    let context = Context::new(&args)?;
    match &args.command {
        Command::Train => train(&context, &args),
        Command::Predict(predict_args) => predict(&context, predict_args, &args),
        Command::Evaluate(evaluate_args) => evaluate(&context, evaluate_args, &args),
        Command::Retrain(retrain_args) => retrain(&context, retrain_args, &args),
        Command::Pipeline => pipeline(&context, &args),
        Command::Status => status(&context, &args),
        Command::Record(record_args) => record(&context, record_args, &args),
    }
}

/// Train from the corpus and publish the artifacts.
fn train(context: &Context, cli_args: &AugurArgs) -> Result<()> {
    let start = Instant::now();
    let corpus = TrainingCorpus::load(&context.config.paths.corpus)?;
    let model = context.trainer.train(&corpus)?;
    model.publish(&context.artifacts)?;

    output_result(
        "Model trained successfully",
        &TrainingResult {
            samples_count: model.samples_count,
            intents: model.classifier.intent_classes().len(),
            vocabulary_size: model.features.vector_dimensions(),
            duration_ms: start.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

/// Classify the given queries.
fn predict(context: &Context, args: &PredictArgs, cli_args: &AugurArgs) -> Result<()> {
    if let Some(threshold) = args.threshold
        && !context.checker.set_threshold(threshold)
    {
        return Err(AugurError::invalid_config(format!(
            "threshold must be within [0, 1], got {threshold}"
        )));
    }

    let predictor = context.predictor()?;
    let predictions = predictor.predict_batch(&args.queries);

    let mut results = Vec::with_capacity(predictions.len());
    for (query, prediction) in args.queries.iter().zip(predictions) {
        let details = if args.details {
            Some(predictor.intent_details(query)?)
        } else {
            None
        };
        results.push(PredictionResult {
            query: query.clone(),
            confident: context.checker.is_confident(prediction.confidence),
            prediction,
            details,
        });
    }

    output_predictions(&results, cli_args)
}

/// Evaluate and write the report.
fn evaluate(context: &Context, args: &EvaluateArgs, cli_args: &AugurArgs) -> Result<()> {
    let corpus = TrainingCorpus::load(&context.config.paths.corpus)?;
    let evaluator = ModelEvaluator::new(context.cleaner());

    let (mode, report, classification_report) = match args.holdout {
        Some(ratio) => {
            let report =
                evaluator.evaluate_holdout(&context.trainer, &corpus, ratio, args.seed)?;
            (format!("hold-out {ratio}"), report, None)
        }
        None => {
            let (report, text) = evaluator.evaluate_full_detailed(&context.artifacts, &corpus)?;
            ("full corpus".to_string(), report, Some(text))
        }
    };

    let report_path = args
        .report
        .clone()
        .unwrap_or_else(|| context.config.paths.evaluation_report.clone());
    report.save(&report_path)?;

    output_evaluation(
        &EvaluationResult {
            report_path: report_path.display().to_string(),
            mode,
            report,
            classification_report,
        },
        cli_args,
    )
}

/// One retraining pass.
fn retrain(context: &Context, args: &RetrainArgs, cli_args: &AugurArgs) -> Result<()> {
    let outcome = context.retrainer()?.retrain(!args.no_augment)?;
    output_result(&describe_outcome(&outcome), &outcome, cli_args)
}

/// Harvest, retrain and report.
fn pipeline(context: &Context, cli_args: &AugurArgs) -> Result<()> {
    let summary = context.retrainer()?.full_pipeline()?;
    output_result(&describe_pipeline(&summary), &summary, cli_args)
}

/// Retraining history summary.
fn status(context: &Context, cli_args: &AugurArgs) -> Result<()> {
    let status = context.retrainer()?.status()?;
    output_result("Retraining status", &status, cli_args)
}

/// Route a query, storing it when below the threshold.
fn record(context: &Context, args: &RecordArgs, cli_args: &AugurArgs) -> Result<()> {
    let predictor = context.predictor()?;
    let store = context.store()?;
    let routed = predictor.route(&args.query, &context.checker, &*store);
    output_result(&describe_routed(&routed), &routed, cli_args)
}
