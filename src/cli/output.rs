//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{AugurArgs, OutputFormat};
use crate::error::Result;
use crate::ml::evaluator::EvaluationReport;
use crate::ml::history::RetrainingStatus;
use crate::ml::predictor::{IntentDetails, Prediction, RoutedPrediction};
use crate::ml::retrainer::{PipelineSummary, RetrainOutcome};

/// Result structure for training.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainingResult {
    pub samples_count: usize,
    pub intents: usize,
    pub vocabulary_size: usize,
    pub duration_ms: u64,
}

/// One classified query.
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResult {
    pub query: String,
    #[serde(flatten)]
    pub prediction: Prediction,
    pub confident: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<IntentDetails>,
}

/// Result structure for evaluation.
#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub report_path: String,
    pub mode: String,
    pub report: EvaluationReport,
    #[serde(skip)]
    pub classification_report: Option<String>,
}

/// Output a result in the requested format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &AugurArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output predictions, one per line in human mode.
pub fn output_predictions(results: &[PredictionResult], args: &AugurArgs) -> Result<()> {
    if args.output_format == OutputFormat::Json {
        return output_json(&results, args);
    }
    for result in results {
        let marker = if result.confident { "" } else { " (low confidence)" };
        println!(
            "{} => {} [{:.4}]{marker}",
            result.query, result.prediction.intent, result.prediction.confidence
        );
        if let Some(details) = &result.details {
            println!("  cleaned: {}", details.cleaned_query);
            for (intent, score) in &details.all_scores {
                println!("  {intent:<20} {score:.4}");
            }
        }
    }
    Ok(())
}

/// Output an evaluation, including the text table in human mode.
pub fn output_evaluation(result: &EvaluationResult, args: &AugurArgs) -> Result<()> {
    if args.output_format == OutputFormat::Json {
        return output_json(result, args);
    }
    let overall = &result.report.overall_metrics;
    println!("Evaluation ({}) on {} samples", result.mode, overall.test_samples);
    println!("  accuracy:  {:.4}", overall.accuracy);
    println!("  precision: {:.4}", overall.precision);
    println!("  recall:    {:.4}", overall.recall);
    println!("  f1_score:  {:.4}", overall.f1_score);
    if let Some(text) = &result.classification_report {
        println!();
        print!("{text}");
    }
    let dist = &result.report.confidence_distribution;
    println!();
    println!(
        "Confidence: mean {:.4}, median {:.4}, high {} / medium {} / low {}",
        dist.mean_confidence,
        dist.median_confidence,
        dist.high_confidence_count,
        dist.medium_confidence_count,
        dist.low_confidence_count
    );
    println!("Report written to {}", result.report_path);
    Ok(())
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &AugurArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;

    match result {
        _ if std::any::type_name::<T>().contains("RetrainingStatus") => {
            output_status_human(&value)
        }
        _ => output_generic_human(&value, 0),
    }
}

/// Output the retraining status in human format.
fn output_status_human(value: &serde_json::Value) -> Result<()> {
    let status: RetrainingStatus = serde_json::from_value(value.clone())?;
    println!("Retraining runs: {}", status.retraining_count);
    println!("  successful: {}", status.successful_retrainings);
    println!("  failed:     {}", status.failed_retrainings);
    match status.last_retraining {
        Some(ts) => println!("  last:       {}", ts.to_rfc3339()),
        None => println!("  last:       never"),
    }
    if !status.recent_events.is_empty() {
        println!();
        println!("Recent events:");
        for event in &status.recent_events {
            let outcome = if event.success { "ok" } else { "FAILED" };
            println!(
                "  {} {outcome:<6} samples={}",
                event.timestamp.to_rfc3339(),
                event.samples_count
            );
        }
    }
    Ok(())
}

/// Generic human-readable output, nesting objects by indentation.
fn output_generic_human(value: &serde_json::Value, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in obj {
                if val.is_object() {
                    println!("{indent}{key}:");
                    output_generic_human(val, depth + 1)?;
                } else {
                    println!("{indent}{key}: {}", format_value(val));
                }
            }
        }
        _ => println!("{indent}{}", format_value(value)),
    }
    Ok(())
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &AugurArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Format a JSON value for display.
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{f:.4}"),
            _ => n.to_string(),
        },
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Array(arr) => {
            let formatted_values = arr.iter().map(format_value).collect::<Vec<_>>().join(", ");
            format!("[{formatted_values}]")
        }
        serde_json::Value::Object(_) => "[object]".to_string(),
        serde_json::Value::Null => "null".to_string(),
    }
}

/// Human summary line for a retraining pass.
pub fn describe_outcome(outcome: &RetrainOutcome) -> String {
    match &outcome.verification {
        Some(v) => format!(
            "Retrained on {} samples ({} augmented), accuracy {:.4}, threshold {:.2}",
            outcome.samples_count, outcome.augmented, v.new_model_accuracy, outcome.threshold
        ),
        None => format!(
            "Retrained on {} samples ({} augmented), verification skipped, threshold {:.2}",
            outcome.samples_count, outcome.augmented, outcome.threshold
        ),
    }
}

/// Human summary line for a pipeline run.
pub fn describe_pipeline(summary: &PipelineSummary) -> String {
    format!(
        "Harvested {} low-confidence queries. {}",
        summary.harvested,
        describe_outcome(&summary.outcome)
    )
}

/// Human line for a routed query.
pub fn describe_routed(routed: &RoutedPrediction) -> String {
    format!(
        "{} => {} [{:.4}, {}] {}{}",
        routed.query,
        routed.intent,
        routed.confidence,
        routed.level,
        routed.recommendation.as_str(),
        if routed.recorded { " (recorded)" } else { "" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::retrainer::VerificationReport;
    use chrono::Utc;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&serde_json::json!(0.5)), "0.5000");
        assert_eq!(format_value(&serde_json::json!(3)), "3");
        assert_eq!(format_value(&serde_json::json!(["a", 1])), "[a, 1]");
        assert_eq!(format_value(&serde_json::Value::Null), "null");
    }

    #[test]
    fn test_describe_outcome() {
        let mut outcome = RetrainOutcome {
            augmented: 2,
            samples_count: 12,
            verification: None,
            threshold: 0.5,
        };
        assert!(describe_outcome(&outcome).contains("verification skipped"));

        outcome.verification = Some(VerificationReport {
            new_model_accuracy: 0.9,
            timestamp: Utc::now(),
        });
        let line = describe_outcome(&outcome);
        assert!(line.contains("12 samples"));
        assert!(line.contains("accuracy 0.9000"));
    }

    #[test]
    fn test_prediction_result_flattens() {
        let result = PredictionResult {
            query: "hi".to_string(),
            prediction: Prediction {
                intent: "greeting".to_string(),
                confidence: 0.75,
            },
            confident: true,
            details: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["intent"], "greeting");
        assert_eq!(value["confidence"], 0.75);
        assert!(value.get("details").is_none());
    }
}
