//! Prediction command

use anyhow::{bail, Context, Result};
use longevity_core::manager::ModelManager;
use longevity_core::models::{Impact, PredictionReport, PredictionResult};
use longevity_core::predictor::{PredictionConfig, PredictionService};
use longevity_core::sources::SourceConfig;
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;

use crate::config::Settings;
use crate::output::{
    color_category, color_score, format_value, print_error, print_json, print_success,
    print_table, print_warning, OutputFormat,
};

/// Row for the key metrics table
#[derive(Tabled, serde::Serialize)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Row for the contributing factors table
#[derive(Tabled, serde::Serialize)]
struct FactorRow {
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Importance")]
    importance: String,
    #[tabled(rename = "Impact")]
    impact: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Row for the recommendations table
#[derive(Tabled, serde::Serialize)]
struct RecommendationRow {
    #[tabled(rename = "Area")]
    area: String,
    #[tabled(rename = "Issue")]
    issue: String,
    #[tabled(rename = "Recommendation")]
    recommendation: String,
}

/// Run one prediction against the live store catalogs
pub async fn run_prediction(
    settings: &Settings,
    app_name: &str,
    model: Option<&str>,
    compare_competitors: bool,
    timeout: Duration,
) -> Result<()> {
    let manager = Arc::new(ModelManager::new(settings.manager_config()));
    if manager.discover().is_empty() {
        print_warning(&format!(
            "No models found in {}",
            settings.model_dir.display()
        ));
    }

    let service = PredictionService::with_store_sources(
        manager,
        &SourceConfig::default(),
        PredictionConfig {
            fetch_timeout: timeout,
            node_name: "cli".to_string(),
        },
    )
    .context("Failed to build catalog clients")?;

    let result = service.predict(app_name, compare_competitors, model).await;

    if matches!(settings.format, OutputFormat::Json) {
        print_json(&result);
        if result.error().is_some() {
            std::process::exit(1);
        }
        return Ok(());
    }

    match result {
        PredictionResult::Success(report) => {
            print_report(&report);
            Ok(())
        }
        PredictionResult::Failure { app_name, error } => {
            print_error(&error);
            bail!("Prediction failed for '{}'", app_name)
        }
    }
}

fn print_report(report: &PredictionReport) {
    let interpretation = &report.longevity_interpretation;
    print_success(&format!(
        "{} ({}) - {} longevity, score {}",
        report.app_name,
        report.platform,
        color_category(&interpretation.category),
        color_score(report.predicted_longevity),
    ));
    println!("  {}", interpretation.description);
    println!(
        "  Expected lifespan: {}, success probability: {}",
        interpretation.expected_lifespan, interpretation.success_probability
    );
    println!(
        "  Model: {}, analyzed {}",
        report.model_used, report.date_analyzed
    );
    println!();

    let metrics = &report.key_metrics;
    let rows = vec![
        metric_row("Rating", &metrics.rating),
        metric_row("Downloads", &metrics.downloads),
        metric_row("Price", &metrics.price),
        metric_row("Size (MB)", &metrics.size_mb),
        metric_row("Days since update", &metrics.days_since_last_update),
        metric_row("Days since release", &metrics.days_since_release),
        metric_row("Positive sentiment", &metrics.positive_sentiment_ratio),
        metric_row("In-app purchases", &metrics.in_app_purchases),
        metric_row("Total ratings", &metrics.total_ratings),
    ];
    print_table(&rows, OutputFormat::Table);

    if let Some(factors) = &report.contributing_factors {
        let rows: Vec<FactorRow> = factors
            .iter()
            .map(|f| FactorRow {
                feature: f.feature.clone(),
                importance: format!("{:.3}", f.importance),
                impact: match f.impact {
                    Impact::Positive => "positive".to_string(),
                    Impact::Negative => "negative".to_string(),
                },
                description: f.description.clone(),
            })
            .collect();
        print_table(&rows, OutputFormat::Table);
    }

    let rows: Vec<RecommendationRow> = report
        .recommendations
        .iter()
        .map(|r| RecommendationRow {
            area: r.area.clone(),
            issue: r.issue.clone(),
            recommendation: r.recommendation.clone(),
        })
        .collect();
    print_table(&rows, OutputFormat::Table);
}

fn metric_row(metric: &str, value: &longevity_core::models::FeatureValue) -> MetricRow {
    MetricRow {
        metric: metric.to_string(),
        value: format_value(value),
    }
}
