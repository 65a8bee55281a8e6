//! Prediction output formatting
//!
//! Turns a raw score plus the selected catalog record into the report
//! returned to callers: interpretation bucket, key metrics, contributing
//! factors and recommendations.

use super::features::SourceSelection;
use crate::manager::ModelBundle;
use crate::models::{
    AppRecord, ContributingFactor, FeatureValue, Impact, Interpretation, KeyMetrics,
    PredictionReport, Recommendation,
};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Placeholder for metrics the catalogs did not report
pub const UNKNOWN_METRIC: &str = "Unknown";

/// Score bands, highest first: (min score, category, lifespan, probability, description)
const INTERPRETATIONS: &[(f64, &str, &str, &str, &str)] = &[
    (
        0.8,
        "Excellent",
        "5+ years",
        "Very High",
        "This app shows strong indicators of long-term success and user retention.",
    ),
    (
        0.6,
        "Good",
        "3-5 years",
        "High",
        "This app has solid fundamentals and is likely to remain viable for years.",
    ),
    (
        0.4,
        "Average",
        "1-3 years",
        "Medium",
        "This app has moderate longevity indicators, typical of the average app.",
    ),
    (
        0.2,
        "Below Average",
        "6 months - 1 year",
        "Low",
        "This app shows some concerning metrics that may limit its lifespan.",
    ),
];

const POOR: (&str, &str, &str, &str) = (
    "Poor",
    "Less than 6 months",
    "Very Low",
    "This app shows significant risk factors that suggest a short lifespan.",
);

/// Thresholds for the report sections
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Maximum number of contributing factors reported
    pub max_factors: usize,
    /// Fillers are appended when fewer recommendations than this apply
    pub min_recommendations: usize,
    pub low_rating: f64,
    pub average_rating: f64,
    pub stale_update_days: f64,
    pub low_sentiment: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_factors: 5,
            min_recommendations: 2,
            low_rating: 3.5,
            average_rating: 4.0,
            stale_update_days: 90.0,
            low_sentiment: 0.6,
        }
    }
}

/// Builds prediction reports
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter {
    config: OutputConfig,
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Full report for a scored app, dated today
    pub fn format(
        &self,
        app_name: &str,
        selection: &SourceSelection,
        score: f64,
        bundle: &ModelBundle,
    ) -> PredictionReport {
        let today = chrono::Local::now().date_naive();
        self.format_on(app_name, selection, score, bundle, today)
    }

    pub fn format_on(
        &self,
        app_name: &str,
        selection: &SourceSelection,
        score: f64,
        bundle: &ModelBundle,
        date: NaiveDate,
    ) -> PredictionReport {
        let record = &selection.record;
        PredictionReport {
            app_name: app_name.to_string(),
            platform: selection.platform,
            store_id: record.text("app_id").map(str::to_string),
            predicted_longevity: score,
            longevity_interpretation: interpret_score(score),
            key_metrics: key_metrics(record),
            contributing_factors: self.contributing_factors(record, &bundle.feature_importances),
            recommendations: self.recommendations(record),
            date_analyzed: date.format("%Y-%m-%d").to_string(),
            model_used: bundle.model_used().to_string(),
        }
    }

    /// Top reported features ranked by signed importance; `None` without importances
    pub fn contributing_factors(
        &self,
        record: &AppRecord,
        importances: &HashMap<String, f64>,
    ) -> Option<Vec<ContributingFactor>> {
        if importances.is_empty() {
            return None;
        }

        let mut available: Vec<(&String, &FeatureValue, f64)> = record
            .iter()
            .filter(|(_, value)| !value.is_missing())
            .filter_map(|(name, value)| importances.get(name).map(|imp| (name, value, *imp)))
            .collect();
        // Stable: equal importances keep record order
        available.sort_by(|a, b| b.2.total_cmp(&a.2));

        Some(
            available
                .into_iter()
                .take(self.config.max_factors)
                .map(|(name, value, importance)| ContributingFactor {
                    feature: name.clone(),
                    value: value.clone(),
                    importance,
                    impact: if importance > 0.0 {
                        Impact::Positive
                    } else {
                        Impact::Negative
                    },
                    description: describe_feature(name, value),
                })
                .collect(),
        )
    }

    /// Advice from independent threshold rules, padded with generic items
    pub fn recommendations(&self, record: &AppRecord) -> Vec<Recommendation> {
        let mut out = Vec::new();

        if let Some(rating) = record.number("rating") {
            if rating < self.config.low_rating {
                out.push(recommendation(
                    "User Satisfaction",
                    "Low app rating",
                    "Address common complaints in reviews and consider a major update to improve user experience.",
                ));
            } else if rating < self.config.average_rating {
                out.push(recommendation(
                    "User Satisfaction",
                    "Average app rating",
                    "Focus on improving specific features mentioned in user reviews to increase ratings.",
                ));
            }
        }

        if record
            .number("days_since_last_update")
            .is_some_and(|days| days > self.config.stale_update_days)
        {
            out.push(recommendation(
                "App Maintenance",
                "Infrequent updates",
                "Establish a regular update schedule to fix bugs and add new features.",
            ));
        }

        if record
            .number("positive_sentiment_ratio")
            .is_some_and(|ratio| ratio < self.config.low_sentiment)
        {
            out.push(recommendation(
                "User Sentiment",
                "Negative user sentiment",
                "Analyze user reviews to identify pain points and prioritize addressing them.",
            ));
        }

        if out.len() < self.config.min_recommendations {
            out.push(recommendation(
                "User Engagement",
                "Potential engagement improvements",
                "Consider adding features that encourage daily app usage, such as notifications, rewards, or social elements.",
            ));
            out.push(recommendation(
                "Monetization",
                "Revenue optimization",
                "Review your monetization strategy compared to competitors in your category.",
            ));
        }

        out
    }
}

fn recommendation(area: &str, issue: &str, advice: &str) -> Recommendation {
    Recommendation {
        area: area.to_string(),
        issue: issue.to_string(),
        recommendation: advice.to_string(),
    }
}

/// Interpretation bucket for a score, first band whose minimum is met
pub fn interpret_score(score: f64) -> Interpretation {
    let (category, lifespan, probability, description) = INTERPRETATIONS
        .iter()
        .find(|band| score >= band.0)
        .map(|band| (band.1, band.2, band.3, band.4))
        .unwrap_or(POOR);

    Interpretation {
        category: category.to_string(),
        description: description.to_string(),
        expected_lifespan: lifespan.to_string(),
        success_probability: probability.to_string(),
    }
}

/// Human-readable description of one feature value
pub fn describe_feature(name: &str, value: &FeatureValue) -> String {
    let set = value.is_truthy();
    match name {
        "rating" => format!("App rating of {}/5", value),
        "days_since_last_update" => format!("Last updated {} days ago", value),
        "days_since_release" if set => format!("Released {} days ago", value),
        "days_since_release" => "Release date unknown".to_string(),
        "downloads" => format!("Approximately {} downloads", value),
        "size_mb" => format!("App size of {} MB", value),
        "number_of_reviews" => format!("{} user reviews", value),
        "positive_sentiment_ratio" => match value.as_f64().filter(|_| set) {
            Some(ratio) => format!("{:.1}% positive sentiment in reviews", ratio * 100.0),
            None => "Sentiment unknown".to_string(),
        },
        "update_frequency" if set => format!("Updated every {} days on average", value),
        "update_frequency" => "Update frequency unknown".to_string(),
        "has_in_app_purchases" if set => "Offers in-app purchases".to_string(),
        "has_in_app_purchases" => "No in-app purchases".to_string(),
        "price" if set => format!("Priced at ${}", value),
        "price" => "Free app".to_string(),
        "content_rating" => format!("Content rated for {}", value),
        "total_ratings" => format!("{} total ratings", value),
        _ => format!("{}: {}", name, value),
    }
}

/// Headline metrics, `"Unknown"` where the catalog had nothing
pub fn key_metrics(record: &AppRecord) -> KeyMetrics {
    let metric = |name: &str| match record.get(name) {
        Some(value) if !value.is_missing() => value.clone(),
        _ => FeatureValue::from(UNKNOWN_METRIC),
    };

    KeyMetrics {
        rating: metric("rating"),
        downloads: metric("downloads"),
        price: metric("price"),
        size_mb: metric("size_mb"),
        days_since_last_update: metric("days_since_last_update"),
        days_since_release: metric("days_since_release"),
        positive_sentiment_ratio: metric("positive_sentiment_ratio"),
        in_app_purchases: match record.get("has_in_app_purchases") {
            Some(value) if !value.is_missing() => value.clone(),
            _ => FeatureValue::Flag(false),
        },
        total_ratings: metric("total_ratings"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;

    fn record() -> AppRecord {
        AppRecord::new()
            .with("app_id", "123")
            .with("rating", 4.6)
            .with("total_ratings", 50000.0)
            .with("days_since_last_update", 10.0)
            .with("positive_sentiment_ratio", 0.9)
            .with("size_mb", FeatureValue::Missing)
    }

    #[test]
    fn test_interpretation_bands() {
        assert_eq!(interpret_score(0.85).category, "Excellent");
        assert_eq!(interpret_score(0.8).expected_lifespan, "5+ years");
        assert_eq!(interpret_score(0.6).category, "Good");
        assert_eq!(interpret_score(0.45).success_probability, "Medium");
        assert_eq!(interpret_score(0.2).category, "Below Average");
        assert_eq!(interpret_score(0.19).category, "Poor");
        assert_eq!(interpret_score(-1.0).expected_lifespan, "Less than 6 months");
    }

    #[test]
    fn test_interpretation_band_edges() {
        assert_eq!(interpret_score(0.79999).category, "Good");
        assert_eq!(interpret_score(0.59999).category, "Average");
        assert_eq!(interpret_score(1.5).category, "Excellent");
    }

    #[test]
    fn test_feature_descriptions() {
        assert_eq!(describe_feature("rating", &FeatureValue::Number(4.5)), "App rating of 4.5/5");
        assert_eq!(
            describe_feature("days_since_last_update", &FeatureValue::Number(30.0)),
            "Last updated 30 days ago"
        );
        assert_eq!(
            describe_feature("positive_sentiment_ratio", &FeatureValue::Number(0.73)),
            "73.0% positive sentiment in reviews"
        );
        assert_eq!(
            describe_feature("positive_sentiment_ratio", &FeatureValue::Number(0.0)),
            "Sentiment unknown"
        );
        assert_eq!(describe_feature("price", &FeatureValue::Number(0.0)), "Free app");
        assert_eq!(describe_feature("price", &FeatureValue::Number(2.99)), "Priced at $2.99");
        assert_eq!(
            describe_feature("has_in_app_purchases", &true.into()),
            "Offers in-app purchases"
        );
        assert_eq!(describe_feature("category", &"Games".into()), "category: Games");
    }

    #[test]
    fn test_contributing_factors_signed_order() {
        let formatter = OutputFormatter::new();
        let importances = HashMap::from([
            ("rating".to_string(), 0.4),
            ("days_since_last_update".to_string(), -0.9),
            ("total_ratings".to_string(), 0.1),
            ("size_mb".to_string(), 0.8),
            ("downloads".to_string(), 0.7),
        ]);

        let factors = formatter
            .contributing_factors(&record(), &importances)
            .unwrap();

        let names: Vec<&str> = factors.iter().map(|f| f.feature.as_str()).collect();
        // Missing size_mb and absent downloads are skipped; a large negative ranks last
        assert_eq!(names, vec!["rating", "total_ratings", "days_since_last_update"]);
        assert_eq!(factors[0].impact, Impact::Positive);
        assert_eq!(factors[2].impact, Impact::Negative);
        assert_eq!(factors[0].description, "App rating of 4.6/5");
    }

    #[test]
    fn test_contributing_factors_capped_and_optional() {
        let formatter = OutputFormatter::new();
        assert!(formatter
            .contributing_factors(&record(), &HashMap::new())
            .is_none());

        let mut wide = AppRecord::new();
        let mut importances = HashMap::new();
        for i in 0..8 {
            wide.insert(format!("f{}", i), 1.0);
            importances.insert(format!("f{}", i), i as f64 / 10.0);
        }
        let factors = formatter.contributing_factors(&wide, &importances).unwrap();
        assert_eq!(factors.len(), 5);
        assert_eq!(factors[0].feature, "f7");
        assert!(factors.iter().all(|f| f.importance > 0.0));
    }

    #[test]
    fn test_healthy_app_gets_fillers() {
        let recs = OutputFormatter::new().recommendations(&record());
        let issues: Vec<&str> = recs.iter().map(|r| r.issue.as_str()).collect();
        assert_eq!(
            issues,
            vec!["Potential engagement improvements", "Revenue optimization"]
        );
    }

    #[test]
    fn test_struggling_app_recommendations() {
        let record = AppRecord::new()
            .with("rating", 3.0)
            .with("days_since_last_update", 200.0)
            .with("positive_sentiment_ratio", 0.55);
        let recs = OutputFormatter::new().recommendations(&record);
        let issues: Vec<&str> = recs.iter().map(|r| r.issue.as_str()).collect();
        assert_eq!(
            issues,
            vec!["Low app rating", "Infrequent updates", "Negative user sentiment"]
        );
    }

    #[test]
    fn test_record_without_metrics_gets_fillers() {
        let formatter = OutputFormatter::new();
        let all_missing = AppRecord::new()
            .with("rating", FeatureValue::Missing)
            .with("days_since_last_update", FeatureValue::Missing)
            .with("positive_sentiment_ratio", FeatureValue::Missing);

        for record in [AppRecord::default(), all_missing] {
            let recs = formatter.recommendations(&record);
            assert_eq!(recs.len(), 2);
            assert_eq!(recs[0].area, "User Engagement");
            assert_eq!(recs[1].area, "Monetization");
        }
    }

    #[test]
    fn test_single_rule_still_padded() {
        let record = AppRecord::new().with("rating", 3.8);
        let recs = OutputFormatter::new().recommendations(&record);
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].issue, "Average app rating");
    }

    #[test]
    fn test_key_metrics_unknown() {
        let metrics = key_metrics(&record());
        assert_eq!(metrics.rating, FeatureValue::Number(4.6));
        assert_eq!(metrics.size_mb, FeatureValue::from("Unknown"));
        assert_eq!(metrics.downloads, FeatureValue::from("Unknown"));
        assert_eq!(metrics.in_app_purchases, FeatureValue::Flag(false));
    }

    #[test]
    fn test_format_report() {
        let selection = SourceSelection {
            platform: Platform::Ios,
            record: record(),
        };
        let bundle = ModelBundle {
            name: Some("rf_model".into()),
            ..ModelBundle::empty()
        };
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();

        let report = OutputFormatter::new().format_on("Notes", &selection, 0.85, &bundle, date);

        assert_eq!(report.store_id.as_deref(), Some("123"));
        assert_eq!(report.date_analyzed, "2024-03-09");
        assert_eq!(report.model_used, "rf_model");
        assert_eq!(report.longevity_interpretation.category, "Excellent");
        assert!(report.contributing_factors.is_none());
        assert!(report.recommendations.len() >= 2);
    }
}
