//! Load Generator
//!
//! Posts synthetic transactions to a running scoring service.
//!
//! Usage: load_generator [url] [count] [suspicious_rate] [delay_ms]

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

const CATEGORIES: [&str; 14] = [
    "entertainment",
    "food_dining",
    "gas_transport",
    "grocery_net",
    "grocery_pos",
    "health_fitness",
    "home",
    "kids_pets",
    "misc_net",
    "misc_pos",
    "personal_care",
    "shopping_net",
    "shopping_pos",
    "travel",
];

/// Transaction in the shape the dashboard posts: CSV cells as strings
#[derive(Debug, Clone, Serialize)]
struct Transaction {
    id: String,
    trans_date_trans_time: String,
    dob: String,
    amt: String,
    zip: String,
    lat: String,
    long: String,
    city_pop: String,
    merch_lat: String,
    merch_long: String,
    category: String,
    gender: String,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(rename = "Prediction")]
    prediction: Vec<i64>,
    #[serde(rename = "Probability")]
    probability: Vec<Vec<f64>>,
}

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
    transaction_counter: u64,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            transaction_counter: 0,
        }
    }

    /// Generate a random everyday transaction
    fn generate_legitimate(&mut self) -> Transaction {
        let amount = self.rng.gen_range(1.0..150.0);
        let hour = self.rng.gen_range(7..22);
        let category = self.random_choice(&CATEGORIES);
        self.generate(amount, hour, category, 25..70)
    }

    /// Generate a transaction with the usual fraud markers: large amount,
    /// night time, online category
    fn generate_suspicious(&mut self) -> Transaction {
        let amount = self.rng.gen_range(500.0..1400.0);
        let hour = self.rng.gen_range(0..4);
        let category = self.random_choice(&["shopping_net", "misc_net", "grocery_pos"]);
        self.generate(amount, hour, category, 18..90)
    }

    fn generate(
        &mut self,
        amount: f64,
        hour: u32,
        category: &str,
        age_years: std::ops::Range<i64>,
    ) -> Transaction {
        self.transaction_counter += 1;

        let today = Utc::now().date_naive();
        let timestamp = today
            .and_hms_opt(hour, self.rng.gen_range(0..60), self.rng.gen_range(0..60))
            .unwrap_or_else(|| today.and_time(chrono::NaiveTime::MIN));
        let age_days = self.rng.gen_range(age_years) * 365 + self.rng.gen_range(0..365);
        let dob = today - ChronoDuration::days(age_days);

        let lat = self.rng.gen_range(25.0..48.0);
        let long = self.rng.gen_range(-122.0..-70.0);

        Transaction {
            id: format!("tx_{:012}", self.transaction_counter),
            trans_date_trans_time: timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            dob: format_date(dob),
            amt: format!("{:.2}", amount),
            zip: self.rng.gen_range(1001..99950).to_string(),
            lat: format!("{:.4}", lat),
            long: format!("{:.4}", long),
            city_pop: self.rng.gen_range(100..2_500_000).to_string(),
            merch_lat: format!("{:.6}", lat + self.rng.gen_range(-1.0..1.0)),
            merch_long: format!("{:.6}", long + self.rng.gen_range(-1.0..1.0)),
            category: category.to_string(),
            gender: self.random_choice(&["M", "F"]).to_string(),
        }
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("load_generator=info".parse()?),
        )
        .init();

    info!("Starting Load Generator");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let url = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("http://localhost:81/predict");
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let suspicious_rate = parse_rate(args.get(3).map(|s| s.as_str()));
    let delay_ms: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        url = %url,
        count = count,
        suspicious_rate = suspicious_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = reqwest::Client::new();
    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    let mut labels: BTreeMap<i64, u64> = BTreeMap::new();
    let mut failures = 0u64;

    for i in 0..count {
        let transaction = if rng.gen_bool(suspicious_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        let response = client.post(url).json(&transaction).send().await;
        match response {
            Ok(resp) if resp.status().is_success() => {
                let body: PredictionResponse = resp.json().await?;
                let label = body.prediction.first().copied().unwrap_or_default();
                *labels.entry(label).or_insert(0) += 1;

                if label != 0 {
                    info!(
                        transaction_id = %transaction.id,
                        amount = %transaction.amt,
                        probabilities = ?body.probability.first(),
                        "Transaction flagged"
                    );
                }
            }
            Ok(resp) => {
                failures += 1;
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                warn!(transaction_id = %transaction.id, %status, body = %text, "Request rejected");
            }
            Err(e) => {
                failures += 1;
                warn!(transaction_id = %transaction.id, error = %e, "Request failed");
            }
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Sent {}/{} transactions (labels: {:?}, failures: {})",
                i + 1,
                count,
                labels,
                failures
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} transactions (labels: {:?}, failures: {})",
        count, labels, failures
    );

    Ok(())
}

/// Suspicious share of the traffic, kept within [0, 1].
fn parse_rate(arg: Option<&str>) -> f64 {
    arg.and_then(|s| s.parse::<f64>().ok())
        .filter(|rate| rate.is_finite())
        .map(|rate| rate.clamp(0.0, 1.0))
        .unwrap_or(0.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate(None), 0.1);
        assert_eq!(parse_rate(Some("0.25")), 0.25);
        assert_eq!(parse_rate(Some("1.5")), 1.0);
        assert_eq!(parse_rate(Some("-2")), 0.0);
        assert_eq!(parse_rate(Some("NaN")), 0.1);
        assert_eq!(parse_rate(Some("often")), 0.1);
    }
}
