use anyhow::Context;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use serde::Deserialize;
use shared::error::MainError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeRateError {
    #[error("Failed to fetch exchange rates")]
    Request(#[source] anyhow::Error),
    #[error("Exchange rate for {0} not found")]
    Missing(NaiveDate),
}

impl From<ExchangeRateError> for MainError {
    fn from(error: ExchangeRateError) -> Self {
        tracing::error!(reason = ?error, "Exchange rate unavailable");
        MainError::ExternalService
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeRatePoint {
    #[serde(rename = "_id")]
    pub date: String,
    pub rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeRateChart {
    pub data: Vec<ExchangeRatePoint>,
}

impl ExchangeRateChart {
    pub fn rate_at(&self, date: NaiveDate) -> Option<f64> {
        let id = date.format("%Y-%m-%d").to_string();
        self.data
            .iter()
            .find(|point| point.date == id)
            .map(|point| point.rate)
    }

    /// Rate change between the day before `today` and `today`.
    pub fn rate_diff(&self, today: NaiveDate) -> Result<f64, ExchangeRateError> {
        let yesterday = today
            .checked_sub_days(Days::new(1))
            .ok_or(ExchangeRateError::Missing(today))?;

        let current = self
            .rate_at(today)
            .ok_or(ExchangeRateError::Missing(today))?;
        let previous = self
            .rate_at(yesterday)
            .ok_or(ExchangeRateError::Missing(yesterday))?;

        Ok(current - previous)
    }
}

#[async_trait]
pub trait ExchangeRateSource: Send + Sync {
    async fn rate_diff(&self, today: NaiveDate)
        -> Result<f64, ExchangeRateError>;
}

/// Vault exchange rate chart served over HTTP.
#[derive(Clone)]
pub struct HttpExchangeRates {
    client: reqwest::Client,
    url: String,
}

impl HttpExchangeRates {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }

    async fn chart(&self) -> anyhow::Result<ExchangeRateChart> {
        self.client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to query {}", self.url))?
            .error_for_status()
            .context("Exchange rate endpoint returned an error")?
            .json::<ExchangeRateChart>()
            .await
            .context("Failed to parse exchange rate chart")
    }
}

#[async_trait]
impl ExchangeRateSource for HttpExchangeRates {
    async fn rate_diff(
        &self,
        today: NaiveDate,
    ) -> Result<f64, ExchangeRateError> {
        let chart = self.chart().await.map_err(ExchangeRateError::Request)?;
        let diff = chart.rate_diff(today)?;
        tracing::debug!(%today, diff, "Fetched exchange rate change");
        Ok(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart() -> ExchangeRateChart {
        serde_json::from_str(
            r#"{"data":[
                {"_id":"2024-09-01","rate":1000000000000000000.0},
                {"_id":"2024-09-02","rate":1000250000000000000.0},
                {"_id":"2024-09-03","rate":1000600000000000000.0}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_rate_diff_between_consecutive_days() {
        let today = NaiveDate::from_ymd_opt(2024, 9, 3).unwrap();

        let diff = chart().rate_diff(today).unwrap();

        assert_eq!(diff, 1000600000000000000.0 - 1000250000000000000.0);
    }

    #[test]
    fn test_missing_day_is_an_error() {
        let today = NaiveDate::from_ymd_opt(2024, 9, 4).unwrap();
        let first = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();

        assert!(matches!(
            chart().rate_diff(today),
            Err(ExchangeRateError::Missing(day)) if day == today
        ));
        assert!(matches!(
            chart().rate_diff(first),
            Err(ExchangeRateError::Missing(day)) if day == first.pred_opt().unwrap()
        ));
    }
}
