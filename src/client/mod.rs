pub mod wire;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::{BacktestResult, SimulationConfig, SimulationResult, TickerMatch};
use crate::error::ServiceError;
use crate::settings::ServiceSettings;

use wire::{BacktestRequest, BacktestResponse, ErrorBody, SimulateRequest, SimulateResponse, TickerHit};

/// The external simulation service. Timeouts and retries belong to implementations.
#[async_trait]
pub trait SimulationService: Send + Sync {
    async fn simulate(&self, config: &SimulationConfig) -> Result<SimulationResult, ServiceError>;

    async fn backtest(
        &self,
        config: &SimulationConfig,
        start_year: i32,
    ) -> Result<BacktestResult, ServiceError>;

    async fn search_tickers(&self, query: &str) -> Result<Vec<TickerMatch>, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct HttpSimulationService {
    client: Client,
    settings: ServiceSettings,
}

impl HttpSimulationService {
    pub fn new(settings: ServiceSettings) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| ServiceError::Connectivity(e.to_string()))?;
        Ok(Self { client, settings })
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.settings.endpoint(path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;
        read_json(response).await
    }
}

#[async_trait]
impl SimulationService for HttpSimulationService {
    async fn simulate(&self, config: &SimulationConfig) -> Result<SimulationResult, ServiceError> {
        let request = SimulateRequest::from_config(config);
        let response: SimulateResponse = self.post_json("simulate", &request).await?;
        Ok(response.into())
    }

    async fn backtest(
        &self,
        config: &SimulationConfig,
        start_year: i32,
    ) -> Result<BacktestResult, ServiceError> {
        let request = BacktestRequest::from_config(config, start_year);
        let response: BacktestResponse = self.post_json("backtest", &request).await?;
        Ok(response.into())
    }

    async fn search_tickers(&self, query: &str) -> Result<Vec<TickerMatch>, ServiceError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.settings.endpoint("tickers/search");
        let response = self
            .client
            .get(&url)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;
        let hits: Vec<TickerHit> = read_json(response).await?;
        Ok(hits.into_iter().map(TickerMatch::from).collect())
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> ServiceError {
    tracing::debug!(url, error = %err, "simulation service unreachable");
    ServiceError::Connectivity(err.to_string())
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ServiceError::Connectivity(e.to_string()))?;

    if !status.is_success() {
        return Err(ServiceError::Request {
            status: status.as_u16(),
            message: error_message(&text),
        });
    }

    serde_json::from_str(&text).map_err(|e| ServiceError::Request {
        status: status.as_u16(),
        message: format!("malformed response body: {e}"),
    })
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => err.message(),
        Err(_) if body.trim().is_empty() => "no error detail".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
