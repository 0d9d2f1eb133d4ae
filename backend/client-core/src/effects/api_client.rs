use crate::error::api::ApiError;
use crate::{
    LOGIN_INFO_ENDPOINT, QUEUE_STOP_ENDPOINT, REMOTE_ACCESS_ENDPOINT, SC_CONTENTS_ENDPOINT,
    SIGNOUT_ENDPOINT,
};

use common::ErrorLocation;
use models::LoginInfo;

use std::panic::Location;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use url::Url;

const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(30);

/// HTTP side of the instrument server: session and remote-access queries
/// issued in reaction to pushed events.
#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url_str: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url_str)?;
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT_DURATION)
            .build()?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Remote-access state: current observers, operator and pending requests.
    pub async fn remote_access(&self) -> Result<Value, ApiError> {
        let json = self.get_json(REMOTE_ACCESS_ENDPOINT).await?;
        Ok(json.get("data").cloned().unwrap_or(Value::Null))
    }

    pub async fn login_info(&self) -> Result<LoginInfo, ApiError> {
        let json = self.get_json(LOGIN_INFO_ENDPOINT).await?;
        Ok(serde_json::from_value(json)?)
    }

    pub async fn sign_out(&self) -> Result<(), ApiError> {
        let url = self.base_url.join(SIGNOUT_ENDPOINT)?;
        let response = self.send(self.client.get(url)).await?;
        check_status(response).await.map(|_| ())
    }

    pub async fn stop_queue(&self) -> Result<(), ApiError> {
        let url = self.base_url.join(QUEUE_STOP_ENDPOINT)?;
        let response = self.send(self.client.put(url)).await?;
        check_status(response).await.map(|_| ())
    }

    pub async fn sample_changer_contents(&self) -> Result<Value, ApiError> {
        self.get_json(SC_CONTENTS_ENDPOINT).await
    }

    async fn get_json(&self, endpoint: &str) -> Result<Value, ApiError> {
        let url = self.base_url.join(endpoint)?;
        let response = self.send(self.client.get(url)).await?;
        let response = check_status(response).await?;

        Ok(response.json().await?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        Ok(request.header("Accept", "application/json").send().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }

    Err(ApiError::Server {
        message: format!(
            "HTTP {} - {}",
            response.status().as_u16(),
            response.text().await.unwrap_or_default()
        ),
        location: ErrorLocation::from(Location::caller()),
    })
}
