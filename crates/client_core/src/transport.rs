//! Network boundary: every call resolves to the next page, a not-found
//! signal, or a transport failure.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use shared::{
    domain::{FriendlyCode, Page, SessionId},
    error::{ApiError, ErrorCode},
    protocol::{PassphraseQuery, ResponseEnvelope, SessionQuery, SubmissionPayload},
};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no survey session matches the request")]
    NotFound,
    #[error("server rejected request with status {status}: {message}")]
    Rejected {
        status: u16,
        code: Option<ErrorCode>,
        message: String,
    },
    #[error("http transport failure: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid server url: {0}")]
    Url(#[from] url::ParseError),
}

#[async_trait]
pub trait SurveyTransport: Send + Sync {
    async fn start(&self) -> Result<Page, TransportError>;
    async fn submit_response(
        &self,
        session_id: SessionId,
        payload: &SubmissionPayload,
    ) -> Result<Page, TransportError>;
    async fn restore(&self, session_id: SessionId) -> Result<Page, TransportError>;
    async fn lookup_passphrase(&self, code: &FriendlyCode) -> Result<Page, TransportError>;
}

pub struct HttpTransport {
    http: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(server_url: &str) -> Result<Self, TransportError> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self, TransportError> {
        let mut base_url = Url::parse(server_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        Ok(self.base_url.join(path)?)
    }
}

#[async_trait]
impl SurveyTransport for HttpTransport {
    async fn start(&self) -> Result<Page, TransportError> {
        let res = self.http.get(self.endpoint("api/start")?).send().await?;
        read_page(res).await
    }

    async fn submit_response(
        &self,
        session_id: SessionId,
        payload: &SubmissionPayload,
    ) -> Result<Page, TransportError> {
        let res = self
            .http
            .post(self.endpoint("api/response")?)
            .json(&ResponseEnvelope {
                session_id,
                response: payload.clone(),
            })
            .send()
            .await?;
        read_page(res).await
    }

    async fn restore(&self, session_id: SessionId) -> Result<Page, TransportError> {
        let res = self
            .http
            .get(self.endpoint("api/restore")?)
            .query(&SessionQuery { session_id })
            .send()
            .await?;
        read_page(res).await
    }

    async fn lookup_passphrase(&self, code: &FriendlyCode) -> Result<Page, TransportError> {
        let res = self
            .http
            .get(self.endpoint("api/answers")?)
            .query(&PassphraseQuery {
                friendly_code: code.clone(),
            })
            .send()
            .await?;
        read_page(res).await
    }
}

/// Only an `ApiError` body with the not-found code means the session or
/// passphrase failed to resolve. A bare 404, such as an unmounted route
/// behind a wrong base url, is an ordinary rejection.
async fn read_page(res: Response) -> Result<Page, TransportError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res.json::<Page>().await?);
    }

    let body = res.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), %body, "survey api rejected request");
    match serde_json::from_str::<ApiError>(&body) {
        Ok(api_error)
            if status == StatusCode::NOT_FOUND && api_error.code == ErrorCode::NotFound =>
        {
            Err(TransportError::NotFound)
        }
        Ok(api_error) => Err(TransportError::Rejected {
            status: status.as_u16(),
            code: Some(api_error.code),
            message: api_error.message,
        }),
        Err(_) => Err(TransportError::Rejected {
            status: status.as_u16(),
            code: None,
            message: body,
        }),
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
