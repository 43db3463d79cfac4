//! HTTP adapters for the question catalog, encryption and email services.
//!
//! All three speak JSON over `POST`. A non-2xx answer is a `ServiceError::Status`
//! (or a `NotificationError` for email), never a panic.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use coverquote_core::config::{EmailConfig, ServicesConfig};
use coverquote_core::domain::question::CatalogQuestion;
use coverquote_core::ports::{
    EmailMessage, EmailSender, EncryptionService, NotificationError, QuestionCatalog,
    QuestionQuery, ServiceError,
};

const QUESTION_SERVICE: &str = "question";
const ENCRYPTION_SERVICE: &str = "encryption";

fn build_client(timeout_secs: u64, service: &'static str) -> Result<Client, ServiceError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|error| ServiceError::Transport { service, message: error.to_string() })
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn ensure_success(status: StatusCode, service: &'static str) -> Result<(), ServiceError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(ServiceError::Status { service, status: status.as_u16() })
    }
}

pub struct HttpQuestionCatalog {
    client: Client,
    base_url: String,
}

impl HttpQuestionCatalog {
    pub fn new(config: &ServicesConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(config.request_timeout_secs, QUESTION_SERVICE)?,
            base_url: config.question_catalog_url.clone(),
        })
    }
}

#[async_trait]
impl QuestionCatalog for HttpQuestionCatalog {
    async fn get_questions(
        &self,
        query: &QuestionQuery,
    ) -> Result<Vec<CatalogQuestion>, ServiceError> {
        let response = self
            .client
            .post(endpoint(&self.base_url, "v1/questions"))
            .json(query)
            .send()
            .await
            .map_err(|error| ServiceError::Transport {
                service: QUESTION_SERVICE,
                message: error.to_string(),
            })?;
        ensure_success(response.status(), QUESTION_SERVICE)?;

        let questions: Vec<CatalogQuestion> =
            response.json().await.map_err(|error| ServiceError::Decode {
                service: QUESTION_SERVICE,
                message: error.to_string(),
            })?;
        debug!(
            event_name = "question_catalog.fetched",
            questions = questions.len(),
            policy_types = query.policy_types.len(),
            "question catalog answered"
        );
        Ok(questions)
    }
}

#[derive(Serialize)]
struct CipherRequest<'a> {
    data: &'a str,
}

#[derive(Deserialize)]
struct CipherResponse {
    data: String,
}

pub struct HttpEncryptionService {
    client: Client,
    base_url: String,
}

impl HttpEncryptionService {
    pub fn new(config: &ServicesConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(config.request_timeout_secs, ENCRYPTION_SERVICE)?,
            base_url: config.encryption_url.clone(),
        })
    }

    async fn call(&self, path: &str, data: &str) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(endpoint(&self.base_url, path))
            .json(&CipherRequest { data })
            .send()
            .await
            .map_err(|error| ServiceError::Transport {
                service: ENCRYPTION_SERVICE,
                message: error.to_string(),
            })?;
        ensure_success(response.status(), ENCRYPTION_SERVICE)?;

        let body: CipherResponse = response.json().await.map_err(|error| ServiceError::Decode {
            service: ENCRYPTION_SERVICE,
            message: error.to_string(),
        })?;
        Ok(body.data)
    }
}

#[async_trait]
impl EncryptionService for HttpEncryptionService {
    async fn encrypt(&self, plaintext: &str) -> Result<String, ServiceError> {
        self.call("v1/encrypt", plaintext).await
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<String, ServiceError> {
        self.call("v1/decrypt", ciphertext).await
    }
}

#[derive(Serialize)]
struct EmailEnvelope<'a> {
    from: &'a str,
    #[serde(flatten)]
    message: &'a EmailMessage,
}

pub struct HttpEmailSender {
    client: Client,
    api_url: String,
    api_key: Option<SecretString>,
    from_address: String,
}

impl HttpEmailSender {
    pub fn new(config: &EmailConfig, timeout_secs: u64) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|error| NotificationError(format!("email client: {error}")))?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let mut request = self
            .client
            .post(endpoint(&self.api_url, "v1/email"))
            .json(&EmailEnvelope { from: &self.from_address, message });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|error| NotificationError(format!("email request failed: {error}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError(format!("email service returned {status}")));
        }
        Ok(())
    }
}
