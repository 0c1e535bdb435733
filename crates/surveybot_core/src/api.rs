use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::sleep;
use tracing::debug;

use crate::config::Settings;

/// The read/write surface of the wiki the bot needs.
#[async_trait]
pub trait WikiApi: Send + Sync {
    async fn read_page(&self, title: &str) -> Result<String>;
    async fn edit_page(&self, title: &str, content: &str, summary: &str) -> Result<()>;
    async fn refresh_token(&self) -> Result<()>;
    async fn login(&self, username: &str, password: &str) -> Result<()>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WikiApiError {
    #[error("MediaWiki API error [{code}]: {info}")]
    Api { code: String, info: String },
    #[error("page does not exist: {0}")]
    MissingPage(String),
    #[error("MediaWiki edit failed for {title}: {result}")]
    EditRejected { title: String, result: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    BadToken,
    SessionLost,
    MissingPage,
    Other,
}

impl WikiApiError {
    pub fn api(code: &str, info: &str) -> Self {
        Self::Api {
            code: code.to_string(),
            info: info.to_string(),
        }
    }

    pub fn kind(&self) -> ApiErrorKind {
        match self {
            Self::Api { code, .. } => match code.as_str() {
                "badtoken" => ApiErrorKind::BadToken,
                "assertbotfailed" | "assertuserfailed" => ApiErrorKind::SessionLost,
                "missingtitle" => ApiErrorKind::MissingPage,
                _ => ApiErrorKind::Other,
            },
            Self::MissingPage(_) => ApiErrorKind::MissingPage,
            Self::EditRejected { .. } => ApiErrorKind::Other,
        }
    }
}

/// Classify any error by the first [`WikiApiError`] in its cause chain.
pub fn error_kind(error: &anyhow::Error) -> ApiErrorKind {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<WikiApiError>())
        .map(WikiApiError::kind)
        .unwrap_or(ApiErrorKind::Other)
}

#[derive(Debug, Clone)]
pub struct MediaWikiClientConfig {
    pub api_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub rate_limit_write_ms: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub assert: Option<String>,
}

impl MediaWikiClientConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            api_url: settings.api_url(),
            user_agent: settings.user_agent(),
            timeout_ms: 30_000,
            read_timeout_ms: settings.timeout_ms(),
            rate_limit_write_ms: 1_000,
            max_retries: 2,
            retry_delay_ms: 500,
            assert: settings.assert().map(ToString::to_string),
        }
    }
}

struct Session {
    http: Client,
    csrf_token: Option<String>,
    logged_in: bool,
}

pub struct MediaWikiClient {
    config: MediaWikiClientConfig,
    session: RwLock<Session>,
    last_write_at: Mutex<Option<Instant>>,
}

impl MediaWikiClient {
    pub fn new(config: MediaWikiClientConfig) -> Result<Self> {
        Url::parse(&config.api_url)
            .with_context(|| format!("invalid WIKI_API_URL: {}", config.api_url))?;
        let http = build_http_client(&config)?;
        Ok(Self {
            config,
            session: RwLock::new(Session {
                http,
                csrf_token: None,
                logged_in: false,
            }),
            last_write_at: Mutex::new(None),
        })
    }

    async fn http(&self) -> Client {
        self.session.read().await.http.clone()
    }

    async fn request_json_get(
        &self,
        params: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let pairs = with_format(params);
        let http = self.http().await;

        for attempt in 0..=self.config.max_retries {
            let mut request = http
                .get(&self.config.api_url)
                .header("User-Agent", self.config.user_agent.clone())
                .query(&pairs);
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        if attempt < self.config.max_retries && is_retryable_status(status) {
                            sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                            continue;
                        }
                        bail!("MediaWiki API request failed with HTTP {status}");
                    }
                    let payload: Value = response
                        .json()
                        .await
                        .context("failed to decode MediaWiki API JSON response")?;
                    return check_api_error(payload);
                }
                Err(error) => {
                    if attempt < self.config.max_retries && is_retryable_error(&error) {
                        sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                        continue;
                    }
                    return Err(error).context("failed to call MediaWiki API");
                }
            }
        }

        bail!("MediaWiki API request exhausted retry budget")
    }

    async fn request_json_post(&self, params: &[(&str, String)]) -> Result<Value> {
        let pairs = with_format(params);
        self.apply_write_rate_limit().await;
        let response = self
            .http()
            .await
            .post(&self.config.api_url)
            .header("User-Agent", self.config.user_agent.clone())
            .form(&pairs)
            .send()
            .await
            .context("failed to call MediaWiki API")?;

        let status = response.status();
        if !status.is_success() {
            bail!("MediaWiki API request failed with HTTP {status}");
        }
        let payload: Value = response
            .json()
            .await
            .context("failed to decode MediaWiki API JSON response")?;
        check_api_error(payload)
    }

    async fn apply_write_rate_limit(&self) {
        let delay = Duration::from_millis(self.config.rate_limit_write_ms);
        let mut last = self.last_write_at.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < delay {
                sleep(delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn fetch_token(&self, kind: &str) -> Result<String> {
        let response = self
            .request_json_get(
                &[
                    ("action", "query".to_string()),
                    ("meta", "tokens".to_string()),
                    ("type", kind.to_string()),
                ],
                None,
            )
            .await?;
        let parsed: TokenQueryResponse =
            serde_json::from_value(response).context("failed to decode token response")?;
        let tokens = parsed.query.tokens.unwrap_or_default();
        let token = match kind {
            "login" => tokens.logintoken,
            _ => tokens.csrftoken,
        };
        token.ok_or_else(|| anyhow::anyhow!("failed to get MediaWiki {kind} token"))
    }

    async fn ensure_csrf_token(&self) -> Result<String> {
        if let Some(token) = &self.session.read().await.csrf_token {
            return Ok(token.clone());
        }
        let token = self.fetch_token("csrf").await?;
        self.session.write().await.csrf_token = Some(token.clone());
        Ok(token)
    }

    /// Numeric page id of an existing page, `None` when it is missing.
    pub async fn page_id(&self, title: &str) -> Result<Option<i64>> {
        let response = self
            .request_json_get(
                &[
                    ("action", "query".to_string()),
                    ("titles", title.to_string()),
                    ("prop", "info".to_string()),
                ],
                None,
            )
            .await?;
        let parsed: QueryResponse =
            serde_json::from_value(response).context("failed to decode page info response")?;
        Ok(parsed
            .query
            .pages
            .into_iter()
            .find(|page| !page.missing.unwrap_or(false))
            .and_then(|page| page.pageid))
    }
}

#[async_trait]
impl WikiApi for MediaWikiClient {
    async fn read_page(&self, title: &str) -> Result<String> {
        let response = self
            .request_json_get(
                &[
                    ("action", "query".to_string()),
                    ("titles", title.to_string()),
                    ("prop", "revisions".to_string()),
                    ("rvprop", "content".to_string()),
                    ("rvslots", "main".to_string()),
                ],
                Some(Duration::from_millis(self.config.read_timeout_ms)),
            )
            .await?;
        let parsed: QueryResponse =
            serde_json::from_value(response).context("failed to decode page content response")?;

        let page = parsed
            .query
            .pages
            .into_iter()
            .next()
            .ok_or_else(|| WikiApiError::MissingPage(title.to_string()))?;
        if page.missing.unwrap_or(false) {
            return Err(WikiApiError::MissingPage(page.title).into());
        }
        page.revisions
            .into_iter()
            .next()
            .and_then(|revision| revision.slots)
            .and_then(|slots| slots.main)
            .map(|slot| slot.content)
            .ok_or_else(|| WikiApiError::MissingPage(title.to_string()).into())
    }

    async fn edit_page(&self, title: &str, content: &str, summary: &str) -> Result<()> {
        let token = self.ensure_csrf_token().await?;
        let logged_in = self.session.read().await.logged_in;
        let mut params = vec![
            ("action", "edit".to_string()),
            ("title", title.to_string()),
            ("text", content.to_string()),
            ("summary", summary.to_string()),
            ("bot", "1".to_string()),
        ];
        if logged_in && let Some(assert) = &self.config.assert {
            params.push(("assert", assert.clone()));
        }
        params.push(("token", token));

        let response = self.request_json_post(&params).await?;
        let edit_payload: EditResponse =
            serde_json::from_value(response).context("failed to decode edit response")?;
        let edit = edit_payload
            .edit
            .ok_or_else(|| anyhow::anyhow!("missing edit payload in API response"))?;
        if edit.result.as_deref() != Some("Success") {
            return Err(WikiApiError::EditRejected {
                title: title.to_string(),
                result: edit.result.unwrap_or_else(|| "unknown".to_string()),
            }
            .into());
        }
        debug!(title, nochange = edit.nochange.is_some(), "edit saved");
        Ok(())
    }

    async fn refresh_token(&self) -> Result<()> {
        self.session.write().await.csrf_token = None;
        let token = self.fetch_token("csrf").await?;
        self.session.write().await.csrf_token = Some(token);
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<()> {
        {
            // A fresh cookie jar drops whatever is left of the previous session.
            let mut session = self.session.write().await;
            session.http = build_http_client(&self.config)?;
            session.csrf_token = None;
            session.logged_in = false;
        }

        let login_token = self.fetch_token("login").await?;
        let login_response = self
            .request_json_post(&[
                ("action", "login".to_string()),
                ("lgname", username.to_string()),
                ("lgpassword", password.to_string()),
                ("lgtoken", login_token),
            ])
            .await?;
        let login_payload: LoginResponse =
            serde_json::from_value(login_response).context("failed to decode login response")?;
        match login_payload.login.result.as_deref() {
            Some("Success") => {
                self.session.write().await.logged_in = true;
                self.ensure_csrf_token().await?;
                Ok(())
            }
            other => bail!(
                "MediaWiki login failed: {}",
                login_payload
                    .login
                    .reason
                    .or_else(|| other.map(ToString::to_string))
                    .unwrap_or_else(|| "unknown error".to_string())
            ),
        }
    }
}

fn build_http_client(config: &MediaWikiClientConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .cookie_store(true)
        .build()
        .context("failed to build MediaWiki HTTP client")
}

fn with_format(params: &[(&str, String)]) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(params.len() + 2);
    pairs.push(("format".to_string(), "json".to_string()));
    pairs.push(("formatversion".to_string(), "2".to_string()));
    pairs.extend(
        params
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone())),
    );
    pairs
}

fn check_api_error(payload: Value) -> Result<Value> {
    if let Some(error) = payload.get("error") {
        let code = error
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        let info = error
            .get("info")
            .and_then(Value::as_str)
            .unwrap_or("unknown info");
        return Err(WikiApiError::api(code, info).into());
    }
    Ok(payload)
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

#[derive(Debug, Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    query: QueryPayload,
}

#[derive(Debug, Deserialize, Default)]
struct QueryPayload {
    #[serde(default)]
    pages: Vec<PageQueryItem>,
}

#[derive(Debug, Deserialize)]
struct PageQueryItem {
    pageid: Option<i64>,
    title: String,
    missing: Option<bool>,
    #[serde(default)]
    revisions: Vec<RevisionQueryItem>,
}

#[derive(Debug, Deserialize)]
struct RevisionQueryItem {
    slots: Option<RevisionSlotContainer>,
}

#[derive(Debug, Deserialize)]
struct RevisionSlotContainer {
    main: Option<RevisionMainSlot>,
}

#[derive(Debug, Deserialize)]
struct RevisionMainSlot {
    content: String,
}

#[derive(Debug, Deserialize, Default)]
struct TokenQueryResponse {
    #[serde(default)]
    query: TokenQueryPayload,
}

#[derive(Debug, Deserialize, Default)]
struct TokenQueryPayload {
    tokens: Option<TokenPayload>,
}

#[derive(Debug, Deserialize, Default)]
struct TokenPayload {
    logintoken: Option<String>,
    csrftoken: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LoginResponse {
    #[serde(default)]
    login: LoginPayload,
}

#[derive(Debug, Deserialize, Default)]
struct LoginPayload {
    result: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct EditResponse {
    edit: Option<EditPayload>,
}

#[derive(Debug, Deserialize, Default)]
struct EditPayload {
    result: Option<String>,
    nochange: Option<Value>,
}
