//! Wiki client context
//!
//! A [`WikiSession`] owns the HTTP client, the credentials and the cached
//! CSRF token. It is built once per run and lent to both the enrichment step
//! (REST summaries) and the publication step (Action API edits).

use std::cell::{Cell, RefCell};

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;

use crate::config::Config;
use crate::error::{Result, TrendError};
use crate::publish::PagePublisher;
use crate::record::Enrichment;
use crate::summary::{summary_path, PageSummary, SummaryLookup};

/// Environment variable holding an OAuth 2 owner-only access token
pub const ENV_OAUTH_TOKEN: &str = "TRENDWIKI_OAUTH_TOKEN";
/// Environment variable holding a bot password user name (`User@BotName`)
pub const ENV_BOT_USER: &str = "TRENDWIKI_BOT_USER";
/// Environment variable holding the bot password
pub const ENV_BOT_PASSWORD: &str = "TRENDWIKI_BOT_PASSWORD";

/// How edits are authenticated
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Bearer token sent with every Action API request
    OAuthToken(String),
    /// Bot password login; the session cookie is kept by the client
    BotPassword { user: String, password: String },
    /// No credentials; only read-only calls will succeed
    Anonymous,
}

impl Credentials {
    /// Read credentials from the environment
    pub fn from_env() -> Self {
        if let Ok(token) = std::env::var(ENV_OAUTH_TOKEN) {
            if !token.trim().is_empty() {
                return Credentials::OAuthToken(token.trim().to_string());
            }
        }
        match (std::env::var(ENV_BOT_USER), std::env::var(ENV_BOT_PASSWORD)) {
            (Ok(user), Ok(password)) if !user.is_empty() && !password.is_empty() => {
                Credentials::BotPassword { user, password }
            }
            _ => Credentials::Anonymous,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::OAuthToken(_) => write!(f, "OAuthToken(..)"),
            Credentials::BotPassword { user, .. } => write!(f, "BotPassword {{ user: {:?} }}", user),
            Credentials::Anonymous => write!(f, "Anonymous"),
        }
    }
}

/// Transport for the wiki APIs.
///
/// Every call returns the decoded JSON body; HTTP failures are errors.
/// [`HttpApi`] is the real implementation.
pub trait WikiApi {
    /// `GET` on the Action API with `format=json&formatversion=2` added
    fn action_get(&self, params: &[(&str, &str)]) -> Result<Value>;

    /// `POST` a form to the Action API with `format=json&formatversion=2` added
    fn action_post(&self, form: &[(&str, &str)]) -> Result<Value>;

    /// `GET` a path relative to the REST API base URL
    fn rest_get(&self, path: &str) -> Result<Value>;
}

/// Blocking HTTP transport with one shared client
pub struct HttpApi {
    client: Client,
    rest_api_url: String,
    action_api_url: String,
    bearer_token: Option<String>,
}

impl HttpApi {
    /// Build the client. Cookies are kept so a bot-password login sticks.
    pub fn new(config: &Config, bearer_token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .cookie_store(true)
            .build()?;

        let mut rest_api_url = config.rest_api_url.clone();
        if !rest_api_url.ends_with('/') {
            rest_api_url.push('/');
        }

        Ok(Self {
            client,
            rest_api_url,
            action_api_url: config.action_api_url.clone(),
            bearer_token,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl WikiApi for HttpApi {
    fn action_get(&self, params: &[(&str, &str)]) -> Result<Value> {
        let body = self
            .authorize(self.client.get(&self.action_api_url))
            .query(&[("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(body)
    }

    fn action_post(&self, form: &[(&str, &str)]) -> Result<Value> {
        let body = self
            .authorize(self.client.post(&self.action_api_url))
            .query(&[("format", "json"), ("formatversion", "2")])
            .form(form)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(body)
    }

    fn rest_get(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.rest_api_url, path);
        let body = self.client.get(&url).send()?.error_for_status()?.json()?;
        Ok(body)
    }
}

/// Explicit client context for every network call
pub struct WikiSession<A: WikiApi = HttpApi> {
    api: A,
    credentials: Credentials,
    logged_in: Cell<bool>,
    csrf_token: RefCell<Option<String>>,
}

impl WikiSession<HttpApi> {
    /// Build the session. No request is made until it is first needed.
    pub fn new(config: &Config, credentials: Credentials) -> Result<Self> {
        let bearer_token = match &credentials {
            Credentials::OAuthToken(token) => Some(token.clone()),
            _ => None,
        };
        let api = HttpApi::new(config, bearer_token)?;
        Ok(Self::with_api(api, credentials))
    }
}

impl<A: WikiApi> WikiSession<A> {
    /// Session over any transport
    pub fn with_api(api: A, credentials: Credentials) -> Self {
        Self {
            api,
            credentials,
            logged_in: Cell::new(false),
            csrf_token: RefCell::new(None),
        }
    }

    fn fetch_token(&self, kind: &str) -> Result<String> {
        let body = self
            .api
            .action_get(&[("action", "query"), ("meta", "tokens"), ("type", kind)])?;
        parse_token(&body, kind)
    }

    /// Log in with the bot password once per session
    fn ensure_logged_in(&self) -> Result<()> {
        let (user, password) = match &self.credentials {
            Credentials::BotPassword { user, password } => (user, password),
            _ => return Ok(()),
        };
        if self.logged_in.get() {
            return Ok(());
        }

        let login_token = self.fetch_token("login")?;
        let body = self.api.action_post(&[
            ("action", "login"),
            ("lgname", user.as_str()),
            ("lgpassword", password.as_str()),
            ("lgtoken", login_token.as_str()),
        ])?;

        match body["login"]["result"].as_str() {
            Some("Success") => {
                tracing::info!("Logged in as {}", user);
                self.logged_in.set(true);
                Ok(())
            }
            other => Err(TrendError::Auth(format!(
                "login as {} returned {}: {}",
                user,
                other.unwrap_or("no result"),
                body["login"]["reason"].as_str().unwrap_or("")
            ))),
        }
    }

    /// CSRF token, fetched on first use and cached until invalidated
    pub fn csrf_token(&self) -> Result<String> {
        if let Some(token) = self.csrf_token.borrow().as_ref() {
            return Ok(token.clone());
        }

        self.ensure_logged_in()?;
        let token = self.fetch_token("csrf")?;
        if token == ANONYMOUS_TOKEN {
            return Err(TrendError::Auth("session is not logged in; edits need credentials".into()));
        }
        tracing::debug!("Fetched CSRF token");
        *self.csrf_token.borrow_mut() = Some(token.clone());
        Ok(token)
    }

    /// Forget the cached token so the next edit fetches a fresh one
    pub fn invalidate_token(&self) {
        self.csrf_token.borrow_mut().take();
    }

    fn edit(&self, page_title: &str, content: &str, summary: &str, token: &str) -> Result<Value> {
        self.api.action_post(&[
            ("action", "edit"),
            ("nocreate", "1"),
            ("summary", summary),
            ("text", content),
            ("title", page_title),
            ("token", token),
        ])
    }
}

/// Token returned to sessions that are not logged in
const ANONYMOUS_TOKEN: &str = "+\\";

impl<A: WikiApi> SummaryLookup for WikiSession<A> {
    fn summarize(&self, article: &str) -> Result<Enrichment> {
        let body = self.api.rest_get(&summary_path(article))?;
        let summary: PageSummary = serde_json::from_value(body)?;
        Ok(summary.into())
    }
}

impl<A: WikiApi> PagePublisher for WikiSession<A> {
    fn publish(&self, page_title: &str, content: &str, summary: &str) -> Result<()> {
        let token = self.csrf_token()?;
        let body = self.edit(page_title, content, summary, &token)?;

        match check_edit_response(page_title, &body) {
            Err(EditFailure::BadToken) => {
                tracing::warn!("CSRF token rejected, refreshing and retrying {}", page_title);
                self.invalidate_token();
                let token = self.csrf_token()?;
                let body = self.edit(page_title, content, summary, &token)?;
                check_edit_response(page_title, &body).map_err(|e| e.into_error(page_title))
            }
            other => other.map_err(|e| e.into_error(page_title)),
        }
    }
}

/// Pull a token out of a `meta=tokens` response
pub fn parse_token(body: &Value, kind: &str) -> Result<String> {
    let field = format!("{}token", kind);
    body["query"]["tokens"][field.as_str()]
        .as_str()
        .map(String::from)
        .ok_or_else(|| TrendError::Auth(format!("no {} in token response: {}", field, api_error_text(body))))
}

/// Why an edit was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditFailure {
    /// Token expired or belongs to another session
    BadToken,
    /// Any other API error or unexpected result
    Api(String),
}

impl EditFailure {
    fn into_error(self, page_title: &str) -> TrendError {
        let message = match self {
            EditFailure::BadToken => "badtoken".to_string(),
            EditFailure::Api(message) => message,
        };
        TrendError::Publish {
            page: page_title.to_string(),
            message,
        }
    }
}

/// Interpret an `action=edit` response.
///
/// `missingtitle` (the page does not exist and `nocreate` was set) is an
/// ordinary API error here.
pub fn check_edit_response(page_title: &str, body: &Value) -> std::result::Result<(), EditFailure> {
    if let Some(code) = body["error"]["code"].as_str() {
        if code == "badtoken" {
            return Err(EditFailure::BadToken);
        }
        return Err(EditFailure::Api(api_error_text(body)));
    }

    match body["edit"]["result"].as_str() {
        Some("Success") => {
            if body["edit"]["nochange"].as_bool().unwrap_or(false) {
                tracing::debug!("{} already up to date", page_title);
            }
            Ok(())
        }
        Some(other) => Err(EditFailure::Api(format!("edit result {}", other))),
        None => Err(EditFailure::Api(format!("unexpected edit response: {}", body))),
    }
}

fn api_error_text(body: &Value) -> String {
    match (body["error"]["code"].as_str(), body["error"]["info"].as_str()) {
        (Some(code), Some(info)) => format!("{}: {}", code, info),
        (Some(code), None) => code.to_string(),
        _ => body.to_string(),
    }
}
