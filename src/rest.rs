use crate::client::{create_rest_client, Config};
use crate::credential::{Credential, CredentialStore};
use crate::dto::{ApiDto, Body, FormField};
use crate::error::{CanvasError, Result};
use crate::pagination::Paginator;
use crate::refresh::TokenRefresher;
use crate::response::Response;
use crate::token::OAuthToken;
use chrono::Utc;
use reqwest::blocking::multipart::Form;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// A single API call: method, path, query and optional body
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path below the API prefix, or an absolute URL
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Body>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        RequestDescriptor {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Append `key[]=value` for each value, e.g. `include[]=term`
    pub fn query_list<I, V>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let name = format!("{}[]", key.trim_end_matches("[]"));
        self.query
            .extend(values.into_iter().map(|v| (name.clone(), v.to_string())));
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach a DTO as a JSON body; fails if the DTO does not validate
    pub fn json<D: ApiDto>(self, dto: &D) -> Result<Self> {
        Ok(self.body(Body::Json(dto.to_json()?)))
    }

    /// Attach a DTO as a multipart body; fails if the DTO does not validate
    pub fn multipart<D: ApiDto>(self, dto: &D) -> Result<Self> {
        Ok(self.body(Body::Multipart(dto.to_api_array()?)))
    }
}

/// Outcome of one dispatch; only `Retryable` may lead to a refresh and retry
enum Dispatch {
    Success(Response),
    Retryable(CanvasError),
    Fatal(CanvasError),
}

/// Client for the Canvas REST API.
///
/// Cheap to share across threads; the credential store is shared with every
/// clone and with anyone holding the `Arc`.
#[derive(Debug, Clone)]
pub struct CanvasClient {
    http: Client,
    config: Config,
    credentials: Arc<CredentialStore>,
    refresher: TokenRefresher,
}

impl CanvasClient {
    /// Create a client using the given configuration and credential store
    pub fn new(config: Config, credentials: Arc<CredentialStore>) -> Result<Self> {
        let http = create_rest_client(&config)?;
        let refresher = TokenRefresher::new(http.clone(), config.clone());
        Ok(CanvasClient {
            http,
            config,
            credentials,
            refresher,
        })
    }

    /// Client authenticating with a static API key
    pub fn with_api_key(config: Config, key: impl Into<String>) -> Result<Self> {
        Self::new(config, Arc::new(CredentialStore::with_api_key(key.into())))
    }

    /// Client authenticating with an OAuth token pair
    pub fn with_oauth_token(config: Config, token: OAuthToken) -> Result<Self> {
        Self::new(config, Arc::new(CredentialStore::with_oauth_token(token)))
    }

    /// Client configured from `CANVAS_*` environment variables.
    ///
    /// `CANVAS_API_KEY` selects key auth; otherwise `CANVAS_OAUTH_ACCESS_TOKEN`
    /// and `CANVAS_OAUTH_REFRESH_TOKEN` select OAuth.
    pub fn from_env() -> Result<Self> {
        let config = Config::from_env();
        let store = CredentialStore::new();

        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        if let Some(key) = var("CANVAS_API_KEY") {
            store.set_api_key(key);
        } else if let Some(access) = var("CANVAS_OAUTH_ACCESS_TOKEN") {
            let refresh = var("CANVAS_OAUTH_REFRESH_TOKEN").unwrap_or_default();
            store.set_oauth_token(OAuthToken::new(access, refresh, None));
        }

        Self::new(config, Arc::new(store))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Execute a request and return the raw successful response.
    ///
    /// Fails before any network I/O when the base URL or credential is missing.
    /// An expired OAuth token is refreshed before dispatch; a token rejected as
    /// expired by Canvas is refreshed and the request retried, at most once per call.
    pub fn execute(&self, descriptor: &RequestDescriptor) -> Result<Response> {
        let url = self.build_url(descriptor)?;
        let mut credential = self.credentials.current_credential()?;
        let mut refreshed = false;

        if credential.is_stale_at(Utc::now()) {
            tracing::debug!("OAuth access token expired, refreshing before dispatch");
            credential = self.refresh(&credential)?;
            refreshed = true;
        }

        loop {
            match self.dispatch(&url, descriptor, &credential) {
                Dispatch::Success(response) => return Ok(response),
                Dispatch::Retryable(err) if !refreshed => {
                    tracing::debug!(error = %err, "access token rejected, refreshing and retrying");
                    credential = self.refresh(&credential)?;
                    refreshed = true;
                }
                Dispatch::Retryable(err) | Dispatch::Fatal(err) => return Err(err),
            }
        }
    }

    /// Execute a request and decode the JSON body into the target type
    pub fn request<T>(&self, descriptor: &RequestDescriptor) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.execute(descriptor)?.json()
    }

    /// Execute a collection request: the first page is fetched now, later
    /// pages as the returned iterator is consumed
    pub fn execute_collection<T>(&self, descriptor: &RequestDescriptor) -> Result<Paginator<'_, T>>
    where
        T: DeserializeOwned,
    {
        let url = self.build_url(descriptor)?;
        let first = self.execute(descriptor)?;
        Paginator::from_response(self, &url, first)
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(&RequestDescriptor::get(path))
    }

    /// All items of a collection endpoint
    pub fn list<T: DeserializeOwned>(&self, path: &str) -> Result<Paginator<'_, T>> {
        self.execute_collection(&RequestDescriptor::get(path))
    }

    /// POST a DTO as multipart form data
    pub fn post<T: DeserializeOwned, D: ApiDto>(&self, path: &str, dto: &D) -> Result<T> {
        self.request(&RequestDescriptor::post(path).multipart(dto)?)
    }

    /// PUT a DTO as multipart form data
    pub fn put<T: DeserializeOwned, D: ApiDto>(&self, path: &str, dto: &D) -> Result<T> {
        self.request(&RequestDescriptor::put(path).multipart(dto)?)
    }

    pub fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(&RequestDescriptor::delete(path))
    }

    fn build_url(&self, descriptor: &RequestDescriptor) -> Result<Url> {
        let mut url = self.config.endpoint_url(&descriptor.path)?;

        if !descriptor.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&descriptor.query);
        }
        if let Some(per_page) = self.config.per_page {
            let has_per_page = url.query_pairs().any(|(k, _)| k == "per_page");
            if descriptor.method == Method::GET && !has_per_page {
                url.query_pairs_mut().append_pair("per_page", &per_page.to_string());
            }
        }

        Ok(url)
    }

    fn refresh(&self, credential: &Credential) -> Result<Credential> {
        match credential {
            Credential::OAuth(token) => self
                .refresher
                .ensure_fresh_token(&self.credentials, token)
                .map(Credential::OAuth),
            Credential::ApiKey(_) => Err(CanvasError::MissingOAuthToken),
        }
    }

    fn dispatch(
        &self,
        url: &Url,
        descriptor: &RequestDescriptor,
        credential: &Credential,
    ) -> Dispatch {
        let mut request = self
            .http
            .request(descriptor.method.clone(), url.clone())
            .bearer_auth(credential.bearer())
            .header(ACCEPT, "application/json");

        match &descriptor.body {
            Some(Body::Json(value)) => request = request.json(value),
            Some(Body::Multipart(fields)) => request = request.multipart(multipart_form(fields)),
            None => {}
        }

        let start = Instant::now();
        let http_response = match request.send() {
            Ok(r) => r,
            Err(e) => return Dispatch::Fatal(CanvasError::transport(e)),
        };
        let status = http_response.status();
        let headers = http_response.headers().clone();
        let body = match http_response.bytes() {
            Ok(b) => b.to_vec(),
            Err(e) => return Dispatch::Fatal(CanvasError::transport(e)),
        };

        tracing::debug!(
            method = %descriptor.method,
            path = url.path(),
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "canvas request"
        );

        if status.is_success() {
            return Dispatch::Success(Response::new(status, headers, body));
        }

        let err = CanvasError::from_response(status, &headers, &body, credential.is_oauth());
        if err.is_retryable_auth() {
            Dispatch::Retryable(err)
        } else {
            Dispatch::Fatal(err)
        }
    }
}

fn multipart_form(fields: &[FormField]) -> Form {
    fields
        .iter()
        .fold(Form::new(), |form, field| form.text(field.name.clone(), field.contents.clone()))
}
