//! Minimal W3C WebDriver client.
//!
//! Speaks the JSON wire protocol of chromedriver/geckodriver over reqwest and
//! covers only what the browser-backed generators need: sessions, navigation,
//! element lookup, clicks, typing and screenshots.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

/// Key under which W3C drivers return element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735a6f5e4b";

const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How often element lookups are retried while waiting.
pub const FIND_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Errors from the WebDriver client and the flows built on it.
#[derive(Debug, thiserror::Error)]
pub enum WebDriverError {
    #[error("login email and password are required")]
    MissingCredentials,

    #[error("WebDriver request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebDriver error '{error}': {message}")]
    Protocol { error: String, message: String },

    #[error("unexpected WebDriver response: {0}")]
    UnexpectedResponse(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("{0}")]
    StepFailed(String),

    #[error("browser session exceeded {secs}s")]
    SessionTimeout { secs: u64 },

    #[error("invalid screenshot data: {0}")]
    Screenshot(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WebDriverError {
    fn is_no_such_element(&self) -> bool {
        matches!(self, WebDriverError::Protocol { error, .. } if error == "no such element")
    }
}

/// How to locate an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Locator::XPath(expression.into())
    }

    fn strategy(&self) -> (&'static str, &str) {
        match self {
            Locator::Css(s) => ("css selector", s),
            Locator::XPath(s) => ("xpath", s),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (using, value) = self.strategy();
        write!(f, "{} '{}'", using, value)
    }
}

/// Reference to an element inside a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn id(&self) -> &str {
        &self.0
    }

    fn from_value(value: &Value) -> Result<Self, WebDriverError> {
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| ElementRef(id.to_string()))
            .ok_or_else(|| WebDriverError::UnexpectedResponse(format!("no element in {}", value)))
    }
}

/// Browser options for a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub headless: bool,
    pub window: (u32, u32),
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            headless: false,
            window: (1920, 1080),
        }
    }
}

impl SessionOptions {
    pub fn headless(headless: bool) -> Self {
        Self {
            headless,
            ..Self::default()
        }
    }

    fn capabilities(&self) -> Value {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-setuid-sandbox".to_string(),
            format!("--window-size={},{}", self.window.0, self.window.1),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

/// Connection to a WebDriver endpoint.
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    endpoint: String,
    http_client: reqwest::Client,
}

impl WebDriverClient {
    pub fn new(endpoint: &str) -> Result<Self, WebDriverError> {
        let http_client = reqwest::Client::builder()
            .timeout(COMMAND_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn command(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, WebDriverError> {
        let url = format!("{}{}", self.endpoint, path);
        let mut request = self.http_client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        let payload: Value = response.json().await?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(match serde_json::from_value::<WireError>(value) {
                Ok(wire) => WebDriverError::Protocol {
                    error: wire.error,
                    message: wire.message,
                },
                Err(_) => WebDriverError::UnexpectedResponse(format!("HTTP {}", status)),
            });
        }
        Ok(value)
    }

    /// Open a new browser session.
    pub async fn start_session(&self, options: SessionOptions) -> Result<Session, WebDriverError> {
        let value = self
            .command(reqwest::Method::POST, "/session", Some(options.capabilities()))
            .await?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| WebDriverError::UnexpectedResponse("missing sessionId".to_string()))?;
        log::info!("WebDriver session {} started", id);
        Ok(Session {
            client: self.clone(),
            id: id.to_string(),
        })
    }
}

/// An open browser session.
///
/// Must be closed with [`Session::delete`]; dropping it leaves the browser
/// running on the WebDriver side.
#[derive(Debug)]
pub struct Session {
    client: WebDriverClient,
    id: String,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, WebDriverError> {
        self.client
            .command(
                reqwest::Method::POST,
                &format!("/session/{}{}", self.id, path),
                Some(body),
            )
            .await
    }

    async fn get(&self, path: &str) -> Result<Value, WebDriverError> {
        self.client
            .command(
                reqwest::Method::GET,
                &format!("/session/{}{}", self.id, path),
                None,
            )
            .await
    }

    pub async fn navigate(&self, url: &str) -> Result<(), WebDriverError> {
        log::debug!("Navigating to {}", url);
        self.post("/url", json!({ "url": url })).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String, WebDriverError> {
        let value = self.get("/url").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WebDriverError::UnexpectedResponse("url is not a string".to_string()))
    }

    /// Look an element up once. `Ok(None)` when it does not exist.
    pub async fn try_find(&self, locator: &Locator) -> Result<Option<ElementRef>, WebDriverError> {
        let (using, value) = locator.strategy();
        match self
            .post("/element", json!({ "using": using, "value": value }))
            .await
        {
            Ok(found) => ElementRef::from_value(&found).map(Some),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Wait up to `timeout` for the first of `locators` to exist.
    ///
    /// Every locator is tried once per round, in order.
    pub async fn find_first_of(
        &self,
        locators: &[Locator],
        timeout: Duration,
    ) -> Result<Option<ElementRef>, WebDriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            for locator in locators {
                if let Some(element) = self.try_find(locator).await? {
                    log::debug!("Found {}", locator);
                    return Ok(Some(element));
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(FIND_POLL_INTERVAL).await;
        }
    }

    /// Like [`Session::find_first_of`] with a single locator, failing when absent.
    pub async fn wait_for(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementRef, WebDriverError> {
        self.find_first_of(std::slice::from_ref(locator), timeout)
            .await?
            .ok_or_else(|| WebDriverError::ElementNotFound(locator.to_string()))
    }

    pub async fn click(&self, element: &ElementRef) -> Result<(), WebDriverError> {
        self.post(&format!("/element/{}/click", element.id()), json!({}))
            .await?;
        Ok(())
    }

    pub async fn clear(&self, element: &ElementRef) -> Result<(), WebDriverError> {
        self.post(&format!("/element/{}/clear", element.id()), json!({}))
            .await?;
        Ok(())
    }

    /// Type `text` into an element. For file inputs `text` is a local path.
    pub async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), WebDriverError> {
        self.post(
            &format!("/element/{}/value", element.id()),
            json!({ "text": text }),
        )
        .await?;
        Ok(())
    }

    /// PNG screenshot of the viewport.
    pub async fn screenshot(&self) -> Result<Vec<u8>, WebDriverError> {
        let value = self.get("/screenshot").await?;
        let encoded = value.as_str().ok_or_else(|| {
            WebDriverError::UnexpectedResponse("screenshot is not a string".to_string())
        })?;
        Ok(base64::engine::general_purpose::STANDARD.decode(encoded)?)
    }

    /// Close the browser and end the session.
    pub async fn delete(self) -> Result<(), WebDriverError> {
        self.client
            .command(
                reqwest::Method::DELETE,
                &format!("/session/{}", self.id),
                None,
            )
            .await?;
        log::info!("WebDriver session {} closed", self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_display() {
        assert_eq!(
            Locator::css("textarea").to_string(),
            "css selector 'textarea'"
        );
        assert_eq!(
            Locator::xpath("//button").to_string(),
            "xpath '//button'"
        );
    }

    #[test]
    fn test_headless_capabilities() {
        let caps = SessionOptions::headless(true).capabilities();
        let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap();
        assert!(args.iter().any(|a| a == "--headless=new"));
        assert!(args.iter().any(|a| a == "--window-size=1920,1080"));

        let caps = SessionOptions::headless(false).capabilities();
        let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap();
        assert!(!args.iter().any(|a| a == "--headless=new"));
    }

    #[test]
    fn test_element_ref_from_value() {
        let value = json!({ ELEMENT_KEY: "abc-123" });
        assert_eq!(ElementRef::from_value(&value).unwrap().id(), "abc-123");
        assert!(ElementRef::from_value(&json!({})).is_err());
    }

    #[test]
    fn test_no_such_element_detection() {
        let err = WebDriverError::Protocol {
            error: "no such element".to_string(),
            message: "gone".to_string(),
        };
        assert!(err.is_no_such_element());
        assert!(!WebDriverError::StepFailed("x".to_string()).is_no_such_element());
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let client = WebDriverClient::new("http://localhost:9515/").unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9515");
    }
}
