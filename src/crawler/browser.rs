//! Headless Chromium fetch backend
//!
//! Each page gets a fresh tab. While it loads, network responses and console errors
//! are collected from CDP events; once the load event fired and the network has been
//! quiet for a short period, the DOM is serialized.

use crate::crawler::fetcher::{
    within_navigation_timeout, FetchError, FetchOptions, FetchedPage, PageFetcher,
};
use crate::crawler::{ResourceInfo, ResourceKind};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EventConsoleApiCalled, EventExceptionThrown,
};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use url::Url;

/// Network silence required before the DOM is considered settled
const NETWORK_QUIET: Duration = Duration::from_millis(500);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

#[derive(Debug, Clone)]
struct ObservedResponse {
    url: String,
    resource_type: ResourceType,
    status: u16,
    headers: BTreeMap<String, String>,
    size: u64,
}

#[derive(Debug, Default)]
struct Observations {
    responses: Vec<ObservedResponse>,
    console_errors: Vec<String>,
    last_activity: Option<Instant>,
}

type SharedObservations = Arc<Mutex<Observations>>;

/// Aborts the event listener tasks when dropped
struct ListenerTasks(Vec<JoinHandle<()>>);

impl Drop for ListenerTasks {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

/// Fetches pages through a headless Chromium instance
pub struct BrowserFetcher {
    navigation_timeout: Duration,
    user_agent: String,
    session: Option<BrowserSession>,
}

impl BrowserFetcher {
    /// Creates an uninitialized fetcher; call [`PageFetcher::initialize`] before use
    ///
    /// The Chromium executable is taken from `CHROMIUM_PATH` when set, otherwise
    /// chromiumoxide's own lookup applies.
    pub fn new(user_agent: impl Into<String>, navigation_timeout: Duration) -> Self {
        Self {
            navigation_timeout,
            user_agent: user_agent.into(),
            session: None,
        }
    }

    async fn load(
        &self,
        page: &Page,
        url: &Url,
        options: &FetchOptions,
    ) -> Result<FetchedPage, FetchError> {
        let observed: SharedObservations = Arc::default();
        let _listeners = spawn_listeners(page, &observed).await?;

        let start = Instant::now();
        page.goto(url.as_str()).await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        page.wait_for_navigation()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        wait_for_network_quiet(&observed, start + self.navigation_timeout).await;
        let load_time = start.elapsed().as_millis() as u64;

        let html = page.content().await.map_err(browser_error)?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());

        let screenshot = if options.take_screenshot {
            match page
                .screenshot(ScreenshotParams::builder().full_page(true).build())
                .await
            {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!("Screenshot of {} failed: {}", final_url, e);
                    None
                }
            }
        } else {
            None
        };

        let (responses, console_errors) = match observed.lock() {
            Ok(mut guard) => (
                std::mem::take(&mut guard.responses),
                std::mem::take(&mut guard.console_errors),
            ),
            Err(_) => (Vec::new(), Vec::new()),
        };

        let document = responses
            .iter()
            .find(|r| r.resource_type == ResourceType::Document && r.url == final_url.as_str())
            .or_else(|| {
                responses
                    .iter()
                    .find(|r| r.resource_type == ResourceType::Document)
            });
        let (status_code, headers) = match document {
            Some(doc) => (doc.status, doc.headers.clone()),
            None => {
                tracing::debug!("No document response observed for {}", final_url);
                (200, BTreeMap::new())
            }
        };

        let resources = responses
            .into_iter()
            .map(|r| ResourceInfo::new(resource_kind(&r.resource_type), r.url, r.size))
            .collect();

        Ok(FetchedPage {
            final_url,
            status_code,
            headers,
            html,
            load_time,
            resources,
            console_errors,
            screenshot,
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn initialize(&mut self) -> Result<(), FetchError> {
        if self.session.is_some() {
            return Ok(());
        }

        let mut builder = BrowserConfig::builder()
            .request_timeout(self.navigation_timeout)
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg(format!("--user-agent={}", self.user_agent));
        if let Ok(path) = std::env::var("CHROMIUM_PATH") {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(FetchError::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(browser_error)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("Browser handler event error: {}", e);
                }
            }
        });

        tracing::info!("Headless browser launched");
        self.session = Some(BrowserSession { browser, handler });
        Ok(())
    }

    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<FetchedPage, FetchError> {
        let session = self.session.as_ref().ok_or(FetchError::NotInitialized)?;
        let page = session
            .browser
            .new_page("about:blank")
            .await
            .map_err(browser_error)?;

        let load = self.load(&page, url, options);
        let result = within_navigation_timeout(url, self.navigation_timeout, load).await;

        if let Err(e) = page.close().await {
            tracing::debug!("Closing tab for {} failed: {}", url, e);
        }
        result
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        if let Err(e) = session.browser.close().await {
            tracing::warn!("Browser did not close cleanly: {}", e);
        }
        if let Err(e) = session.browser.wait().await {
            tracing::debug!("Waiting for browser exit failed: {}", e);
        }
        session.handler.abort();
        tracing::info!("Headless browser closed");
        Ok(())
    }
}

async fn spawn_listeners(
    page: &Page,
    observed: &SharedObservations,
) -> Result<ListenerTasks, FetchError> {
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(browser_error)?;
    let mut console = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .map_err(browser_error)?;
    let mut exceptions = page
        .event_listener::<EventExceptionThrown>()
        .await
        .map_err(browser_error)?;

    let on_response = {
        let observed = Arc::clone(observed);
        tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                let headers = cdp_headers(event.response.headers.inner());
                let size = headers
                    .get("content-length")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(0);
                let response = ObservedResponse {
                    url: event.response.url.clone(),
                    resource_type: event.r#type.clone(),
                    status: u16::try_from(event.response.status).unwrap_or(0),
                    headers,
                    size,
                };
                if let Ok(mut guard) = observed.lock() {
                    guard.responses.push(response);
                    guard.last_activity = Some(Instant::now());
                }
            }
        })
    };

    let on_console = {
        let observed = Arc::clone(observed);
        tokio::spawn(async move {
            while let Some(event) = console.next().await {
                if event.r#type != ConsoleApiCalledType::Error {
                    continue;
                }
                let text = event
                    .args
                    .iter()
                    .filter_map(|arg| match &arg.value {
                        Some(serde_json::Value::String(s)) => Some(s.clone()),
                        Some(other) => Some(other.to_string()),
                        None => arg.description.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                if let Ok(mut guard) = observed.lock() {
                    guard.console_errors.push(text);
                }
            }
        })
    };

    let on_exception = {
        let observed = Arc::clone(observed);
        tokio::spawn(async move {
            while let Some(event) = exceptions.next().await {
                let details = &event.exception_details;
                let text = details
                    .exception
                    .as_ref()
                    .and_then(|e| e.description.clone())
                    .unwrap_or_else(|| details.text.clone());
                if let Ok(mut guard) = observed.lock() {
                    guard.console_errors.push(text);
                }
            }
        })
    };

    Ok(ListenerTasks(vec![on_response, on_console, on_exception]))
}

/// Waits until no response has arrived for [`NETWORK_QUIET`], or until `deadline`
async fn wait_for_network_quiet(observed: &SharedObservations, deadline: Instant) {
    let mut quiet_since = Instant::now();
    loop {
        let now = Instant::now();
        if now >= deadline {
            tracing::debug!("Network never went quiet before the navigation deadline");
            return;
        }

        let last = observed.lock().ok().and_then(|guard| guard.last_activity);
        if let Some(last) = last {
            if last > quiet_since {
                quiet_since = last;
            }
        }
        if now.duration_since(quiet_since) >= NETWORK_QUIET {
            return;
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn cdp_headers(value: &serde_json::Value) -> BTreeMap<String, String> {
    let Some(object) = value.as_object() else {
        return BTreeMap::new();
    };
    object
        .iter()
        .map(|(name, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.to_ascii_lowercase(), value)
        })
        .collect()
}

fn resource_kind(resource_type: &ResourceType) -> ResourceKind {
    match resource_type {
        ResourceType::Image => ResourceKind::Image,
        ResourceType::Script => ResourceKind::Script,
        ResourceType::Stylesheet => ResourceKind::Stylesheet,
        ResourceType::Font => ResourceKind::Font,
        _ => ResourceKind::Other,
    }
}

fn browser_error(e: impl std::fmt::Display) -> FetchError {
    FetchError::Browser(e.to_string())
}
