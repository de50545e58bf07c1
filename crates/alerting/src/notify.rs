//! Notification dispatch
//!
//! Wording comes from a remote text service, bounded by a timeout and
//! replaced by a canned message on any failure. An audio cue plays alongside.
//! Both run as detached tasks on the tokio runtime; the caller never waits.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::report::StatusReport;
use crate::NotifyError;

/// Upper bound for the text service timeout
pub const MAX_TIMEOUT_MS: u64 = 5000;

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Chat-completions endpoint
    pub endpoint: String,
    /// Bearer key; without one the canned message is always used
    pub api_key: Option<String>,
    pub model: String,
    /// Text service timeout, at most 5000
    pub timeout_ms: u64,
    /// Message used when the service fails or times out
    pub fallback_message: String,
    /// Reported vehicle speed (no vehicle bus integration)
    pub vehicle_speed_kmh: f64,
    pub beep_frequency_hz: u32,
    pub beep_duration_ms: u64,
    pub beep_repeat: u32,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepseek.com/v1/chat/completions".to_string(),
            api_key: None,
            model: "deepseek-chat".to_string(),
            timeout_ms: MAX_TIMEOUT_MS,
            fallback_message: "Please drive safely. If you feel tired, take a break.".to_string(),
            vehicle_speed_kmh: 80.0,
            beep_frequency_hz: 1000,
            beep_duration_ms: 500,
            beep_repeat: 1,
        }
    }
}

/// Remote service producing the alert wording
pub trait TextAlertService: Send + Sync + 'static {
    fn compose(&self, report: &StatusReport) -> impl Future<Output = Result<String, NotifyError>> + Send;
}

/// Audio beep primitive; blocks for the duration of the tone
pub trait AudioCue: Send + Sync + 'static {
    fn beep(&self, frequency_hz: u32, duration_ms: u64);
}

/// OpenAI-compatible chat-completions client
pub struct HttpTextService {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl HttpTextService {
    pub fn new(config: &NotifyConfig, api_key: String) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
        })
    }
}

impl TextAlertService for HttpTextService {
    async fn compose(&self, report: &StatusReport) -> Result<String, NotifyError> {
        let prompt = report.prompt();
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: 0.7,
            max_tokens: 100,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        parse_completion(&body)
    }
}

/// Extract `choices[0].message.content`
fn parse_completion(body: &[u8]) -> Result<String, NotifyError> {
    let response: ChatResponse =
        serde_json::from_slice(body).map_err(|e| NotifyError::Malformed(e.to_string()))?;

    let content = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| NotifyError::Malformed("no choices".into()))?
        .message
        .content
        .ok_or_else(|| NotifyError::Malformed("choice without content".into()))?;

    let text = content.trim();
    if text.is_empty() {
        return Err(NotifyError::Empty);
    }
    Ok(text.to_string())
}

/// Offline wording: always answers with a fixed message
pub struct CannedTextService {
    message: String,
}

impl CannedTextService {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl TextAlertService for CannedTextService {
    async fn compose(&self, _report: &StatusReport) -> Result<String, NotifyError> {
        Ok(self.message.clone())
    }
}

/// Text backend picked at startup
pub enum TextBackend {
    Http(HttpTextService),
    Canned(CannedTextService),
}

impl TextAlertService for TextBackend {
    async fn compose(&self, report: &StatusReport) -> Result<String, NotifyError> {
        match self {
            Self::Http(service) => service.compose(report).await,
            Self::Canned(service) => service.compose(report).await,
        }
    }
}

/// Rings the terminal bell and holds for the tone duration
pub struct TerminalBell;

impl AudioCue for TerminalBell {
    fn beep(&self, frequency_hz: u32, duration_ms: u64) {
        debug!("Beep {} Hz for {} ms", frequency_hz, duration_ms);
        let mut stderr = std::io::stderr();
        if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
            debug!("Terminal bell unavailable: {}", e);
        }
        std::thread::sleep(Duration::from_millis(duration_ms));
    }
}

/// Receiver of dispatch requests from the processing loop
pub trait AlertSink: Send {
    /// Start a notification; must not block
    fn dispatch(&self, report: StatusReport);

    /// Most recent generated message
    fn latest_message(&self) -> Option<String>;
}

/// Fire-and-forget notification dispatcher
pub struct NotificationDispatcher<T, A> {
    service: Arc<T>,
    audio: Arc<A>,
    config: NotifyConfig,
    runtime: Handle,
    latest: Arc<watch::Sender<Option<String>>>,
}

impl<T: TextAlertService, A: AudioCue> NotificationDispatcher<T, A> {
    /// Tasks are spawned on `runtime`, so dispatch works from plain threads
    pub fn new(service: T, audio: A, config: NotifyConfig, runtime: Handle) -> Self {
        let (latest, _) = watch::channel(None);
        info!(
            "Notification dispatcher: timeout {} ms, beep {} Hz x {} ms x{}",
            config.timeout_ms, config.beep_frequency_hz, config.beep_duration_ms, config.beep_repeat
        );
        Self {
            service: Arc::new(service),
            audio: Arc::new(audio),
            config,
            runtime,
            latest: Arc::new(latest),
        }
    }

    /// Start the audio cue and message generation; resolves to the final message
    pub fn spawn_notification(&self, report: StatusReport) -> JoinHandle<String> {
        metrics::counter!("alerts_dispatched_total").increment(1);

        let audio = Arc::clone(&self.audio);
        let (frequency, duration, repeat) = (
            self.config.beep_frequency_hz,
            self.config.beep_duration_ms,
            self.config.beep_repeat,
        );
        self.runtime.spawn_blocking(move || {
            for _ in 0..repeat {
                audio.beep(frequency, duration);
            }
        });

        let service = Arc::clone(&self.service);
        let latest = Arc::clone(&self.latest);
        let limit = Duration::from_millis(self.config.timeout_ms.min(MAX_TIMEOUT_MS));
        let fallback = self.config.fallback_message.clone();

        self.runtime.spawn(async move {
            let message = match timeout(limit, service.compose(&report)).await {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    warn!("Text service failed, using fallback: {}", e);
                    metrics::counter!("notification_fallbacks_total").increment(1);
                    fallback
                }
                Err(_) => {
                    warn!("Text service timed out after {:?}, using fallback", limit);
                    metrics::counter!("notification_fallbacks_total").increment(1);
                    fallback
                }
            };

            info!("Alert message: {}", message);
            latest.send_replace(Some(message.clone()));
            message
        })
    }

    /// Follow generated messages
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.latest.subscribe()
    }
}

impl<T: TextAlertService, A: AudioCue> AlertSink for NotificationDispatcher<T, A> {
    fn dispatch(&self, report: StatusReport) {
        drop(self.spawn_notification(report));
    }

    fn latest_message(&self) -> Option<String> {
        self.latest.borrow().clone()
    }
}
