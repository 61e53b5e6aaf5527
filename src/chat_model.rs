//! The model handle the chat loop talks to.
//!
//! [`LanguageModel`] is the seam between the loop and the provider: one
//! `invoke` per turn, with a [`StreamObserver`] receiving fragments while the
//! call is in flight. [`ChatGemini`] implements it on top of the [`Gemini`]
//! client.

use futures::Stream;
use futures::stream::StreamExt;

use crate::chat::ChatConfig;
use crate::observability::CHAT_FRAGMENTS;
use crate::types::{
    Content, FinishReason, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    Model, UsageMetadata,
};
use crate::{Error, Gemini, Result};

/// Receives incremental text and a completion signal during a model call.
///
/// Callbacks arrive in delivery order: zero or more `on_fragment`, then
/// exactly one of `on_stream_end` (success) or `on_stream_error` (failure).
pub trait StreamObserver: Send {
    /// Called for every text fragment as it arrives.
    fn on_fragment(&mut self, fragment: &str);

    /// Called once after the last fragment of a successful call.
    fn on_stream_end(&mut self);

    /// Called once when the call fails, instead of `on_stream_end`.
    fn on_stream_error(&mut self, error: &Error) {
        _ = error;
    }
}

/// The final result of a model call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiMessage {
    /// The complete response text.
    pub content: String,

    /// Why generation stopped, if the API said.
    pub finish_reason: Option<FinishReason>,

    /// Token usage, if reported.
    pub usage: Option<UsageMetadata>,

    /// The model version that served the call.
    pub model_version: Option<String>,
}

impl AiMessage {
    /// Create a message holding only text.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Fold one response (or stream chunk) into this message.
    ///
    /// Text is appended; finish reason, usage and model version are replaced
    /// by the latest chunk that carries them.
    pub fn absorb(&mut self, response: &GenerateContentResponse) -> Result<()> {
        if let Some(reason) = response.block_reason() {
            return Err(Error::blocked(reason));
        }
        for text in response.text_parts() {
            self.content.push_str(text);
        }
        if let Some(reason) = response.finish_reason() {
            self.finish_reason = Some(reason);
        }
        if let Some(usage) = response.usage_metadata {
            self.usage = Some(usage);
        }
        if let Some(version) = &response.model_version {
            self.model_version = Some(version.clone());
        }
        Ok(())
    }
}

/// A chat model that answers a list of messages.
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send `messages` to the model and return its reply.
    ///
    /// Blocks until the call completes; `observer` sees every fragment
    /// before this returns.
    async fn invoke(
        &self,
        messages: Vec<Content>,
        observer: &mut dyn StreamObserver,
    ) -> Result<AiMessage>;
}

/// A Gemini chat model with fixed sampling settings.
#[derive(Debug, Clone)]
pub struct ChatGemini {
    client: Gemini,
    model: Model,
    temperature: Option<f32>,
    streaming: bool,
}

impl ChatGemini {
    /// Create a streaming model handle with the API's default temperature.
    pub fn new(client: Gemini, model: Model) -> Self {
        Self {
            client,
            model,
            temperature: None,
            streaming: true,
        }
    }

    /// Create a model handle from a chat configuration.
    pub fn from_config(client: Gemini, config: &ChatConfig) -> Self {
        Self::new(client, config.model.clone())
            .with_temperature(Some(config.temperature))
            .with_streaming(config.streaming)
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Enable or disable streaming.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// The model identifier.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The sampling temperature, if set.
    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    /// Whether responses are streamed.
    pub fn streaming(&self) -> bool {
        self.streaming
    }

    fn request(&self, messages: Vec<Content>) -> GenerateContentRequest {
        let mut config = GenerationConfig::new();
        config.temperature = self.temperature;
        GenerateContentRequest::new(messages).with_generation_config(config)
    }

    async fn invoke_streaming(
        &self,
        request: &GenerateContentRequest,
        observer: &mut dyn StreamObserver,
    ) -> Result<AiMessage> {
        let stream = self.client.stream(&self.model, request).await?;
        consume_stream(stream, observer).await
    }

    async fn invoke_blocking(
        &self,
        request: &GenerateContentRequest,
        observer: &mut dyn StreamObserver,
    ) -> Result<AiMessage> {
        let response = self.client.send(&self.model, request).await?;
        let mut message = AiMessage::default();
        message.absorb(&response)?;
        observer.on_stream_end();
        Ok(message)
    }
}

#[async_trait::async_trait]
impl LanguageModel for ChatGemini {
    async fn invoke(
        &self,
        messages: Vec<Content>,
        observer: &mut dyn StreamObserver,
    ) -> Result<AiMessage> {
        let request = self.request(messages);
        let result = if self.streaming {
            self.invoke_streaming(&request, observer).await
        } else {
            self.invoke_blocking(&request, observer).await
        };
        if let Err(err) = &result {
            observer.on_stream_error(err);
        }
        result
    }
}

/// Drain a chunk stream, forwarding every text part to `observer`.
///
/// Calls `on_stream_end` once the stream is exhausted; on the first error the
/// error is returned and the end signal is not sent.
///
/// ```
/// use futures::stream;
/// use geminius::{GenerateContentResponse, TokenAccumulator, consume_stream};
///
/// # tokio_test::block_on(async {
/// let chunk: GenerateContentResponse = serde_json::from_str(
///     r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hi"}]}}]}"#,
/// )
/// .unwrap();
/// let mut acc = TokenAccumulator::with_writer(Vec::new());
/// let message = consume_stream(stream::iter(vec![Ok(chunk)]), &mut acc)
///     .await
///     .unwrap();
/// assert_eq!(message.content, "Hi");
/// assert_eq!(acc.writer().as_slice(), b"Hi\nAI Response:\nHi\n\n");
/// # });
/// ```
pub async fn consume_stream<S>(stream: S, observer: &mut dyn StreamObserver) -> Result<AiMessage>
where
    S: Stream<Item = Result<GenerateContentResponse>>,
{
    futures::pin_mut!(stream);
    let mut message = AiMessage::default();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        message.absorb(&chunk)?;
        for fragment in chunk.text_parts().filter(|text| !text.is_empty()) {
            CHAT_FRAGMENTS.click();
            observer.on_fragment(fragment);
        }
    }
    observer.on_stream_end();
    Ok(message)
}
