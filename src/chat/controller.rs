// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session controller
//!
//! Drives one chat session: sends requests, applies streamed tokens, runs the
//! tools the model asks for and recovers from capacity and connection
//! failures by retrying or switching to the provider's fallback model.
//!
//! Each public operation runs to the end of the exchange, including automatic
//! recovery and tool continuations. Errors surfaced to the user land in
//! [`SessionState::error`]; the returned `Result` only reports precondition
//! violations, thread store failures and observer errors.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

use crate::chat::observer::{NoopObserver, RecoveryKind, RecoveryNotice, SessionObserver};
use crate::chat::state::{
    ConnectionState, SessionEvent, SessionState, SessionStatus, SurfacedError,
};
use crate::chat::streaming::{StreamAccumulator, StreamEventResult};
use crate::config::Settings;
use crate::error::{ApiError, ErrorClass, ParleyError, Result};
use crate::llm::message::Message;
use crate::llm::retry::{self, RecoveryAction, RetryConfig};
use crate::llm::transport::{ChatRequest, ChatTransport, ToolCallRequest};
use crate::threads::{Thread, ThreadStore};
use crate::tools::{parse_tool_kinds, ToolKind, ToolRegistry, ToolResult};

const TARGET: &str = "parley.chat.controller";

/// Cancels the exchange in flight.
///
/// Cloneable so a UI task (or a signal handler) can hold one while the
/// controller is busy.
#[derive(Clone, Debug)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request a stop
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    fn reset(&self) {
        self.tx.send_replace(false);
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Resolves once a stop is requested
async fn stopped(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Sleep for `delay`; false if a stop arrived first
async fn wait_unless_stopped(mut rx: watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = stopped(&mut rx) => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

enum TurnOutcome {
    /// The stream ended; these tools still need to run
    Finished { tool_calls: Vec<ToolCallRequest> },
    /// The request or the stream failed
    Failed(ParleyError),
    /// A stop arrived; calls already requested still run
    Stopped { tool_calls: Vec<ToolCallRequest> },
}

/// Controller for a single chat session
pub struct SessionController {
    settings: Settings,
    retry: RetryConfig,
    transport: Arc<dyn ChatTransport>,
    tools: Arc<ToolRegistry>,
    threads: Arc<dyn ThreadStore>,
    enabled_tools: Vec<ToolKind>,
    state: SessionState,
    thread_cache: Arc<Mutex<Vec<Thread>>>,
    stop: StopHandle,
    observer: Box<dyn SessionObserver>,
    /// Attachments of the current user turn
    request_images: Vec<String>,
    /// History length carried by the most recent request
    last_request_len: Option<usize>,
}

impl SessionController {
    /// Create a controller for a fresh session
    pub fn new(
        settings: Settings,
        transport: Arc<dyn ChatTransport>,
        tools: Arc<ToolRegistry>,
        threads: Arc<dyn ThreadStore>,
    ) -> Result<Self> {
        settings.validate()?;
        let enabled_tools = parse_tool_kinds(&settings.chat.enabled_tools)?;
        let retry = RetryConfig::from(&settings.resilience);

        Ok(Self {
            settings,
            retry,
            transport,
            tools,
            threads,
            enabled_tools,
            state: SessionState::new(),
            thread_cache: Arc::new(Mutex::new(Vec::new())),
            stop: StopHandle::new(),
            observer: Box::new(NoopObserver),
            request_images: Vec::new(),
            last_request_len: None,
        })
    }

    /// Attach an observer
    pub fn with_observer(mut self, observer: impl SessionObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status
    }

    pub fn messages(&self) -> &[Message] {
        self.state.messages()
    }

    pub fn current_thread_id(&self) -> Option<&str> {
        self.state.current_thread_id.as_deref()
    }

    pub fn is_using_fallback_model(&self) -> bool {
        self.state.is_using_fallback_model()
    }

    /// Model the next request goes to
    pub fn model_id(&self) -> &str {
        self.state.model_id(&self.settings.chat.model)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Handle for stopping the exchange in flight
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Stop the exchange in flight
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Update the draft input
    pub fn set_input(&mut self, input: impl Into<String>) {
        self.state.input = input.into();
    }

    /// Send a user message and run the exchange to completion
    pub async fn submit(&mut self, text: &str) -> Result<()> {
        self.submit_with_images(text, Vec::new()).await
    }

    /// Send a user message with image attachments
    pub async fn submit_with_images(&mut self, text: &str, images: Vec<String>) -> Result<()> {
        if self.state.status.is_busy() {
            return Err(ParleyError::SessionBusy);
        }
        if text.trim().is_empty() && images.is_empty() {
            return Err(ParleyError::InvalidInput("message is empty".into()));
        }

        if self.state.fallback_pending_reset {
            tracing::info!(target: TARGET, model = %self.settings.chat.model, "returning to primary model");
            self.state.apply(SessionEvent::PrimaryRestored)?;
        }

        self.stop.reset();
        self.request_images = images;
        self.transition(SessionEvent::Submitted(Some(Message::user(text))))?;
        self.run_exchange().await
    }

    /// Resend the most recent request with the current model selection
    pub async fn reload(&mut self) -> Result<()> {
        if self.state.status.is_busy() {
            return Err(ParleyError::SessionBusy);
        }
        let len = self
            .last_request_len
            .ok_or_else(|| ParleyError::InvalidInput("there is no request to reload".into()))?;

        tracing::info!(target: TARGET, model = %self.model_id(), "reloading last request");
        self.stop.reset();
        self.state.apply(SessionEvent::Rewound { len })?;
        self.transition(SessionEvent::Submitted(None))?;
        self.run_exchange().await
    }

    /// Switch to the provider's fallback model and resend the last request.
    ///
    /// Without a previous request the switch applies to the next submit.
    pub async fn use_fallback_model(&mut self) -> Result<()> {
        if self.state.status.is_busy() {
            return Err(ParleyError::SessionBusy);
        }
        let provider = &self.settings.chat.provider;
        let model_id = self
            .settings
            .fallback_model_for(provider)
            .ok_or_else(|| {
                ParleyError::Config(format!(
                    "no fallback model configured for provider {}",
                    provider
                ))
            })?
            .to_string();

        tracing::info!(target: TARGET, model = %model_id, "switching to fallback model");
        let retries = self.state.connection_retries;
        self.state
            .apply(SessionEvent::FallbackSelected { model_id, retries })?;

        if self.last_request_len.is_none() {
            return Ok(());
        }
        self.reload().await
    }

    fn build_request(&self) -> ChatRequest {
        let chat = &self.settings.chat;
        ChatRequest::new(self.model_id(), self.state.conversation.messages.clone())
            .with_provider(chat.provider.clone())
            .with_temperature(chat.temperature)
            .with_max_tokens(chat.max_tokens)
            .with_system_prompt(chat.system_prompt.clone())
            .with_images(self.request_images.clone())
            .with_tools(self.tools.definitions(&self.enabled_tools))
            .with_middleware(chat.middleware.clone())
            .with_thread_id(self.state.current_thread_id.clone())
    }

    /// Apply a transition and report status changes
    fn transition(&mut self, event: SessionEvent) -> Result<()> {
        let before = self.state.status;
        self.state.apply(event)?;
        if self.state.status != before {
            self.observer.on_status(self.state.status)?;
        }
        Ok(())
    }

    /// Run the exchange; an error abandons it so the session stays usable
    async fn run_exchange(&mut self) -> Result<()> {
        let result = self.drive_exchange().await;
        if let Err(ref e) = result {
            if self.state.status.is_busy() {
                tracing::warn!(target: TARGET, error = %e, "abandoning exchange");
                self.state.apply(SessionEvent::Stopped)?;
            }
        }
        result
    }

    async fn drive_exchange(&mut self) -> Result<()> {
        loop {
            let request = self.build_request();
            self.last_request_len = Some(request.messages.len());
            tracing::debug!(
                target: TARGET,
                model = %request.model,
                messages = request.messages.len(),
                transport = self.transport.name(),
                "sending request"
            );

            match self.stream_turn(request).await? {
                TurnOutcome::Stopped { tool_calls } => {
                    if !tool_calls.is_empty() {
                        self.run_tools(tool_calls).await?;
                    }
                    return self.finish_stopped();
                }
                TurnOutcome::Finished { tool_calls } if !tool_calls.is_empty() => {
                    self.run_tools(tool_calls).await?;
                    if self.stop.is_stopped() {
                        return self.finish_stopped();
                    }
                    self.transition(SessionEvent::Submitted(None))?;
                }
                TurnOutcome::Finished { .. } => return self.complete(),
                TurnOutcome::Failed(error) => {
                    if !self.recover(error).await? {
                        return Ok(());
                    }
                    let len = self
                        .last_request_len
                        .unwrap_or_else(|| self.state.conversation.len());
                    self.state.apply(SessionEvent::Rewound { len })?;
                    self.transition(SessionEvent::Submitted(None))?;
                }
            }
        }
    }

    async fn stream_turn(&mut self, request: ChatRequest) -> Result<TurnOutcome> {
        let transport = self.transport.clone();
        let mut stop_rx = self.stop.subscribe();

        let response = tokio::select! {
            biased;
            _ = stopped(&mut stop_rx) => return Ok(TurnOutcome::Stopped { tool_calls: Vec::new() }),
            response = transport.send(request) => response,
        };
        let response = match response {
            Ok(response) => response,
            Err(error) => return Ok(TurnOutcome::Failed(error)),
        };

        if let Some(thread_id) = response.thread_id {
            if self.state.current_thread_id.is_none() {
                tracing::info!(target: TARGET, thread_id = %thread_id, "adopting thread id");
            }
            self.state.apply(SessionEvent::ThreadAnnounced(thread_id))?;
        }

        let mut events = response.events;
        let mut accumulator = StreamAccumulator::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = stopped(&mut stop_rx) => {
                    return Ok(TurnOutcome::Stopped {
                        tool_calls: accumulator.into_tool_calls(),
                    });
                }
                next = events.next() => next,
            };
            let event = match next {
                None => break,
                Some(Ok(event)) => event,
                Some(Err(error)) => return Ok(TurnOutcome::Failed(error)),
            };

            match accumulator.process_event(event) {
                StreamEventResult::TextDelta(text) => {
                    self.transition(SessionEvent::Token(text.clone()))?;
                    self.observer.on_token(&text)?;
                }
                StreamEventResult::ToolCall(call) => {
                    let id = call.tool_call_id.clone();
                    self.transition(SessionEvent::ToolCallRequested(call))?;
                    if let Some(call) = self.state.tool_call(&id).cloned() {
                        self.observer.on_tool_call(&call)?;
                    }
                }
                StreamEventResult::Finished(reason) => {
                    tracing::debug!(target: TARGET, ?reason, stats = ?accumulator.stats(), "turn finished");
                    break;
                }
                StreamEventResult::Error(message) => {
                    return Ok(TurnOutcome::Failed(ParleyError::Api(ApiError::StreamError(
                        message,
                    ))));
                }
            }
        }

        Ok(TurnOutcome::Finished {
            tool_calls: accumulator.into_tool_calls(),
        })
    }

    /// Run a turn's tool calls concurrently, applying results as they resolve.
    ///
    /// Each executor runs on its own task, so a panicking tool resolves its
    /// call as an error instead of unwinding through the session.
    async fn run_tools(&mut self, calls: Vec<ToolCallRequest>) -> Result<()> {
        tracing::info!(target: TARGET, tool_calls = calls.len(), "executing tool calls");

        let mut pending: FuturesUnordered<_> = calls
            .into_iter()
            .map(|call| {
                let tools = self.tools.clone();
                let id = call.tool_call_id.clone();
                let task = tokio::spawn(async move {
                    tools
                        .execute(&call.tool_call_id, &call.tool_name, call.args)
                        .await
                });
                async move {
                    task.await.unwrap_or_else(|e| {
                        tracing::error!(target: TARGET, tool_call_id = %id, error = %e, "tool task failed");
                        ToolResult::error(id, format!("tool panicked: {}", e))
                    })
                }
            })
            .collect();

        while let Some(result) = pending.next().await {
            let id = result.tool_call_id.clone();
            tracing::debug!(target: TARGET, tool_call_id = %id, is_error = result.is_error(), "tool call resolved");
            if let Err(e) = self.state.apply(SessionEvent::ToolResolved(result)) {
                tracing::warn!(target: TARGET, tool_call_id = %id, error = %e, "dropping tool result");
                continue;
            }
            if let Some(call) = self.state.tool_call(&id).cloned() {
                self.observer.on_tool_call(&call)?;
            }
        }
        Ok(())
    }

    /// Apply the recovery policy. Returns true when the request should be resent.
    async fn recover(&mut self, error: ParleyError) -> Result<bool> {
        let class = ErrorClass::classify(&error);
        let fallback = self
            .settings
            .fallback_model_for(&self.settings.chat.provider)
            .map(str::to_string);
        let action = retry::decide(
            class,
            self.state.connection_retries,
            self.state.is_using_fallback_model(),
            fallback.as_deref(),
            &self.retry,
        );

        tracing::warn!(target: TARGET, error = %error, ?class, ?action, "chat request failed");

        let (event, kind, delay) = match action {
            RecoveryAction::Surface {
                retries,
                fallback_available,
            } => {
                let surfaced = SurfacedError::new(&error, true, fallback_available);
                self.transition(SessionEvent::Failed {
                    error: surfaced.clone(),
                    retries,
                })?;
                self.observer.on_error(&surfaced)?;
                return Ok(false);
            }
            RecoveryAction::Retry {
                delay,
                retries,
                reconnect: true,
            } => (
                SessionEvent::ConnectionInterrupted { retries },
                RecoveryKind::Reconnecting,
                delay,
            ),
            RecoveryAction::Retry { delay, retries, .. } => (
                SessionEvent::RetryScheduled { retries },
                RecoveryKind::Retrying,
                delay,
            ),
            RecoveryAction::Fallback {
                model,
                delay,
                retries,
            } => (
                SessionEvent::FallbackSelected {
                    model_id: model,
                    retries,
                },
                RecoveryKind::Fallback,
                delay,
            ),
        };

        self.transition(SessionEvent::AttemptFailed)?;
        self.state.apply(event)?;

        let notice = RecoveryNotice {
            kind,
            delay,
            attempt: self.state.connection_retries,
            model: self.model_id().to_string(),
        };
        tracing::info!(
            target: TARGET,
            kind = %notice.kind,
            delay_ms = delay.as_millis() as u64,
            attempt = notice.attempt,
            model = %notice.model,
            "scheduling recovery"
        );
        self.observer.on_recovery(&notice)?;

        if !wait_unless_stopped(self.stop.subscribe(), delay).await {
            self.finish_stopped()?;
            return Ok(false);
        }
        if self.state.connection == ConnectionState::Interrupted {
            self.state.apply(SessionEvent::Reconnected)?;
        }
        Ok(true)
    }

    fn complete(&mut self) -> Result<()> {
        self.transition(SessionEvent::Completed)?;
        tracing::debug!(target: TARGET, messages = self.state.conversation.len(), "exchange complete");
        self.spawn_thread_refresh();
        Ok(())
    }

    fn finish_stopped(&mut self) -> Result<()> {
        tracing::info!(target: TARGET, "exchange stopped");
        self.transition(SessionEvent::Stopped)
    }

    /// Refresh the cached thread list in the background
    fn spawn_thread_refresh(&self) {
        let store = self.threads.clone();
        let cache = self.thread_cache.clone();
        tokio::spawn(async move {
            match store.list().await {
                Ok(threads) => *lock(&cache) = threads,
                Err(e) => {
                    tracing::warn!(target: "parley.threads", error = %e, "thread list refresh failed")
                }
            }
        });
    }

    /// Cached thread list
    pub fn threads(&self) -> Vec<Thread> {
        lock(&self.thread_cache).clone()
    }

    /// Reload the thread list and update the cache
    pub async fn refresh_threads(&mut self) -> Result<Vec<Thread>> {
        let threads = self.threads.list().await?;
        *lock(&self.thread_cache) = threads.clone();
        Ok(threads)
    }

    /// Replace the session with a saved thread
    pub async fn load_thread(&mut self, id: &str) -> Result<()> {
        if self.state.status.is_busy() {
            return Err(ParleyError::SessionBusy);
        }
        let messages = self.threads.get_messages(id).await?;
        tracing::info!(target: TARGET, thread_id = %id, messages = messages.len(), "loaded thread");
        self.replace_state(SessionState::for_thread(id, messages))
    }

    /// Start a new, unsaved session
    pub fn new_thread(&mut self) -> Result<()> {
        if self.state.status.is_busy() {
            return Err(ParleyError::SessionBusy);
        }
        self.replace_state(SessionState::new())
    }

    /// Create a named thread and switch the session to it
    pub async fn create_thread(&mut self, name: &str) -> Result<Thread> {
        if self.state.status.is_busy() {
            return Err(ParleyError::SessionBusy);
        }
        let thread = self.threads.create(name).await?;
        lock(&self.thread_cache).insert(0, thread.clone());
        self.replace_state(SessionState::for_thread(thread.id.clone(), Vec::new()))?;
        Ok(thread)
    }

    pub async fn rename_thread(&mut self, id: &str, name: &str) -> Result<Thread> {
        let thread = self.threads.rename(id, name).await?;
        if let Some(cached) = lock(&self.thread_cache).iter_mut().find(|t| t.id == id) {
            *cached = thread.clone();
        }
        Ok(thread)
    }

    /// Delete a thread; deleting the current one starts a new session
    pub async fn delete_thread(&mut self, id: &str) -> Result<()> {
        self.threads.delete(id).await?;
        lock(&self.thread_cache).retain(|t| t.id != id);
        if self.state.current_thread_id.as_deref() == Some(id) {
            tracing::info!(target: TARGET, thread_id = %id, "current thread deleted, starting new session");
            self.new_thread()?;
        }
        Ok(())
    }

    fn replace_state(&mut self, state: SessionState) -> Result<()> {
        let before = self.state.status;
        self.state = state;
        self.last_request_len = None;
        self.request_images.clear();
        if before != self.state.status {
            self.observer.on_status(self.state.status)?;
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(target: TARGET, "Thread cache lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
