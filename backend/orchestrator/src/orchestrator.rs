//! The completion orchestrator.
//!
//! Holds the active conversation, persists it after every change (streamed
//! replies on a short throttle), and decides how a user-terminated
//! conversation gets its answer: from the loaded script when the last user
//! message starts with a space, otherwise from the completion transport,
//! streamed into an assistant placeholder.

use std::sync::Arc;
use std::time::Duration;

use chatdeck_core::{
    ChatError, CompletionRequest, CompletionTransport, Configuration, ConfigurationUpdate,
    Conversation, ConversationPatch, History, Message, ModelCatalog, Role, Script,
    DEFAULT_SYSTEM_MESSAGE,
};
use chatdeck_store::{HistoryStore, ScriptStore, SCRIPT_DEFAULT_ID};
use chrono::Utc;
use futures::StreamExt;
use tokio::sync::{broadcast, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::events::OrchestratorEvent;
use crate::state::{ChatSession, SubmissionState, SubmitOutcome};

const EVENT_CAPACITY: usize = 256;

/// Minimum gap between history writes while a reply streams in. The
/// finished or failed reply is always written.
const STREAM_PERSIST_INTERVAL: Duration = Duration::from_millis(250);

/// Defaults applied to new and cleared conversations.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub system_message: String,
    pub config: Configuration,
    /// Bearer token sent with every completion request.
    pub token: String,
    /// Script loaded at [`ChatOrchestrator::init`].
    pub script_id: String,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            config: Configuration::default(),
            token: String::new(),
            script_id: SCRIPT_DEFAULT_ID.to_string(),
        }
    }
}

/// Session-scoped store of the active conversation.
///
/// Share it by `Arc`; every method takes `&self`.
pub struct ChatOrchestrator {
    session: RwLock<ChatSession>,
    history: HistoryStore,
    scripts: ScriptStore,
    transport: Arc<dyn CompletionTransport>,
    catalog: ModelCatalog,
    options: OrchestratorOptions,
    events: broadcast::Sender<OrchestratorEvent>,
}

impl ChatOrchestrator {
    pub fn new(
        history: HistoryStore,
        scripts: ScriptStore,
        transport: Arc<dyn CompletionTransport>,
        catalog: ModelCatalog,
        options: OrchestratorOptions,
    ) -> Self {
        let session = ChatSession::new(
            &options.system_message,
            options.config.clone(),
            options.token.clone(),
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            session: RwLock::new(session),
            history,
            scripts,
            transport,
            catalog,
            options,
            events,
        }
    }

    /// Load the history cache and the configured script.
    pub async fn init(&self) {
        let conversations = self.history.get();
        let script = self.scripts.get(&self.options.script_id);

        let mut session = self.session.write().await;
        info!(
            conversations = conversations.len(),
            script = %self.options.script_id,
            script_loaded = script.is_some(),
            "Initialized chat orchestrator"
        );
        session.conversations = conversations;
        session.script = script;
        session.script_position = 0;
    }

    /// Drop all working state. Persisted history is left as is.
    pub async fn shutdown(&self) {
        let mut session = self.session.write().await;
        session.reset(&self.options.system_message);
        session.conversations.clear();
        session.script = None;
        session.script_position = 0;
        session.state = SubmissionState::Idle;
        session.error.clear();
        info!("Chat orchestrator shut down");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: OrchestratorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub async fn messages(&self) -> Vec<Message> {
        self.session.read().await.messages.clone()
    }

    pub async fn system_message(&self) -> Message {
        self.session.read().await.system_message.clone()
    }

    pub async fn config(&self) -> Configuration {
        self.session.read().await.config.clone()
    }

    pub async fn conversation_id(&self) -> String {
        self.session.read().await.conversation_id.clone()
    }

    pub async fn conversation_name(&self) -> String {
        self.session.read().await.conversation_name.clone()
    }

    pub async fn conversations(&self) -> History {
        self.session.read().await.conversations.clone()
    }

    pub async fn state(&self) -> SubmissionState {
        self.session.read().await.state.clone()
    }

    pub async fn loading(&self) -> bool {
        self.session.read().await.state.is_loading()
    }

    /// Message of the last failed submission, empty otherwise.
    pub async fn error(&self) -> String {
        self.session.read().await.error.clone()
    }

    pub async fn script_position(&self) -> usize {
        self.session.read().await.script_position
    }

    pub async fn set_token(&self, token: impl Into<String>) {
        self.session.write().await.token = token.into();
    }

    /// Replace the loaded script and rewind its cursor.
    pub async fn set_script(&self, script: Option<Script>) {
        let mut session = self.session.write().await;
        session.script = script;
        session.script_position = 0;
    }

    /// Load script `id` from the script store. Returns whether it exists.
    pub async fn reload_script(&self, id: &str) -> bool {
        let script = self.scripts.get(id);
        let found = script.is_some();
        self.set_script(script).await;
        debug!(script_id = %id, found, "Reloaded script");
        found
    }

    // ------------------------------------------------------------------
    // Message transitions
    // ------------------------------------------------------------------

    /// Append a message and submit if it leaves the conversation waiting for
    /// an answer.
    #[instrument(skip(self, content), fields(role = %role))]
    pub async fn add_message(&self, content: impl Into<String>, role: Role) -> SubmitOutcome {
        {
            let mut session = self.session.write().await;
            let message = session.push_message(role, content);
            debug!(id = message.id, "Appended message");
            self.emit(OrchestratorEvent::MessageAppended { message });
        }
        self.on_messages_changed().await
    }

    /// Remove every message carrying `id`.
    pub async fn remove_message(&self, id: usize) -> SubmitOutcome {
        {
            let mut session = self.session.write().await;
            let before = session.messages.len();
            session.messages.retain(|m| m.id != id);
            if session.messages.len() == before {
                return SubmitOutcome::Skipped;
            }
            self.emit(OrchestratorEvent::MessageRemoved { id });
        }
        self.on_messages_changed().await
    }

    /// Flip a message between user and assistant.
    pub async fn toggle_message_role(&self, id: usize) -> SubmitOutcome {
        {
            let mut session = self.session.write().await;
            let Some(message) = session.find_message_mut(id) else {
                return SubmitOutcome::Skipped;
            };
            message.role = message.role.toggled();
            let message = message.clone();
            self.emit(OrchestratorEvent::MessageUpdated { message });
        }
        self.on_messages_changed().await
    }

    pub async fn update_message_content(
        &self,
        id: usize,
        content: impl Into<String>,
    ) -> SubmitOutcome {
        {
            let mut session = self.session.write().await;
            let Some(message) = session.find_message_mut(id) else {
                return SubmitOutcome::Skipped;
            };
            message.content = content.into();
            let message = message.clone();
            self.emit(OrchestratorEvent::MessageUpdated { message });
        }
        self.on_messages_changed().await
    }

    pub async fn update_system_message(&self, content: impl Into<String>) {
        let mut session = self.session.write().await;
        session.system_message = Message::system(content);
        self.emit(OrchestratorEvent::SystemMessageUpdated {
            content: session.system_message.content.clone(),
        });
        self.persist(&mut session);
    }

    /// Apply a configuration update; switching models resets `max_tokens`
    /// to half of the new model's limit unless the update sets it too.
    pub async fn update_config(
        &self,
        update: ConfigurationUpdate,
    ) -> Result<Configuration, ChatError> {
        let mut session = self.session.write().await;
        let next = session.config.apply(&update, &self.catalog)?;
        if next.model != session.config.model {
            info!(
                from = %session.config.model,
                to = %next.model,
                max_tokens = next.max_tokens,
                "Switched model"
            );
        }
        session.config = next.clone();
        self.persist(&mut session);
        Ok(next)
    }

    // ------------------------------------------------------------------
    // Conversation lifecycle
    // ------------------------------------------------------------------

    /// Make `conversation` the working conversation.
    pub async fn load_conversation(
        &self,
        id: impl Into<String>,
        conversation: Conversation,
    ) -> SubmitOutcome {
        let id = id.into();
        {
            let mut session = self.session.write().await;
            let update = ConfigurationUpdate::replace_with(&conversation.config);
            let config = match session.config.apply(&update, &self.catalog) {
                Ok(config) => config,
                Err(e) => {
                    warn!(conversation_id = %id, error = %e, "Stored configuration rejected; using defaults");
                    self.options.config.clone()
                }
            };

            session.conversation_id = id.clone();
            session.conversation_name = conversation.name;
            session.system_message = Message::system(conversation.system_message.content);
            session.messages = conversation.messages;
            session.config = config;
            session.generation += 1;
            info!(conversation_id = %id, messages = session.messages.len(), "Loaded conversation");
        }
        self.emit(OrchestratorEvent::ConversationLoaded { id });
        self.on_messages_changed().await
    }

    /// Load a stored conversation by id. `None` when it does not exist.
    pub async fn load_conversation_by_id(&self, id: &str) -> Option<SubmitOutcome> {
        let cached = self.session.read().await.conversations.get(id).cloned();
        let conversation = cached.or_else(|| self.history.get_conversation(id))?;
        Some(self.load_conversation(id, conversation).await)
    }

    /// Start over with an empty, unsaved conversation.
    pub async fn clear_conversation(&self) {
        let mut session = self.session.write().await;
        session.reset(&self.options.system_message);
        self.emit(OrchestratorEvent::ConversationCleared);
    }

    /// Delete all stored history and the working conversation.
    pub async fn clear_conversations(&self) -> Result<(), ChatError> {
        self.history.clear()?;
        let mut session = self.session.write().await;
        session.reset(&self.options.system_message);
        session.conversations.clear();
        self.emit(OrchestratorEvent::HistoryCleared);
        Ok(())
    }

    /// Delete a conversation. Deleting the active one also clears the
    /// working state. Returns whether anything was deleted.
    pub async fn delete_conversation(&self, id: &str) -> Result<bool, ChatError> {
        let stored = self.history.delete(id)?;

        let mut session = self.session.write().await;
        let cached = session.conversations.remove(id).is_some();
        if !id.is_empty() && session.conversation_id == id {
            session.reset(&self.options.system_message);
            self.emit(OrchestratorEvent::ConversationCleared);
        }

        let deleted = stored || cached;
        if deleted {
            self.emit(OrchestratorEvent::ConversationDeleted { id: id.to_string() });
        }
        Ok(deleted)
    }

    pub async fn update_conversation_name(
        &self,
        id: &str,
        name: impl Into<String>,
    ) -> Result<bool, ChatError> {
        let name = name.into();
        let stored = self.history.update(id, ConversationPatch::name(name.clone()))?;

        let mut session = self.session.write().await;
        let cached = match session.conversations.get_mut(id) {
            Some(conversation) => {
                conversation.name = name.clone();
                true
            }
            None => false,
        };
        if !id.is_empty() && session.conversation_id == id {
            session.conversation_name = name;
        }
        Ok(stored || cached)
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    async fn on_messages_changed(&self) -> SubmitOutcome {
        let waiting_for_answer = {
            let mut session = self.session.write().await;
            self.persist(&mut session);
            !session.messages.is_empty() && !session.last_is_assistant()
        };
        if !waiting_for_answer {
            return SubmitOutcome::Skipped;
        }
        self.submit().await
    }

    /// Answer the current conversation, from the script or the network.
    ///
    /// At most one submission runs at a time; a call made while another is
    /// in flight returns [`SubmitOutcome::Busy`] and does nothing.
    #[instrument(skip(self))]
    pub async fn submit(&self) -> SubmitOutcome {
        let (request, token, generation) = {
            let mut session = self.session.write().await;
            if session.state.is_loading() {
                debug!("Submission dropped; another one is in flight");
                return SubmitOutcome::Busy;
            }
            if session.messages.is_empty() {
                return SubmitOutcome::Skipped;
            }

            if let Some(item) = session.pending_script_item() {
                let message = session.push_message(Role::Assistant, item.value);
                session.script_position += 1;
                info!(script_position = session.script_position, "Answered from script");
                self.emit(OrchestratorEvent::MessageAppended { message });
                self.persist(&mut session);
                session.error.clear();
                if matches!(session.state, SubmissionState::Error(_)) {
                    session.state = SubmissionState::Idle;
                    self.emit(OrchestratorEvent::StateChanged {
                        state: SubmissionState::Idle,
                    });
                }
                return SubmitOutcome::Scripted;
            }

            session.state = SubmissionState::Submitting;
            session.error.clear();
            self.emit(OrchestratorEvent::StateChanged {
                state: SubmissionState::Submitting,
            });
            let request = CompletionRequest::new(
                &session.system_message,
                &session.messages,
                &session.config,
            );
            (request, session.token.clone(), session.generation)
        };

        self.fetch_completion(request, token, generation).await
    }

    async fn fetch_completion(
        &self,
        request: CompletionRequest,
        token: String,
        generation: u64,
    ) -> SubmitOutcome {
        info!(
            transport = self.transport.name(),
            model = %request.config.model,
            messages = request.messages.len(),
            "Fetching completion"
        );

        let mut stream = match self.transport.stream_completion(&request, &token).await {
            Ok(stream) => stream,
            Err(e) => return self.fail(e.to_string(), generation).await,
        };

        let placeholder_id = {
            let mut session = self.session.write().await;
            if session.generation != generation {
                return self.abandon(&mut session);
            }
            let message = session.push_message(Role::Assistant, "");
            session.state = SubmissionState::Streaming;
            let id = message.id;
            self.emit(OrchestratorEvent::MessageAppended { message });
            self.emit(OrchestratorEvent::StateChanged {
                state: SubmissionState::Streaming,
            });
            self.persist(&mut session);
            id
        };

        let mut received = 0usize;
        let mut last_persist = Instant::now();
        while let Some(chunk) = stream.next().await {
            let text = match chunk {
                Ok(text) => text,
                Err(e) => return self.fail(e.to_string(), generation).await,
            };
            received += text.len();

            let mut session = self.session.write().await;
            if session.generation != generation {
                return self.abandon(&mut session);
            }
            // Ids repeat after removals; the placeholder is the latest one.
            let Some(message) = session
                .messages
                .iter_mut()
                .rev()
                .find(|m| m.id == placeholder_id)
            else {
                debug!(id = placeholder_id, "Placeholder removed; dropping chunk");
                continue;
            };
            message.content.push_str(&text);
            let message = message.clone();
            self.emit(OrchestratorEvent::MessageUpdated { message });
            if last_persist.elapsed() >= STREAM_PERSIST_INTERVAL {
                self.persist(&mut session);
                last_persist = Instant::now();
            }
        }

        let mut session = self.session.write().await;
        if session.generation != generation {
            return self.abandon(&mut session);
        }
        self.persist(&mut session);
        session.state = SubmissionState::Idle;
        self.emit(OrchestratorEvent::StateChanged {
            state: SubmissionState::Idle,
        });
        info!(bytes = received, "Completion finished");
        SubmitOutcome::Streamed
    }

    /// Record a failed completion. A failure that outlived its conversation
    /// is dropped instead.
    async fn fail(&self, message: String, generation: u64) -> SubmitOutcome {
        let mut session = self.session.write().await;
        if session.generation != generation {
            warn!(error = %message, "Completion failed after its conversation was replaced");
            return self.abandon(&mut session);
        }
        warn!(error = %message, "Completion failed");
        // Keep whatever partial reply arrived before the failure.
        self.persist(&mut session);
        session.state = SubmissionState::Error(message.clone());
        session.error = message.clone();
        self.emit(OrchestratorEvent::StateChanged {
            state: session.state.clone(),
        });
        SubmitOutcome::Failed(message)
    }

    fn abandon(&self, session: &mut ChatSession) -> SubmitOutcome {
        info!("Working conversation replaced; abandoning stream");
        session.state = SubmissionState::Idle;
        self.emit(OrchestratorEvent::StateChanged {
            state: SubmissionState::Idle,
        });
        SubmitOutcome::Abandoned
    }

    /// Write the working conversation to history. Empty conversations are
    /// never stored; the first store assigns the conversation id.
    fn persist(&self, session: &mut ChatSession) {
        if session.messages.is_empty() {
            return;
        }
        let conversation = session.snapshot(Utc::now().timestamp_millis());
        match self.history.store(&session.conversation_id, &conversation) {
            Ok(id) => {
                let created = session.conversation_id != id;
                session.conversation_id = id.clone();
                session.conversations.insert(id.clone(), conversation);
                self.emit(OrchestratorEvent::ConversationStored { id, created });
            }
            Err(e) => warn!(error = %e, "Failed to persist conversation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdeck_core::{ScriptItem, TransportError};
    use chatdeck_store::{create_script, MemoryStorage};
    use chatdeck_transport::{MockReply, MockTransport};
    use tokio::sync::Notify;

    struct Harness {
        orchestrator: Arc<ChatOrchestrator>,
        transport: Arc<MockTransport>,
        history: HistoryStore,
        scripts: ScriptStore,
    }

    fn harness(transport: MockTransport) -> Harness {
        let storage = Arc::new(MemoryStorage::new());
        let history = HistoryStore::new(storage.clone());
        let scripts = ScriptStore::new(storage);
        let transport = Arc::new(transport);
        let orchestrator = Arc::new(ChatOrchestrator::new(
            history.clone(),
            scripts.clone(),
            transport.clone(),
            ModelCatalog::builtin(),
            OrchestratorOptions {
                token: "test-token".into(),
                ..Default::default()
            },
        ));
        Harness {
            orchestrator,
            transport,
            history,
            scripts,
        }
    }

    fn script(values: &[&str]) -> Script {
        Script {
            name: "demo".into(),
            script_items: values
                .iter()
                .map(|v| ScriptItem {
                    id: v.to_string(),
                    value: v.to_string(),
                    prompt: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn user_message_streams_network_reply() {
        let h = harness(MockTransport::new().with_reply(MockReply::chunks(["Hi", "!"])));
        h.orchestrator.init().await;

        let outcome = h.orchestrator.add_message("hello", Role::User).await;
        assert_eq!(outcome, SubmitOutcome::Streamed);

        let messages = h.orchestrator.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], Message::new(1, Role::Assistant, "Hi!"));
        assert_eq!(h.transport.call_count(), 1);
        assert_eq!(h.orchestrator.state().await, SubmissionState::Idle);
        assert!(!h.orchestrator.loading().await);
    }

    #[tokio::test]
    async fn request_carries_system_message_config_and_history() {
        let h = harness(MockTransport::new());
        h.orchestrator.update_system_message("Be brief.").await;
        h.orchestrator.add_message("hello", Role::User).await;

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, "Be brief.");
        assert_eq!(request.messages[1].content, "hello");
        assert_eq!(request.config, Configuration::default());
    }

    #[tokio::test]
    async fn leading_space_uses_script_then_falls_through() {
        let h = harness(MockTransport::new());
        h.scripts.store(&create_script(), None).unwrap();
        h.orchestrator.init().await;

        let outcome = h.orchestrator.add_message(" go", Role::User).await;
        assert_eq!(outcome, SubmitOutcome::Scripted);
        let messages = h.orchestrator.messages().await;
        assert_eq!(messages.last().unwrap().role, Role::Assistant);
        assert_eq!(messages.last().unwrap().content, "Hello World");
        assert_eq!(h.transport.call_count(), 0);
        assert_eq!(h.orchestrator.script_position().await, 1);

        let outcome = h.orchestrator.add_message(" go", Role::User).await;
        assert_eq!(outcome, SubmitOutcome::Streamed);
        assert_eq!(h.transport.call_count(), 1);
        assert_eq!(h.orchestrator.messages().await.len(), 4);
    }

    #[tokio::test]
    async fn whitespace_only_message_triggers_script() {
        let h = harness(MockTransport::new());
        h.orchestrator.set_script(Some(script(&["canned"]))).await;

        let outcome = h.orchestrator.add_message(" ", Role::User).await;
        assert_eq!(outcome, SubmitOutcome::Scripted);
        assert_eq!(h.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn message_without_leading_space_skips_script() {
        let h = harness(MockTransport::new());
        h.orchestrator.set_script(Some(script(&["canned"]))).await;

        let outcome = h.orchestrator.add_message("go", Role::User).await;
        assert_eq!(outcome, SubmitOutcome::Streamed);
        assert_eq!(h.orchestrator.script_position().await, 0);
    }

    #[tokio::test]
    async fn exactly_one_path_per_user_message() {
        let h = harness(MockTransport::new());
        h.orchestrator.set_script(Some(script(&["one"]))).await;

        for content in [" a", "b", " c", "d"] {
            let before = h.orchestrator.messages().await.len();
            let outcome = h.orchestrator.add_message(content, Role::User).await;
            assert!(matches!(outcome, SubmitOutcome::Scripted | SubmitOutcome::Streamed));
            // User message plus exactly one assistant answer.
            assert_eq!(h.orchestrator.messages().await.len(), before + 2);
        }
        assert_eq!(h.transport.call_count(), 3);
    }

    #[tokio::test]
    async fn assistant_message_does_not_submit() {
        let h = harness(MockTransport::new());
        let outcome = h.orchestrator.add_message("note", Role::Assistant).await;
        assert_eq!(outcome, SubmitOutcome::Skipped);
        assert_eq!(h.transport.call_count(), 0);
        assert_eq!(h.history.get().len(), 1);
    }

    #[tokio::test]
    async fn empty_conversation_is_never_persisted() {
        let h = harness(MockTransport::new());
        h.orchestrator.update_system_message("changed").await;
        h.orchestrator
            .update_config(ConfigurationUpdate::default().with_temperature(1.0))
            .await
            .unwrap();
        assert!(h.history.get().is_empty());
        assert!(h.orchestrator.conversation_id().await.is_empty());
        assert_eq!(h.orchestrator.submit().await, SubmitOutcome::Skipped);
    }

    #[tokio::test]
    async fn first_round_trip_creates_one_stable_entry() {
        let h = harness(MockTransport::new());
        h.orchestrator.add_message("hello", Role::User).await;

        let history = h.history.get();
        assert_eq!(history.len(), 1);
        let id = h.orchestrator.conversation_id().await;
        assert!(history.contains_key(&id));
        assert_eq!(history[&id].messages.len(), 2);

        h.orchestrator.add_message("again", Role::User).await;
        h.orchestrator.update_system_message("new prompt").await;
        let history = h.history.get();
        assert_eq!(history.len(), 1);
        assert_eq!(h.orchestrator.conversation_id().await, id);
        assert_eq!(history[&id].messages.len(), 4);
        assert_eq!(history[&id].system_message.content, "new prompt");
    }

    #[tokio::test]
    async fn model_switch_halves_new_model_limit() {
        let h = harness(MockTransport::new());
        h.orchestrator
            .update_config(ConfigurationUpdate::default().with_max_tokens(100))
            .await
            .unwrap();

        let config = h
            .orchestrator
            .update_config(ConfigurationUpdate::model("gpt-4"))
            .await
            .unwrap();
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(h.orchestrator.config().await.model, "gpt-4");
    }

    #[tokio::test]
    async fn invalid_config_update_changes_nothing() {
        let h = harness(MockTransport::new());
        let before = h.orchestrator.config().await;
        assert!(h
            .orchestrator
            .update_config(ConfigurationUpdate::model("unknown"))
            .await
            .is_err());
        assert_eq!(h.orchestrator.config().await, before);
    }

    #[tokio::test]
    async fn chunks_update_placeholder_in_place() {
        let h = harness(
            MockTransport::new().with_reply(MockReply::chunks(["Hel", "lo", " there"])),
        );
        let mut events = h.orchestrator.subscribe();

        h.orchestrator.add_message("hi", Role::User).await;

        let messages = h.orchestrator.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Hello there");

        let mut appended_assistant = 0;
        let mut updates = Vec::new();
        while let Ok(event) = events.try_recv() {
            match event {
                OrchestratorEvent::MessageAppended { message } if message.role == Role::Assistant => {
                    appended_assistant += 1;
                }
                OrchestratorEvent::MessageUpdated { message } => updates.push(message.content),
                _ => {}
            }
        }
        assert_eq!(appended_assistant, 1);
        assert_eq!(updates, vec!["Hel", "Hello", "Hello there"]);
    }

    #[tokio::test]
    async fn transport_failure_sets_error_without_rollback() {
        let h = harness(MockTransport::new().with_reply(MockReply::Fail(TransportError::Api {
            status: 401,
            message: "Invalid API key".into(),
        })));

        let outcome = h.orchestrator.add_message("hello", Role::User).await;
        assert_eq!(outcome, SubmitOutcome::Failed("Invalid API key".into()));
        assert_eq!(h.orchestrator.error().await, "Invalid API key");
        assert_eq!(
            h.orchestrator.state().await,
            SubmissionState::Error("Invalid API key".into())
        );
        let messages = h.orchestrator.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn interrupted_stream_keeps_partial_content() {
        let h = harness(MockTransport::new().with_reply(MockReply::Interrupted {
            chunks: vec!["Partial".into()],
            error: TransportError::Stream("connection reset".into()),
        }));

        let outcome = h.orchestrator.add_message("hello", Role::User).await;
        assert!(matches!(outcome, SubmitOutcome::Failed(_)));
        let messages = h.orchestrator.messages().await;
        assert_eq!(messages[1].content, "Partial");

        let id = h.orchestrator.conversation_id().await;
        assert_eq!(h.history.get()[&id].messages[1].content, "Partial");

        // Explicit resubmission clears the error once it succeeds.
        h.orchestrator.remove_message(1).await;
        assert!(h.orchestrator.error().await.is_empty());
        assert_eq!(h.transport.call_count(), 2);
    }

    #[tokio::test]
    async fn concurrent_submission_is_dropped() {
        let gate = Arc::new(Notify::new());
        let h = harness(MockTransport::new().with_gate(gate.clone()));

        let orchestrator = h.orchestrator.clone();
        let first = tokio::spawn(async move { orchestrator.add_message("one", Role::User).await });

        while !h.orchestrator.loading().await {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.orchestrator.submit().await, SubmitOutcome::Busy);

        gate.notify_one();
        assert_eq!(first.await.unwrap(), SubmitOutcome::Streamed);
        assert_eq!(h.transport.call_count(), 1);
    }

    #[tokio::test]
    async fn scripted_reply_clears_previous_error() {
        let h = harness(MockTransport::new().with_reply(MockReply::Fail(TransportError::Api {
            status: 500,
            message: "boom".into(),
        })));
        h.orchestrator.set_script(Some(script(&["canned"]))).await;

        let failed = h.orchestrator.add_message("hello", Role::User).await;
        assert_eq!(failed, SubmitOutcome::Failed("boom".into()));

        let outcome = h.orchestrator.add_message(" go", Role::User).await;
        assert_eq!(outcome, SubmitOutcome::Scripted);
        assert_eq!(h.orchestrator.state().await, SubmissionState::Idle);
        assert!(h.orchestrator.error().await.is_empty());
        assert_eq!(h.orchestrator.messages().await[2].content, "canned");
    }

    #[tokio::test]
    async fn clearing_mid_request_abandons_the_reply() {
        let gate = Arc::new(Notify::new());
        let h = harness(
            MockTransport::new()
                .with_gate(gate.clone())
                .with_reply(MockReply::chunks(["late", " reply"])),
        );

        let orchestrator = h.orchestrator.clone();
        let pending = tokio::spawn(async move { orchestrator.add_message("one", Role::User).await });
        while !h.orchestrator.loading().await {
            tokio::task::yield_now().await;
        }
        let old_id = h.orchestrator.conversation_id().await;

        h.orchestrator.clear_conversation().await;
        gate.notify_one();

        assert_eq!(pending.await.unwrap(), SubmitOutcome::Abandoned);
        assert!(h.orchestrator.messages().await.is_empty());
        assert!(h.orchestrator.conversation_id().await.is_empty());
        assert_eq!(h.orchestrator.state().await, SubmissionState::Idle);

        // The replaced conversation keeps only what it had before.
        let stored = h.history.get_conversation(&old_id).unwrap();
        assert_eq!(stored.messages.len(), 1);
        assert_eq!(stored.messages[0].content, "one");
    }

    #[tokio::test]
    async fn failure_after_load_does_not_touch_new_conversation() {
        let gate = Arc::new(Notify::new());
        let h = harness(
            MockTransport::new()
                .with_gate(gate.clone())
                .with_reply(MockReply::Fail(TransportError::Request("down".into()))),
        );
        let other = Conversation {
            name: "other".into(),
            system_message: Message::system("sys"),
            messages: vec![
                Message::new(0, Role::User, "old question"),
                Message::new(1, Role::Assistant, "old answer"),
            ],
            config: Configuration::default(),
            last_message: 0,
        };
        let other_id = h.history.store("", &other).unwrap();

        let orchestrator = h.orchestrator.clone();
        let pending = tokio::spawn(async move { orchestrator.add_message("one", Role::User).await });
        while !h.orchestrator.loading().await {
            tokio::task::yield_now().await;
        }

        let loaded = h.orchestrator.load_conversation_by_id(&other_id).await;
        assert_eq!(loaded, Some(SubmitOutcome::Skipped));
        gate.notify_one();

        assert_eq!(pending.await.unwrap(), SubmitOutcome::Abandoned);
        assert_eq!(h.orchestrator.conversation_id().await, other_id);
        assert_eq!(h.orchestrator.messages().await, other.messages);
        assert_eq!(h.orchestrator.state().await, SubmissionState::Idle);
        assert!(h.orchestrator.error().await.is_empty());
    }

    #[tokio::test]
    async fn finished_reply_is_persisted_whole() {
        let h = harness(MockTransport::new().with_reply(MockReply::chunks(["a", "b", "c", "d"])));
        h.orchestrator.add_message("hi", Role::User).await;

        let id = h.orchestrator.conversation_id().await;
        assert_eq!(h.history.get()[&id].messages[1].content, "abcd");
        assert_eq!(h.orchestrator.conversations().await[&id].messages[1].content, "abcd");
    }

    #[tokio::test]
    async fn toggling_last_reply_to_user_resubmits() {
        let h = harness(MockTransport::new());
        h.orchestrator.add_message("hello", Role::User).await;
        assert_eq!(h.transport.call_count(), 1);

        assert_eq!(
            h.orchestrator.toggle_message_role(99).await,
            SubmitOutcome::Skipped
        );
        let outcome = h.orchestrator.toggle_message_role(1).await;
        assert_eq!(outcome, SubmitOutcome::Streamed);
        assert_eq!(h.transport.call_count(), 2);
        assert_eq!(h.orchestrator.messages().await[1].role, Role::User);
    }

    #[tokio::test]
    async fn editing_a_message_updates_history() {
        let h = harness(MockTransport::new());
        h.orchestrator.add_message("hello", Role::User).await;
        h.orchestrator.update_message_content(1, "edited").await;

        let id = h.orchestrator.conversation_id().await;
        assert_eq!(h.history.get()[&id].messages[1].content, "edited");
        assert_eq!(h.transport.call_count(), 1);
    }

    #[tokio::test]
    async fn delete_missing_conversation_is_noop() {
        let h = harness(MockTransport::new());
        h.orchestrator.add_message("hello", Role::User).await;
        let id = h.orchestrator.conversation_id().await;

        assert!(!h.orchestrator.delete_conversation("missing").await.unwrap());
        assert_eq!(h.orchestrator.conversation_id().await, id);
        assert_eq!(h.orchestrator.messages().await.len(), 2);
        assert_eq!(h.history.get().len(), 1);
    }

    #[tokio::test]
    async fn deleting_active_conversation_clears_working_state() {
        let h = harness(MockTransport::new());
        h.orchestrator.add_message("hello", Role::User).await;
        let id = h.orchestrator.conversation_id().await;

        assert!(h.orchestrator.delete_conversation(&id).await.unwrap());
        assert!(h.orchestrator.messages().await.is_empty());
        assert!(h.orchestrator.conversation_id().await.is_empty());
        assert!(h.orchestrator.conversations().await.is_empty());
        assert!(h.history.get().is_empty());
    }

    #[tokio::test]
    async fn load_conversation_restores_state_without_resubmitting() {
        let h = harness(MockTransport::new());
        let stored = Conversation {
            name: "Saved".into(),
            system_message: Message::system("Pirate mode."),
            messages: vec![
                Message::new(0, Role::User, "ahoy"),
                Message::new(1, Role::Assistant, "arr"),
            ],
            config: Configuration {
                model: "gpt-4".into(),
                max_tokens: 1234,
                ..Configuration::default()
            },
            last_message: 1,
        };
        let id = h.history.store("", &stored).unwrap();
        h.orchestrator.init().await;

        let outcome = h.orchestrator.load_conversation_by_id(&id).await;
        assert_eq!(outcome, Some(SubmitOutcome::Skipped));
        assert_eq!(h.transport.call_count(), 0);
        assert_eq!(h.orchestrator.conversation_id().await, id);
        assert_eq!(h.orchestrator.conversation_name().await, "Saved");
        assert_eq!(h.orchestrator.system_message().await.content, "Pirate mode.");
        let config = h.orchestrator.config().await;
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.max_tokens, 1234);

        assert!(h.orchestrator.load_conversation_by_id("missing").await.is_none());
    }

    #[tokio::test]
    async fn rename_updates_store_cache_and_active_name() {
        let h = harness(MockTransport::new());
        h.orchestrator.add_message("hello", Role::User).await;
        let id = h.orchestrator.conversation_id().await;

        assert!(h.orchestrator.update_conversation_name(&id, "Greeting").await.unwrap());
        assert_eq!(h.orchestrator.conversation_name().await, "Greeting");
        assert_eq!(h.orchestrator.conversations().await[&id].name, "Greeting");
        assert_eq!(h.history.get()[&id].name, "Greeting");

        assert!(!h.orchestrator.update_conversation_name("missing", "x").await.unwrap());
    }

    #[tokio::test]
    async fn clear_conversations_wipes_history_and_working_state() {
        let h = harness(MockTransport::new());
        h.orchestrator.add_message("hello", Role::User).await;
        h.orchestrator.clear_conversation().await;
        h.orchestrator.add_message("second", Role::User).await;
        assert_eq!(h.history.get().len(), 2);

        h.orchestrator.clear_conversations().await.unwrap();
        assert!(h.history.get().is_empty());
        assert!(h.orchestrator.conversations().await.is_empty());
        assert!(h.orchestrator.messages().await.is_empty());
        assert!(h.orchestrator.conversation_id().await.is_empty());
    }

    #[tokio::test]
    async fn clear_conversation_starts_fresh_id() {
        let h = harness(MockTransport::new());
        h.orchestrator.add_message("hello", Role::User).await;
        let first = h.orchestrator.conversation_id().await;

        h.orchestrator.clear_conversation().await;
        assert_eq!(
            h.orchestrator.system_message().await.content,
            DEFAULT_SYSTEM_MESSAGE
        );
        h.orchestrator.add_message("new topic", Role::User).await;
        assert_ne!(h.orchestrator.conversation_id().await, first);
    }

    #[tokio::test]
    async fn reload_script_rewinds_cursor() {
        let h = harness(MockTransport::new());
        h.scripts.store(&script(&["a", "b"]), Some("demo")).unwrap();

        assert!(h.orchestrator.reload_script("demo").await);
        h.orchestrator.add_message(" x", Role::User).await;
        assert_eq!(h.orchestrator.script_position().await, 1);

        assert!(h.orchestrator.reload_script("demo").await);
        assert_eq!(h.orchestrator.script_position().await, 0);
        assert!(!h.orchestrator.reload_script("missing").await);
    }

    #[tokio::test]
    async fn shutdown_drops_working_state() {
        let h = harness(MockTransport::new());
        h.orchestrator.add_message("hello", Role::User).await;
        h.orchestrator.shutdown().await;

        assert!(h.orchestrator.messages().await.is_empty());
        assert!(h.orchestrator.conversations().await.is_empty());
        assert_eq!(h.history.get().len(), 1);
    }
}
