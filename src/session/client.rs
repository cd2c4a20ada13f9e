use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::auth::IdentityProvider;
use crate::common::{ChatCommand, ChatEvent, FeedEvent, MessageDraft};
use crate::error::FeedError;
use crate::feed::{Aggregator, ErrorSink, FeedListener};
use crate::storage::{DocumentStore, StoreError};

/// Channel capacity between the session and its view.
pub const CHANNEL_CAPACITY: usize = 100;

/// Identifiers of a stored submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// Client-generated identifier written into the document.
    pub identifier: String,
    /// Id the store assigned to the document.
    pub document_id: String,
}

/// Event loop of one chat screen.
///
/// Owns the aggregation state; snapshots and commands are handled one at a
/// time on the task running [`ChatSession::run`].
pub struct ChatSession {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    collection: String,
    aggregator: Aggregator,
    event_sender: mpsc::Sender<ChatEvent>,
    command_receiver: mpsc::Receiver<ChatCommand>,
}

impl ChatSession {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        collection: impl Into<String>,
        event_sender: mpsc::Sender<ChatEvent>,
        command_receiver: mpsc::Receiver<ChatCommand>,
    ) -> Self {
        Self {
            store,
            identity,
            collection: collection.into(),
            aggregator: Aggregator::new(),
            event_sender,
            command_receiver,
        }
    }

    pub fn with_error_sink(mut self, sink: Box<dyn ErrorSink>) -> Self {
        self.aggregator = Aggregator::with_sink(sink);
        self
    }

    /// Runs until logout or until the view drops its command sender.
    pub async fn run(mut self) -> Result<(), FeedError> {
        let mut listener = FeedListener::subscribe(self.store.clone(), &self.collection)?;
        log::info!("Chat session started on `{}`", self.collection);

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(ChatCommand::Send(body)) => self.handle_send(body).await,
                        Some(ChatCommand::Logout) => {
                            self.identity.sign_out();
                            listener.unsubscribe();
                            self.emit(ChatEvent::SignedOut).await;
                            break;
                        }
                        None => {
                            log::info!("View closed; stopping chat session");
                            listener.unsubscribe();
                            break;
                        }
                    }
                }
                event = listener.recv() => {
                    match event {
                        Some(event) => self.handle_feed_event(event).await,
                        None => {
                            log::warn!("Feed for `{}` ended unexpectedly", self.collection);
                            break;
                        }
                    }
                }
            }
        }

        log::info!("Chat session on `{}` stopped", self.collection);
        Ok(())
    }

    /// Writes a message as the signed-in user.
    pub async fn submit(&self, body: &str) -> Result<SubmitReceipt, FeedError> {
        if body.trim().is_empty() {
            return Err(FeedError::EmptyMessage);
        }
        let user = self
            .identity
            .current_user()
            .ok_or(FeedError::NotAuthenticated)?;

        let draft = MessageDraft::new(user.display_name, body);
        let fields = draft.to_fields();
        let store = self.store.clone();
        let collection = self.collection.clone();

        let document_id = tokio::task::spawn_blocking(move || store.submit(&collection, fields))
            .await
            .map_err(|err| StoreError::Unavailable(format!("submit task failed: {err}")))??;

        log::debug!("Message {} stored as {document_id}", draft.identifier);
        Ok(SubmitReceipt {
            identifier: draft.identifier,
            document_id,
        })
    }

    async fn handle_send(&mut self, body: String) {
        match self.submit(&body).await {
            Ok(receipt) => {
                self.emit(ChatEvent::SubmitConfirmed {
                    identifier: receipt.identifier,
                    document_id: receipt.document_id,
                })
                .await;
            }
            Err(err) => {
                log::warn!("Failed to submit message: {err}");
                self.emit(ChatEvent::SubmitFailed {
                    body,
                    reason: err.to_string(),
                })
                .await;
            }
        }
    }

    async fn handle_feed_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Snapshot(documents) => {
                let chats = self.aggregator.apply_snapshot(&documents).to_vec();
                self.emit(ChatEvent::ChatsUpdated(chats)).await;
            }
            FeedEvent::Error(error) => {
                self.aggregator.apply_error(&error);
                self.emit(ChatEvent::FeedError(error.to_string())).await;
            }
        }
    }

    async fn emit(&self, event: ChatEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::warn!("Failed to notify view: {err}");
        }
    }
}

/// Channels and task of a spawned [`ChatSession`].
pub struct SessionHandle {
    pub commands: mpsc::Sender<ChatCommand>,
    pub events: mpsc::Receiver<ChatEvent>,
    pub task: JoinHandle<Result<(), FeedError>>,
}

/// Spawns a session on the current tokio runtime.
pub fn spawn(
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    collection: &str,
) -> SessionHandle {
    let (command_sender, command_receiver) = mpsc::channel(CHANNEL_CAPACITY);
    let (event_sender, event_receiver) = mpsc::channel(CHANNEL_CAPACITY);

    let session = ChatSession::new(store, identity, collection, event_sender, command_receiver);
    let task = tokio::spawn(async move {
        let result = session.run().await;
        if let Err(err) = &result {
            log::error!("Chat session terminated: {err}");
        }
        result
    });

    SessionHandle {
        commands: command_sender,
        events: event_receiver,
        task,
    }
}
