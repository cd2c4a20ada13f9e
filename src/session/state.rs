use std::collections::VecDeque;

use crate::common::{ChatEvent, MessageRecord};

/// Local state of a chat view.
///
/// The composer text is only cleared once the store confirms the write; a
/// failed submission leaves the text in place so it can be sent again.
pub struct ChatViewState {
    pub messages: Vec<MessageRecord>,
    pub input_text: String,
    pub display_name: String,
    /// Body currently awaiting confirmation. One submission at a time.
    pub pending: Option<String>,
    /// Lines entered while a submission was in flight, oldest first.
    pub queued: VecDeque<String>,
    /// Last error worth showing to the user.
    pub notice: Option<String>,
    pub signed_out: bool,
}

impl ChatViewState {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            input_text: String::new(),
            display_name: display_name.into(),
            pending: None,
            queued: VecDeque::new(),
            notice: None,
            signed_out: false,
        }
    }

    /// Body to submit, or `None` if the composer is empty or a
    /// submission is still in flight.
    pub fn take_submission(&mut self) -> Option<String> {
        if self.pending.is_some() || self.input_text.trim().is_empty() {
            return None;
        }
        let body = self.input_text.clone();
        self.pending = Some(body.clone());
        Some(body)
    }

    /// Takes a line typed into the composer. Returns the body to send now;
    /// while a submission is in flight the line is queued instead.
    pub fn compose(&mut self, line: String) -> Option<String> {
        if line.trim().is_empty() {
            return None;
        }
        if self.pending.is_some() {
            self.queued.push_back(line);
            return None;
        }
        self.input_text = line;
        self.take_submission()
    }

    /// Next queued line to send, once nothing is in flight.
    pub fn next_queued(&mut self) -> Option<String> {
        if self.pending.is_some() {
            return None;
        }
        let body = self.queued.pop_front()?;
        self.pending = Some(body.clone());
        Some(body)
    }

    pub fn apply_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::ChatsUpdated(messages) => self.messages = messages,
            ChatEvent::SubmitConfirmed { .. } => {
                if let Some(sent) = self.pending.take() {
                    if self.input_text == sent {
                        self.input_text.clear();
                    }
                }
                self.notice = None;
            }
            ChatEvent::SubmitFailed { body, reason } => {
                self.pending = None;
                if self.input_text.is_empty() {
                    self.input_text = body;
                }
                self.notice = Some(format!("Message not sent: {reason}"));
            }
            ChatEvent::FeedError(reason) => {
                self.notice = Some(format!("Feed unavailable: {reason}"));
            }
            ChatEvent::SignedOut => {
                self.signed_out = true;
                self.pending = None;
                self.queued.clear();
            }
        }
    }

    pub fn is_own(&self, message: &MessageRecord) -> bool {
        message.is_own(&self.display_name)
    }
}
