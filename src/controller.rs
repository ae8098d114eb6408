//! Submission controller: one request/response cycle at a time.
//!
//! The controller never touches the network or the audio device itself. It
//! hands out [`Outgoing`] requests and capture session ids, and the host
//! reports results back through [`Controller::complete`] and
//! [`Controller::voice_finished`]. Each request carries a token; only the
//! reply whose token matches the one in flight is applied.

use tracing::{debug, info, warn};

use crate::backend::{ChatError, Reply};
use crate::composer::{Composer, ComposerState, Controls, Hint};
use crate::config::TextConfig;
use crate::transcript::{Message, Transcript};
use crate::voice::VoiceOutcome;

/// A request the host must send exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub token: u64,
    pub text: String,
}

pub struct Controller {
    composer: Composer,
    transcript: Transcript,
    text: TextConfig,
    auto_submit: bool,
    voice_available: bool,
    last_token: u64,
    in_flight: Option<u64>,
    last_session: u64,
    listening: Option<u64>,
}

impl Controller {
    pub fn new(text: TextConfig, auto_submit: bool, voice_available: bool) -> Self {
        Controller {
            composer: Composer::new(),
            transcript: Transcript::new(),
            text,
            auto_submit,
            voice_available,
            last_token: 0,
            in_flight: None,
            last_session: 0,
            listening: None,
        }
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn texts(&self) -> &TextConfig {
        &self.text
    }

    pub fn controls(&self) -> Controls {
        self.composer.controls(self.voice_available)
    }

    pub fn greet(&mut self) {
        if !self.text.greeting.is_empty() {
            self.transcript.push(Message::assistant(self.text.greeting.clone()));
        }
    }

    pub fn input_changed(&mut self, value: String) {
        self.composer.set_input(value);
    }

    pub fn submit_input(&mut self) -> Option<Outgoing> {
        let text = self.composer.input().to_string();
        self.submit(&text)
    }

    pub fn submit(&mut self, text: &str) -> Option<Outgoing> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if !self.composer.lock() {
            debug!(state = ?self.composer.state(), "Ignoring submit while busy");
            return None;
        }

        self.transcript.push(Message::user(text));
        self.composer.clear_input();

        self.last_token += 1;
        let token = self.last_token;
        self.in_flight = Some(token);
        self.transcript.push_pending(token);

        info!(token, "Submitting message");
        Some(Outgoing { token, text: text.to_string() })
    }

    /// Applies the result of request `token`. Returns false when the reply
    /// was stale and nothing changed.
    pub fn complete(&mut self, token: u64, result: Result<Reply, ChatError>) -> bool {
        if self.in_flight != Some(token) {
            debug!(token, current = ?self.in_flight, "Discarding reply for abandoned request");
            return false;
        }
        self.in_flight = None;
        self.transcript.remove_pending();

        match result {
            Ok(Reply::Text(reply)) => self.transcript.push(Message::assistant(reply)),
            Ok(Reply::Action(chip)) => self.transcript.push(Message::chip(chip)),
            Err(e) => {
                warn!(token, "Submission failed: {}", e);
                let notice = match e {
                    ChatError::Transport(_) => self.text.connection_error.clone(),
                    ChatError::Status(_) | ChatError::Malformed(_) => self.text.server_error.clone(),
                };
                self.transcript.push(Message::assistant(notice));
            }
        }

        self.composer.unlock();
        true
    }

    /// Gives up waiting for the reply in flight. The request itself keeps
    /// running; its reply will be discarded.
    pub fn stop(&mut self) -> bool {
        if self.composer.state() != ComposerState::AwaitingReply {
            return false;
        }
        info!(token = ?self.in_flight, "Stopped waiting for reply");
        self.in_flight = None;
        self.transcript.remove_pending();
        self.transcript.push(Message::assistant(self.text.stopped.clone()));
        self.composer.unlock();
        true
    }

    /// Enters ListeningForSpeech and returns the new capture session id.
    pub fn start_listening(&mut self) -> Option<u64> {
        if !self.voice_available || !self.composer.begin_listening() {
            return None;
        }
        self.last_session += 1;
        self.listening = Some(self.last_session);
        Some(self.last_session)
    }

    /// Session the host should end early, if one is running.
    pub fn listening_session(&self) -> Option<u64> {
        self.listening
    }

    /// Handles the single outcome of capture `session`. With auto-submit on,
    /// a transcript goes straight to [`Controller::submit`].
    pub fn voice_finished(&mut self, session: u64, outcome: VoiceOutcome) -> Option<Outgoing> {
        if self.listening != Some(session) {
            debug!(session, "Ignoring outcome of old capture session");
            return None;
        }
        self.listening = None;

        match outcome {
            VoiceOutcome::Transcript(transcript) => {
                self.composer.end_listening(false);
                if self.auto_submit {
                    self.submit(&transcript)
                } else {
                    self.composer.set_input(transcript.trim().to_string());
                    None
                }
            }
            VoiceOutcome::Empty => {
                self.composer.end_listening(false);
                None
            }
            VoiceOutcome::Failed(e) => {
                warn!(session, "Voice capture failed: {}", e);
                self.composer.end_listening(true);
                None
            }
        }
    }

    pub fn hint_text(&self) -> &str {
        match self.composer.hint() {
            Hint::Normal => &self.text.input_hint,
            Hint::Listening => &self.text.listening_hint,
            Hint::VoiceError => &self.text.voice_error_hint,
        }
    }
}
