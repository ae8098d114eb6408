#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComposerState {
    #[default]
    Idle,
    AwaitingReply,
    ListeningForSpeech,
}

/// The single control shown next to the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    Microphone,
    Send,
    Stop,
}

/// Presentation state derived from the composer; carries no behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub affordance: Affordance,
    pub enabled: bool,
    pub recording: bool,
    pub input_enabled: bool,
}

impl Controls {
    pub fn derive(state: ComposerState, input: &str, voice_available: bool) -> Self {
        match state {
            ComposerState::AwaitingReply => Controls {
                affordance: Affordance::Stop,
                enabled: true,
                recording: false,
                input_enabled: false,
            },
            ComposerState::ListeningForSpeech => Controls {
                affordance: Affordance::Microphone,
                enabled: true,
                recording: true,
                input_enabled: false,
            },
            ComposerState::Idle if !input.trim().is_empty() => Controls {
                affordance: Affordance::Send,
                enabled: true,
                recording: false,
                input_enabled: true,
            },
            ComposerState::Idle if voice_available => Controls {
                affordance: Affordance::Microphone,
                enabled: true,
                recording: false,
                input_enabled: true,
            },
            ComposerState::Idle => Controls {
                affordance: Affordance::Send,
                enabled: false,
                recording: false,
                input_enabled: true,
            },
        }
    }
}

/// Most lines the input grows to before it scrolls.
pub const MAX_INPUT_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hint {
    #[default]
    Normal,
    Listening,
    VoiceError,
}

/// Input field contents plus the state machine driving its controls.
#[derive(Debug, Default)]
pub struct Composer {
    state: ComposerState,
    input: String,
    hint: Hint,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ComposerState {
        self.state
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn hint(&self) -> Hint {
        self.hint
    }

    /// Visible height of the input, in lines. Back to one once cleared.
    pub fn input_rows(&self) -> usize {
        self.input.trim_end_matches('\n').lines().count().clamp(1, MAX_INPUT_ROWS)
    }

    pub fn controls(&self, voice_available: bool) -> Controls {
        Controls::derive(self.state, &self.input, voice_available)
    }

    pub fn set_input(&mut self, value: String) {
        if self.state == ComposerState::Idle {
            if self.hint == Hint::VoiceError {
                self.hint = Hint::Normal;
            }
            self.input = value;
        }
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
    }

    /// Idle -> AwaitingReply. Returns false if the composer was busy.
    pub fn lock(&mut self) -> bool {
        if self.state != ComposerState::Idle {
            return false;
        }
        self.state = ComposerState::AwaitingReply;
        true
    }

    /// AwaitingReply -> Idle. Returns false if there was nothing to unlock.
    pub fn unlock(&mut self) -> bool {
        if self.state != ComposerState::AwaitingReply {
            return false;
        }
        self.state = ComposerState::Idle;
        true
    }

    /// Idle -> ListeningForSpeech; clears whatever was typed.
    pub fn begin_listening(&mut self) -> bool {
        if self.state != ComposerState::Idle {
            return false;
        }
        self.input.clear();
        self.hint = Hint::Listening;
        self.state = ComposerState::ListeningForSpeech;
        true
    }

    /// ListeningForSpeech -> Idle.
    pub fn end_listening(&mut self, failed: bool) -> bool {
        if self.state != ComposerState::ListeningForSpeech {
            return false;
        }
        self.hint = if failed { Hint::VoiceError } else { Hint::Normal };
        self.state = ComposerState::Idle;
        true
    }
}
