mod audio;
mod backend;
mod composer;
mod config;
mod controller;
mod markup;
mod render;
mod transcript;
mod voice;

use iced::{
    widget::{column, container, row, scrollable, text_editor},
    Element, Length, Task, Theme, Font, Subscription, Size,
    time,
    keyboard::{self, Key},
    event::{self, Event as IcedEvent},
    alignment,
    window,
};
use iced::widget::text_editor::{Binding, KeyPress};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use backend::{ChatClient, ChatError, Reply};
use composer::ComposerState;
use controller::{Controller, Outgoing};
use voice::{VoiceCapture, VoiceOutcome};

fn init_logging() {
    let filter = EnvFilter::try_from_env("HOPE_CHAT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let config = config::Config::load();
    let client = ChatClient::with_config(&config.backend)?;
    let voice = VoiceCapture::detect(&config.voice);
    info!(endpoint = client.endpoint(), voice = voice.is_some(), "Starting chat window");

    let window_settings = window::Settings {
        size: Size::new(config.window.width as f32, config.window.height as f32),
        min_size: Some(Size::new(config.window.min_width as f32, config.window.min_height as f32)),
        position: window::Position::Centered,
        ..Default::default()
    };

    iced::application("Hope", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window_settings)
        .default_font(Font::MONOSPACE)
        .run_with(move || App::new(config, client, voice))?;

    Ok(())
}

#[derive(Debug, Clone)]
pub enum Message {
    Edit(text_editor::Action),
    Submit,
    Stop,
    MicPressed,
    ReplyReceived(u64, Result<Reply, ChatError>),
    VoiceFinished(u64, VoiceOutcome),
    OpenLink(String),
    Tick,
    Escape,
}

const INPUT_TEXT_SIZE: f32 = 16.0;
const INPUT_PADDING: f32 = 12.0;

/// Enter sends, Shift+Enter breaks the line.
fn input_key_binding(key_press: KeyPress) -> Option<Binding<Message>> {
    let submits = matches!(key_press.key.as_ref(), Key::Named(keyboard::key::Named::Enter))
        && !key_press.modifiers.shift()
        && key_press.status == text_editor::Status::Focused;

    if submits {
        Some(Binding::Custom(Message::Submit))
    } else {
        Binding::from_key_press(key_press)
    }
}

/// The editor always reports a trailing newline; the composer never stores it.
fn editor_text(editor: &text_editor::Content) -> String {
    let mut text = editor.text();
    if text.ends_with('\n') {
        text.pop();
    }
    text
}

/// Gives keyboard focus to the input, the only focusable widget in the window.
fn focus_input() -> Task<Message> {
    use iced::advanced::widget::operation::{Focusable, Operation};
    use iced::advanced::widget::Id;
    use iced::Rectangle;

    struct FocusInput;

    impl<T> Operation<T> for FocusInput {
        fn container(
            &mut self,
            _id: Option<&Id>,
            _bounds: Rectangle,
            operate_on_children: &mut dyn FnMut(&mut dyn Operation<T>),
        ) {
            operate_on_children(self)
        }

        fn focusable(&mut self, state: &mut dyn Focusable, _id: Option<&Id>) {
            state.focus();
        }
    }

    iced::advanced::widget::operate(FocusInput)
}

struct App {
    controller: Controller,
    client: ChatClient,
    voice: Option<VoiceCapture>,
    capture_stop: Option<CancellationToken>,
    editor: text_editor::Content,
    transcript_id: scrollable::Id,
    spinner_frame: usize,
}

impl App {
    fn new(config: config::Config, client: ChatClient, voice: Option<VoiceCapture>) -> (Self, Task<Message>) {
        let mut controller = Controller::new(config.text, config.voice.auto_submit, voice.is_some());
        controller.greet();

        let app = App {
            controller,
            client,
            voice,
            capture_stop: None,
            editor: text_editor::Content::new(),
            transcript_id: scrollable::Id::unique(),
            spinner_frame: 0,
        };

        let task = Task::batch([focus_input(), app.scroll_to_end()]);
        (app, task)
    }

    fn scroll_to_end(&self) -> Task<Message> {
        scrollable::snap_to(self.transcript_id.clone(), scrollable::RelativeOffset::END)
    }

    /// Rebuilds the editor buffer after the controller replaced the input.
    fn sync_editor(&mut self) {
        let input = self.controller.composer().input();
        if editor_text(&self.editor) != input {
            self.editor = text_editor::Content::with_text(input);
        }
    }

    fn dispatch(&self, outgoing: Outgoing) -> Task<Message> {
        let client = self.client.clone();
        let Outgoing { token, text } = outgoing;

        let request = Task::perform(
            async move { client.send(&text).await },
            move |result| Message::ReplyReceived(token, result),
        );

        Task::batch([self.scroll_to_end(), request])
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Edit(action) => {
                if !self.controller.controls().input_enabled {
                    return Task::none();
                }
                let edited = action.is_edit();
                self.editor.perform(action);
                if edited {
                    self.controller.input_changed(editor_text(&self.editor));
                }
                Task::none()
            }
            Message::Submit => match self.controller.submit_input() {
                Some(outgoing) => {
                    self.sync_editor();
                    self.dispatch(outgoing)
                }
                None => Task::none(),
            },
            Message::ReplyReceived(token, result) => {
                if self.controller.complete(token, result) {
                    Task::batch([self.scroll_to_end(), focus_input()])
                } else {
                    Task::none()
                }
            }
            Message::Stop => {
                if self.controller.stop() {
                    Task::batch([self.scroll_to_end(), focus_input()])
                } else {
                    Task::none()
                }
            }
            Message::MicPressed => {
                if self.controller.listening_session().is_some() {
                    if let Some(stop) = &self.capture_stop {
                        stop.cancel();
                    }
                    return Task::none();
                }

                let Some(capture) = self.voice.clone() else {
                    return Task::none();
                };
                let Some(session) = self.controller.start_listening() else {
                    return Task::none();
                };

                self.sync_editor();
                let stop = CancellationToken::new();
                self.capture_stop = Some(stop.clone());
                Task::perform(capture.listen(stop), move |outcome| {
                    Message::VoiceFinished(session, outcome)
                })
            }
            Message::VoiceFinished(session, outcome) => {
                if self.controller.listening_session() == Some(session) {
                    self.capture_stop = None;
                }
                let outgoing = self.controller.voice_finished(session, outcome);
                self.sync_editor();
                match outgoing {
                    Some(outgoing) => self.dispatch(outgoing),
                    None => focus_input(),
                }
            }
            Message::OpenLink(url) => {
                if !backend::is_web_link(&url) {
                    warn!(%url, "Refusing to open a non-web link");
                    return Task::none();
                }
                if let Err(e) = open::that(&url) {
                    warn!(%url, "Could not open link: {}", e);
                }
                Task::none()
            }
            Message::Tick => {
                self.spinner_frame = (self.spinner_frame + 1) % render::spinner_len();
                Task::none()
            }
            Message::Escape => match self.controller.composer().state() {
                ComposerState::AwaitingReply => self.update(Message::Stop),
                ComposerState::ListeningForSpeech => self.update(Message::MicPressed),
                ComposerState::Idle => iced::exit(),
            },
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let timer = if self.controller.composer().state() == ComposerState::AwaitingReply {
            time::every(Duration::from_millis(80)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };

        let events = event::listen_with(|event, _status, _id| {
            if let IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Named(keyboard::key::Named::Escape),
                ..
            }) = event
            {
                Some(Message::Escape)
            } else {
                None
            }
        });

        Subscription::batch([timer, events])
    }

    fn view(&self) -> Element<Message> {
        let controls = self.controller.controls();
        let texts = self.controller.texts();

        let entries = column(
            self.controller
                .transcript()
                .entries()
                .iter()
                .map(|entry| render::entry(entry, texts, self.spinner_frame)),
        )
        .spacing(10)
        .padding(10);

        let transcript = scrollable(entries)
            .id(self.transcript_id.clone())
            .height(Length::Fill);

        let rows = self.controller.composer().input_rows() as f32;
        let line_height = INPUT_TEXT_SIZE * 1.3;

        let mut input = text_editor(&self.editor)
            .placeholder(self.controller.hint_text())
            .padding(INPUT_PADDING)
            .size(INPUT_TEXT_SIZE)
            .height(rows * line_height + 2.0 * INPUT_PADDING)
            .key_binding(input_key_binding);
        if controls.input_enabled {
            input = input.on_action(Message::Edit);
        }

        let composer = row![input, render::affordance_button(controls)]
            .spacing(8)
            .align_y(alignment::Vertical::Center);

        container(column![transcript, composer].spacing(10).padding(10))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}
