use iced::widget::text::Span;
use iced::widget::{button, column, container, rich_text, text};
use iced::{alignment, font, Element, Font, Length};

use crate::composer::{Affordance, Controls};
use crate::config::TextConfig;
use crate::markup::{self, Fragment};
use crate::transcript::{ActionChip, Body, Entry, Message as ChatMessage, Sender};
use crate::Message;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn spinner_len() -> usize {
    SPINNER_FRAMES.len()
}

fn bold_font() -> Font {
    Font {
        weight: font::Weight::Bold,
        ..Font::MONOSPACE
    }
}

fn spans(fragments: &[Fragment]) -> Vec<Span<'static, Message, Font>> {
    fragments
        .iter()
        .map(|fragment| match fragment {
            Fragment::Text { content, bold: true } => Span::new(content.clone()).font(bold_font()),
            Fragment::Text { content, bold: false } => Span::new(content.clone()),
            Fragment::LineBreak => Span::new("\n"),
        })
        .collect()
}

fn markup_text(source: &str) -> Element<'static, Message> {
    rich_text(spans(&markup::translate(source))).size(15).into()
}

fn chip(chip: &ActionChip) -> Element<'static, Message> {
    let label = if chip.icon.is_empty() {
        chip.label.clone()
    } else {
        format!("{} {}", chip.icon, chip.label)
    };

    let mut content = column![].spacing(8);
    if !chip.pre_text.is_empty() {
        content = content.push(markup_text(&chip.pre_text));
    }
    content
        .push(
            button(text(label).size(14))
                .on_press(Message::OpenLink(chip.url.clone()))
                .padding(8),
        )
        .into()
}

fn bubble(sender: Sender, content: Element<'static, Message>) -> Element<'static, Message> {
    let align = match sender {
        Sender::User => alignment::Horizontal::Right,
        Sender::Assistant => alignment::Horizontal::Left,
    };

    container(
        container(content)
            .padding(10)
            .max_width(380)
            .style(container::rounded_box),
    )
    .width(Length::Fill)
    .align_x(align)
    .into()
}

pub fn message(message: &ChatMessage) -> Element<'static, Message> {
    let content = match &message.body {
        // User text is shown as typed.
        Body::Plain(body) if message.sender == Sender::User => text(body.clone()).size(15).into(),
        Body::Plain(body) => markup_text(body),
        Body::ActionChip(action) => chip(action),
    };
    bubble(message.sender, content)
}

pub fn entry(entry: &Entry, texts: &TextConfig, frame: usize) -> Element<'static, Message> {
    match entry {
        Entry::Message(m) => message(m),
        Entry::Pending { .. } => {
            let spinner = SPINNER_FRAMES[frame % SPINNER_FRAMES.len()];
            bubble(
                Sender::Assistant,
                text(format!("{} {}", spinner, texts.thinking)).size(15).into(),
            )
        }
    }
}

pub fn affordance_button(controls: Controls) -> Element<'static, Message> {
    let (label, on_press) = match controls.affordance {
        Affordance::Microphone if controls.recording => ("[● Rec]", Message::MicPressed),
        Affordance::Microphone => ("[Mic]", Message::MicPressed),
        Affordance::Send => ("[Send]", Message::Submit),
        Affordance::Stop => ("[Stop]", Message::Stop),
    };

    let style = if controls.recording {
        button::danger
    } else {
        button::primary
    };

    button(text(label).size(14))
        .on_press_maybe(controls.enabled.then_some(on_press))
        .padding(12)
        .style(style)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_follow_fragments() {
        let spans = spans(&markup::translate("Mass **Sunday**\n10h"));
        let texts: Vec<&str> = spans.iter().map(|s| &*s.text).collect();
        assert_eq!(texts, vec!["Mass ", "Sunday", "\n", "10h"]);
        assert_eq!(spans[1].font, Some(bold_font()));
        assert_eq!(spans[0].font, None);
    }
}
