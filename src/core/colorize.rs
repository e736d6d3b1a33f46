//! Terminal colour codes -> styled markup.
//!
//! Log text keeps its escape codes until it is colourized. Colourized output
//! is a flat token list where styles never nest: opening a new style closes
//! the previous one.

use strum::{AsRefStr, EnumIter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Tone {
    Gray,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Turquoise,
}

impl Tone {
    /// Style class used for this tone; plain and bold magenta differ.
    pub fn class(self, bold: bool) -> &'static str {
        match (self, bold) {
            (Tone::Gray, _) => "gray",
            (Tone::Red, _) => "red",
            (Tone::Green, _) => "green",
            (Tone::Yellow, _) => "yellow",
            (Tone::Blue, _) => "blue",
            (Tone::Magenta, false) => "magentapink",
            (Tone::Magenta, true) => "pink",
            (Tone::Turquoise, _) => "turquoise",
        }
    }

    fn from_digit(digit: char) -> Option<Self> {
        Some(match digit {
            '0' => Tone::Gray,
            '1' => Tone::Red,
            '2' => Tone::Green,
            '3' => Tone::Yellow,
            '4' => Tone::Blue,
            '5' => Tone::Magenta,
            '6' => Tone::Turquoise,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    Text(String),
    Open { tone: Tone, bold: bool },
    Close,
}

enum Code {
    Style { tone: Tone, bold: bool, len: usize },
    Reset,
}

const RESET: &[char] = &['\u{1b}', '[', 'm'];

fn code_at(chars: &[char], idx: usize) -> Option<Code> {
    let rest = &chars[idx..];
    if rest.first() != Some(&'\u{1b}') {
        return None;
    }
    if rest.starts_with(RESET) {
        return Some(Code::Reset);
    }
    match rest {
        ['\u{1b}', '[', '3', digit, 'm', ..] => Tone::from_digit(*digit).map(|tone| Code::Style {
            tone,
            bold: false,
            len: 5,
        }),
        ['\u{1b}', '[', '1', ';', '3', digit, 'm', ..] => {
            Tone::from_digit(*digit).map(|tone| Code::Style {
                tone,
                bold: true,
                len: 7,
            })
        }
        _ => None,
    }
}

#[derive(Default)]
struct Emitter {
    out: Vec<Markup>,
    text: String,
    open: bool,
}

impl Emitter {
    fn flush(&mut self) {
        if !self.text.is_empty() {
            self.out.push(Markup::Text(std::mem::take(&mut self.text)));
        }
    }

    fn open(&mut self, tone: Tone, bold: bool) {
        self.close();
        self.flush();
        self.out.push(Markup::Open { tone, bold });
        self.open = true;
    }

    fn close(&mut self) {
        if self.open {
            self.flush();
            self.out.push(Markup::Close);
            self.open = false;
        }
    }

    fn finish(mut self) -> Vec<Markup> {
        self.close();
        self.flush();
        self.out
    }
}

/// Convert the colour codes found in the first `window` characters of text.
///
/// `tokens` may already contain markup from an earlier run; it is carried
/// over and kept non-nesting. Text past the window passes through unchanged,
/// and a style opened by a code inside the window ends at the window edge.
pub fn colorize(tokens: &[Markup], window: usize) -> Vec<Markup> {
    let mut em = Emitter::default();
    let mut seen = 0usize;
    // whether the open style was started by a code in this pass
    let mut ours = false;

    for token in merge_text(tokens) {
        match token {
            Markup::Open { tone, bold } => {
                em.open(tone, bold);
                ours = false;
            }
            Markup::Close => em.close(),
            Markup::Text(text) => {
                let chars: Vec<char> = text.chars().collect();
                let mut idx = 0;
                while idx < chars.len() {
                    if seen >= window {
                        if ours {
                            em.close();
                            ours = false;
                        }
                        em.text.extend(&chars[idx..]);
                        seen += chars.len() - idx;
                        break;
                    }
                    match code_at(&chars, idx) {
                        Some(Code::Style { tone, bold, len }) => {
                            em.open(tone, bold);
                            ours = true;
                            idx += len;
                            seen += len;
                        }
                        Some(Code::Reset) if em.open => {
                            em.close();
                            ours = false;
                            idx += RESET.len();
                            seen += RESET.len();
                        }
                        _ => {
                            em.text.push(chars[idx]);
                            idx += 1;
                            seen += 1;
                        }
                    }
                }
            }
        }
    }
    em.finish()
}

fn merge_text(tokens: &[Markup]) -> Vec<Markup> {
    let mut merged: Vec<Markup> = Vec::with_capacity(tokens.len());
    for token in tokens {
        match (merged.last_mut(), token) {
            (Some(Markup::Text(prev)), Markup::Text(next)) => prev.push_str(next),
            (_, token) => merged.push(token.clone()),
        }
    }
    merged
}

/// The text with all markup dropped.
pub fn plain_text(tokens: &[Markup]) -> String {
    tokens
        .iter()
        .filter_map(|token| match token {
            Markup::Text(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

pub fn to_html(tokens: &[Markup]) -> String {
    let mut html = String::new();
    let mut stack: Option<bool> = None;
    for token in tokens {
        match token {
            Markup::Text(text) => html.push_str(&escape_html(text)),
            Markup::Open { tone, bold } => {
                let tag = if *bold { "b" } else { "span" };
                html.push_str(&format!("<{tag} class=\"{}\">", tone.class(*bold)));
                stack = Some(*bold);
            }
            Markup::Close => {
                if let Some(bold) = stack.take() {
                    html.push_str(if bold { "</b>" } else { "</span>" });
                }
            }
        }
    }
    html
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
