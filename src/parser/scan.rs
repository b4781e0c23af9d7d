//! String-aware lexical scans over (possibly broken) JSON text.

use std::ops::Range;

/// Marks every byte that lies strictly inside a string literal. Quote
/// characters themselves are outside.
pub fn string_mask(text: &str) -> Vec<bool> {
    let mut mask = vec![false; text.len()];
    let mut in_string = false;
    let mut escaped = false;
    for (i, b) in text.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
                continue;
            }
            mask[i] = true;
        } else if b == b'"' {
            in_string = true;
        }
    }
    mask
}

/// Span of the first top-level object: from the first `{` to the brace that
/// brings depth back to zero, or to the end of the text if it never does.
pub fn object_span(text: &str) -> Option<Range<usize>> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, b) in text.bytes().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start..i + 1);
                }
            }
            _ => {}
        }
    }
    Some(start..text.len())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub close: char,
    /// Where the entry currently being written begins: the separating comma,
    /// or just past the opening bracket for the first entry.
    pub entry_start: usize,
    expecting_key: bool,
    /// An object key was read but no `:` yet.
    pub key_done: bool,
    /// A `:` was read but no value has started.
    pub value_pending: bool,
}

impl Frame {
    fn new(close: char, entry_start: usize) -> Self {
        Self {
            close,
            entry_start,
            expecting_key: close == '}',
            key_done: false,
            value_pending: false,
        }
    }

    pub fn is_object(&self) -> bool {
        self.close == '}'
    }

    /// The current entry is a key with no value behind it.
    pub fn entry_incomplete(&self) -> bool {
        self.is_object() && (self.key_done || self.value_pending)
    }
}

/// What is still open at the end of a JSON prefix.
#[derive(Debug, Clone, Default)]
pub struct OpenState {
    pub stack: Vec<Frame>,
    pub in_string: bool,
    /// The prefix ends in the middle of an escape sequence.
    pub escaped: bool,
}

impl OpenState {
    pub fn is_complete(&self) -> bool {
        self.stack.is_empty() && !self.in_string
    }
}

pub fn open_state(text: &str) -> OpenState {
    let mut state = OpenState::default();
    for (i, b) in text.bytes().enumerate() {
        if state.in_string {
            if state.escaped {
                state.escaped = false;
            } else if b == b'\\' {
                state.escaped = true;
            } else if b == b'"' {
                state.in_string = false;
                if let Some(top) = state.stack.last_mut() {
                    if top.is_object() && top.expecting_key {
                        top.expecting_key = false;
                        top.key_done = true;
                    }
                }
            }
            continue;
        }
        match b {
            b'"' => {
                state.in_string = true;
                value_started(&mut state.stack);
            }
            b'{' => {
                value_started(&mut state.stack);
                state.stack.push(Frame::new('}', i + 1));
            }
            b'[' => {
                value_started(&mut state.stack);
                state.stack.push(Frame::new(']', i + 1));
            }
            b'}' | b']' => {
                state.stack.pop();
            }
            b',' => {
                if let Some(top) = state.stack.last_mut() {
                    top.entry_start = i;
                    top.expecting_key = top.is_object();
                    top.key_done = false;
                    top.value_pending = false;
                }
            }
            b':' => {
                if let Some(top) = state.stack.last_mut() {
                    top.key_done = false;
                    top.value_pending = top.is_object();
                }
            }
            b if b.is_ascii_whitespace() => {}
            _ => value_started(&mut state.stack),
        }
    }
    state
}

fn value_started(stack: &mut [Frame]) {
    if let Some(top) = stack.last_mut() {
        top.value_pending = false;
    }
}

// ── Tests ──
