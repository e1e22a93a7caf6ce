use color_eyre::{eyre::eyre, Result};

/// Longest input sent to the API, in characters.
const MAX_INPUT_CHARS: usize = 10_000;
/// Accepted length of the trimmed text, in characters.
const MIN_SUBMIT_CHARS: usize = 2;
const MAX_SUBMIT_CHARS: usize = 5_000;
/// Whitespace runs at least this long are collapsed to this many spaces.
const MAX_WHITESPACE_RUN: usize = 10;

fn is_stripped_control(c: char) -> bool {
  matches!(c, '\0'..='\x08' | '\x0B' | '\x0C' | '\x0E'..='\x1F' | '\x7F')
}

/// Clean user text before it is sent or used in a cache key.
///
/// Drops control characters other than tab, newline and carriage return,
/// collapses long whitespace runs, and caps the length.
pub fn sanitize_text_input(input: &str) -> String {
  let mut out = String::with_capacity(input.len().min(MAX_INPUT_CHARS));
  let mut pending = String::new();
  let mut pending_len = 0;

  let flush = |out: &mut String, pending: &mut String, pending_len: &mut usize| {
    if *pending_len >= MAX_WHITESPACE_RUN {
      out.push_str(&" ".repeat(MAX_WHITESPACE_RUN));
    } else {
      out.push_str(pending);
    }
    pending.clear();
    *pending_len = 0;
  };

  for c in input.chars().filter(|c| !is_stripped_control(*c)) {
    if c.is_whitespace() {
      pending.push(c);
      pending_len += 1;
    } else {
      flush(&mut out, &mut pending, &mut pending_len);
      out.push(c);
    }
  }
  flush(&mut out, &mut pending, &mut pending_len);

  out.chars().take(MAX_INPUT_CHARS).collect()
}

/// Reject text that is blank, too short or too long once trimmed.
pub fn validate_text(text: &str) -> Result<()> {
  let length = text.trim().chars().count();
  if length == 0 {
    return Err(eyre!("Please enter some text to analyze or translate"));
  }
  if length < MIN_SUBMIT_CHARS {
    return Err(eyre!(
      "Text is too short. Please enter at least {} characters",
      MIN_SUBMIT_CHARS
    ));
  }
  if length > MAX_SUBMIT_CHARS {
    return Err(eyre!(
      "Text is too long. Maximum {} characters allowed",
      MAX_SUBMIT_CHARS
    ));
  }
  Ok(())
}
