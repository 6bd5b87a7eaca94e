//! Interactive input, with masking for secret values.
//!
//! Masked input puts the terminal into raw mode for the duration of a single
//! read. Raw mode is held by `RawModeGuard`, whose `Drop` restores the
//! terminal on every way out of the read: normal return, `?` on an I/O error,
//! Ctrl+C (reported as `ProvisionError::Interrupted`) or a panic unwinding
//! through the prompt.

use crate::error::{ProvisionError, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, BufRead, IsTerminal, Write};

/// A value read from a masked prompt.
///
/// `Debug` and `Display` never show the value. The backing allocation is
/// zeroed on drop, and the type is not `Clone` so no unscrubbed copy can
/// outlive it.
#[derive(Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Strip surrounding whitespace without copying the value elsewhere
    fn trim_in_place(&mut self) {
        let end = self.0.trim_end().len();
        self.0.truncate(end);
        let start = self.0.len() - self.0.trim_start().len();
        self.0.drain(..start);
    }

    /// The actual value. Only the config writer should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        scrub(&mut std::mem::take(&mut self.0).into_bytes());
    }
}

/// Zero the whole allocation, including spare capacity where trimmed or
/// erased characters still sit
fn scrub(bytes: &mut Vec<u8>) {
    bytes.resize(bytes.capacity(), 0);
    for byte in bytes.iter_mut() {
        // SAFETY: `byte` is a valid, aligned, exclusive reference
        unsafe { std::ptr::write_volatile(byte, 0) };
    }
}

/// Source of operator input.
pub trait Prompter {
    /// Ask for a value without echoing it. Surrounding whitespace is trimmed.
    fn secret(&mut self, label: &str) -> Result<Secret>;

    /// Ask for a plain value. Surrounding whitespace is trimmed.
    fn line(&mut self, label: &str) -> Result<String>;
}

/// Holds the terminal in raw mode; restores it on drop.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn acquire() -> Result<Self> {
        terminal::enable_raw_mode()
            .map_err(|e| ProvisionError::terminal(format!("Failed to enable raw mode: {}", e)))?;
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Leave raw mode if a prompt currently holds it. Safe to call at any time.
pub fn restore_terminal() {
    let _ = terminal::disable_raw_mode();
}

/// Prompts on the controlling terminal.
///
/// When stdin is not a terminal (piped input) values are read line by line
/// and masking does not apply.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }

    /// Input is read straight into a `Secret` so the buffer is scrubbed on
    /// every path out, errors included
    fn read_plain_line(label: &str) -> Result<Secret> {
        let mut out = io::stdout();
        write!(out, "{}: ", label)?;
        out.flush()?;

        let mut input = Secret::default();
        let read = io::stdin().lock().read_line(&mut input.0)?;
        if read == 0 {
            tracing::debug!("stdin closed while reading {:?}", label);
        }
        input.trim_in_place();
        Ok(input)
    }

    fn read_masked(label: &str) -> Result<Secret> {
        let mut out = io::stdout();
        write!(out, "{}: ", label)?;
        out.flush()?;

        let mut value = Secret::default();
        {
            let _raw = RawModeGuard::acquire()?;
            loop {
                let key = match event::read()? {
                    Event::Key(key) if key.kind != KeyEventKind::Release => key,
                    _ => continue,
                };
                match apply_key(&mut value.0, key) {
                    KeyAction::Echo => write!(out, "*")?,
                    KeyAction::Erase => write!(out, "\u{8} \u{8}")?,
                    KeyAction::Ignore => continue,
                    KeyAction::Submit => break,
                    KeyAction::Interrupt => {
                        write!(out, "\r\n")?;
                        out.flush()?;
                        return Err(ProvisionError::Interrupted);
                    }
                }
                out.flush()?;
            }
            write!(out, "\r\n")?;
            out.flush()?;
        }

        value.trim_in_place();
        Ok(value)
    }
}

impl Prompter for TerminalPrompter {
    fn secret(&mut self, label: &str) -> Result<Secret> {
        if io::stdin().is_terminal() {
            Self::read_masked(label)
        } else {
            Self::read_plain_line(label)
        }
    }

    fn line(&mut self, label: &str) -> Result<String> {
        Self::read_plain_line(label).map(|value| value.expose().to_string())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum KeyAction {
    Echo,
    Erase,
    Ignore,
    Submit,
    Interrupt,
}

/// Apply one key press to the masked buffer
fn apply_key(buffer: &mut String, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Enter => KeyAction::Submit,
        KeyCode::Char('c') | KeyCode::Char('d')
            if key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            KeyAction::Interrupt
        }
        KeyCode::Backspace => {
            if buffer.pop().is_some() {
                KeyAction::Erase
            } else {
                KeyAction::Ignore
            }
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            buffer.push(c);
            KeyAction::Echo
        }
        _ => KeyAction::Ignore,
    }
}

/// Prompter that replays canned answers, for tests and non-interactive use.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    asked: Vec<String>,
    /// Report Ctrl+C instead of an error once the answers run out
    interrupt_when_exhausted: bool,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
            interrupt_when_exhausted: false,
        }
    }

    /// After the last answer, the operator presses Ctrl+C
    pub fn then_interrupt(mut self) -> Self {
        self.interrupt_when_exhausted = true;
        self
    }

    /// Labels of every prompt issued so far, in order
    pub fn asked(&self) -> &[String] {
        &self.asked
    }

    fn next_answer(&mut self, label: &str) -> Result<String> {
        self.asked.push(label.to_string());
        match self.answers.pop_front() {
            Some(answer) => Ok(answer.trim().to_string()),
            None if self.interrupt_when_exhausted => Err(ProvisionError::Interrupted),
            None => Err(ProvisionError::terminal(format!(
                "No answer scripted for {:?}",
                label
            ))),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn secret(&mut self, label: &str) -> Result<Secret> {
        self.next_answer(label).map(Secret::new)
    }

    fn line(&mut self, label: &str) -> Result<String> {
        self.next_answer(label)
    }
}
