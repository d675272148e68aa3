/// Command buffer ring and the parser that drains it
///
/// The client appends header-prefixed records at `put`; the parser walks
/// from `get` to `put`, hands each record to a `CommandHandler` and advances
/// `get` past it. A record never straddles the end of the ring: the writer
/// pads the tail with a `Noop` and wraps to 0. A deferred command leaves
/// `get` on it so the next pass retries it. The first command error is
/// sticky and stops all further parsing.

use crate::decoder::commands::{self, Command, CommandId};
use crate::decoder::{CommandError, CommandOutcome, CommandResult, Decoder};
use std::fmt;

// ===== ERRORS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Not enough free entries for a record of `needed` words
    BufferFull { needed: usize, free: usize },
    /// Put offset outside the ring
    InvalidPut { put: usize, entries: usize },
    /// A record failed; parsing stopped at `offset`
    Command { offset: usize, error: CommandError },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BufferFull { needed, free } => {
                write!(f, "command buffer full ({} words needed, {} free)", needed, free)
            }
            ParseError::InvalidPut { put, entries } => {
                write!(f, "put offset {} outside a {} entry buffer", put, entries)
            }
            ParseError::Command { offset, error } => write!(f, "command at {} failed: {}", offset, error),
        }
    }
}

impl std::error::Error for ParseError {}

// ===== HANDLER =====

/// Receiver of parsed records
pub trait CommandHandler {
    /// Execute one record; `args` holds the `arg_count` words after the header
    fn execute(&mut self, command: u32, arg_count: u32, args: &[u32]) -> CommandResult;
}

impl CommandHandler for Decoder {
    fn execute(&mut self, command: u32, arg_count: u32, args: &[u32]) -> CommandResult {
        Decoder::execute(self, command, arg_count, args)
    }
}

// ===== COMMAND BUFFER =====

/// Fixed-size ring of command words
///
/// One entry always stays free so `get == put` means empty.
pub struct CommandBuffer {
    words: Vec<u32>,
    get: usize,
    put: usize,
}

impl CommandBuffer {
    pub fn new(entries: usize) -> Self {
        Self {
            words: vec![0; entries.max(2)],
            get: 0,
            put: 0,
        }
    }

    pub fn entry_count(&self) -> usize {
        self.words.len()
    }

    pub fn get_offset(&self) -> usize {
        self.get
    }

    pub fn put_offset(&self) -> usize {
        self.put
    }

    pub fn is_empty(&self) -> bool {
        self.get == self.put
    }

    pub fn free_entries(&self) -> usize {
        let n = self.words.len();
        (self.get + n - self.put - 1) % n
    }

    /// Append `cmd` with immediate `data`
    pub fn push<C: Command>(&mut self, cmd: &C, data: &[u32]) -> Result<(), ParseError> {
        self.push_record(&commands::encode(cmd, data))
    }

    /// Append a pre-encoded record, wrapping to the start when it does not
    /// fit before the end
    pub fn push_record(&mut self, record: &[u32]) -> Result<(), ParseError> {
        let n = self.words.len();
        let tail = n - self.put;
        let padding = if record.len() > tail { tail } else { 0 };
        let needed = record.len() + padding;
        if record.is_empty() || record.len() >= n || needed > self.free_entries() {
            return Err(ParseError::BufferFull { needed, free: self.free_entries() });
        }
        if padding > 0 {
            self.words[self.put] = commands::header(CommandId::Noop as u32, padding as u32);
            self.put = 0;
        }
        self.words[self.put..self.put + record.len()].copy_from_slice(record);
        self.put = (self.put + record.len()) % n;
        Ok(())
    }

    /// Write raw words at `offset` without moving `put`
    ///
    /// Out-of-range words are dropped. Lets a client lay down records by hand,
    /// malformed ones included.
    pub fn write_words(&mut self, offset: usize, words: &[u32]) {
        for (slot, word) in self.words.iter_mut().skip(offset).zip(words) {
            *slot = *word;
        }
    }

    /// Move `put` directly, as a client flushing a raw write would
    pub fn set_put(&mut self, put: usize) -> Result<(), ParseError> {
        if put >= self.words.len() {
            return Err(ParseError::InvalidPut { put, entries: self.words.len() });
        }
        self.put = put;
        Ok(())
    }
}

// ===== PARSER =====

/// Result of one `process_commands` pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// `get` caught up with `put`
    Empty,
    /// The command at `get` asked to be retried later
    Deferred,
    /// The per-pass command budget ran out with records left
    Yielded,
}

pub struct CommandParser {
    buffer: CommandBuffer,
    error: Option<ParseError>,
    processed: u64,
}

impl CommandParser {
    pub fn new(buffer: CommandBuffer) -> Self {
        Self {
            buffer,
            error: None,
            processed: 0,
        }
    }

    pub fn buffer(&self) -> &CommandBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut CommandBuffer {
        &mut self.buffer
    }

    /// Sticky error from an earlier pass
    pub fn error(&self) -> Option<ParseError> {
        self.error
    }

    /// Commands executed so far, deferred retries excluded
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Execute up to `max_commands` records
    pub fn process_commands(
        &mut self,
        handler: &mut dyn CommandHandler,
        max_commands: usize,
    ) -> Result<ParseStatus, ParseError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        for _ in 0..max_commands {
            if self.buffer.is_empty() {
                return Ok(ParseStatus::Empty);
            }
            match self.process_one(handler) {
                Ok(CommandOutcome::Done) => self.processed += 1,
                Ok(CommandOutcome::Deferred) => return Ok(ParseStatus::Deferred),
                Err(error) => {
                    let error = ParseError::Command { offset: self.buffer.get, error };
                    crate::gpu_error!("gpu::CommandParser", "Parsing stopped: {}", error);
                    self.error = Some(error);
                    return Err(error);
                }
            }
        }
        Ok(if self.buffer.is_empty() { ParseStatus::Empty } else { ParseStatus::Yielded })
    }

    /// Drain everything up to `put`
    pub fn process_all_commands(&mut self, handler: &mut dyn CommandHandler) -> Result<ParseStatus, ParseError> {
        self.process_commands(handler, usize::MAX)
    }

    fn process_one(&mut self, handler: &mut dyn CommandHandler) -> CommandResult {
        let buffer = &mut self.buffer;
        let n = buffer.words.len();
        let get = buffer.get;
        let (command, size) = commands::split_header(buffer.words[get]);
        let size = size as usize;
        if size == 0 {
            return Err(CommandError::InvalidSize);
        }
        if get + size > n {
            return Err(CommandError::OutOfBounds);
        }
        // The record must be fully written
        let available = if buffer.put > get { buffer.put - get } else { n - get };
        if size > available {
            return Err(CommandError::InvalidSize);
        }

        let args = &buffer.words[get + 1..get + size];
        let outcome = handler.execute(command, (size - 1) as u32, args)?;
        if outcome == CommandOutcome::Done {
            buffer.get = (get + size) % n;
        } else {
            crate::gpu_trace!("gpu::CommandParser", "Command {} at {} deferred", command, get);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "cmd_parser_tests.rs"]
mod tests;
