/// Sticky GL errors of one decoder
///
/// One bit per GL error kind. Errors raised by validation and errors the
/// driver reports are folded into the same set; a poll returns the lowest
/// set error and clears only that bit.

use crate::driver::GraphicsDriver;
use crate::gl;
use bitflags::bitflags;

/// Log lines emitted per context before going quiet
pub const MAX_LOG_MESSAGES: u32 = 256;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ErrorBits: u32 {
        const INVALID_ENUM = 1 << 0;
        const INVALID_VALUE = 1 << 1;
        const INVALID_OPERATION = 1 << 2;
        const OUT_OF_MEMORY = 1 << 3;
        const INVALID_FRAMEBUFFER_OPERATION = 1 << 4;
        const CONTEXT_LOST = 1 << 5;
    }
}

fn bit_for(error: u32) -> ErrorBits {
    match error {
        gl::INVALID_ENUM => ErrorBits::INVALID_ENUM,
        gl::INVALID_VALUE => ErrorBits::INVALID_VALUE,
        gl::INVALID_OPERATION => ErrorBits::INVALID_OPERATION,
        gl::OUT_OF_MEMORY => ErrorBits::OUT_OF_MEMORY,
        gl::INVALID_FRAMEBUFFER_OPERATION => ErrorBits::INVALID_FRAMEBUFFER_OPERATION,
        gl::CONTEXT_LOST => ErrorBits::CONTEXT_LOST,
        _ => ErrorBits::empty(),
    }
}

fn error_for(bit: ErrorBits) -> u32 {
    if bit == ErrorBits::INVALID_ENUM {
        gl::INVALID_ENUM
    } else if bit == ErrorBits::INVALID_VALUE {
        gl::INVALID_VALUE
    } else if bit == ErrorBits::INVALID_OPERATION {
        gl::INVALID_OPERATION
    } else if bit == ErrorBits::OUT_OF_MEMORY {
        gl::OUT_OF_MEMORY
    } else if bit == ErrorBits::INVALID_FRAMEBUFFER_OPERATION {
        gl::INVALID_FRAMEBUFFER_OPERATION
    } else if bit == ErrorBits::CONTEXT_LOST {
        gl::CONTEXT_LOST
    } else {
        gl::NO_ERROR
    }
}

#[derive(Debug, Default)]
pub struct ErrorState {
    bits: ErrorBits,
    log_count: u32,
}

impl Default for ErrorBits {
    fn default() -> Self {
        ErrorBits::empty()
    }
}

impl ErrorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `error` raised by `function`
    pub fn set_gl_error(&mut self, error: u32, function: &str, message: &str) {
        self.log(format_args!("[{}] GL ERROR :{:#06x} : {}", function, error, message));
        self.bits |= bit_for(error);
    }

    /// Record INVALID_ENUM for a rejected enum argument
    pub fn set_gl_error_invalid_enum(&mut self, function: &str, value: u32, label: &str) {
        self.set_gl_error(gl::INVALID_ENUM, function, &format!("{} was {:#06x}", label, value));
    }

    fn log(&mut self, args: std::fmt::Arguments<'_>) {
        if self.log_count < MAX_LOG_MESSAGES {
            self.log_count += 1;
            crate::gpu_warn!("gpu::Decoder", "{}", args);
            if self.log_count == MAX_LOG_MESSAGES {
                crate::gpu_warn!("gpu::Decoder", "Too many GL errors, not reporting any more for this context");
            }
        }
    }

    /// Drain driver errors without recording them
    ///
    /// Used around service-internal driver calls whose failures must not
    /// reach the client.
    pub fn clear_real_gl_errors(&mut self, driver: &mut dyn GraphicsDriver) {
        loop {
            let error = driver.get_error();
            if error == gl::NO_ERROR {
                break;
            }
            // OUT_OF_MEMORY is legal on a lost device
            if error != gl::OUT_OF_MEMORY {
                self.log(format_args!("GL ERROR :{:#06x} : was unhandled", error));
            }
        }
    }

    /// Move every error the driver has queued into the sticky set
    pub fn copy_real_gl_errors(&mut self, driver: &mut dyn GraphicsDriver) {
        loop {
            let error = driver.get_error();
            if error == gl::NO_ERROR {
                break;
            }
            self.bits |= bit_for(error);
        }
    }

    /// Error the driver raised for the last call, recorded but not consumed
    pub fn peek_gl_error(&mut self, driver: &mut dyn GraphicsDriver) -> u32 {
        let error = driver.get_error();
        self.bits |= bit_for(error);
        error
    }

    /// Poll: fold driver errors in, return and clear the lowest one
    pub fn get_gl_error(&mut self, driver: &mut dyn GraphicsDriver) -> u32 {
        self.copy_real_gl_errors(driver);
        self.pop()
    }

    fn pop(&mut self) -> u32 {
        let Some(bit) = self.bits.iter().next() else {
            return gl::NO_ERROR;
        };
        self.bits.remove(bit);
        error_for(bit)
    }

    /// Current set, without consuming it
    pub fn bits(&self) -> ErrorBits {
        self.bits
    }

    pub fn has_errors(&self) -> bool {
        !self.bits.is_empty()
    }

    pub fn log_count(&self) -> u32 {
        self.log_count
    }
}

#[cfg(test)]
#[path = "error_state_tests.rs"]
mod tests;
