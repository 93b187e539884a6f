//! Error taxonomy for class-file decoding and bytecode execution.
use thiserror::Error;

use crate::value::Reference;

/// Errors raised while decoding a class file. All of them abort
/// loading; nothing is recovered from a malformed image.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid class file: bad magic number {0:#010X}")]
    BadMagic(u32),
    #[error("truncated class file: {0}")]
    Truncated(#[from] std::io::Error),
    #[error("unknown constant pool tag {0}")]
    UnknownConstantTag(u8),
    #[error("malformed UTF-8 constant: {0}")]
    MalformedUtf8(#[from] std::string::FromUtf8Error),
}

/// Errors raised while executing bytecode.
///
/// `Exception` is not a terminal failure: it is the pending-exception
/// half of each instruction's result. The dispatch loop intercepts it
/// and runs the handler search; only when no handler exists does it
/// turn into `UncaughtException`.
#[derive(Debug, Error)]
pub enum VmError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("class not found: {0}")]
    ClassNotFound(String),
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("unimplemented opcode 0x{opcode:02X} at pc={pc}")]
    UnknownOpcode { opcode: u8, pc: usize },
    #[error("exception: {class_name}")]
    Exception {
        reference: Reference,
        class_name: String,
    },
    #[error("uncaught exception: {class_name}")]
    UncaughtException { class_name: String },
    #[error("{0}")]
    Internal(String),
}

impl VmError {
    /// Raise a runtime exception identified by class name alone, e.g.
    /// a `NullPointerException` injected by the interpreter. The
    /// reference carried into propagation is a bare class token.
    pub fn exception(class_name: &str) -> VmError {
        VmError::Exception {
            reference: Reference::Class(class_name.into()),
            class_name: class_name.to_string(),
        }
    }

    /// Raise an exception whose reference is an existing value, e.g.
    /// an object thrown by `athrow`.
    pub fn thrown(reference: Reference, class_name: String) -> VmError {
        VmError::Exception {
            reference,
            class_name,
        }
    }
}
