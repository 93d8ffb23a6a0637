//! Crate-wide error types.
//!
//! Each layer gets its own `thiserror`-derived variant set; `DspError` is the
//! composition callers actually see. This mirrors the layered
//! `InterpreterError<StorageError>` shape used by comparable bytecode-VM
//! crates: a flat `Display` per variant, `#[from]` conversions at the seams,
//! no string-typed catch-alls.

use thiserror::Error;

/// Errors raised by the static stack analyzer (component C) over malformed
/// or unsound bytecode.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BytecodeError {
    /// A running stack depth went negative at the given instruction index
    /// within the block being analyzed.
    #[error("stack underflow: {stack} depth went negative at instruction {index}")]
    Underflow { stack: StackKind, index: usize },
    /// The two children of an `If` left the int/real stacks at different
    /// residual depths; a sound interpreter cannot choose a single
    /// post-branch depth. See SPEC_FULL.md §11.
    #[error(
        "unbalanced if: then-branch nets ({then_int}, {then_real}), \
         else-branch nets ({else_int}, {else_real})"
    )]
    UnbalancedBranch {
        then_int: i64,
        then_real: i64,
        else_int: i64,
        else_real: i64,
    },
    /// A `Loop` body did not return the operand stacks to their depth on
    /// entry.
    #[error("loop body is not stack-neutral: net int {int_delta}, net real {real_delta}")]
    NonNeutralLoop { int_delta: i64, real_delta: i64 },
}

/// Which operand stack an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackKind {
    Int,
    Real,
}

impl std::fmt::Display for StackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackKind::Int => write!(f, "int"),
            StackKind::Real => write!(f, "real"),
        }
    }
}

/// Errors from establishing or tearing down a remote factory (component F)
/// and the process-wide registry (component E).
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("bytecode rejected by the static analyzer: {0}")]
    Bytecode(#[from] BytecodeError),
    #[error("server refused compilation: {0}")]
    Compilation(String),
    #[error("server has no factory for this key")]
    NotFound,
    #[error("malformed JSON descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
    #[error("descriptor is missing mandatory metadata key {0:?}")]
    MissingMetadata(&'static str),
    #[error("control-plane request failed: {0}")]
    Transport(#[from] ControlPlaneError),
}

/// Errors from materializing or driving a remote instance (component G).
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("streaming audio transport failed to open")]
    TransportNotStarted,
    #[error("control-plane request failed: {0}")]
    Transport(#[from] ControlPlaneError),
    #[error("requested buffer size {0} exceeds the control-channel capacity {1}")]
    BufferTooLarge(usize, usize),
}

/// A single slice-level failure on the hot path, reported to the caller's
/// error callback rather than propagated as a `Result`: `compute` itself
/// never returns an error (see SPEC_FULL.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceError {
    Read,
    Write,
}

impl std::fmt::Display for SliceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SliceError::Read => write!(f, "transport read failed"),
            SliceError::Write => write!(f, "transport write failed"),
        }
    }
}

/// Control-plane (HTTP) transport failures: connect/timeout/transport-level
/// issues distinct from an application-level 400 response.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned unexpected status {0}")]
    UnexpectedStatus(u16),
}

/// Top-level error type a caller of this crate's public API will see.
#[derive(Debug, Error)]
pub enum DspError {
    #[error(transparent)]
    Factory(#[from] FactoryError),
    #[error(transparent)]
    Instance(#[from] InstanceError),
    #[error(transparent)]
    Bytecode(#[from] BytecodeError),
}
