//! Centralised error hierarchy for the **Rox interpreter**.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here.  Static and
//! runtime failures stay separate tiers: the resolver only ever produces
//! [`LoxError::Resolve`], the interpreter only ever produces
//! [`LoxError::Runtime`].
//!
//! The module **does not** print diagnostics itself; I/O failures at the
//! edges are the binary's business (`anyhow`).

use std::fmt;

use log::info;
use thiserror::Error;

use crate::token::{Token, TokenType};

/// What a static (resolution) error is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticErrorKind {
    DuplicateDeclaration,
    SelfReference,
    TopLevelReturn,
    InitializerReturnValue,
    MisplacedSuper,
    MisplacedThis,
    SelfInheritance,
}

/// What a runtime error is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    UndefinedVariable,
    UndefinedProperty,
    NotCallable,
    Arity,
    /// An operator was applied to an illegal combination of operand kinds.
    Type,
    /// Property access on something that is not an instance.
    InvalidReceiver,
    InvalidSuperclass,
    /// A builtin reported a host-side failure.
    Native,
}

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        line: usize,
        location: Location,
    },

    /// Static‑analysis failure found by the resolver.
    #[error("[line {line}] Error at '{lexeme}': {message}")]
    Resolve {
        kind: StaticErrorKind,
        message: String,
        line: usize,
        lexeme: String,
    },

    /// Runtime evaluation error, attached to the offending token.
    #[error("{message}\n[line {line}]")]
    Runtime {
        kind: RuntimeErrorKind,
        message: String,
        line: usize,
        lexeme: String,
    },
}

/// Where a syntax error was detected, rendered as part of the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    End,
    Lexeme(String),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::End => write!(f, " at end"),
            Location::Lexeme(lexeme) => write!(f, " at '{}'", lexeme),
        }
    }
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", token.line, message);

        let location = match token.token_type {
            TokenType::EOF => Location::End,
            _ => Location::Lexeme(token.lexeme.clone()),
        };

        LoxError::Parse {
            message,
            line: token.line,
            location,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(kind: StaticErrorKind, token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Resolve error: kind={:?}, line={}, msg={}",
            kind, token.line, message
        );

        LoxError::Resolve {
            kind,
            message,
            line: token.line,
            lexeme: token.lexeme.clone(),
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(kind: RuntimeErrorKind, token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Runtime error: kind={:?}, line={}, msg={}",
            kind, token.line, message
        );

        LoxError::Runtime {
            kind,
            message,
            line: token.line,
            lexeme: token.lexeme.clone(),
        }
    }

    /// Source line the error points at.
    pub fn line(&self) -> usize {
        match self {
            LoxError::Lex { line, .. }
            | LoxError::Parse { line, .. }
            | LoxError::Resolve { line, .. }
            | LoxError::Runtime { line, .. } => *line,
        }
    }

    pub fn static_kind(&self) -> Option<StaticErrorKind> {
        match self {
            LoxError::Resolve { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn runtime_kind(&self) -> Option<RuntimeErrorKind> {
        match self {
            LoxError::Runtime { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

/// Why a whole [`Session::run`](crate::session::Session::run) failed.
///
/// Each phase stops the pipeline: syntax errors prevent resolution, static
/// errors prevent execution, and a runtime error ends the program.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{}", join(.0))]
    Syntax(Vec<LoxError>),

    #[error("{}", join(.0))]
    Static(Vec<LoxError>),

    #[error("{0}")]
    Runtime(LoxError),
}

impl RunError {
    /// Conventional `sysexits` status for the failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Syntax(_) | RunError::Static(_) => 65,
            RunError::Runtime(_) => 70,
        }
    }

    /// Every individual diagnostic carried by this failure.
    pub fn errors(&self) -> &[LoxError] {
        match self {
            RunError::Syntax(errors) | RunError::Static(errors) => errors,
            RunError::Runtime(error) => std::slice::from_ref(error),
        }
    }
}

fn join(errors: &[LoxError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
