//! The scan → parse → resolve → interpret pipeline over one long‑lived
//! [`Interpreter`].  A REPL keeps a single `Session` so definitions persist
//! between lines.

use std::io::Write;

use log::{debug, info};

use crate::ast::ExprId;
use crate::error::RunError;
use crate::interpreter::Interpreter;
use crate::resolver::Resolver;
use crate::{parser, scanner};

pub struct Session {
    interpreter: Interpreter,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            interpreter: Interpreter::new(),
        }
    }

    pub fn with_output(output: Box<dyn Write>) -> Self {
        Self {
            interpreter: Interpreter::with_output(output),
        }
    }

    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    /// Runs one chunk of source.  Nothing executes unless scanning, parsing
    /// and resolution all succeed.
    pub fn run(&mut self, source: &str) -> Result<(), RunError> {
        let tokens = scanner::scan(source).map_err(RunError::Syntax)?;
        let statements = parser::parse(&tokens).map_err(RunError::Syntax)?;
        debug!("Parsed {} statement(s)", statements.len());

        let mut resolver = Resolver::new();
        let errors = resolver.resolve(&statements);
        if !errors.is_empty() {
            info!("Resolution failed with {} error(s)", errors.len());
            return Err(RunError::Static(errors));
        }

        let top_level: Vec<ExprId> = resolver.top_level_ids().to_vec();
        self.interpreter.add_locals(resolver.into_locals());

        let result = self.interpreter.interpret(&statements);

        // Function bodies stay reachable through closures; the rest of this
        // source has run and its entries can go.
        self.interpreter.forget_locals(&top_level);
        result.map_err(RunError::Runtime)
    }
}
