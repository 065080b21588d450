use crate::error::{LoxError, Result, RuntimeErrorKind};
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to a scope frame.  Every closure created while a frame is
/// live holds one of these.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    pub fn enclosing(&self) -> Option<&EnvRef> {
        self.enclosing.as_ref()
    }

    /// Binds `name` in this frame, replacing any previous binding here.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    /// Never creates a binding: the name must already exist somewhere in
    /// the chain.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// The frame `depth` hops outward from `env` (0 is `env` itself).
    pub fn ancestor(env: &EnvRef, depth: usize) -> Option<EnvRef> {
        let mut current: EnvRef = env.clone();

        for _ in 0..depth {
            let next: EnvRef = current.borrow().enclosing.clone()?;
            current = next;
        }

        Some(current)
    }

    /// Reads `name` from exactly the frame `depth` hops out, without walking
    /// further.
    pub fn get_at(env: &EnvRef, depth: usize, name: &Token) -> Result<Value> {
        Environment::ancestor(env, depth)
            .and_then(|frame| frame.borrow().values.get(&name.lexeme).cloned())
            .ok_or_else(|| undefined(name))
    }

    pub fn assign_at(env: &EnvRef, depth: usize, name: &Token, value: Value) -> Result<()> {
        let frame: EnvRef = Environment::ancestor(env, depth).ok_or_else(|| undefined(name))?;
        let mut frame = frame.borrow_mut();

        match frame.values.get_mut(&name.lexeme) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name)),
        }
    }

    /// Like [`Environment::get_at`] for synthetic bindings (`this`, `super`)
    /// whose presence the resolver guarantees.
    pub fn lookup_at(env: &EnvRef, depth: usize, name: &str) -> Option<Value> {
        Environment::ancestor(env, depth).and_then(|frame| frame.borrow().values.get(name).cloned())
    }
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(
        RuntimeErrorKind::UndefinedVariable,
        name,
        format!("Undefined variable '{}'.", name.lexeme),
    )
}
