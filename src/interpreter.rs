use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info, warn};

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::class::{LoxClass, LoxInstance};
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result, RuntimeErrorKind};
use crate::function::{LoxFunction, NativeFn, NativeFunction};
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::{self, OpResult, Value};

/// How a statement finished.  `return` unwinds through blocks and loops as
/// `Flow::Return` until the function call that owns it.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    locals: Locals,
    output: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates an Interpreter printing to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Creates an Interpreter whose `print` writes to `output`, with the
    /// builtins `clock` and `print` defined as globals.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Rc::new(RefCell::new(Environment::new()));

        let mut interpreter = Self {
            globals: globals.clone(),
            environment: globals,
            locals: HashMap::new(),
            output,
        };

        interpreter.define_native("clock", 0, |_, _args| {
            let millis: i64 = Utc::now().timestamp_millis();
            debug!("Native function 'clock' returned: {}", millis);
            Ok(Value::Number(millis as f64))
        });

        interpreter.define_native("print", 1, |interpreter, args| {
            let text: String = args.first().map(ToString::to_string).unwrap_or_default();
            interpreter
                .write_line(&text)
                .map_err(|e| format!("Failed to print: {}", e))?;
            Ok(Value::Nil)
        });

        interpreter
    }

    pub fn define_native(&mut self, name: &str, arity: usize, func: NativeFn) {
        debug!("Defining native function '{}'", name);

        let native = NativeFunction {
            name: name.to_string(),
            arity,
            func,
        };

        self.globals
            .borrow_mut()
            .define(name, Value::Native(Rc::new(native)));
    }

    pub fn globals(&self) -> &EnvRef {
        &self.globals
    }

    /// Merges a resolution map into the one this interpreter consults.  The
    /// REPL calls this once per line.
    pub fn add_locals(&mut self, locals: Locals) {
        debug!("Installing {} resolved local(s)", locals.len());
        self.locals.extend(locals);
    }

    /// Drops resolution entries that can no longer be evaluated.  The REPL
    /// calls this for each line's top-level uses once the line has run.
    pub fn forget_locals(&mut self, ids: &[ExprId]) {
        for id in ids {
            self.locals.remove(id);
        }
        debug!("Forgot {} resolved local(s), {} kept", ids.len(), self.locals.len());
    }

    /// Number of resolution entries currently held.
    pub fn resolved_count(&self) -> usize {
        self.locals.len()
    }

    pub fn write_line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{}", text)?;
        self.output.flush()
    }

    /// Interprets a list of statements (a "program").  Stops at the first
    /// runtime error; effects of statements already run are kept.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                warn!("Top-level return of {} ignored", value);
            }
        }
        info!("Interpretation completed successfully");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Defining variable '{}' = {}", name.lexeme, value);
                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let frame = Environment::with_enclosing(self.environment.clone());
                self.execute_block(statements, Rc::new(RefCell::new(frame)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);
                let function =
                    LoxFunction::new(declaration.clone(), self.environment.clone(), false);
                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                Ok(Flow::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let superclass: Option<Rc<LoxClass>> = match superclass {
                    Some(expr) => match self.evaluate(expr)? {
                        Value::Class(class) => Some(class),
                        _ => {
                            let token = match expr {
                                Expr::Variable { name, .. } => name,
                                _ => name,
                            };
                            return Err(LoxError::runtime(
                                RuntimeErrorKind::InvalidSuperclass,
                                token,
                                "Superclass must be a class.",
                            ));
                        }
                    },
                    None => None,
                };

                self.environment.borrow_mut().define(&name.lexeme, Value::Nil);

                // Methods of a subclass close over an extra frame holding `super`.
                let method_env: EnvRef = match &superclass {
                    Some(class) => {
                        let mut frame = Environment::with_enclosing(self.environment.clone());
                        frame.define("super", Value::Class(class.clone()));
                        Rc::new(RefCell::new(frame))
                    }
                    None => self.environment.clone(),
                };

                let methods: HashMap<String, Rc<LoxFunction>> = methods
                    .iter()
                    .map(|method| {
                        let is_initializer = method.name.lexeme == "init";
                        let function =
                            LoxFunction::new(method.clone(), method_env.clone(), is_initializer);
                        (method.name.lexeme.clone(), Rc::new(function))
                    })
                    .collect();

                let class = LoxClass::new(name.lexeme.clone(), superclass, methods);
                info!("Class '{}' defined", name.lexeme);

                self.environment
                    .borrow_mut()
                    .assign(name, Value::Class(Rc::new(class)))?;
                Ok(Flow::Normal)
            }
        }
    }

    /// Runs `statements` inside `environment`, restoring the previous
    /// environment on every exit path (normal, `return`, or error).
    pub fn execute_block(&mut self, statements: &[Stmt], environment: EnvRef) -> Result<Flow> {
        let previous: EnvRef = std::mem::replace(&mut self.environment, environment);

        let mut result: Result<Flow> = Ok(Flow::Normal);
        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;
        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match operator.token_type {
                    TokenType::MINUS => with_token(value::negate(&right), operator),
                    TokenType::BANG => Ok(value::invert(&right)),
                    _ => Err(invalid_operator(operator)),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                debug!("Binary {} on {} and {}", operator.lexeme, left, right);
                self.binary(&left, operator, &right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let decided = match operator.token_type {
                    TokenType::OR => left.is_truthy(),
                    _ => !left.is_truthy(),
                };
                if decided {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(id) {
                    Some(&depth) => {
                        Environment::assign_at(&self.environment, depth, name, value.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }
                debug!("Assigned {} to '{}'", value, name.lexeme);
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;
                let mut args = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }
                self.call_value(&callee, paren, args)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),
                _ => Err(LoxError::runtime(
                    RuntimeErrorKind::InvalidReceiver,
                    name,
                    "Only instances have properties.",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(
                        RuntimeErrorKind::InvalidReceiver,
                        name,
                        "Only instances have fields.",
                    ));
                };
                let value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());
                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn binary(&self, left: &Value, operator: &Token, right: &Value) -> Result<Value> {
        let result: OpResult = match operator.token_type {
            TokenType::PLUS => value::add(left, right),
            TokenType::MINUS => value::subtract(left, right),
            TokenType::STAR => value::multiply(left, right),
            TokenType::SLASH => value::divide(left, right),
            TokenType::PERCENT => value::modulo(left, right),
            TokenType::GREATER => value::greater(left, right),
            TokenType::GREATER_EQUAL => value::greater_equal(left, right),
            TokenType::LESS => value::less(left, right),
            TokenType::LESS_EQUAL => value::less_equal(left, right),
            TokenType::EQUAL_EQUAL => Ok(Value::Bool(value::is_equal(left, right))),
            TokenType::BANG_EQUAL => Ok(Value::Bool(!value::is_equal(left, right))),
            _ => return Err(invalid_operator(operator)),
        };

        with_token(result, operator)
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&depth) => Environment::get_at(&self.environment, depth, name),
            None => self.globals.borrow().get(name),
        }
    }

    /// `super.method`: look the method up on the superclass captured at
    /// class declaration, and bind it to the `this` one frame further in.
    fn evaluate_super(&self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let depth: usize = self.locals.get(&id).copied().ok_or_else(|| {
            LoxError::runtime(
                RuntimeErrorKind::UndefinedVariable,
                keyword,
                "Unresolved 'super'.",
            )
        })?;

        let superclass = Environment::lookup_at(&self.environment, depth, "super");
        let object = depth
            .checked_sub(1)
            .and_then(|this_depth| Environment::lookup_at(&self.environment, this_depth, "this"));

        let (Some(Value::Class(superclass)), Some(Value::Instance(object))) = (superclass, object)
        else {
            return Err(LoxError::runtime(
                RuntimeErrorKind::UndefinedVariable,
                keyword,
                "Unresolved 'super'.",
            ));
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(object)))),
            None => Err(LoxError::runtime(
                RuntimeErrorKind::UndefinedProperty,
                method,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    fn call_value(&mut self, callee: &Value, paren: &Token, args: Vec<Value>) -> Result<Value> {
        match callee {
            Value::Function(function) => {
                check_arity(function.arity(), &args, paren)?;
                self.call_function(function, args)
            }

            Value::Native(native) => {
                check_arity(native.arity, &args, paren)?;
                debug!("Calling native function '{}'", native.name);
                (native.func)(self, &args).map_err(|message| {
                    LoxError::runtime(RuntimeErrorKind::Native, paren, message)
                })
            }

            Value::Class(class) => {
                check_arity(class.arity(), &args, paren)?;
                self.instantiate(class, args)
            }

            _ => Err(LoxError::runtime(
                RuntimeErrorKind::NotCallable,
                paren,
                format!(
                    "Can only call functions and classes, not `{}`.",
                    callee.type_name()
                ),
            )),
        }
    }

    /// Runs a user function in a fresh frame under its closure.  Arity has
    /// already been checked.
    pub fn call_function(&mut self, function: &LoxFunction, args: Vec<Value>) -> Result<Value> {
        debug!("Calling function '{}'", function.name());

        let mut frame = Environment::with_enclosing(function.closure.clone());
        for (param, arg) in function.declaration.params.iter().zip(args) {
            frame.define(&param.lexeme, arg);
        }

        let flow = self.execute_block(&function.declaration.body, Rc::new(RefCell::new(frame)))?;

        if function.is_initializer {
            return Ok(Environment::lookup_at(&function.closure, 0, "this").unwrap_or(Value::Nil));
        }

        Ok(match flow {
            Flow::Return(value) => value,
            Flow::Normal => Value::Nil,
        })
    }

    fn instantiate(&mut self, class: &Rc<LoxClass>, args: Vec<Value>) -> Result<Value> {
        let instance = Rc::new(RefCell::new(LoxInstance::new(class.clone())));

        if let Some(initializer) = class.find_method("init") {
            self.call_function(&initializer.bind(instance.clone()), args)?;
        }

        debug!("Instantiated '{}'", class.name);
        Ok(Value::Instance(instance))
    }
}

/// Checked before the callee runs, so a mismatched call has no effects.
fn check_arity(arity: usize, args: &[Value], paren: &Token) -> Result<()> {
    if args.len() == arity {
        return Ok(());
    }

    Err(LoxError::runtime(
        RuntimeErrorKind::Arity,
        paren,
        format!("Expected {} arguments but got {}.", arity, args.len()),
    ))
}

fn with_token(result: OpResult, operator: &Token) -> Result<Value> {
    result.map_err(|e| LoxError::runtime(RuntimeErrorKind::Type, operator, e.message))
}

fn invalid_operator(operator: &Token) -> LoxError {
    LoxError::runtime(
        RuntimeErrorKind::Type,
        operator,
        format!("Invalid operator '{}'.", operator.lexeme),
    )
}
