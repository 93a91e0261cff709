//! Tree-walking evaluator.
//!
//! The interpreter owns nothing global: its [`Console`] sink is handed in by
//! the caller, its globals are created fresh per evaluation, and every loop
//! iteration and call is metered against [`Limits`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use crate::ast::{
    BinaryOp, DeclKind, Expr, FunctionBody, FunctionDef, LogicalOp, Program, Stmt, TemplatePart,
    UnaryOp,
};
use crate::builtins::{self, Builtin};
use crate::console::Console;
use crate::error::ScriptError;
use crate::value::{Closure, ErrorKind, Value, release};

/// Longest string a script may build, in bytes.
pub(crate) const MAX_STRING_LEN: usize = 1 << 24;
/// Longest array a script may build.
pub(crate) const MAX_ARRAY_LEN: usize = 1 << 20;

/// How often, in steps, the wall clock is consulted.
const CLOCK_INTERVAL: u64 = 1024;

/// Resource bounds for one evaluation.
/// Deepest script call nesting the evaluation thread's stack is sized for.
/// Larger `max_call_depth` values are clamped to it.
pub const MAX_CALL_DEPTH: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Statements, loop iterations and calls, counted together.
    pub max_steps: u64,
    pub max_call_depth: usize,
    pub timeout: Duration,
    /// Console entries kept before further output is only counted.
    pub max_log_entries: usize,
    /// Bytes of strings and array slots a run may create, counted as they
    /// are created.
    pub max_alloc_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            max_call_depth: 128,
            timeout: Duration::from_secs(2),
            max_log_entries: 1000,
            max_alloc_bytes: 1 << 30,
        }
    }
}

/// Why evaluation left the normal path.
#[derive(Debug)]
pub(crate) enum Interrupt {
    /// A script value in flight; `try` can catch it.
    Throw(Value),
    /// A limit was hit. Not catchable.
    Abort(ScriptError),
}

pub(crate) type Eval<T> = Result<T, Interrupt>;

/// Completion of a statement.
#[derive(Debug)]
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

#[derive(Debug)]
struct Binding {
    value: Value,
    mutable: bool,
}

/// A lexical environment. Function bodies and blocks each get one.
#[derive(Debug, Default)]
pub struct Scope {
    vars: RefCell<HashMap<String, Binding>>,
    parent: Option<Rc<Scope>>,
}

impl Drop for Scope {
    fn drop(&mut self) {
        for (_, binding) in std::mem::take(self.vars.get_mut()) {
            release(binding.value);
        }
    }
}

impl Scope {
    fn child(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope {
            vars: RefCell::default(),
            parent: Some(parent.clone()),
        })
    }

    fn has_own(&self, name: &str) -> bool {
        self.vars.borrow().contains_key(name)
    }

    fn declare(&self, name: &str, value: Value, mutable: bool) {
        let old = self
            .vars
            .borrow_mut()
            .insert(name.to_string(), Binding { value, mutable });
        if let Some(old) = old {
            release(old.value);
        }
    }

    fn clear(&self) {
        let vars = std::mem::take(&mut *self.vars.borrow_mut());
        for (_, binding) in vars {
            release(binding.value);
        }
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.vars.borrow().get(name) {
            return Some(binding.value.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    /// `Ok(false)` when the name is not bound anywhere.
    fn assign(&self, name: &str, value: Value) -> Result<bool, ()> {
        let mut vars = self.vars.borrow_mut();
        if let Some(binding) = vars.get_mut(name) {
            if !binding.mutable {
                return Err(());
            }
            let old = std::mem::replace(&mut binding.value, value);
            drop(vars);
            release(old);
            return Ok(true);
        }
        drop(vars);
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Ok(false),
        }
    }
}

pub(crate) struct Interpreter<'c> {
    pub(crate) console: &'c mut Console,
    limits: Limits,
    steps: u64,
    call_depth: usize,
    allocated: usize,
    started: Instant,
    rng_state: u64,
    globals: Rc<Scope>,
    /// Scopes captured by closures. Cleared on drop to break the
    /// closure -> scope -> closure reference cycles.
    captured: Vec<Weak<Scope>>,
}

impl Drop for Interpreter<'_> {
    fn drop(&mut self) {
        for scope in self.captured.drain(..) {
            if let Some(scope) = scope.upgrade() {
                scope.clear();
            }
        }
        self.globals.clear();
    }
}

impl<'c> Interpreter<'c> {
    pub(crate) fn new(console: &'c mut Console, limits: &Limits) -> Self {
        let globals = Rc::new(Scope::default());
        for (name, value) in builtins::globals() {
            globals.declare(name, value, false);
        }
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9_7F4A_7C15);
        let limits = Limits {
            max_call_depth: limits.max_call_depth.min(MAX_CALL_DEPTH),
            ..limits.clone()
        };
        Self {
            console,
            limits,
            steps: 0,
            call_depth: 0,
            allocated: 0,
            started: Instant::now(),
            rng_state: seed | 1,
            globals,
            captured: Vec::new(),
        }
    }

    /// Run a program. The value is that of the last top-level expression
    /// statement, or of a top-level `return`.
    pub(crate) fn run(&mut self, program: &Program) -> Eval<Value> {
        let scope = Scope::child(&self.globals);
        self.hoist(&program.body, &scope);
        let mut completion = Value::Undefined;
        for stmt in &program.body {
            if let Stmt::Expr(expr) = stmt {
                self.tick()?;
                completion = self.eval(expr, &scope)?;
                continue;
            }
            if let Flow::Return(value) = self.exec(stmt, &scope)? {
                return Ok(value);
            }
        }
        Ok(completion)
    }

    /// Next pseudo-random number in `[0, 1)`.
    pub(crate) fn next_random(&mut self) -> f64 {
        // xorshift64*
        let mut x = self.rng_state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.rng_state = x;
        (x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11) as f64 / (1u64 << 53) as f64
    }

    pub(crate) fn tick(&mut self) -> Eval<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(Interrupt::Abort(ScriptError::StepLimit(self.limits.max_steps)));
        }
        if self.steps % CLOCK_INTERVAL == 0 && self.started.elapsed() > self.limits.timeout {
            return Err(Interrupt::Abort(ScriptError::Timeout(self.limits.timeout)));
        }
        Ok(())
    }

    pub(crate) fn throw<T>(&self, kind: ErrorKind, message: impl Into<String>) -> Eval<T> {
        Err(Interrupt::Throw(Value::error(kind, message)))
    }

    // ---- statements ----

    fn hoist(&mut self, body: &[Stmt], scope: &Rc<Scope>) {
        for stmt in body {
            if let Stmt::Function(def) = stmt
                && let Some(name) = &def.name
            {
                let closure = self.closure(def, scope);
                scope.declare(name, closure, true);
            }
        }
    }

    fn closure(&mut self, def: &Rc<FunctionDef>, scope: &Rc<Scope>) -> Value {
        self.captured.push(Rc::downgrade(scope));
        Value::Function(Rc::new(Closure {
            def: def.clone(),
            scope: scope.clone(),
        }))
    }

    fn exec_block(&mut self, body: &[Stmt], scope: &Rc<Scope>) -> Eval<Flow> {
        self.hoist(body, scope);
        for stmt in body {
            match self.exec(stmt, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, scope: &Rc<Scope>) -> Eval<Flow> {
        self.tick()?;
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::Declare { kind, decls } => {
                for (name, init) in decls {
                    let value = match init {
                        Some(expr) => self.eval(expr, scope)?,
                        None => Value::Undefined,
                    };
                    if *kind != DeclKind::Var && scope.has_own(name) {
                        return self.throw(
                            ErrorKind::SyntaxError,
                            format!("Identifier '{name}' has already been declared"),
                        );
                    }
                    scope.declare(name, value, *kind != DeclKind::Const);
                }
                Ok(Flow::Normal)
            }
            Stmt::Block(body) => self.exec_block(body, &Scope::child(scope)),
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond, scope)?.truthy() {
                    self.exec(then, scope)
                } else if let Some(otherwise) = otherwise {
                    self.exec(otherwise, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                while self.eval(cond, scope)?.truthy() {
                    match self.exec(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile { body, cond } => {
                loop {
                    match self.exec(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.eval(cond, scope)?.truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                let scope = Scope::child(scope);
                if let Some(init) = init {
                    self.exec(init, &scope)?;
                }
                loop {
                    if let Some(cond) = cond
                        && !self.eval(cond, &scope)?.truthy()
                    {
                        break;
                    }
                    match self.exec(body, &scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, &scope)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::ForOf {
                kind,
                name,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable, scope)?;
                let items: Vec<Value> = match &iterable {
                    Value::Array(items) => items.borrow().clone(),
                    Value::Str(s) => s.chars().map(|c| Value::str(c.to_string())).collect(),
                    other => {
                        return self.throw(
                            ErrorKind::TypeError,
                            format!("{} is not iterable", other.inspect()),
                        );
                    }
                };
                for item in items {
                    let iteration = Scope::child(scope);
                    iteration.declare(name, item, *kind != DeclKind::Const);
                    match self.exec(body, &iteration)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            // Declared when the enclosing block was entered.
            Stmt::Function(_) | Stmt::Empty => Ok(Flow::Normal),
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Throw(expr) => {
                let value = self.eval(expr, scope)?;
                Err(Interrupt::Throw(value))
            }
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => {
                let mut result = self.exec_block(block, &Scope::child(scope));
                if let Some(handler) = handler {
                    result = match result {
                        Err(Interrupt::Throw(thrown)) => {
                            let catch_scope = Scope::child(scope);
                            if let Some(param) = param {
                                catch_scope.declare(param, thrown, true);
                            }
                            self.exec_block(handler, &catch_scope)
                        }
                        other => other,
                    };
                }
                if matches!(result, Err(Interrupt::Abort(_))) {
                    return result;
                }
                if let Some(finalizer) = finalizer {
                    match self.exec_block(finalizer, &Scope::child(scope))? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                result
            }
        }
    }

    // ---- expressions ----

    fn eval(&mut self, expr: &Expr, scope: &Rc<Scope>) -> Eval<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Expr(expr) => {
                            out.push_str(&self.eval(expr, scope)?.to_js_string())
                        }
                    }
                    self.check_string_len(out.len())?;
                }
                self.charge(out.len())?;
                Ok(Value::str(out))
            }
            Expr::Ident(name) => match scope.lookup(name) {
                Some(value) => Ok(value),
                None => self.throw(ErrorKind::ReferenceError, format!("{name} is not defined")),
            },
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, scope)?);
                }
                self.charge_slots(values.len())?;
                Ok(Value::array(values))
            }
            Expr::Object(props) => {
                let object = Value::object(Vec::new());
                for (key, value) in props {
                    let value = self.eval(value, scope)?;
                    self.set_property(&object, key, value)?;
                }
                Ok(object)
            }
            Expr::Member { object, property } => {
                let object = self.eval(object, scope)?;
                self.get_property(&object, property)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let key = self.eval(index, scope)?;
                self.get_property(&object, &property_key(&key))
            }
            Expr::Call { callee, args } => {
                let function = self.eval(callee, scope)?;
                let args = self.eval_args(args, scope)?;
                if !is_callable(&function) {
                    return self.throw(
                        ErrorKind::TypeError,
                        format!("{} is not a function", describe(callee)),
                    );
                }
                self.call(&function, args)
            }
            Expr::New { callee, args } => {
                let constructor = self.eval(callee, scope)?;
                let args = self.eval_args(args, scope)?;
                match &constructor {
                    Value::Builtin(bound) if bound.builtin.is_constructor() => {
                        self.call(&constructor, args)
                    }
                    _ => self.throw(
                        ErrorKind::TypeError,
                        format!("{} is not a constructor", describe(callee)),
                    ),
                }
            }
            Expr::Function(def) => Ok(self.closure(def, scope)),
            Expr::Unary { op, operand } => {
                if *op == UnaryOp::TypeOf
                    && let Expr::Ident(name) = operand.as_ref()
                {
                    let value = scope.lookup(name).unwrap_or(Value::Undefined);
                    return Ok(Value::str(value.type_of()));
                }
                let value = self.eval(operand, scope)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Negate => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::str(value.type_of()),
                })
            }
            Expr::Update {
                increment,
                prefix,
                target,
            } => {
                let old = self.eval(target, scope)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.assign_to(target, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond, scope)?.truthy() {
                    self.eval(then, scope)
                } else {
                    self.eval(otherwise, scope)
                }
            }
            Expr::Assign { op, target, value } => {
                let value = match op {
                    None => self.eval(value, scope)?,
                    Some(op) => {
                        let current = self.eval(target, scope)?;
                        let rhs = self.eval(value, scope)?;
                        self.binary(*op, &current, &rhs)?
                    }
                };
                self.assign_to(target, value.clone(), scope)?;
                Ok(value)
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr], scope: &Rc<Scope>) -> Eval<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg, scope)).collect()
    }

    fn assign_to(&mut self, target: &Expr, value: Value, scope: &Rc<Scope>) -> Eval<()> {
        match target {
            Expr::Ident(name) => match scope.assign(name, value) {
                Ok(true) => Ok(()),
                Ok(false) => {
                    self.throw(ErrorKind::ReferenceError, format!("{name} is not defined"))
                }
                Err(()) => self.throw(ErrorKind::TypeError, "Assignment to constant variable."),
            },
            Expr::Member { object, property } => {
                let object = self.eval(object, scope)?;
                self.set_property(&object, property, value)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let key = self.eval(index, scope)?;
                self.set_property(&object, &property_key(&key), value)
            }
            _ => self.throw(ErrorKind::SyntaxError, "Invalid assignment target"),
        }
    }

    pub(crate) fn check_string_len(&self, len: usize) -> Eval<()> {
        if len > MAX_STRING_LEN {
            self.throw(ErrorKind::RangeError, "Invalid string length")
        } else {
            Ok(())
        }
    }

    /// Counts `bytes` against the allocation budget.
    pub(crate) fn charge(&mut self, bytes: usize) -> Eval<()> {
        self.allocated = self.allocated.saturating_add(bytes);
        if self.allocated > self.limits.max_alloc_bytes {
            return Err(Interrupt::Abort(ScriptError::MemoryLimit(
                self.limits.max_alloc_bytes,
            )));
        }
        Ok(())
    }

    pub(crate) fn charge_slots(&mut self, slots: usize) -> Eval<()> {
        self.charge(slots.saturating_mul(size_of::<Value>()))
    }

    pub(crate) fn check_array_len(&self, len: usize) -> Eval<()> {
        if len > MAX_ARRAY_LEN {
            self.throw(ErrorKind::RangeError, "Invalid array length")
        } else {
            Ok(())
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &Value, right: &Value) -> Eval<Value> {
        let number = |f: fn(f64, f64) -> f64| Value::Number(f(left.to_number(), right.to_number()));
        Ok(match op {
            BinaryOp::Add => {
                let (l, r) = (to_primitive(left), to_primitive(right));
                if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) {
                    let (l, r) = (l.to_js_string(), r.to_js_string());
                    self.check_string_len(l.len() + r.len())?;
                    self.charge(l.len() + r.len())?;
                    Value::str(l + &r)
                } else {
                    Value::Number(l.to_number() + r.to_number())
                }
            }
            BinaryOp::Sub => number(|a, b| a - b),
            BinaryOp::Mul => number(|a, b| a * b),
            BinaryOp::Div => number(|a, b| a / b),
            BinaryOp::Rem => number(|a, b| a % b),
            BinaryOp::Pow => number(|a, b| {
                if b.is_nan() || (a.abs() == 1.0 && b.is_infinite()) {
                    f64::NAN
                } else {
                    a.powf(b)
                }
            }),
            BinaryOp::Lt => Value::Bool(compare(left, right, |o| o.is_lt())),
            BinaryOp::Gt => Value::Bool(compare(left, right, |o| o.is_gt())),
            BinaryOp::Le => Value::Bool(compare(left, right, |o| o.is_le())),
            BinaryOp::Ge => Value::Bool(compare(left, right, |o| o.is_ge())),
            BinaryOp::LooseEq => Value::Bool(left.loose_equals(right)),
            BinaryOp::LooseNe => Value::Bool(!left.loose_equals(right)),
            BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
            BinaryOp::StrictNe => Value::Bool(!left.strict_equals(right)),
        })
    }

    // ---- properties ----

    pub(crate) fn get_property(&mut self, object: &Value, key: &str) -> Eval<Value> {
        match object {
            Value::Undefined | Value::Null => self.throw(
                ErrorKind::TypeError,
                format!(
                    "Cannot read properties of {} (reading '{key}')",
                    object.to_js_string()
                ),
            ),
            Value::Str(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.chars().count() as f64));
                }
                if let Some(index) = array_index(key) {
                    return Ok(s
                        .chars()
                        .nth(index)
                        .map(|c| Value::str(c.to_string()))
                        .unwrap_or(Value::Undefined));
                }
                Ok(method(Builtin::string_method(key), object))
            }
            Value::Array(items) => {
                if key == "length" {
                    return Ok(Value::Number(items.borrow().len() as f64));
                }
                if let Some(index) = array_index(key) {
                    return Ok(items.borrow().get(index).cloned().unwrap_or(Value::Undefined));
                }
                Ok(method(Builtin::array_method(key), object))
            }
            Value::Object(obj) => {
                if let Some(value) = obj.borrow().get(key) {
                    return Ok(value);
                }
                Ok(method(Builtin::object_method(key), object))
            }
            Value::Number(_) => Ok(method(Builtin::number_method(key), object)),
            Value::Bool(_) => Ok(method(Builtin::object_method(key), object)),
            Value::Function(closure) => Ok(match key {
                "name" => Value::str(closure.def.name.clone().unwrap_or_default()),
                "length" => Value::Number(closure.def.params.len() as f64),
                _ => method(Builtin::object_method(key), object),
            }),
            Value::Builtin(bound) => Ok(match bound.builtin.static_member(key) {
                Some(value) => value,
                None if key == "name" => Value::str(bound.builtin.name()),
                None => Value::Undefined,
            }),
        }
    }

    pub(crate) fn set_property(&mut self, object: &Value, key: &str, value: Value) -> Eval<()> {
        match object {
            Value::Undefined | Value::Null => self.throw(
                ErrorKind::TypeError,
                format!(
                    "Cannot set properties of {} (setting '{key}')",
                    object.to_js_string()
                ),
            ),
            Value::Object(obj) => {
                obj.borrow_mut().set(key, value);
                Ok(())
            }
            Value::Array(items) => {
                if key == "length" {
                    let len = value.to_number();
                    if len < 0.0 || len.fract() != 0.0 || !len.is_finite() {
                        return self.throw(ErrorKind::RangeError, "Invalid array length");
                    }
                    self.check_array_len(len as usize)?;
                    let grown = (len as usize).saturating_sub(items.borrow().len());
                    self.charge_slots(grown)?;
                    items.borrow_mut().resize(len as usize, Value::Undefined);
                    return Ok(());
                }
                let Some(index) = array_index(key) else {
                    // Named properties on arrays are not modelled.
                    return Ok(());
                };
                self.check_array_len(index + 1)?;
                let grown = (index + 1).saturating_sub(items.borrow().len());
                self.charge_slots(grown)?;
                let mut items = items.borrow_mut();
                if index >= items.len() {
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                Ok(())
            }
            // Writes to primitives and functions are silently dropped.
            _ => Ok(()),
        }
    }

    // ---- calls ----

    pub(crate) fn call(&mut self, function: &Value, args: Vec<Value>) -> Eval<Value> {
        match function {
            Value::Function(closure) => self.call_closure(closure, args),
            Value::Builtin(bound) => {
                let bound = bound.clone();
                let result = self.call_builtin(bound.builtin, &bound.this, args)?;
                match &result {
                    Value::Str(s) => self.charge(s.len())?,
                    Value::Array(items) if !result.strict_equals(&bound.this) => {
                        self.charge_slots(items.borrow().len())?
                    }
                    _ => {}
                }
                Ok(result)
            }
            other => self.throw(
                ErrorKind::TypeError,
                format!("{} is not a function", other.inspect()),
            ),
        }
    }

    fn call_closure(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Eval<Value> {
        self.tick()?;
        if self.call_depth >= self.limits.max_call_depth {
            return Err(Interrupt::Abort(ScriptError::CallDepth(
                self.limits.max_call_depth,
            )));
        }

        let scope = Scope::child(&closure.scope);
        let mut args = args.into_iter();
        for param in &closure.def.params {
            scope.declare(param, args.next().unwrap_or(Value::Undefined), true);
        }

        self.call_depth += 1;
        let result = match &closure.def.body {
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
            FunctionBody::Block(body) => self.exec_block(body, &scope).map(|flow| match flow {
                Flow::Return(value) => value,
                _ => Value::Undefined,
            }),
        };
        self.call_depth -= 1;
        result
    }
}

fn method(builtin: Option<Builtin>, this: &Value) -> Value {
    match builtin {
        Some(builtin) => Value::builtin(builtin, this.clone()),
        None => Value::Undefined,
    }
}

fn is_callable(value: &Value) -> bool {
    matches!(value, Value::Function(_) | Value::Builtin(_))
}

/// Arrays and objects compare and concatenate through their string form.
fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Builtin(_) => {
            Value::str(value.to_js_string())
        }
        other => other.clone(),
    }
}

fn compare(left: &Value, right: &Value, test: fn(std::cmp::Ordering) -> bool) -> bool {
    match (to_primitive(left), to_primitive(right)) {
        (Value::Str(a), Value::Str(b)) => test(a.cmp(&b)),
        (a, b) => a
            .to_number()
            .partial_cmp(&b.to_number())
            .is_some_and(test),
    }
}

pub(crate) fn property_key(key: &Value) -> String {
    key.to_js_string()
}

/// Canonical non-negative integer keys only: `"01"` is a name, not an index.
fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// Source-ish name of a callee for error messages.
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member { object, property } => format!("{}.{property}", describe(object)),
        Expr::Index { object, .. } => format!("{}[...]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        _ => "expression".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn run(source: &str) -> Result<String, String> {
        run_with(source, &Limits::default())
    }

    fn run_with(source: &str, limits: &Limits) -> Result<String, String> {
        let mut console = Console::new(100);
        let program = parse(source).map_err(|e| e.to_string())?;
        let mut interp = Interpreter::new(&mut console, limits);
        match interp.run(&program) {
            Ok(value) => Ok(value.inspect()),
            Err(Interrupt::Throw(value)) => Err(value.display()),
            Err(Interrupt::Abort(err)) => Err(err.to_string()),
        }
    }

    #[rstest]
    #[case("1 + 2 * 3", "7")]
    #[case("'a' + 1", "\"a1\"")]
    #[case("[1, 2] + ''", "\"1,2\"")]
    #[case("10 % 4", "2")]
    #[case("2 ** 10", "1024")]
    #[case("'b' > 'a'", "true")]
    #[case("null ?? 'fallback'", "\"fallback\"")]
    #[case("0 || 'x'", "\"x\"")]
    #[case("typeof undeclared", "\"undefined\"")]
    #[case("typeof (() => 1)", "\"function\"")]
    #[case("let x = 5; x++; x", "6")]
    #[case("let x = 5; x += 2; x", "7")]
    #[case("`sum: ${1 + 1}`", "\"sum: 2\"")]
    fn expressions(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(run(source), Ok(expected.to_string()));
    }

    #[test]
    fn closures_capture_their_scope() {
        let source = "
            function counter() {
                let n = 0
                return () => ++n
            }
            const next = counter()
            next()
            next()
        ";
        assert_eq!(run(source), Ok("2".to_string()));
    }

    #[test]
    fn functions_are_hoisted() {
        assert_eq!(run("double(21)\nfunction double(x) { return x * 2 }"), Ok("42".to_string()));
    }

    #[test]
    fn loops_with_break_and_continue() {
        let source = "
            let total = 0
            for (let i = 0; i < 10; i++) {
                if (i % 2) continue
                if (i > 6) break
                total += i
            }
            total
        ";
        assert_eq!(run(source), Ok("12".to_string()));
    }

    #[test]
    fn try_catch_finally_order() {
        let source = "
            const seen = []
            try {
                seen.push('try')
                throw new RangeError('bad')
            } catch (e) {
                seen.push(e.name + ':' + e.message)
            } finally {
                seen.push('finally')
            }
            seen
        ";
        assert_eq!(
            run(source),
            Ok(r#"["try", "RangeError:bad", "finally"]"#.to_string())
        );
    }

    #[test]
    fn arrays_and_objects_share_references() {
        let source = "const a = { items: [] }; const b = a; b.items.push(1); a.items.length";
        assert_eq!(run(source), Ok("1".to_string()));
    }

    #[rstest]
    #[case("document.write('x')", "ReferenceError: document is not defined")]
    #[case("const c = 1; c = 2", "TypeError: Assignment to constant variable.")]
    #[case("null.x", "TypeError: Cannot read properties of null (reading 'x')")]
    #[case("let o = {}; o.missing()", "TypeError: o.missing is not a function")]
    #[case("let a = 1; let a = 2", "SyntaxError: Identifier 'a' has already been declared")]
    #[case("for (const x of 5) {}", "TypeError: 5 is not iterable")]
    fn runtime_errors(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(run(source), Err(expected.to_string()));
    }

    fn small_step_budget() -> Limits {
        Limits {
            max_steps: 10_000,
            ..Limits::default()
        }
    }

    #[test]
    fn infinite_loop_hits_step_limit() {
        let err = run_with("while (true) {}", &small_step_budget()).unwrap_err();
        assert!(err.contains("step limit"), "{err}");
    }

    #[test]
    fn step_limit_cannot_be_caught() {
        let err = run_with("try { while (true) {} } catch (e) { 'caught' }", &small_step_budget()).unwrap_err();
        assert!(err.contains("step limit"), "{err}");
    }

    #[test]
    fn allocation_budget_cannot_be_caught() {
        let limits = Limits {
            max_alloc_bytes: 1 << 20,
            ..Limits::default()
        };
        let source = "let s = 'ab'; try { while (true) { s = s + s } } catch (e) { 'caught' }";
        let err = run_with(source, &limits).unwrap_err();
        assert_eq!(err, "RangeError: execution allocated more than 1048576 bytes");
    }

    #[test]
    fn runaway_recursion_hits_call_depth() {
        let limits = Limits {
            max_call_depth: 16,
            ..Limits::default()
        };
        let err = run_with("function f() { return f() }\nf()", &limits).unwrap_err();
        assert!(err.contains("Maximum call stack size exceeded"), "{err}");
    }

    #[test]
    fn top_level_return_sets_the_value() {
        assert_eq!(run("1\nreturn 2\n3"), Ok("2".to_string()));
    }

    #[test]
    fn array_length_assignment_truncates() {
        assert_eq!(
            run("const a = [1, 2, 3]; a.length = 1; a"),
            Ok("[1]".to_string())
        );
    }

    #[rstest]
    #[case("0", Some(0))]
    #[case("12", Some(12))]
    #[case("01", None)]
    #[case("-1", None)]
    #[case("length", None)]
    fn array_index_keys(#[case] key: &str, #[case] expected: Option<usize>) {
        assert_eq!(array_index(key), expected);
    }
}
