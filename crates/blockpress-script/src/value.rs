//! Runtime values.
//!
//! Compound values are reference-counted and interior-mutable so that arrays
//! and objects have reference semantics, as scripts expect. Everything here
//! is dropped when the evaluation ends.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionDef;
use crate::builtins::Builtin;
use crate::interp::{MAX_STRING_LEN, Scope};

/// Nesting depth past which `inspect` abbreviates, which also keeps
/// self-referencing structures finite.
const INSPECT_DEPTH: usize = 6;

/// Deepest array or object nesting that string conversion and `flat` walk.
pub(crate) const MAX_NESTING: usize = 512;

#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Object>>),
    Function(Rc<Closure>),
    Builtin(Rc<BoundBuiltin>),
}

/// The error constructors available to scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
    SyntaxError,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
        }
    }
}

/// A plain object: insertion-ordered properties. Error objects carry their kind.
#[derive(Debug, Default)]
pub struct Object {
    pub(crate) props: Vec<(String, Value)>,
    pub(crate) error: Option<ErrorKind>,
}

impl Object {
    pub fn get(&self, key: &str) -> Option<Value> {
        self.props
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn set(&mut self, key: &str, value: Value) {
        match self.props.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => self.props.push((key.to_string(), value)),
        }
    }
}

/// A script function together with the scope it closes over.
pub struct Closure {
    pub(crate) def: Rc<FunctionDef>,
    pub(crate) scope: Rc<Scope>,
}

impl fmt::Debug for Closure {
    // The captured scope may contain this closure; don't print it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.def.name)
            .finish_non_exhaustive()
    }
}

/// A native function, with the receiver it was read from (`"abc".toUpperCase`).
#[derive(Debug)]
pub struct BoundBuiltin {
    pub(crate) builtin: Builtin,
    pub(crate) this: Value,
}

impl Value {
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(props: Vec<(String, Value)>) -> Self {
        Value::Object(Rc::new(RefCell::new(Object { props, error: None })))
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        let props = vec![
            ("name".to_string(), Value::str(kind.name())),
            ("message".to_string(), Value::str(message.into())),
        ];
        Value::Object(Rc::new(RefCell::new(Object {
            props,
            error: Some(kind),
        })))
    }

    pub(crate) fn builtin(builtin: Builtin, this: Value) -> Self {
        Value::Builtin(Rc::new(BoundBuiltin { builtin, this }))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Function(_) | Value::Builtin(_) => "function",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => string_to_number(s),
            Value::Array(items) => {
                let items = items.borrow();
                match items.len() {
                    0 => 0.0,
                    1 => string_to_number(&items[0].to_js_string()),
                    _ => f64::NAN,
                }
            }
            _ => f64::NAN,
        }
    }

    /// The `String(value)` conversion.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::Str(s) => s.to_string(),
            Value::Array(_) | Value::Object(_) => {
                let mut out = String::new();
                js_string_into(self, &mut Vec::new(), &mut out);
                out
            }
            Value::Function(closure) => format!(
                "function {}() {{ [code] }}",
                closure.def.name.as_deref().unwrap_or("")
            ),
            Value::Builtin(bound) => {
                format!("function {}() {{ [native code] }}", bound.builtin.name())
            }
        }
    }

    /// Console form: strings as-is, everything else inspected.
    pub fn display(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            other => other.inspect(),
        }
    }

    /// Developer-facing rendering used for result values and nested output.
    pub fn inspect(&self) -> String {
        let mut out = String::new();
        inspect_into(self, 0, &mut out);
        out
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`: `null == undefined`, numeric comparison across primitives,
    /// objects compared to primitives through their string form.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::Str(_), Value::Number(_))
            | (Value::Number(_), Value::Str(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            (Value::Array(_) | Value::Object(_), Value::Str(_) | Value::Number(_)) => {
                Value::str(self.to_js_string()).loose_equals(other)
            }
            (Value::Str(_) | Value::Number(_), Value::Array(_) | Value::Object(_)) => {
                self.loose_equals(&Value::str(other.to_js_string()))
            }
            _ => self.strict_equals(other),
        }
    }

    /// Equality used by `includes`: like `===` but NaN matches NaN.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }
}

/// Drops `value` without recursing through nested arrays and objects, so a
/// deeply nested structure cannot exhaust the stack on its way out.
pub(crate) fn release(value: Value) {
    let mut pending = vec![value];
    while let Some(value) = pending.pop() {
        match value {
            Value::Array(items) => {
                if let Ok(items) = Rc::try_unwrap(items) {
                    pending.extend(items.into_inner());
                }
            }
            Value::Object(obj) => {
                if let Ok(obj) = Rc::try_unwrap(obj) {
                    pending.extend(obj.into_inner().props.into_iter().map(|(_, v)| v));
                }
            }
            _ => {}
        }
    }
}

/// `Name: message` for error objects, falling back to just the name.
pub(crate) fn error_summary(obj: &Object) -> String {
    let mut out = String::new();
    summary_into(obj, &mut Vec::new(), &mut out);
    out
}

fn summary_into(obj: &Object, seen: &mut Vec<*const ()>, out: &mut String) {
    match obj.get("name") {
        Some(name) => js_string_into(&name, seen, out),
        None => out.push_str("Error"),
    }
    let mut message = String::new();
    if let Some(value) = obj.get("message") {
        js_string_into(&value, seen, &mut message);
    }
    if !message.is_empty() {
        out.push_str(": ");
        out.push_str(&message);
    }
}

/// `Array.prototype.join`. Elements that lead back to `items` join as the
/// empty string.
pub(crate) fn join(items: &Rc<RefCell<Vec<Value>>>, separator: &str) -> String {
    let mut out = String::new();
    let mut seen = vec![Rc::as_ptr(items).cast::<()>()];
    join_into(&items.borrow(), separator, &mut seen, &mut out);
    out
}

fn join_into(items: &[Value], separator: &str, seen: &mut Vec<*const ()>, out: &mut String) {
    for (i, item) in items.iter().enumerate() {
        if out.len() > MAX_STRING_LEN {
            break;
        }
        if i > 0 {
            out.push_str(separator);
        }
        if !item.is_nullish() {
            js_string_into(item, seen, out);
        }
    }
}

/// String conversion for compound values. `seen` holds the arrays and
/// objects currently being converted; one reached again through itself, or
/// nested deeper than [`MAX_NESTING`], converts to the empty string.
/// Output stops growing past the string length cap.
fn js_string_into(value: &Value, seen: &mut Vec<*const ()>, out: &mut String) {
    let ptr = match value {
        Value::Array(items) => Rc::as_ptr(items).cast::<()>(),
        Value::Object(obj) => Rc::as_ptr(obj).cast::<()>(),
        other => {
            out.push_str(&other.to_js_string());
            return;
        }
    };
    if seen.contains(&ptr) || seen.len() >= MAX_NESTING {
        return;
    }
    seen.push(ptr);
    match value {
        Value::Array(items) => join_into(&items.borrow(), ",", seen, out),
        Value::Object(obj) => {
            let obj = obj.borrow();
            match obj.error {
                Some(_) => summary_into(&obj, seen, out),
                None => out.push_str("[object Object]"),
            }
        }
        _ => {}
    }
    seen.pop();
}

fn inspect_into(value: &Value, depth: usize, out: &mut String) {
    match value {
        Value::Str(s) => {
            out.push_str(&serde_json::Value::String(s.to_string()).to_string());
        }
        Value::Array(_) if depth >= INSPECT_DEPTH => out.push_str("[Array]"),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.borrow().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                inspect_into(item, depth + 1, out);
            }
            out.push(']');
        }
        Value::Object(obj) => {
            let obj = obj.borrow();
            if obj.error.is_some() {
                out.push_str(&error_summary(&obj));
            } else if depth >= INSPECT_DEPTH {
                out.push_str("[Object]");
            } else if obj.props.is_empty() {
                out.push_str("{}");
            } else {
                out.push_str("{ ");
                for (i, (key, item)) in obj.props.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(key);
                    out.push_str(": ");
                    inspect_into(item, depth + 1, out);
                }
                out.push_str(" }");
            }
        }
        Value::Function(closure) => match &closure.def.name {
            Some(name) => out.push_str(&format!("[Function: {name}]")),
            None => out.push_str("[Function (anonymous)]"),
        },
        Value::Builtin(bound) => out.push_str(&format!("[Function: {}]", bound.builtin.name())),
        other => out.push_str(&other.to_js_string()),
    }
}

/// Number-to-string conversion following the script language's rules for
/// the common cases: integers print without a fraction, non-finite values
/// by name.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let name = if n > 0.0 { "Infinity" } else { "-Infinity" };
        name.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

pub(crate) fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust accepts "inf"/"nan" spellings that scripts must not.
        _ if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
            f64::NAN
        }
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}
