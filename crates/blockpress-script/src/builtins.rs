//! Native functions: the global objects, constructors and the methods of
//! strings, arrays and numbers.
//!
//! There is deliberately nothing here that reaches outside the process:
//! no timers, no I/O, no host objects.

use serde::Serialize;

use crate::console::Level;
use crate::interp::{Eval, Interpreter};
use crate::value::{self, ErrorKind, MAX_NESTING, Value, number_to_string, string_to_number};

/// Nesting past which `JSON.stringify` assumes a cycle.
const MAX_JSON_DEPTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Console(Level),
    Math(MathFn),
    JsonStringify,
    JsonParse,
    StringCtor,
    NumberCtor,
    BooleanCtor,
    ArrayCtor,
    ObjectCtor,
    ErrorCtor(ErrorKind),
    ParseInt,
    ParseFloat,
    IsNaN,
    IsFinite,
    ArrayIsArray,
    ArrayFrom,
    ObjectKeys,
    ObjectValues,
    ObjectEntries,
    ObjectAssign,
    NumberIsInteger,
    NumberIsFinite,
    NumberIsNaN,
    Array(ArrayMethod),
    Str(StringMethod),
    ToFixed,
    ToString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFn {
    Floor,
    Ceil,
    Round,
    Trunc,
    Abs,
    Sign,
    Sqrt,
    Cbrt,
    Exp,
    Log,
    Log2,
    Log10,
    Sin,
    Cos,
    Tan,
    Atan,
    Atan2,
    Pow,
    Hypot,
    Min,
    Max,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayMethod {
    Push,
    Pop,
    Shift,
    Unshift,
    Slice,
    Splice,
    Concat,
    Join,
    Reverse,
    IndexOf,
    Includes,
    Find,
    FindIndex,
    Filter,
    Map,
    ForEach,
    Reduce,
    Some,
    Every,
    Sort,
    Fill,
    Flat,
    At,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMethod {
    ToUpperCase,
    ToLowerCase,
    Trim,
    TrimStart,
    TrimEnd,
    Split,
    Includes,
    StartsWith,
    EndsWith,
    IndexOf,
    Slice,
    Substring,
    Repeat,
    PadStart,
    PadEnd,
    Replace,
    ReplaceAll,
    CharAt,
    CharCodeAt,
    At,
    Concat,
}

const MATH_FNS: &[(&str, MathFn)] = &[
    ("floor", MathFn::Floor),
    ("ceil", MathFn::Ceil),
    ("round", MathFn::Round),
    ("trunc", MathFn::Trunc),
    ("abs", MathFn::Abs),
    ("sign", MathFn::Sign),
    ("sqrt", MathFn::Sqrt),
    ("cbrt", MathFn::Cbrt),
    ("exp", MathFn::Exp),
    ("log", MathFn::Log),
    ("log2", MathFn::Log2),
    ("log10", MathFn::Log10),
    ("sin", MathFn::Sin),
    ("cos", MathFn::Cos),
    ("tan", MathFn::Tan),
    ("atan", MathFn::Atan),
    ("atan2", MathFn::Atan2),
    ("pow", MathFn::Pow),
    ("hypot", MathFn::Hypot),
    ("min", MathFn::Min),
    ("max", MathFn::Max),
    ("random", MathFn::Random),
];

const ARRAY_METHODS: &[(&str, ArrayMethod)] = &[
    ("push", ArrayMethod::Push),
    ("pop", ArrayMethod::Pop),
    ("shift", ArrayMethod::Shift),
    ("unshift", ArrayMethod::Unshift),
    ("slice", ArrayMethod::Slice),
    ("splice", ArrayMethod::Splice),
    ("concat", ArrayMethod::Concat),
    ("join", ArrayMethod::Join),
    ("reverse", ArrayMethod::Reverse),
    ("indexOf", ArrayMethod::IndexOf),
    ("includes", ArrayMethod::Includes),
    ("find", ArrayMethod::Find),
    ("findIndex", ArrayMethod::FindIndex),
    ("filter", ArrayMethod::Filter),
    ("map", ArrayMethod::Map),
    ("forEach", ArrayMethod::ForEach),
    ("reduce", ArrayMethod::Reduce),
    ("some", ArrayMethod::Some),
    ("every", ArrayMethod::Every),
    ("sort", ArrayMethod::Sort),
    ("fill", ArrayMethod::Fill),
    ("flat", ArrayMethod::Flat),
    ("at", ArrayMethod::At),
];

const STRING_METHODS: &[(&str, StringMethod)] = &[
    ("toUpperCase", StringMethod::ToUpperCase),
    ("toLowerCase", StringMethod::ToLowerCase),
    ("trim", StringMethod::Trim),
    ("trimStart", StringMethod::TrimStart),
    ("trimEnd", StringMethod::TrimEnd),
    ("split", StringMethod::Split),
    ("includes", StringMethod::Includes),
    ("startsWith", StringMethod::StartsWith),
    ("endsWith", StringMethod::EndsWith),
    ("indexOf", StringMethod::IndexOf),
    ("slice", StringMethod::Slice),
    ("substring", StringMethod::Substring),
    ("repeat", StringMethod::Repeat),
    ("padStart", StringMethod::PadStart),
    ("padEnd", StringMethod::PadEnd),
    ("replace", StringMethod::Replace),
    ("replaceAll", StringMethod::ReplaceAll),
    ("charAt", StringMethod::CharAt),
    ("charCodeAt", StringMethod::CharCodeAt),
    ("at", StringMethod::At),
    ("concat", StringMethod::Concat),
];

fn lookup<T: Copy>(table: &[(&'static str, T)], key: &str) -> Option<T> {
    table.iter().find(|(name, _)| *name == key).map(|(_, v)| *v)
}

fn name_of<T: PartialEq>(table: &[(&'static str, T)], value: &T) -> &'static str {
    table
        .iter()
        .find(|(_, v)| v == value)
        .map(|(name, _)| *name)
        .unwrap_or("anonymous")
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Console(level) => level.as_str(),
            Builtin::Math(f) => name_of(MATH_FNS, &f),
            Builtin::JsonStringify => "stringify",
            Builtin::JsonParse => "parse",
            Builtin::StringCtor => "String",
            Builtin::NumberCtor => "Number",
            Builtin::BooleanCtor => "Boolean",
            Builtin::ArrayCtor => "Array",
            Builtin::ObjectCtor => "Object",
            Builtin::ErrorCtor(kind) => kind.name(),
            Builtin::ParseInt => "parseInt",
            Builtin::ParseFloat => "parseFloat",
            Builtin::IsNaN | Builtin::NumberIsNaN => "isNaN",
            Builtin::IsFinite | Builtin::NumberIsFinite => "isFinite",
            Builtin::ArrayIsArray => "isArray",
            Builtin::ArrayFrom => "from",
            Builtin::ObjectKeys => "keys",
            Builtin::ObjectValues => "values",
            Builtin::ObjectEntries => "entries",
            Builtin::ObjectAssign => "assign",
            Builtin::NumberIsInteger => "isInteger",
            Builtin::Array(m) => name_of(ARRAY_METHODS, &m),
            Builtin::Str(m) => name_of(STRING_METHODS, &m),
            Builtin::ToFixed => "toFixed",
            Builtin::ToString => "toString",
        }
    }

    pub(crate) fn is_constructor(self) -> bool {
        matches!(
            self,
            Builtin::StringCtor
                | Builtin::NumberCtor
                | Builtin::BooleanCtor
                | Builtin::ArrayCtor
                | Builtin::ObjectCtor
                | Builtin::ErrorCtor(_)
        )
    }

    /// Properties of the constructor functions themselves (`Array.isArray`).
    pub(crate) fn static_member(self, key: &str) -> Option<Value> {
        let member = match (self, key) {
            (Builtin::ArrayCtor, "isArray") => Builtin::ArrayIsArray,
            (Builtin::ArrayCtor, "from") => Builtin::ArrayFrom,
            (Builtin::ObjectCtor, "keys") => Builtin::ObjectKeys,
            (Builtin::ObjectCtor, "values") => Builtin::ObjectValues,
            (Builtin::ObjectCtor, "entries") => Builtin::ObjectEntries,
            (Builtin::ObjectCtor, "assign") => Builtin::ObjectAssign,
            (Builtin::NumberCtor, "isInteger") => Builtin::NumberIsInteger,
            (Builtin::NumberCtor, "isFinite") => Builtin::NumberIsFinite,
            (Builtin::NumberCtor, "isNaN") => Builtin::NumberIsNaN,
            (Builtin::NumberCtor, "parseInt") => Builtin::ParseInt,
            (Builtin::NumberCtor, "parseFloat") => Builtin::ParseFloat,
            (Builtin::NumberCtor, "MAX_SAFE_INTEGER") => {
                return Some(Value::Number(9_007_199_254_740_991.0));
            }
            (Builtin::NumberCtor, "EPSILON") => return Some(Value::Number(f64::EPSILON)),
            _ => return None,
        };
        Some(Value::builtin(member, Value::Undefined))
    }

    pub(crate) fn string_method(key: &str) -> Option<Builtin> {
        lookup(STRING_METHODS, key)
            .map(Builtin::Str)
            .or_else(|| Self::object_method(key))
    }

    pub(crate) fn array_method(key: &str) -> Option<Builtin> {
        lookup(ARRAY_METHODS, key)
            .map(Builtin::Array)
            .or_else(|| Self::object_method(key))
    }

    pub(crate) fn number_method(key: &str) -> Option<Builtin> {
        match key {
            "toFixed" => Some(Builtin::ToFixed),
            _ => Self::object_method(key),
        }
    }

    pub(crate) fn object_method(key: &str) -> Option<Builtin> {
        (key == "toString").then_some(Builtin::ToString)
    }
}

/// The global bindings every evaluation starts with.
pub(crate) fn globals() -> Vec<(&'static str, Value)> {
    let unbound = |b: Builtin| Value::builtin(b, Value::Undefined);
    let namespace = |members: Vec<(&str, Value)>| {
        Value::object(
            members
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    };

    let console = namespace(
        [
            ("log", Level::Log),
            ("debug", Level::Log),
            ("info", Level::Info),
            ("warn", Level::Warn),
            ("error", Level::Error),
        ]
        .into_iter()
        .map(|(name, level)| (name, unbound(Builtin::Console(level))))
        .collect(),
    );

    let mut math_members = vec![
        ("PI", Value::Number(std::f64::consts::PI)),
        ("E", Value::Number(std::f64::consts::E)),
        ("LN2", Value::Number(std::f64::consts::LN_2)),
        ("SQRT2", Value::Number(std::f64::consts::SQRT_2)),
    ];
    math_members.extend(
        MATH_FNS
            .iter()
            .map(|(name, f)| (*name, unbound(Builtin::Math(*f)))),
    );

    let json = namespace(vec![
        ("stringify", unbound(Builtin::JsonStringify)),
        ("parse", unbound(Builtin::JsonParse)),
    ]);

    let mut globals = vec![
        ("console", console),
        ("Math", namespace(math_members)),
        ("JSON", json),
        ("String", unbound(Builtin::StringCtor)),
        ("Number", unbound(Builtin::NumberCtor)),
        ("Boolean", unbound(Builtin::BooleanCtor)),
        ("Array", unbound(Builtin::ArrayCtor)),
        ("Object", unbound(Builtin::ObjectCtor)),
        ("parseInt", unbound(Builtin::ParseInt)),
        ("parseFloat", unbound(Builtin::ParseFloat)),
        ("isNaN", unbound(Builtin::IsNaN)),
        ("isFinite", unbound(Builtin::IsFinite)),
        ("NaN", Value::Number(f64::NAN)),
        ("Infinity", Value::Number(f64::INFINITY)),
    ];
    for kind in [
        ErrorKind::Error,
        ErrorKind::TypeError,
        ErrorKind::RangeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
    ] {
        globals.push((kind.name(), unbound(Builtin::ErrorCtor(kind))));
    }
    globals
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn to_integer(value: &Value) -> f64 {
    let n = value.to_number();
    if n.is_nan() { 0.0 } else { n.trunc() }
}

/// Resolve a possibly negative, possibly absent position against `len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = to_integer(value);
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn char_slice(chars: &[char], start: usize, end: usize) -> String {
    if start >= end {
        String::new()
    } else {
        chars[start..end].iter().collect()
    }
}

fn char_index_of(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let byte_from = haystack
        .char_indices()
        .nth(from)
        .map(|(i, _)| i)
        .unwrap_or(haystack.len());
    haystack[byte_from..]
        .find(needle)
        .map(|byte| from + haystack[byte_from..byte_from + byte].chars().count())
}

impl Interpreter<'_> {
    pub(crate) fn call_builtin(
        &mut self,
        builtin: Builtin,
        this: &Value,
        args: Vec<Value>,
    ) -> Eval<Value> {
        match builtin {
            Builtin::Console(level) => {
                let message = args
                    .iter()
                    .map(Value::display)
                    .collect::<Vec<_>>()
                    .join(" ");
                self.console.record(level, message);
                Ok(Value::Undefined)
            }
            Builtin::Math(f) => self.call_math(f, &args),
            Builtin::JsonStringify => self.json_stringify(&arg(&args, 0), &arg(&args, 2)),
            Builtin::JsonParse => self.json_parse(&arg(&args, 0).to_js_string()),
            Builtin::StringCtor => Ok(Value::str(match args.first() {
                Some(value) => value.to_js_string(),
                None => String::new(),
            })),
            Builtin::NumberCtor => Ok(Value::Number(
                args.first().map(Value::to_number).unwrap_or(0.0),
            )),
            Builtin::BooleanCtor => Ok(Value::Bool(arg(&args, 0).truthy())),
            Builtin::ArrayCtor => {
                if let [Value::Number(n)] = args.as_slice() {
                    let n = *n;
                    if n < 0.0 || n.fract() != 0.0 || !n.is_finite() {
                        return self.throw(ErrorKind::RangeError, "Invalid array length");
                    }
                    self.check_array_len(n as usize)?;
                    return Ok(Value::array(vec![Value::Undefined; n as usize]));
                }
                Ok(Value::array(args))
            }
            Builtin::ObjectCtor => match args.into_iter().next() {
                Some(value @ (Value::Object(_) | Value::Array(_))) => Ok(value),
                _ => Ok(Value::object(Vec::new())),
            },
            Builtin::ErrorCtor(kind) => {
                let message = match arg(&args, 0) {
                    Value::Undefined => String::new(),
                    other => other.to_js_string(),
                };
                Ok(Value::error(kind, message))
            }
            Builtin::ParseInt => Ok(Value::Number(parse_int(
                &arg(&args, 0).to_js_string(),
                to_integer(&arg(&args, 1)) as u32,
            ))),
            Builtin::ParseFloat => Ok(Value::Number(parse_float(&arg(&args, 0).to_js_string()))),
            Builtin::IsNaN => Ok(Value::Bool(arg(&args, 0).to_number().is_nan())),
            Builtin::IsFinite => Ok(Value::Bool(arg(&args, 0).to_number().is_finite())),
            Builtin::NumberIsNaN => Ok(Value::Bool(
                matches!(arg(&args, 0), Value::Number(n) if n.is_nan()),
            )),
            Builtin::NumberIsFinite => Ok(Value::Bool(
                matches!(arg(&args, 0), Value::Number(n) if n.is_finite()),
            )),
            Builtin::NumberIsInteger => Ok(Value::Bool(
                matches!(arg(&args, 0), Value::Number(n) if n.is_finite() && n.fract() == 0.0),
            )),
            Builtin::ArrayIsArray => Ok(Value::Bool(matches!(arg(&args, 0), Value::Array(_)))),
            Builtin::ArrayFrom => {
                let items = match arg(&args, 0) {
                    Value::Array(items) => items.borrow().clone(),
                    Value::Str(s) => s.chars().map(|c| Value::str(c.to_string())).collect(),
                    _ => Vec::new(),
                };
                match args.get(1) {
                    Some(mapper) => {
                        let mut mapped = Vec::with_capacity(items.len());
                        for (i, item) in items.into_iter().enumerate() {
                            mapped.push(self.callback(mapper, vec![item, Value::Number(i as f64)])?);
                        }
                        Ok(Value::array(mapped))
                    }
                    None => Ok(Value::array(items)),
                }
            }
            Builtin::ObjectKeys => Ok(Value::array(
                own_entries(&arg(&args, 0))
                    .into_iter()
                    .map(|(k, _)| Value::str(k))
                    .collect(),
            )),
            Builtin::ObjectValues => Ok(Value::array(
                own_entries(&arg(&args, 0))
                    .into_iter()
                    .map(|(_, v)| v)
                    .collect(),
            )),
            Builtin::ObjectEntries => Ok(Value::array(
                own_entries(&arg(&args, 0))
                    .into_iter()
                    .map(|(k, v)| Value::array(vec![Value::str(k), v]))
                    .collect(),
            )),
            Builtin::ObjectAssign => {
                let target = arg(&args, 0);
                for source in args.iter().skip(1) {
                    for (key, value) in own_entries(source) {
                        self.set_property(&target, &key, value)?;
                    }
                }
                Ok(target)
            }
            Builtin::Array(method) => match this {
                Value::Array(_) => self.call_array_method(method, this, args),
                _ => self.throw(ErrorKind::TypeError, "receiver is not an array"),
            },
            Builtin::Str(method) => self.call_string_method(method, &this.to_js_string(), args),
            Builtin::ToFixed => {
                let digits = to_integer(&arg(&args, 0));
                if !(0.0..=100.0).contains(&digits) {
                    return self.throw(
                        ErrorKind::RangeError,
                        "toFixed() digits argument must be between 0 and 100",
                    );
                }
                let n = this.to_number();
                if !n.is_finite() || n.abs() >= 1e21 {
                    return Ok(Value::str(number_to_string(n)));
                }
                Ok(Value::str(format!("{n:.prec$}", prec = digits as usize)))
            }
            Builtin::ToString => match (this, arg(&args, 0)) {
                (Value::Number(n), Value::Number(radix)) if radix != 10.0 => {
                    if !(2.0..=36.0).contains(&radix) {
                        return self.throw(
                            ErrorKind::RangeError,
                            "toString() radix must be between 2 and 36",
                        );
                    }
                    Ok(Value::str(to_radix(*n, radix as u32)))
                }
                (Value::Object(obj), _) if obj.borrow().error.is_none() => {
                    Ok(Value::str("[object Object]"))
                }
                (other, _) => Ok(Value::str(other.to_js_string())),
            },
        }
    }

    fn callback(&mut self, function: &Value, args: Vec<Value>) -> Eval<Value> {
        if !matches!(function, Value::Function(_) | Value::Builtin(_)) {
            return self.throw(
                ErrorKind::TypeError,
                format!("{} is not a function", function.inspect()),
            );
        }
        self.call(function, args)
    }

    fn call_math(&mut self, f: MathFn, args: &[Value]) -> Eval<Value> {
        let x = arg(args, 0).to_number();
        let y = arg(args, 1).to_number();
        let n = match f {
            MathFn::Floor => x.floor(),
            MathFn::Ceil => x.ceil(),
            // Halves round towards +Infinity.
            MathFn::Round => (x + 0.5).floor(),
            MathFn::Trunc => x.trunc(),
            MathFn::Abs => x.abs(),
            MathFn::Sign => {
                if x.is_nan() || x == 0.0 {
                    x
                } else {
                    x.signum()
                }
            }
            MathFn::Sqrt => x.sqrt(),
            MathFn::Cbrt => x.cbrt(),
            MathFn::Exp => x.exp(),
            MathFn::Log => x.ln(),
            MathFn::Log2 => x.log2(),
            MathFn::Log10 => x.log10(),
            MathFn::Sin => x.sin(),
            MathFn::Cos => x.cos(),
            MathFn::Tan => x.tan(),
            MathFn::Atan => x.atan(),
            MathFn::Atan2 => x.atan2(y),
            MathFn::Pow => {
                if y.is_nan() {
                    f64::NAN
                } else {
                    x.powf(y)
                }
            }
            MathFn::Hypot => args
                .iter()
                .map(|v| v.to_number().powi(2))
                .sum::<f64>()
                .sqrt(),
            MathFn::Min => args
                .iter()
                .map(Value::to_number)
                .fold(f64::INFINITY, |acc, v| if v.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(v) }),
            MathFn::Max => args
                .iter()
                .map(Value::to_number)
                .fold(f64::NEG_INFINITY, |acc, v| if v.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(v) }),
            MathFn::Random => self.next_random(),
        };
        Ok(Value::Number(n))
    }

    fn call_array_method(
        &mut self,
        method: ArrayMethod,
        this: &Value,
        args: Vec<Value>,
    ) -> Eval<Value> {
        let Value::Array(items) = this else {
            return Ok(Value::Undefined);
        };
        let len = items.borrow().len();

        match method {
            ArrayMethod::Push => {
                self.check_array_len(len + args.len())?;
                self.charge_slots(args.len())?;
                let mut items = items.borrow_mut();
                items.extend(args);
                Ok(Value::Number(items.len() as f64))
            }
            ArrayMethod::Pop => Ok(items.borrow_mut().pop().unwrap_or(Value::Undefined)),
            ArrayMethod::Shift => {
                let mut items = items.borrow_mut();
                if items.is_empty() {
                    Ok(Value::Undefined)
                } else {
                    Ok(items.remove(0))
                }
            }
            ArrayMethod::Unshift => {
                self.check_array_len(len + args.len())?;
                self.charge_slots(args.len())?;
                let mut items = items.borrow_mut();
                items.splice(0..0, args);
                Ok(Value::Number(items.len() as f64))
            }
            ArrayMethod::Slice => {
                let start = relative_index(&arg(&args, 0), len, 0);
                let end = relative_index(&arg(&args, 1), len, len);
                let items = items.borrow();
                Ok(Value::array(if start < end {
                    items[start..end].to_vec()
                } else {
                    Vec::new()
                }))
            }
            ArrayMethod::Splice => {
                let start = relative_index(&arg(&args, 0), len, 0);
                let delete = match args.get(1) {
                    Some(count) => (to_integer(count).max(0.0) as usize).min(len - start),
                    None => len - start,
                };
                let inserted: Vec<Value> = args.into_iter().skip(2).collect();
                self.check_array_len(len - delete + inserted.len())?;
                self.charge_slots(inserted.len())?;
                let removed: Vec<Value> = items
                    .borrow_mut()
                    .splice(start..start + delete, inserted)
                    .collect();
                Ok(Value::array(removed))
            }
            ArrayMethod::Concat => {
                let mut out = items.borrow().clone();
                for value in args {
                    match value {
                        Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                        other => out.push(other),
                    }
                    self.check_array_len(out.len())?;
                }
                Ok(Value::array(out))
            }
            ArrayMethod::Join => {
                let separator = match arg(&args, 0) {
                    Value::Undefined => ",".to_string(),
                    other => other.to_js_string(),
                };
                let out = value::join(items, &separator);
                self.check_string_len(out.len())?;
                Ok(Value::str(out))
            }
            ArrayMethod::Reverse => {
                items.borrow_mut().reverse();
                Ok(this.clone())
            }
            ArrayMethod::IndexOf => {
                let needle = arg(&args, 0);
                let position = items.borrow().iter().position(|v| v.strict_equals(&needle));
                Ok(Value::Number(position.map(|p| p as f64).unwrap_or(-1.0)))
            }
            ArrayMethod::Includes => {
                let needle = arg(&args, 0);
                Ok(Value::Bool(
                    items.borrow().iter().any(|v| v.same_value_zero(&needle)),
                ))
            }
            ArrayMethod::Find
            | ArrayMethod::FindIndex
            | ArrayMethod::Filter
            | ArrayMethod::Map
            | ArrayMethod::ForEach
            | ArrayMethod::Some
            | ArrayMethod::Every => self.iterate(method, this, &arg(&args, 0)),
            ArrayMethod::Reduce => {
                let callback = arg(&args, 0);
                let snapshot = items.borrow().clone();
                let mut iter = snapshot.into_iter().enumerate();
                let mut acc = match args.get(1) {
                    Some(initial) => initial.clone(),
                    None => match iter.next() {
                        Some((_, first)) => first,
                        None => {
                            return self.throw(
                                ErrorKind::TypeError,
                                "Reduce of empty array with no initial value",
                            );
                        }
                    },
                };
                for (i, item) in iter {
                    acc = self.callback(
                        &callback,
                        vec![acc, item, Value::Number(i as f64), this.clone()],
                    )?;
                }
                Ok(acc)
            }
            ArrayMethod::Sort => {
                let comparator = args.first().filter(|c| !matches!(c, Value::Undefined));
                let snapshot = items.borrow().clone();
                let sorted = self.merge_sort(snapshot, comparator)?;
                *items.borrow_mut() = sorted;
                Ok(this.clone())
            }
            ArrayMethod::Fill => {
                let value = arg(&args, 0);
                let start = relative_index(&arg(&args, 1), len, 0);
                let end = relative_index(&arg(&args, 2), len, len);
                let mut items = items.borrow_mut();
                for slot in items.iter_mut().take(end).skip(start) {
                    *slot = value.clone();
                }
                Ok(this.clone())
            }
            ArrayMethod::Flat => {
                let depth = match arg(&args, 0) {
                    Value::Undefined => 1,
                    other => to_integer(&other).max(0.0) as usize,
                };
                let mut out = Vec::new();
                self.flatten_into(&items.borrow(), depth, 0, &mut out)?;
                Ok(Value::array(out))
            }
            ArrayMethod::At => {
                let n = to_integer(&arg(&args, 0));
                let index = if n < 0.0 { len as f64 + n } else { n };
                if index < 0.0 {
                    return Ok(Value::Undefined);
                }
                Ok(items
                    .borrow()
                    .get(index as usize)
                    .cloned()
                    .unwrap_or(Value::Undefined))
            }
        }
    }

    /// The callback-per-element methods. Callbacks see a snapshot.
    /// Each element costs a step, so shared sub-arrays cannot make `flat`
    /// unbounded work. Nesting past [`MAX_NESTING`] is a `RangeError`, which
    /// is where a self-containing array ends up under `flat(Infinity)`.
    fn flatten_into(
        &mut self,
        items: &[Value],
        depth: usize,
        nesting: usize,
        out: &mut Vec<Value>,
    ) -> Eval<()> {
        if nesting >= MAX_NESTING {
            return self.throw(ErrorKind::RangeError, "Maximum call stack size exceeded");
        }
        for item in items {
            self.tick()?;
            match item {
                Value::Array(inner) if depth > 0 => {
                    self.flatten_into(&inner.borrow(), depth - 1, nesting + 1, out)?;
                }
                other => out.push(other.clone()),
            }
            self.check_array_len(out.len())?;
        }
        Ok(())
    }

    fn iterate(&mut self, method: ArrayMethod, this: &Value, callback: &Value) -> Eval<Value> {
        let Value::Array(items) = this else {
            return Ok(Value::Undefined);
        };
        let snapshot = items.borrow().clone();
        let mut mapped = Vec::new();
        for (i, item) in snapshot.into_iter().enumerate() {
            let result = self.callback(
                callback,
                vec![item.clone(), Value::Number(i as f64), this.clone()],
            )?;
            match method {
                ArrayMethod::Find if result.truthy() => return Ok(item),
                ArrayMethod::FindIndex if result.truthy() => return Ok(Value::Number(i as f64)),
                ArrayMethod::Some if result.truthy() => return Ok(Value::Bool(true)),
                ArrayMethod::Every if !result.truthy() => return Ok(Value::Bool(false)),
                ArrayMethod::Filter if result.truthy() => mapped.push(item),
                ArrayMethod::Map => mapped.push(result),
                _ => {}
            }
        }
        Ok(match method {
            ArrayMethod::Filter | ArrayMethod::Map => Value::array(mapped),
            ArrayMethod::FindIndex => Value::Number(-1.0),
            ArrayMethod::Some => Value::Bool(false),
            ArrayMethod::Every => Value::Bool(true),
            _ => Value::Undefined,
        })
    }

    /// Stable merge sort. The comparator is script code and may throw or be
    /// inconsistent, so this does not lean on `slice::sort_by`.
    fn merge_sort(&mut self, mut items: Vec<Value>, comparator: Option<&Value>) -> Eval<Vec<Value>> {
        if items.len() <= 1 {
            return Ok(items);
        }
        let right = items.split_off(items.len() / 2);
        let left = self.merge_sort(items, comparator)?;
        let right = self.merge_sort(right, comparator)?;

        let mut merged = Vec::with_capacity(left.len() + right.len());
        let mut left = left.into_iter().peekable();
        let mut right = right.into_iter().peekable();
        loop {
            let right_first = match (left.peek(), right.peek()) {
                (Some(l), Some(r)) => self.sorts_after(l, r, comparator)?,
                _ => break,
            };
            if right_first {
                merged.extend(right.next());
            } else {
                merged.extend(left.next());
            }
        }
        merged.extend(left);
        merged.extend(right);
        Ok(merged)
    }

    fn sorts_after(&mut self, a: &Value, b: &Value, comparator: Option<&Value>) -> Eval<bool> {
        match (a, b) {
            (Value::Undefined, Value::Undefined) => return Ok(false),
            (Value::Undefined, _) => return Ok(true),
            (_, Value::Undefined) => return Ok(false),
            _ => {}
        }
        match comparator {
            Some(comparator) => {
                let order = self.callback(comparator, vec![a.clone(), b.clone()])?;
                Ok(order.to_number() > 0.0)
            }
            None => Ok(a.to_js_string() > b.to_js_string()),
        }
    }

    fn call_string_method(
        &mut self,
        method: StringMethod,
        s: &str,
        args: Vec<Value>,
    ) -> Eval<Value> {
        let text_arg = |i: usize| arg(&args, i).to_js_string();
        let chars: Vec<char> = s.chars().collect();
        let len = chars.len();

        let value = match method {
            StringMethod::ToUpperCase => Value::str(s.to_uppercase()),
            StringMethod::ToLowerCase => Value::str(s.to_lowercase()),
            StringMethod::Trim => Value::str(s.trim()),
            StringMethod::TrimStart => Value::str(s.trim_start()),
            StringMethod::TrimEnd => Value::str(s.trim_end()),
            StringMethod::Split => {
                let parts: Vec<Value> = match arg(&args, 0) {
                    Value::Undefined => vec![Value::str(s)],
                    separator => {
                        let separator = separator.to_js_string();
                        if separator.is_empty() {
                            chars.iter().map(|c| Value::str(c.to_string())).collect()
                        } else {
                            s.split(separator.as_str()).map(Value::str).collect()
                        }
                    }
                };
                let limit = match arg(&args, 1) {
                    Value::Undefined => usize::MAX,
                    other => to_integer(&other).max(0.0) as usize,
                };
                self.check_array_len(parts.len().min(limit))?;
                Value::array(parts.into_iter().take(limit).collect())
            }
            StringMethod::Includes => Value::Bool(s.contains(text_arg(0).as_str())),
            StringMethod::StartsWith => Value::Bool(s.starts_with(text_arg(0).as_str())),
            StringMethod::EndsWith => Value::Bool(s.ends_with(text_arg(0).as_str())),
            StringMethod::IndexOf => {
                let from = relative_index(&arg(&args, 1), len, 0);
                Value::Number(
                    char_index_of(s, &text_arg(0), from)
                        .map(|i| i as f64)
                        .unwrap_or(-1.0),
                )
            }
            StringMethod::Slice => {
                let start = relative_index(&arg(&args, 0), len, 0);
                let end = relative_index(&arg(&args, 1), len, len);
                Value::str(char_slice(&chars, start, end))
            }
            StringMethod::Substring => {
                let clamp = |v: Value, default: usize| match v {
                    Value::Undefined => default,
                    other => to_integer(&other).clamp(0.0, len as f64) as usize,
                };
                let a = clamp(arg(&args, 0), 0);
                let b = clamp(arg(&args, 1), len);
                Value::str(char_slice(&chars, a.min(b), a.max(b)))
            }
            StringMethod::Repeat => {
                let count = arg(&args, 0).to_number();
                if count < 0.0 || count.is_infinite() {
                    return self.throw(
                        ErrorKind::RangeError,
                        format!("Invalid count value: {}", number_to_string(count)),
                    );
                }
                let count = if count.is_nan() { 0 } else { count as usize };
                self.check_string_len(s.len().saturating_mul(count))?;
                Value::str(s.repeat(count))
            }
            StringMethod::PadStart | StringMethod::PadEnd => {
                let target = to_integer(&arg(&args, 0)).max(0.0) as usize;
                let filler = match arg(&args, 1) {
                    Value::Undefined => " ".to_string(),
                    other => other.to_js_string(),
                };
                if target <= len || filler.is_empty() {
                    Value::str(s)
                } else {
                    self.check_string_len(target.saturating_mul(4))?;
                    let pad: String = filler.chars().cycle().take(target - len).collect();
                    if method == StringMethod::PadStart {
                        Value::str(pad + s)
                    } else {
                        Value::str(s.to_string() + &pad)
                    }
                }
            }
            StringMethod::Replace | StringMethod::ReplaceAll => {
                let pattern = text_arg(0);
                let replacement = arg(&args, 1);
                let mut out = String::new();
                let mut rest = s;
                while let Some(pos) = rest.find(pattern.as_str()) {
                    out.push_str(&rest[..pos]);
                    let piece = match &replacement {
                        Value::Function(_) | Value::Builtin(_) => self
                            .call(&replacement, vec![Value::str(pattern.as_str())])?
                            .to_js_string(),
                        other => other.to_js_string(),
                    };
                    out.push_str(&piece);
                    self.check_string_len(out.len())?;
                    rest = &rest[pos + pattern.len()..];
                    if method == StringMethod::Replace {
                        break;
                    }
                    if pattern.is_empty() {
                        // Step past one character so an empty pattern terminates.
                        let mut it = rest.chars();
                        if let Some(c) = it.next() {
                            out.push(c);
                        } else {
                            break;
                        }
                        rest = it.as_str();
                    }
                }
                out.push_str(rest);
                Value::str(out)
            }
            StringMethod::CharAt => {
                let i = to_integer(&arg(&args, 0));
                Value::str(
                    (i >= 0.0)
                        .then(|| chars.get(i as usize))
                        .flatten()
                        .map(|c| c.to_string())
                        .unwrap_or_default(),
                )
            }
            StringMethod::CharCodeAt => {
                let i = to_integer(&arg(&args, 0));
                Value::Number(
                    (i >= 0.0)
                        .then(|| chars.get(i as usize))
                        .flatten()
                        .map(|c| f64::from(u32::from(*c)))
                        .unwrap_or(f64::NAN),
                )
            }
            StringMethod::At => {
                let n = to_integer(&arg(&args, 0));
                let index = if n < 0.0 { len as f64 + n } else { n };
                if index < 0.0 {
                    Value::Undefined
                } else {
                    chars
                        .get(index as usize)
                        .map(|c| Value::str(c.to_string()))
                        .unwrap_or(Value::Undefined)
                }
            }
            StringMethod::Concat => {
                let mut out = s.to_string();
                for value in &args {
                    out.push_str(&value.to_js_string());
                    self.check_string_len(out.len())?;
                }
                Value::str(out)
            }
        };
        Ok(value)
    }

    fn json_stringify(&mut self, value: &Value, space: &Value) -> Eval<Value> {
        let Some(json) = self.to_json(value, 0)? else {
            return Ok(Value::Undefined);
        };
        let indent = match space {
            Value::Number(n) => " ".repeat(n.clamp(0.0, 10.0) as usize),
            Value::Str(s) => s.chars().take(10).collect(),
            _ => String::new(),
        };

        let text = if indent.is_empty() {
            json.to_string()
        } else {
            let mut out = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
            let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
            if let Err(err) = json.serialize(&mut serializer) {
                return self.throw(ErrorKind::TypeError, err.to_string());
            }
            String::from_utf8_lossy(&out).into_owned()
        };
        self.check_string_len(text.len())?;
        Ok(Value::str(text))
    }

    /// `None` for values JSON has no spelling for (`undefined`, functions).
    fn to_json(&self, value: &Value, depth: usize) -> Eval<Option<serde_json::Value>> {
        if depth > MAX_JSON_DEPTH {
            return self.throw(ErrorKind::TypeError, "Converting circular structure to JSON");
        }
        Ok(Some(match value {
            Value::Undefined | Value::Function(_) | Value::Builtin(_) => return Ok(None),
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => json_number(*n),
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::Array(items) => {
                let mut out = Vec::new();
                for item in items.borrow().iter() {
                    out.push(self.to_json(item, depth + 1)?.unwrap_or(serde_json::Value::Null));
                }
                serde_json::Value::Array(out)
            }
            Value::Object(obj) => {
                let obj = obj.borrow();
                let mut map = serde_json::Map::new();
                // Error fields are not enumerable.
                if obj.error.is_none() {
                    for (key, item) in &obj.props {
                        if let Some(json) = self.to_json(item, depth + 1)? {
                            map.insert(key.clone(), json);
                        }
                    }
                }
                serde_json::Value::Object(map)
            }
        }))
    }

    fn json_parse(&mut self, text: &str) -> Eval<Value> {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(json) => self.from_json(json),
            Err(err) => self.throw(ErrorKind::SyntaxError, format!("JSON.parse: {err}")),
        }
    }

    fn from_json(&self, json: serde_json::Value) -> Eval<Value> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::str(s),
            serde_json::Value::Array(items) => {
                self.check_array_len(items.len())?;
                Value::array(
                    items
                        .into_iter()
                        .map(|item| self.from_json(item))
                        .collect::<Eval<Vec<_>>>()?,
                )
            }
            serde_json::Value::Object(map) => Value::object(
                map.into_iter()
                    .map(|(k, v)| Ok((k, self.from_json(v)?)))
                    .collect::<Eval<Vec<_>>>()?,
            ),
        })
    }
}

fn json_number(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    // Integral values print without a trailing ".0".
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Own enumerable entries: object properties, or array/string indices.
fn own_entries(value: &Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(obj) => {
            let obj = obj.borrow();
            if obj.error.is_some() {
                Vec::new()
            } else {
                obj.props.clone()
            }
        }
        Value::Array(items) => items
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        Value::Str(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Value::str(c.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_int(text: &str, radix: u32) -> f64 {
    let text = text.trim_start();
    let (negative, mut digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let mut radix = radix;
    if (radix == 0 || radix == 16)
        && let Some(rest) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X"))
    {
        radix = 16;
        digits = rest;
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }

    let mut value = 0.0f64;
    let mut any = false;
    for c in digits.chars() {
        let Some(d) = c.to_digit(radix) else {
            break;
        };
        value = value * f64::from(radix) + f64::from(d);
        any = true;
    }
    match (any, negative) {
        (false, _) => f64::NAN,
        (true, true) => -value,
        (true, false) => value,
    }
}

/// Longest numeric prefix, as `parseFloat` reads it.
fn parse_float(text: &str) -> f64 {
    let text = text.trim_start();
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    if unsigned.starts_with("Infinity") {
        return if text.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || &text[digits_start..end] == "." {
        return f64::NAN;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    string_to_number(&text[..end])
}

/// Integer part in the given radix; fractions fall back to base 10.
fn to_radix(n: f64, radix: u32) -> String {
    if !n.is_finite() || n.fract() != 0.0 || n.abs() >= 9_007_199_254_740_992.0 {
        return number_to_string(n);
    }
    let mut value = n.abs() as u64;
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        let d = (value % u64::from(radix)) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('?'));
        value /= u64::from(radix);
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Console;
    use crate::interp::{Interrupt, Limits};
    use crate::parser::parse;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn run(source: &str) -> String {
        let mut console = Console::new(100);
        let program = parse(source).unwrap();
        let mut interp = Interpreter::new(&mut console, &Limits::default());
        match interp.run(&program) {
            Ok(value) => value.inspect(),
            Err(Interrupt::Throw(value)) => format!("threw {}", value.display()),
            Err(Interrupt::Abort(err)) => format!("aborted {err}"),
        }
    }

    #[rstest]
    #[case("[3, 1, 2].sort()", "[1, 2, 3]")]
    #[case("[10, 9, 1].sort()", "[1, 10, 9]")]
    #[case("[3, 1, 2].sort((a, b) => b - a)", "[3, 2, 1]")]
    #[case("[1, 2, 3].map(x => x * 2)", "[2, 4, 6]")]
    #[case("[1, 2, 3, 4].filter(x => x % 2 === 0)", "[2, 4]")]
    #[case("[1, 2, 3].reduce((a, b) => a + b, 0)", "6")]
    #[case("[1, 2, 3].find(x => x > 1)", "2")]
    #[case("[1, 2, 3].findIndex(x => x > 5)", "-1")]
    #[case("[1, [2, [3]]].flat()", "[1, 2, [3]]")]
    #[case("[1, 2, 3].slice(-2)", "[2, 3]")]
    #[case("const a = [1, 2, 3, 4]; a.splice(1, 2, 'x'); a", "[1, \"x\", 4]")]
    #[case("[1, null, 'a'].join('-')", "\"1--a\"")]
    #[case("[NaN].includes(NaN)", "true")]
    #[case("[1, 2, 3].at(-1)", "3")]
    fn array_methods(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(run(source), expected);
    }

    #[rstest]
    #[case("'Hello'.toUpperCase()", "\"HELLO\"")]
    #[case("'  x '.trim()", "\"x\"")]
    #[case("'a,b,c'.split(',')", "[\"a\", \"b\", \"c\"]")]
    #[case("'abc'.split('')", "[\"a\", \"b\", \"c\"]")]
    #[case("'héllo'.slice(1, 3)", "\"él\"")]
    #[case("'héllo'.length", "5")]
    #[case("'abc'.substring(2, 0)", "\"ab\"")]
    #[case("'5'.padStart(3, '0')", "\"005\"")]
    #[case("'a-b-c'.replace('-', '+')", "\"a+b-c\"")]
    #[case("'a-b-c'.replaceAll('-', '+')", "\"a+b+c\"")]
    #[case("'abc'.indexOf('c')", "2")]
    #[case("'ab'.repeat(3)", "\"ababab\"")]
    #[case("'A'.charCodeAt(0)", "65")]
    fn string_methods(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(run(source), expected);
    }

    #[rstest]
    #[case("(3.14159).toFixed(2)", "\"3.14\"")]
    #[case("(255).toString(16)", "\"ff\"")]
    #[case("Math.max(1, 5, 3)", "5")]
    #[case("Math.max()", "-Infinity")]
    #[case("Math.round(2.5)", "3")]
    #[case("Math.round(-2.5)", "-2")]
    #[case("parseInt('42px')", "42")]
    #[case("parseInt('0x1A')", "26")]
    #[case("parseInt('z')", "NaN")]
    #[case("parseFloat('3.5e2 apples')", "350")]
    #[case("Number('')", "0")]
    #[case("String([1, [2, 3]])", "\"1,2,3\"")]
    #[case("Boolean('')", "false")]
    #[case("isNaN('abc')", "true")]
    #[case("Number.isInteger(4)", "true")]
    fn numbers_and_conversions(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(run(source), expected);
    }

    #[test]
    fn math_random_is_in_unit_interval() {
        assert_eq!(
            run("let ok = true; for (let i = 0; i < 100; i++) { const r = Math.random(); if (r < 0 || r >= 1) ok = false } ok"),
            "true"
        );
    }

    #[rstest]
    #[case("JSON.stringify({ a: 1, b: [true, null], c: 'x' })", r#""{\"a\":1,\"b\":[true,null],\"c\":\"x\"}""#)]
    #[case("JSON.stringify({ f: () => 1, u: undefined, n: NaN })", r#""{\"n\":null}""#)]
    #[case("JSON.stringify(undefined)", "undefined")]
    #[case("JSON.stringify(1.5)", r#""1.5""#)]
    #[case("JSON.parse('{\"b\": 1, \"a\": [2]}')", "{ b: 1, a: [2] }")]
    fn json(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(run(source), expected);
    }

    #[test]
    fn json_stringify_indents() {
        assert_eq!(
            run("JSON.stringify({ a: [1] }, null, 2)"),
            r#""{\n  \"a\": [\n    1\n  ]\n}""#
        );
    }

    #[test]
    fn json_stringify_reports_cycles() {
        assert_eq!(
            run("const o = {}; o.self = o; JSON.stringify(o)"),
            "threw TypeError: Converting circular structure to JSON"
        );
    }

    #[test]
    fn json_parse_errors_are_catchable() {
        assert_eq!(
            run("try { JSON.parse('{') } catch (e) { e.name }"),
            "\"SyntaxError\""
        );
    }

    #[rstest]
    #[case("'x'.repeat(2 ** 30)")]
    #[case("let s = 'x'.repeat(2 ** 23); s + s + s")]
    fn oversized_strings_raise_range_errors(#[case] source: &str) {
        assert_eq!(run(source), "threw RangeError: Invalid string length");
    }

    #[test]
    fn oversized_arrays_raise_range_errors() {
        assert_eq!(run("new Array(2 ** 30)"), "threw RangeError: Invalid array length");
    }

    #[test]
    fn comparator_errors_propagate_out_of_sort() {
        assert_eq!(
            run("[2, 1].sort(() => { throw new Error('cmp') })"),
            "threw Error: cmp"
        );
    }

    #[test]
    fn error_constructors_build_error_values() {
        assert_eq!(run("TypeError('bad').message"), "\"bad\"");
        assert_eq!(run("String(new RangeError('r'))"), "\"RangeError: r\"");
    }

    #[test]
    fn object_helpers() {
        assert_eq!(run("Object.keys({ a: 1, b: 2 })"), r#"["a", "b"]"#);
        assert_eq!(run("Object.entries({ a: 1 })"), r#"[["a", 1]]"#);
        assert_eq!(run("Object.assign({ a: 1 }, { b: 2 })"), "{ a: 1, b: 2 }");
        assert_eq!(run("Array.isArray([])"), "true");
    }

    #[test]
    fn console_joins_arguments_with_spaces() {
        let mut console = Console::new(10);
        let program = parse("console.warn('a', 1, { b: 'c' })").unwrap();
        Interpreter::new(&mut console, &Limits::default())
            .run(&program)
            .unwrap();
        assert_eq!(
            console.finish(),
            vec![crate::console::LogEntry::new(Level::Warn, "a 1 { b: \"c\" }")]
        );
    }
}
