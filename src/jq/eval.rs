//! Expression evaluator for jq-like queries.
//!
//! Every expression hands its outputs one at a time to a sink callback. An error stops
//! the stream, but the outputs produced before it are kept, so callers observe the same
//! "values, then error" sequence jq produces. A sink may also ask its producer to stop,
//! which is how `limit` and `first` finish without running a generator to the end.

use core::cmp::Ordering;

use indexmap::IndexMap;
use thiserror::Error;

use super::expr::{ArithOp, Builtin, CompareOp, Expr, ObjectEntry, ObjectKey, TypeFilter};
use super::value::JqValue;

/// Longest string that `*` may build by repetition, in bytes.
const MAX_REPEAT_BYTES: usize = 1 << 28;

/// Highest array index an assignment may create.
const MAX_ARRAY_INDEX: usize = 1 << 29;

/// Error raised while evaluating a query.
///
/// Carries the value that was raised, so `error({"code": 1})` keeps its payload.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", message_of(.value))]
pub struct EvalError {
    value: JqValue,
    /// Set when this is not a real error but a request to stop the producer that
    /// feeds the consumer with this label.
    stop: Option<usize>,
}

impl EvalError {
    /// Create an error with a string message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::from_value(JqValue::String(message.into()))
    }

    /// Create an error carrying an arbitrary value, as `error(v)` does.
    pub fn from_value(value: JqValue) -> Self {
        EvalError { value, stop: None }
    }

    fn stop(label: usize) -> Self {
        EvalError {
            value: JqValue::Null,
            stop: Some(label),
        }
    }

    /// The raised value.
    pub fn value(&self) -> &JqValue {
        &self.value
    }

    /// The error message: the raised string itself, or the JSON form of a non-string.
    pub fn message(&self) -> String {
        message_of(&self.value)
    }
}

fn message_of(value: &JqValue) -> String {
    match value {
        JqValue::String(s) => s.clone(),
        other => format!("{} (not a string)", other.to_json()),
    }
}

/// The outputs of one query run: every emitted value, then the error that stopped the
/// run, if any.
#[derive(Debug)]
pub struct Outputs {
    values: std::vec::IntoIter<JqValue>,
    error: Option<EvalError>,
}

impl Outputs {
    pub(crate) fn failed(error: EvalError) -> Self {
        Outputs {
            values: Vec::new().into_iter(),
            error: Some(error),
        }
    }
}

impl Iterator for Outputs {
    type Item = Result<JqValue, EvalError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.values.next() {
            Some(value) => Some(Ok(value)),
            None => self.error.take().map(Err),
        }
    }
}

type Path = Vec<JqValue>;

/// Receives each output as it is produced. An error returned here stops the producer.
type Sink<'s> = dyn FnMut(&mut Evaluator, JqValue) -> Result<(), EvalError> + 's;

pub(crate) struct Evaluator {
    /// Bound variables; lookups scan from the end so inner bindings shadow outer ones.
    vars: Vec<(String, JqValue)>,
    /// Last label handed out for stopping a producer early.
    labels: usize,
}

impl Evaluator {
    pub(crate) fn new(vars: Vec<(String, JqValue)>) -> Self {
        Evaluator { vars, labels: 0 }
    }

    pub(crate) fn run(mut self, expr: &Expr, input: &JqValue) -> Outputs {
        let mut out = Vec::new();
        let error = self.gather(expr, input, &mut out).err();
        Outputs {
            values: out.into_iter(),
            error,
        }
    }

    fn lookup(&self, name: &str) -> Result<&JqValue, EvalError> {
        self.vars
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| EvalError::new(format!("variable not defined: ${}", name)))
    }

    fn bind<T>(
        &mut self,
        name: &str,
        value: JqValue,
        f: impl FnOnce(&mut Self) -> Result<T, EvalError>,
    ) -> Result<T, EvalError> {
        self.vars.push((name.to_string(), value));
        let result = f(self);
        self.vars.pop();
        result
    }

    /// Evaluate into `values`. Outputs produced before an error are kept.
    fn gather(&mut self, expr: &Expr, input: &JqValue, values: &mut Vec<JqValue>) -> Result<(), EvalError> {
        self.eval(expr, input, &mut |_: &mut Evaluator, v: JqValue| {
            values.push(v);
            Ok(())
        })
    }

    fn collect(&mut self, expr: &Expr, input: &JqValue) -> Result<Vec<JqValue>, EvalError> {
        let mut values = Vec::new();
        self.gather(expr, input, &mut values)?;
        Ok(values)
    }

    fn first(&mut self, expr: &Expr, input: &JqValue) -> Result<Option<JqValue>, EvalError> {
        let mut found = None;
        self.take(expr, input, 1, &mut |_: &mut Evaluator, v: JqValue| {
            found = Some(v);
            Ok(())
        })?;
        Ok(found)
    }

    fn next_label(&mut self) -> usize {
        self.labels += 1;
        self.labels
    }

    /// Pass at most `n` outputs of `expr` on to `out`, then stop evaluating `expr`.
    fn take(&mut self, expr: &Expr, input: &JqValue, n: usize, out: &mut Sink<'_>) -> Result<(), EvalError> {
        if n == 0 {
            return Ok(());
        }
        let label = self.next_label();
        let mut left = n;
        let result = self.eval(expr, input, &mut |ev: &mut Evaluator, v: JqValue| {
            out(ev, v)?;
            left -= 1;
            if left == 0 {
                Err(EvalError::stop(label))
            } else {
                Ok(())
            }
        });
        match result {
            Err(e) if e.stop == Some(label) => Ok(()),
            other => other,
        }
    }

    /// Evaluate `expr` into `out`, keeping apart the errors `expr` raises itself (the
    /// inner result) and those raised downstream by `out` (the outer one). Handlers such
    /// as `try` only see the former.
    fn guarded(
        &mut self,
        expr: &Expr,
        input: &JqValue,
        out: &mut Sink<'_>,
    ) -> Result<Result<(), EvalError>, EvalError> {
        let label = self.next_label();
        let mut downstream = None;
        let result = self.eval(expr, input, &mut |ev: &mut Evaluator, v: JqValue| {
            out(ev, v).map_err(|e| {
                downstream = Some(e);
                EvalError::stop(label)
            })
        });
        match downstream {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }

    fn eval(&mut self, expr: &Expr, input: &JqValue, out: &mut Sink<'_>) -> Result<(), EvalError> {
        match expr {
            Expr::Identity => out(self, input.clone())?,

            Expr::RecursiveDescent => {
                let mut all = Vec::new();
                descend(input, &mut all);
                for v in all {
                    out(self, v)?;
                }
            }

            Expr::Field(name) => out(self, index_field(input, name)?)?,

            Expr::Index { target, index } => {
                let indices = self.collect(index, input)?;
                self.eval(target, input, &mut |ev: &mut Evaluator, t: JqValue| {
                    for i in &indices {
                        out(ev, index_value(&t, i)?)?;
                    }
                    Ok(())
                })?;
            }

            Expr::Slice { target, start, end } => {
                let start = self.slice_bound(start.as_deref(), input)?;
                let end = self.slice_bound(end.as_deref(), input)?;
                self.eval(target, input, &mut |ev: &mut Evaluator, t: JqValue| {
                    out(ev, slice_value(&t, start, end)?)
                })?;
            }

            Expr::Iterate => {
                for v in values_of(input)? {
                    out(self, v)?;
                }
            }

            Expr::Optional(inner) => {
                // Outputs produced before the error survive; the error itself is dropped.
                let _ = self.guarded(inner, input, out)?;
            }

            Expr::Pipe(steps) => self.eval_pipe(steps, input, out)?,

            Expr::Comma(exprs) => {
                for e in exprs {
                    self.eval(e, input, out)?;
                }
            }

            Expr::Array(inner) => {
                let items = match inner {
                    Some(e) => self.collect(e, input)?,
                    None => Vec::new(),
                };
                out(self, JqValue::Array(items))?;
            }

            Expr::Object(entries) => self.eval_object(entries, input, out)?,

            Expr::Literal(lit) => out(self, JqValue::from(lit.clone()))?,

            Expr::Arithmetic { op, left, right } => {
                let rights = self.collect(right, input)?;
                let lefts = self.collect(left, input)?;
                for r in &rights {
                    for l in &lefts {
                        out(self, arith(*op, l.clone(), r.clone())?)?;
                    }
                }
            }

            Expr::Neg(inner) => {
                for v in self.collect(inner, input)? {
                    out(self, negate(v)?)?;
                }
            }

            Expr::Compare { op, left, right } => {
                let rights = self.collect(right, input)?;
                let lefts = self.collect(left, input)?;
                for r in &rights {
                    for l in &lefts {
                        out(self, JqValue::Bool(compare(*op, l, r)))?;
                    }
                }
            }

            Expr::And(left, right) => {
                for l in self.collect(left, input)? {
                    if !l.is_truthy() {
                        out(self, JqValue::Bool(false))?;
                        continue;
                    }
                    for r in self.collect(right, input)? {
                        out(self, JqValue::Bool(r.is_truthy()))?;
                    }
                }
            }

            Expr::Or(left, right) => {
                for l in self.collect(left, input)? {
                    if l.is_truthy() {
                        out(self, JqValue::Bool(true))?;
                        continue;
                    }
                    for r in self.collect(right, input)? {
                        out(self, JqValue::Bool(r.is_truthy()))?;
                    }
                }
            }

            Expr::Alternative(left, right) => {
                let mut values = Vec::new();
                let _ = self.gather(left, input, &mut values);
                let truthy: Vec<JqValue> = values.into_iter().filter(JqValue::is_truthy).collect();
                if truthy.is_empty() {
                    self.eval(right, input, out)?;
                } else {
                    for v in truthy {
                        out(self, v)?;
                    }
                }
            }

            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                for c in self.collect(cond, input)? {
                    let branch = if c.is_truthy() {
                        then_branch
                    } else {
                        else_branch
                    };
                    self.eval(branch, input, out)?;
                }
            }

            Expr::Try { expr, catch } => {
                if let Err(e) = self.guarded(expr, input, out)? {
                    if let Some(handler) = catch {
                        self.eval(handler, &e.value, out)?;
                    }
                }
            }

            Expr::Var(name) => {
                let value = self.lookup(name)?.clone();
                out(self, value)?;
            }

            Expr::As { source, var, body } => {
                self.eval(source, input, &mut |ev: &mut Evaluator, v: JqValue| {
                    ev.bind(var, v, |ev| ev.eval(body, input, out))
                })?;
            }

            Expr::Reduce {
                source,
                var,
                init,
                update,
            } => {
                let items = self.collect(source, input)?;
                for mut acc in self.collect(init, input)? {
                    for item in &items {
                        let next = self.bind(var, item.clone(), |ev| ev.collect(update, &acc))?;
                        acc = next.into_iter().last().unwrap_or(JqValue::Null);
                    }
                    out(self, acc)?;
                }
            }

            Expr::Assign { path, value } => {
                for v in self.collect(value, input)? {
                    let mut result = input.clone();
                    for (p, _) in self.paths(path, input)? {
                        set_path(&mut result, &p, v.clone())?;
                    }
                    out(self, result)?;
                }
            }

            Expr::Update { path, f } => {
                let mut result = input.clone();
                for (p, _) in self.paths(path, input)? {
                    let current = get_path(&result, &p)?;
                    if let Some(updated) = self.first(f, &current)? {
                        set_path(&mut result, &p, updated)?;
                    }
                }
                out(self, result)?;
            }

            Expr::Call { name, args } => {
                return Err(EvalError::new(format!(
                    "function not defined: {}/{}",
                    name,
                    args.len()
                )))
            }

            Expr::Builtin(builtin) => self.eval_builtin(builtin, input, out)?,
        }

        Ok(())
    }

    fn eval_pipe(&mut self, steps: &[Expr], input: &JqValue, out: &mut Sink<'_>) -> Result<(), EvalError> {
        let Some((first, rest)) = steps.split_first() else {
            return out(self, input.clone());
        };
        if rest.is_empty() {
            return self.eval(first, input, out);
        }
        self.eval(first, input, &mut |ev: &mut Evaluator, v: JqValue| {
            ev.eval_pipe(rest, &v, out)
        })
    }

    fn eval_object(
        &mut self,
        entries: &[ObjectEntry],
        input: &JqValue,
        out: &mut Sink<'_>,
    ) -> Result<(), EvalError> {
        // Each entry may produce several keys and values; the result is their product.
        let mut objects = vec![IndexMap::new()];

        for entry in entries {
            let keys = match &entry.key {
                ObjectKey::Literal(k) => vec![k.clone()],
                ObjectKey::Expr(e) => self
                    .collect(e, input)?
                    .into_iter()
                    .map(|k| match k {
                        JqValue::String(s) => Ok(s),
                        other => Err(EvalError::new(format!(
                            "object keys must be strings, got {}",
                            describe(&other)
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            };
            let values = self.collect(&entry.value, input)?;

            let mut next = Vec::with_capacity(objects.len() * keys.len() * values.len());
            for obj in &objects {
                for k in &keys {
                    for v in &values {
                        let mut o = obj.clone();
                        o.insert(k.clone(), v.clone());
                        next.push(o);
                    }
                }
            }
            objects = next;
        }

        for obj in objects {
            out(self, JqValue::Object(obj))?;
        }
        Ok(())
    }

    fn slice_bound(&mut self, expr: Option<&Expr>, input: &JqValue) -> Result<Option<f64>, EvalError> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        match self.first(expr, input)? {
            None | Some(JqValue::Null) => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| {
                EvalError::new("start and end indices of an array slice must be numbers")
            }),
        }
    }

    /// Evaluate `expr` as a path expression, returning each path with the value found there.
    fn paths(&mut self, expr: &Expr, input: &JqValue) -> Result<Vec<(Path, JqValue)>, EvalError> {
        Ok(match expr {
            Expr::Identity => vec![(Vec::new(), input.clone())],

            Expr::Field(name) => vec![(
                vec![JqValue::string(name.clone())],
                index_field(input, name)?,
            )],

            Expr::Index { target, index } => {
                let indices = self.collect(index, input)?;
                let mut result = Vec::new();
                for (p, v) in self.paths(target, input)? {
                    for i in &indices {
                        let mut full = p.clone();
                        full.push(i.clone());
                        result.push((full, index_value(&v, i)?));
                    }
                }
                result
            }

            Expr::Iterate => match input {
                JqValue::Array(items) => items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (vec![JqValue::Int(i as i64)], v.clone()))
                    .collect(),
                JqValue::Object(map) => map
                    .iter()
                    .map(|(k, v)| (vec![JqValue::string(k.clone())], v.clone()))
                    .collect(),
                JqValue::Null => Vec::new(),
                other => return Err(cannot_iterate(other)),
            },

            Expr::RecursiveDescent => {
                let mut result = Vec::new();
                descend_paths(Vec::new(), input, &mut result);
                result
            }

            Expr::Optional(inner) => self.paths(inner, input).unwrap_or_default(),

            Expr::Pipe(steps) => {
                let mut current = vec![(Vec::new(), input.clone())];
                for step in steps {
                    let mut next = Vec::new();
                    for (p, v) in current {
                        for (q, w) in self.paths(step, &v)? {
                            let mut full = p.clone();
                            full.extend(q);
                            next.push((full, w));
                        }
                    }
                    current = next;
                }
                current
            }

            Expr::Comma(exprs) => {
                let mut result = Vec::new();
                for e in exprs {
                    result.extend(self.paths(e, input)?);
                }
                result
            }

            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let mut result = Vec::new();
                for c in self.collect(cond, input)? {
                    let branch = if c.is_truthy() {
                        then_branch
                    } else {
                        else_branch
                    };
                    result.extend(self.paths(branch, input)?);
                }
                result
            }

            Expr::Alternative(left, right) => {
                let truthy: Vec<_> = self
                    .paths(left, input)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|(_, v)| v.is_truthy())
                    .collect();
                if truthy.is_empty() {
                    self.paths(right, input)?
                } else {
                    truthy
                }
            }

            Expr::Builtin(Builtin::Select(cond)) => self
                .collect(cond, input)?
                .into_iter()
                .filter(JqValue::is_truthy)
                .map(|_| (Vec::new(), input.clone()))
                .collect(),

            Expr::Builtin(Builtin::Filter(kind)) if type_matches(*kind, input) => {
                vec![(Vec::new(), input.clone())]
            }
            Expr::Builtin(Builtin::Filter(_)) | Expr::Builtin(Builtin::Empty) => Vec::new(),

            Expr::Builtin(Builtin::First(None)) => {
                let first = JqValue::Int(0);
                vec![(vec![first.clone()], index_value(input, &first)?)]
            }

            _ => return Err(EvalError::new("invalid path expression")),
        })
    }

    fn range(&mut self, from: &JqValue, upto: &JqValue, out: &mut Sink<'_>) -> Result<(), EvalError> {
        match (from, upto) {
            (JqValue::Int(a), JqValue::Int(b)) => {
                for n in *a..*b {
                    out(self, JqValue::Int(n))?;
                }
            }
            (a, b) => {
                let (Some(mut x), Some(end)) = (a.as_f64(), b.as_f64()) else {
                    return Err(EvalError::new("range bounds must be numbers"));
                };
                while x < end {
                    out(self, JqValue::number(x))?;
                    let next = x + 1.0;
                    if next == x {
                        // Past 2^53 adding one no longer moves the counter.
                        return Err(EvalError::new("range bounds are too large"));
                    }
                    x = next;
                }
            }
        }
        Ok(())
    }

    fn keyed(&mut self, f: &Expr, items: &[JqValue]) -> Result<Vec<(JqValue, JqValue)>, EvalError> {
        items
            .iter()
            .map(|item| Ok((JqValue::Array(self.collect(f, item)?), item.clone())))
            .collect()
    }

    fn eval_builtin(
        &mut self,
        builtin: &Builtin,
        input: &JqValue,
        out: &mut Sink<'_>,
    ) -> Result<(), EvalError> {
        match builtin {
            Builtin::Type => out(self, JqValue::string(input.type_name()))?,

            Builtin::Filter(kind) => {
                if type_matches(*kind, input) {
                    out(self, input.clone())?;
                }
            }

            Builtin::Length => out(
                self,
                input
                    .length()
                    .ok_or_else(|| EvalError::new(format!("{} has no length", describe(input))))?,
            )?,

            Builtin::Utf8ByteLength => match input {
                JqValue::String(s) => out(self, JqValue::Int(s.len() as i64))?,
                other => {
                    return Err(EvalError::new(format!(
                        "{} only strings have UTF-8 byte length",
                        describe(other)
                    )))
                }
            },

            Builtin::Keys => out(self, keys(input, true)?)?,
            Builtin::KeysUnsorted => out(self, keys(input, false)?)?,

            Builtin::Has(key) => {
                for k in self.collect(key, input)? {
                    out(self, JqValue::Bool(has(input, &k)?))?;
                }
            }

            Builtin::In(container) => {
                for c in self.collect(container, input)? {
                    out(self, JqValue::Bool(has(&c, input)?))?;
                }
            }

            Builtin::Select(cond) => {
                for c in self.collect(cond, input)? {
                    if c.is_truthy() {
                        out(self, input.clone())?;
                    }
                }
            }

            Builtin::Empty => {}

            Builtin::Not => out(self, JqValue::Bool(!input.is_truthy()))?,

            Builtin::Error(None) => return Err(EvalError::from_value(input.clone())),
            Builtin::Error(Some(msg)) => {
                if let Some(m) = self.first(msg, input)? {
                    return Err(EvalError::from_value(m));
                }
            }

            Builtin::Map(f) => {
                let mut mapped = Vec::new();
                for item in values_of(input)? {
                    self.gather(f, &item, &mut mapped)?;
                }
                out(self, JqValue::Array(mapped))?;
            }

            Builtin::MapValues(f) => {
                let mapped = match input {
                    JqValue::Array(items) => {
                        let mut mapped = Vec::with_capacity(items.len());
                        for item in items {
                            if let Some(v) = self.first(f, item)? {
                                mapped.push(v);
                            }
                        }
                        JqValue::Array(mapped)
                    }
                    JqValue::Object(map) => {
                        let mut mapped = IndexMap::with_capacity(map.len());
                        for (k, v) in map {
                            if let Some(v) = self.first(f, v)? {
                                mapped.insert(k.clone(), v);
                            }
                        }
                        JqValue::Object(mapped)
                    }
                    other => return Err(cannot_iterate(other)),
                };
                out(self, mapped)?;
            }

            Builtin::Range { from, upto } => {
                let froms = match from {
                    Some(e) => self.collect(e, input)?,
                    None => vec![JqValue::Int(0)],
                };
                let uptos = self.collect(upto, input)?;
                for f in &froms {
                    for u in &uptos {
                        self.range(f, u, out)?;
                    }
                }
            }

            Builtin::Limit { n, f } => {
                for n in self.collect(n, input)? {
                    let n = n
                        .as_f64()
                        .ok_or_else(|| EvalError::new("limit count must be a number"))?;
                    if n <= 0.0 {
                        continue;
                    }
                    self.take(f, input, n.ceil() as usize, out)?;
                }
            }

            Builtin::First(None) => out(self, index_value(input, &JqValue::Int(0))?)?,
            Builtin::Last(None) => out(self, index_value(input, &JqValue::Int(-1))?)?,
            Builtin::First(Some(f)) => self.take(f, input, 1, out)?,
            Builtin::Last(Some(f)) => {
                if let Some(v) = self.collect(f, input)?.pop() {
                    out(self, v)?;
                }
            }

            Builtin::Add => {
                let mut acc = JqValue::Null;
                if !input.is_null() {
                    for v in values_of(input)? {
                        acc = arith(ArithOp::Add, acc, v)?;
                    }
                }
                out(self, acc)?;
            }

            Builtin::Any => out(self, JqValue::Bool(values_of(input)?.iter().any(JqValue::is_truthy)))?,
            Builtin::All => out(self, JqValue::Bool(values_of(input)?.iter().all(JqValue::is_truthy)))?,

            Builtin::Min => {
                let items = array_of(input, "min")?;
                out(self, items.iter().min_by(|a, b| a.jq_cmp(b)).cloned().unwrap_or(JqValue::Null))?;
            }
            Builtin::Max => {
                let items = array_of(input, "max")?;
                out(self, items.iter().max_by(|a, b| a.jq_cmp(b)).cloned().unwrap_or(JqValue::Null))?;
            }
            Builtin::MinBy(f) => {
                let keyed = self.keyed(f, array_of(input, "min_by")?)?;
                out(
                    self,
                    keyed
                        .into_iter()
                        .min_by(|(a, _), (b, _)| a.jq_cmp(b))
                        .map_or(JqValue::Null, |(_, v)| v),
                )?;
            }
            Builtin::MaxBy(f) => {
                let keyed = self.keyed(f, array_of(input, "max_by")?)?;
                out(
                    self,
                    keyed
                        .into_iter()
                        .max_by(|(a, _), (b, _)| a.jq_cmp(b))
                        .map_or(JqValue::Null, |(_, v)| v),
                )?;
            }

            Builtin::Sort => {
                let mut items = array_of(input, "sorted")?.to_vec();
                items.sort_by(|a, b| a.jq_cmp(b));
                out(self, JqValue::Array(items))?;
            }
            Builtin::SortBy(f) => {
                let mut keyed = self.keyed(f, array_of(input, "sorted")?)?;
                keyed.sort_by(|(a, _), (b, _)| a.jq_cmp(b));
                out(self, JqValue::Array(keyed.into_iter().map(|(_, v)| v).collect()))?;
            }
            Builtin::Unique => {
                let mut items = array_of(input, "sorted")?.to_vec();
                items.sort_by(|a, b| a.jq_cmp(b));
                items.dedup_by(|a, b| a.jq_eq(b));
                out(self, JqValue::Array(items))?;
            }

            Builtin::Reverse => out(self, match input {
                JqValue::Array(items) => JqValue::Array(items.iter().rev().cloned().collect()),
                JqValue::String(s) => JqValue::String(s.chars().rev().collect()),
                JqValue::Null => JqValue::Array(Vec::new()),
                other => return Err(EvalError::new(format!("cannot reverse {}", describe(other)))),
            })?,

            Builtin::Contains(needle) => {
                for b in self.collect(needle, input)? {
                    out(self, JqValue::Bool(contains(input, &b)?))?;
                }
            }

            Builtin::ToEntries => out(self, JqValue::Array(entries_of(input)?))?,
            Builtin::FromEntries => out(self, from_entries(array_of(input, "from_entries")?)?)?,
            Builtin::WithEntries(f) => {
                let mut mapped = Vec::new();
                for entry in entries_of(input)? {
                    self.gather(f, &entry, &mut mapped)?;
                }
                out(self, from_entries(&mapped)?)?;
            }

            Builtin::ToString => out(self, match input {
                JqValue::String(_) => input.clone(),
                other => JqValue::String(other.to_json()),
            })?,
            Builtin::ToNumber => out(self, to_number(input)?)?,
            Builtin::ToJson => out(self, JqValue::String(input.to_json()))?,
            Builtin::FromJson => match input {
                JqValue::String(s) => out(
                    self,
                    serde_json::from_str(s)
                        .map_err(|e| EvalError::new(format!("{} (while parsing '{}')", e, s)))?,
                )?,
                other => {
                    return Err(EvalError::new(format!(
                        "{} only strings can be parsed",
                        describe(other)
                    )))
                }
            },

            Builtin::AsciiDowncase => {
                out(self, JqValue::String(string_of(input, "ascii_downcase")?.to_ascii_lowercase()))?
            }
            Builtin::AsciiUpcase => {
                out(self, JqValue::String(string_of(input, "ascii_upcase")?.to_ascii_uppercase()))?
            }

            Builtin::StartsWith(prefix) => {
                for p in self.collect(prefix, input)? {
                    match (input, &p) {
                        (JqValue::String(a), JqValue::String(b)) => {
                            out(self, JqValue::Bool(a.starts_with(b.as_str())))?
                        }
                        _ => return Err(EvalError::new("startswith() requires string inputs")),
                    }
                }
            }
            Builtin::EndsWith(suffix) => {
                for s in self.collect(suffix, input)? {
                    match (input, &s) {
                        (JqValue::String(a), JqValue::String(b)) => {
                            out(self, JqValue::Bool(a.ends_with(b.as_str())))?
                        }
                        _ => return Err(EvalError::new("endswith() requires string inputs")),
                    }
                }
            }
            Builtin::LtrimStr(prefix) => {
                for p in self.collect(prefix, input)? {
                    out(self, match (input, &p) {
                        (JqValue::String(a), JqValue::String(b)) => {
                            JqValue::string(a.strip_prefix(b.as_str()).unwrap_or(a))
                        }
                        _ => input.clone(),
                    })?;
                }
            }
            Builtin::RtrimStr(suffix) => {
                for s in self.collect(suffix, input)? {
                    out(self, match (input, &s) {
                        (JqValue::String(a), JqValue::String(b)) => {
                            JqValue::string(a.strip_suffix(b.as_str()).unwrap_or(a))
                        }
                        _ => input.clone(),
                    })?;
                }
            }

            Builtin::Split(sep) => {
                for s in self.collect(sep, input)? {
                    match (input, &s) {
                        (JqValue::String(a), JqValue::String(b)) => out(self, split(a, b))?,
                        _ => {
                            return Err(EvalError::new(
                                "split input and separator must be strings",
                            ))
                        }
                    }
                }
            }
            Builtin::Join(sep) => {
                for s in self.collect(sep, input)? {
                    out(self, join(input, &s)?)?;
                }
            }

            Builtin::Floor => out(self, match input {
                JqValue::Int(_) => input.clone(),
                JqValue::Float(f) => JqValue::number(f.floor()),
                other => return Err(EvalError::new(format!("{} number required", describe(other)))),
            })?,
        }

        Ok(())
    }
}

/// Short description of a value for error messages: `number (1)`, `string ("a")`.
fn describe(value: &JqValue) -> String {
    const MAX: usize = 11;
    let json = value.to_json();
    if json.chars().count() > MAX {
        let truncated: String = json.chars().take(MAX - 1).collect();
        format!("{} ({}...)", value.type_name(), truncated)
    } else {
        format!("{} ({})", value.type_name(), json)
    }
}

fn describe_index(index: &JqValue) -> String {
    match index {
        JqValue::String(s) => format!("\"{}\"", s),
        other => other.type_name().to_string(),
    }
}

fn cannot_iterate(value: &JqValue) -> EvalError {
    EvalError::new(format!("cannot iterate over {}", describe(value)))
}

fn type_matches(kind: TypeFilter, value: &JqValue) -> bool {
    match kind {
        TypeFilter::Arrays => matches!(value, JqValue::Array(_)),
        TypeFilter::Objects => matches!(value, JqValue::Object(_)),
        TypeFilter::Iterables => matches!(value, JqValue::Array(_) | JqValue::Object(_)),
        TypeFilter::Booleans => matches!(value, JqValue::Bool(_)),
        TypeFilter::Numbers => matches!(value, JqValue::Int(_) | JqValue::Float(_)),
        TypeFilter::Strings => matches!(value, JqValue::String(_)),
        TypeFilter::Nulls => value.is_null(),
        TypeFilter::Values => !value.is_null(),
        TypeFilter::Scalars => !matches!(value, JqValue::Array(_) | JqValue::Object(_)),
    }
}

fn descend(value: &JqValue, out: &mut Vec<JqValue>) {
    out.push(value.clone());
    match value {
        JqValue::Array(items) => items.iter().for_each(|v| descend(v, out)),
        JqValue::Object(map) => map.values().for_each(|v| descend(v, out)),
        _ => {}
    }
}

fn descend_paths(path: Path, value: &JqValue, out: &mut Vec<(Path, JqValue)>) {
    out.push((path.clone(), value.clone()));
    match value {
        JqValue::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                let mut p = path.clone();
                p.push(JqValue::Int(i as i64));
                descend_paths(p, v, out);
            }
        }
        JqValue::Object(map) => {
            for (k, v) in map {
                let mut p = path.clone();
                p.push(JqValue::string(k.clone()));
                descend_paths(p, v, out);
            }
        }
        _ => {}
    }
}

fn values_of(value: &JqValue) -> Result<Vec<JqValue>, EvalError> {
    match value {
        JqValue::Array(items) => Ok(items.clone()),
        JqValue::Object(map) => Ok(map.values().cloned().collect()),
        other => Err(cannot_iterate(other)),
    }
}

fn array_of<'v>(value: &'v JqValue, what: &str) -> Result<&'v [JqValue], EvalError> {
    match value {
        JqValue::Array(items) => Ok(items),
        other => Err(EvalError::new(format!(
            "{} cannot be {}, as it is not an array",
            describe(other),
            what
        ))),
    }
}

fn string_of<'v>(value: &'v JqValue, what: &str) -> Result<&'v str, EvalError> {
    value.as_str().ok_or_else(|| {
        EvalError::new(format!("{} cannot be {}: not a string", describe(value), what))
    })
}

fn index_field(input: &JqValue, name: &str) -> Result<JqValue, EvalError> {
    match input {
        JqValue::Object(map) => Ok(map.get(name).cloned().unwrap_or(JqValue::Null)),
        JqValue::Null => Ok(JqValue::Null),
        other => Err(EvalError::new(format!(
            "cannot index {} with \"{}\"",
            other.type_name(),
            name
        ))),
    }
}

fn array_get(items: &[JqValue], index: i64) -> JqValue {
    let len = items.len() as i64;
    let pos = if index < 0 { len + index } else { index };
    if (0..len).contains(&pos) {
        items[pos as usize].clone()
    } else {
        JqValue::Null
    }
}

fn index_value(target: &JqValue, index: &JqValue) -> Result<JqValue, EvalError> {
    match (target, index) {
        (JqValue::Object(map), JqValue::String(k)) => {
            Ok(map.get(k).cloned().unwrap_or(JqValue::Null))
        }
        (JqValue::Array(items), JqValue::Int(n)) => Ok(array_get(items, *n)),
        (JqValue::Array(items), JqValue::Float(f)) => Ok(array_get(items, f.floor() as i64)),
        (JqValue::Null, JqValue::String(_) | JqValue::Int(_) | JqValue::Float(_)) => Ok(JqValue::Null),
        (t, i) => Err(EvalError::new(format!(
            "cannot index {} with {}",
            t.type_name(),
            describe_index(i)
        ))),
    }
}

fn slice_value(target: &JqValue, start: Option<f64>, end: Option<f64>) -> Result<JqValue, EvalError> {
    let bounds = |len: usize| {
        let len = len as i64;
        let clamp = |n: i64| {
            let n = if n < 0 { n + len } else { n };
            n.clamp(0, len) as usize
        };
        let s = start.map_or(0, |f| clamp(f.floor() as i64));
        let e = end.map_or(len as usize, |f| clamp(f.ceil() as i64));
        (s, e.max(s))
    };

    match target {
        JqValue::Null => Ok(JqValue::Null),
        JqValue::Array(items) => {
            let (s, e) = bounds(items.len());
            Ok(JqValue::Array(items[s..e].to_vec()))
        }
        JqValue::String(text) => {
            let chars: Vec<char> = text.chars().collect();
            let (s, e) = bounds(chars.len());
            Ok(JqValue::String(chars[s..e].iter().collect()))
        }
        other => Err(EvalError::new(format!(
            "cannot index {} with object",
            other.type_name()
        ))),
    }
}

fn keys(input: &JqValue, sorted: bool) -> Result<JqValue, EvalError> {
    match input {
        JqValue::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            if sorted {
                keys.sort();
            }
            Ok(JqValue::Array(keys.into_iter().map(|k| JqValue::string(k.clone())).collect()))
        }
        JqValue::Array(items) => Ok(JqValue::Array(
            (0..items.len() as i64).map(JqValue::Int).collect(),
        )),
        other => Err(EvalError::new(format!("{} has no keys", describe(other)))),
    }
}

fn has(container: &JqValue, key: &JqValue) -> Result<bool, EvalError> {
    match (container, key) {
        (JqValue::Object(map), JqValue::String(k)) => Ok(map.contains_key(k)),
        (JqValue::Array(items), k) if k.as_f64().is_some() => {
            let n = k.as_f64().map_or(-1.0, f64::floor);
            Ok(n >= 0.0 && n < items.len() as f64)
        }
        (c, k) => Err(EvalError::new(format!(
            "cannot check whether {} has a {} key",
            c.type_name(),
            k.type_name()
        ))),
    }
}

fn contains(a: &JqValue, b: &JqValue) -> Result<bool, EvalError> {
    match (a, b) {
        (JqValue::Object(x), JqValue::Object(y)) => {
            for (k, bv) in y {
                match x.get(k) {
                    Some(av) if contains(av, bv)? => {}
                    _ => return Ok(false),
                }
            }
            Ok(true)
        }
        (JqValue::Array(x), JqValue::Array(y)) => {
            for bv in y {
                let mut found = false;
                for av in x {
                    if contains(av, bv)? {
                        found = true;
                        break;
                    }
                }
                if !found {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (JqValue::String(x), JqValue::String(y)) => Ok(x.contains(y.as_str())),
        _ if a.type_name() == b.type_name() => Ok(a.jq_eq(b)),
        _ => Err(EvalError::new(format!(
            "{} and {} cannot have their containment checked",
            describe(a),
            describe(b)
        ))),
    }
}

fn entries_of(input: &JqValue) -> Result<Vec<JqValue>, EvalError> {
    match input {
        JqValue::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| {
                JqValue::object_from([
                    ("key".to_string(), JqValue::string(k.clone())),
                    ("value".to_string(), v.clone()),
                ])
            })
            .collect()),
        other => Err(EvalError::new(format!("{} has no keys", describe(other)))),
    }
}

fn from_entries(items: &[JqValue]) -> Result<JqValue, EvalError> {
    let mut map = IndexMap::with_capacity(items.len());
    for item in items {
        let JqValue::Object(entry) = item else {
            return Err(EvalError::new(format!(
                "cannot index {} with \"key\"",
                item.type_name()
            )));
        };
        let pick = |names: &[&str]| {
            names
                .iter()
                .filter_map(|n| entry.get(*n))
                .find(|v| !v.is_null())
                .cloned()
        };

        let key = match pick(&["key", "k", "name", "Name", "K"]) {
            Some(JqValue::String(s)) => s,
            Some(v @ (JqValue::Int(_) | JqValue::Float(_) | JqValue::Bool(_))) => v.to_json(),
            Some(other) => {
                return Err(EvalError::new(format!(
                    "cannot use {} as object key",
                    describe(&other)
                )))
            }
            None => return Err(EvalError::new("cannot use null (null) as object key")),
        };
        let value = pick(&["value", "v", "Value"]).unwrap_or(JqValue::Null);
        map.insert(key, value);
    }
    Ok(JqValue::Object(map))
}

fn to_number(input: &JqValue) -> Result<JqValue, EvalError> {
    match input {
        JqValue::Int(_) | JqValue::Float(_) => Ok(input.clone()),
        JqValue::String(s) => {
            let text = s.trim();
            if let Ok(n) = text.parse::<i64>() {
                return Ok(JqValue::Int(n));
            }
            match text.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(JqValue::number(f)),
                _ => Err(EvalError::new(format!("cannot parse '{}' as number", s))),
            }
        }
        other => Err(EvalError::new(format!(
            "{} cannot be parsed as a number",
            describe(other)
        ))),
    }
}

fn split(text: &str, sep: &str) -> JqValue {
    if text.is_empty() {
        return JqValue::Array(Vec::new());
    }
    let parts = if sep.is_empty() {
        text.chars().map(|c| JqValue::String(c.to_string())).collect()
    } else {
        text.split(sep).map(JqValue::string).collect()
    };
    JqValue::Array(parts)
}

fn join(input: &JqValue, sep: &JqValue) -> Result<JqValue, EvalError> {
    let sep = sep
        .as_str()
        .ok_or_else(|| EvalError::new("join separator must be a string"))?;
    let items = array_of(input, "joined")?;

    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        parts.push(match item {
            JqValue::Null => String::new(),
            JqValue::String(s) => s.clone(),
            JqValue::Int(_) | JqValue::Float(_) | JqValue::Bool(_) => item.to_json(),
            other => {
                return Err(EvalError::new(format!(
                    "cannot join with {}",
                    describe(other)
                )))
            }
        });
    }
    Ok(JqValue::String(parts.join(sep)))
}

fn negate(value: JqValue) -> Result<JqValue, EvalError> {
    match value {
        JqValue::Int(n) => Ok(n.checked_neg().map_or(JqValue::Float(-(n as f64)), JqValue::Int)),
        JqValue::Float(f) => Ok(JqValue::Float(-f)),
        other => Err(EvalError::new(format!("{} cannot be negated", describe(&other)))),
    }
}

fn compare(op: CompareOp, left: &JqValue, right: &JqValue) -> bool {
    let ord = left.jq_cmp(right);
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Ge => ord != Ordering::Less,
    }
}

fn arith(op: ArithOp, left: JqValue, right: JqValue) -> Result<JqValue, EvalError> {
    match op {
        ArithOp::Add => arith_add(left, right),
        ArithOp::Sub => arith_sub(left, right),
        ArithOp::Mul => arith_mul(left, right),
        ArithOp::Div => arith_div(left, right),
        ArithOp::Mod => arith_mod(left, right),
    }
}

fn arith_error(left: &JqValue, right: &JqValue, verb: &str) -> EvalError {
    EvalError::new(format!(
        "{} and {} cannot be {}",
        describe(left),
        describe(right),
        verb
    ))
}

/// Add two values (numbers, strings, arrays, objects). `null` is the identity.
fn arith_add(left: JqValue, right: JqValue) -> Result<JqValue, EvalError> {
    match (left, right) {
        (JqValue::Int(a), JqValue::Int(b)) => {
            Ok(a.checked_add(b).map_or(JqValue::Float(a as f64 + b as f64), JqValue::Int))
        }
        (JqValue::Int(a), JqValue::Float(b)) => Ok(JqValue::number(a as f64 + b)),
        (JqValue::Float(a), JqValue::Int(b)) => Ok(JqValue::number(a + b as f64)),
        (JqValue::Float(a), JqValue::Float(b)) => Ok(JqValue::number(a + b)),
        (JqValue::String(mut a), JqValue::String(b)) => {
            a.push_str(&b);
            Ok(JqValue::String(a))
        }
        (JqValue::Array(mut a), JqValue::Array(b)) => {
            a.extend(b);
            Ok(JqValue::Array(a))
        }
        // Object merge (right overwrites left)
        (JqValue::Object(mut a), JqValue::Object(b)) => {
            a.extend(b);
            Ok(JqValue::Object(a))
        }
        (JqValue::Null, other) | (other, JqValue::Null) => Ok(other),
        (a, b) => Err(arith_error(&a, &b, "added")),
    }
}

fn arith_sub(left: JqValue, right: JqValue) -> Result<JqValue, EvalError> {
    match (left, right) {
        (JqValue::Int(a), JqValue::Int(b)) => {
            Ok(a.checked_sub(b).map_or(JqValue::Float(a as f64 - b as f64), JqValue::Int))
        }
        (JqValue::Int(a), JqValue::Float(b)) => Ok(JqValue::number(a as f64 - b)),
        (JqValue::Float(a), JqValue::Int(b)) => Ok(JqValue::number(a - b as f64)),
        (JqValue::Float(a), JqValue::Float(b)) => Ok(JqValue::number(a - b)),
        // Array subtraction removes every element equal to one on the right
        (JqValue::Array(a), JqValue::Array(b)) => Ok(JqValue::Array(
            a.into_iter()
                .filter(|x| !b.iter().any(|y| x.jq_eq(y)))
                .collect(),
        )),
        (a, b) => Err(arith_error(&a, &b, "subtracted")),
    }
}

fn arith_mul(left: JqValue, right: JqValue) -> Result<JqValue, EvalError> {
    match (left, right) {
        (JqValue::Int(a), JqValue::Int(b)) => {
            Ok(a.checked_mul(b).map_or(JqValue::Float(a as f64 * b as f64), JqValue::Int))
        }
        (JqValue::Int(a), JqValue::Float(b)) => Ok(JqValue::number(a as f64 * b)),
        (JqValue::Float(a), JqValue::Int(b)) => Ok(JqValue::number(a * b as f64)),
        (JqValue::Float(a), JqValue::Float(b)) => Ok(JqValue::number(a * b)),
        // String repetition: "ab" * 3 = "ababab"
        (JqValue::String(s), n @ (JqValue::Int(_) | JqValue::Float(_)))
        | (n @ (JqValue::Int(_) | JqValue::Float(_)), JqValue::String(s)) => {
            let times = n.as_f64().unwrap_or(0.0);
            if times <= 0.0 {
                return Ok(JqValue::Null);
            }
            let times = times.ceil() as usize;
            match s.len().checked_mul(times) {
                Some(len) if len <= MAX_REPEAT_BYTES => Ok(JqValue::String(s.repeat(times))),
                _ => Err(EvalError::new("repeat string result too long")),
            }
        }
        (JqValue::Object(a), JqValue::Object(b)) => Ok(JqValue::Object(merge_objects(a, b))),
        (a, b) => Err(arith_error(&a, &b, "multiplied")),
    }
}

/// Recursively merge two objects.
fn merge_objects(
    mut left: IndexMap<String, JqValue>,
    right: IndexMap<String, JqValue>,
) -> IndexMap<String, JqValue> {
    for (k, v) in right {
        let merged = match (left.get_mut(&k), v) {
            (Some(JqValue::Object(a)), JqValue::Object(b)) => {
                JqValue::Object(merge_objects(std::mem::take(a), b))
            }
            (_, v) => v,
        };
        left.insert(k, merged);
    }
    left
}

fn arith_div(left: JqValue, right: JqValue) -> Result<JqValue, EvalError> {
    match (left, right) {
        (a, b) if b.as_f64() == Some(0.0) && a.as_f64().is_some() => Err(EvalError::new(format!(
            "{} and {} cannot be divided because the divisor is zero",
            describe(&a),
            describe(&b)
        ))),
        (JqValue::Int(a), JqValue::Int(b)) if a.checked_rem(b) == Some(0) => {
            Ok(a.checked_div(b).map_or(JqValue::Float(a as f64 / b as f64), JqValue::Int))
        }
        (a @ (JqValue::Int(_) | JqValue::Float(_)), b @ (JqValue::Int(_) | JqValue::Float(_))) => {
            let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(1.0));
            Ok(JqValue::number(x / y))
        }
        // String split: "a,b,c" / "," = ["a", "b", "c"]
        (JqValue::String(s), JqValue::String(sep)) => Ok(split(&s, &sep)),
        (a, b) => Err(arith_error(&a, &b, "divided")),
    }
}

fn arith_mod(left: JqValue, right: JqValue) -> Result<JqValue, EvalError> {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => {
            let (a, b) = (a as i64, b as i64);
            if b == 0 {
                return Err(EvalError::new(format!(
                    "{} and {} cannot be divided because the divisor is zero",
                    describe(&left),
                    describe(&right)
                )));
            }
            Ok(JqValue::Int(a.checked_rem(b).unwrap_or(0)))
        }
        _ => Err(arith_error(&left, &right, "divided")),
    }
}

fn get_path(root: &JqValue, path: &[JqValue]) -> Result<JqValue, EvalError> {
    let mut current = root.clone();
    for step in path {
        current = index_value(&current, step)?;
    }
    Ok(current)
}

fn set_path(root: &mut JqValue, path: &[JqValue], value: JqValue) -> Result<(), EvalError> {
    let Some((head, rest)) = path.split_first() else {
        *root = value;
        return Ok(());
    };

    if root.is_null() {
        *root = match head {
            JqValue::String(_) => JqValue::Object(IndexMap::new()),
            _ => JqValue::Array(Vec::new()),
        };
    }

    match (root, head) {
        (JqValue::Object(map), JqValue::String(key)) => {
            let slot = map.entry(key.clone()).or_insert(JqValue::Null);
            set_path(slot, rest, value)
        }
        (JqValue::Array(items), JqValue::Int(_) | JqValue::Float(_)) => {
            let n = head.as_f64().map_or(0, |f| f.floor() as i64);
            let pos = if n < 0 { n + items.len() as i64 } else { n };
            if pos < 0 {
                return Err(EvalError::new("out of bounds negative array index"));
            }
            let pos = pos as usize;
            if pos > MAX_ARRAY_INDEX {
                return Err(EvalError::new("array index too large"));
            }
            if pos >= items.len() {
                items.resize(pos + 1, JqValue::Null);
            }
            set_path(&mut items[pos], rest, value)
        }
        (root, head) => Err(EvalError::new(format!(
            "cannot index {} with {}",
            root.type_name(),
            describe_index(head)
        ))),
    }
}
