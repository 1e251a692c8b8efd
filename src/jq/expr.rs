//! Expression AST for jq-like queries.
//!
//! The parser produces [`Expr::Call`] for every named function; compilation rewrites
//! those into [`Expr::Builtin`] once the name and arity are known.

/// A jq expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Identity: `.`
    Identity,

    /// Recursive descent: `..`
    RecursiveDescent,

    /// Field access: `.foo`
    Field(String),

    /// Dynamic index: `.[expr]`, `.foo[expr]`
    ///
    /// Both `target` and `index` are evaluated against the same input, so
    /// `.items[.pos]` reads `.pos` from the outer input.
    Index { target: Box<Expr>, index: Box<Expr> },

    /// Array slice: `.[2:5]`, `.[2:]`, `.[:5]`
    Slice {
        target: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
    },

    /// Iterate all elements: `.[]`
    Iterate,

    /// Optional access: `.foo?` - suppresses errors from the inner expression
    Optional(Box<Expr>),

    /// Chained expressions: `.foo | .bar`
    /// Each element is applied in sequence to the result of the previous.
    Pipe(Vec<Expr>),

    /// Comma operator: `.foo, .bar` - outputs from both expressions
    Comma(Vec<Expr>),

    /// Array construction: `[.foo, .bar]` or `[.items[]]`
    /// Collects all outputs from the inner expression into an array.
    Array(Option<Box<Expr>>),

    /// Object construction: `{foo: .bar, (.k): .v}`
    Object(Vec<ObjectEntry>),

    /// Literal value
    Literal(Literal),

    /// Arithmetic operation: `.a + .b`, `.a - .b`, `.a * .b`, `.a / .b`, `.a % .b`
    Arithmetic {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Unary minus: `-.x`
    Neg(Box<Expr>),

    /// Comparison operation: `.a == .b`, `.a != .b`, `.a < .b`, etc.
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Boolean AND: `.a and .b`
    And(Box<Expr>, Box<Expr>),

    /// Boolean OR: `.a or .b`
    Or(Box<Expr>, Box<Expr>),

    /// Alternative operator: `.foo // "default"`
    /// Returns the truthy outputs of left, otherwise the outputs of right.
    Alternative(Box<Expr>, Box<Expr>),

    /// If-then-else conditional: `if .foo then .bar else .baz end`
    /// elif is desugared to nested If during parsing.
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    /// Try-catch error handling: `try .foo catch "default"`
    /// If catch is None, errors are silently suppressed (outputs nothing).
    Try {
        expr: Box<Expr>,
        catch: Option<Box<Expr>>,
    },

    /// Variable reference: `$name` (stored without the sigil)
    Var(String),

    /// Variable binding: `EXPR as $name | BODY`
    As {
        source: Box<Expr>,
        var: String,
        body: Box<Expr>,
    },

    /// Reduction: `reduce SOURCE as $name (INIT; UPDATE)`
    Reduce {
        source: Box<Expr>,
        var: String,
        init: Box<Expr>,
        update: Box<Expr>,
    },

    /// Plain assignment: `PATH = VALUE` (VALUE is evaluated against the original input)
    Assign { path: Box<Expr>, value: Box<Expr> },

    /// Update assignment: `PATH |= F` (F is applied to the value at each path)
    Update { path: Box<Expr>, f: Box<Expr> },

    /// Unresolved function call as written in the source: `length`, `map(f)`, `range(a; b)`
    Call { name: String, args: Vec<Expr> },

    /// Builtin function, resolved at compile time
    Builtin(Builtin),
}

/// Builtin functions supported by the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum Builtin {
    // Type functions
    /// `type` - returns the type name as a string
    Type,
    /// `arrays`, `objects`, `booleans`, ... - pass through inputs of one kind
    Filter(TypeFilter),

    // Length & Keys
    /// `length`
    Length,
    /// `utf8bytelength`
    Utf8ByteLength,
    /// `keys` - sorted object keys or array indices
    Keys,
    /// `keys_unsorted` - object keys in original order
    KeysUnsorted,
    /// `has(key)`
    Has(Box<Expr>),
    /// `in(obj)`
    In(Box<Expr>),

    // Selection & Filtering
    /// `select(condition)`
    Select(Box<Expr>),
    /// `empty` - output nothing
    Empty,
    /// `not`
    Not,
    /// `error` / `error(message)`
    Error(Option<Box<Expr>>),

    // Map & Iteration
    /// `map(f)` - `[.[] | f]`
    Map(Box<Expr>),
    /// `map_values(f)`
    MapValues(Box<Expr>),
    /// `range(upto)` / `range(from; upto)`
    Range {
        from: Option<Box<Expr>>,
        upto: Box<Expr>,
    },
    /// `limit(n; f)`
    Limit { n: Box<Expr>, f: Box<Expr> },
    /// `first` / `first(f)`
    First(Option<Box<Expr>>),
    /// `last` / `last(f)`
    Last(Option<Box<Expr>>),

    // Reduction
    /// `add`
    Add,
    /// `any`
    Any,
    /// `all`
    All,
    /// `min`
    Min,
    /// `max`
    Max,
    /// `min_by(f)`
    MinBy(Box<Expr>),
    /// `max_by(f)`
    MaxBy(Box<Expr>),

    // Arrays
    /// `sort`
    Sort,
    /// `sort_by(f)`
    SortBy(Box<Expr>),
    /// `unique`
    Unique,
    /// `reverse`
    Reverse,
    /// `contains(v)`
    Contains(Box<Expr>),

    // Objects
    /// `to_entries`
    ToEntries,
    /// `from_entries`
    FromEntries,
    /// `with_entries(f)`
    WithEntries(Box<Expr>),

    // Strings & conversion
    /// `tostring`
    ToString,
    /// `tonumber`
    ToNumber,
    /// `tojson`
    ToJson,
    /// `fromjson`
    FromJson,
    /// `ascii_downcase`
    AsciiDowncase,
    /// `ascii_upcase`
    AsciiUpcase,
    /// `startswith(s)`
    StartsWith(Box<Expr>),
    /// `endswith(s)`
    EndsWith(Box<Expr>),
    /// `ltrimstr(s)`
    LtrimStr(Box<Expr>),
    /// `rtrimstr(s)`
    RtrimStr(Box<Expr>),
    /// `split(s)`
    Split(Box<Expr>),
    /// `join(s)`
    Join(Box<Expr>),

    // Math
    /// `floor`
    Floor,
}

/// Kind selectors used by `arrays`, `objects`, `iterables`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFilter {
    Arrays,
    Objects,
    Iterables,
    Booleans,
    Numbers,
    Strings,
    Nulls,
    Values,
    Scalars,
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// Addition: `+`
    Add,
    /// Subtraction: `-`
    Sub,
    /// Multiplication: `*`
    Mul,
    /// Division: `/`
    Div,
    /// Modulo: `%`
    Mod,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal: `==`
    Eq,
    /// Not equal: `!=`
    Ne,
    /// Less than: `<`
    Lt,
    /// Less than or equal: `<=`
    Le,
    /// Greater than: `>`
    Gt,
    /// Greater than or equal: `>=`
    Ge,
}

/// An entry in an object construction expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    /// The key expression. Can be a literal string or a dynamic expression.
    pub key: ObjectKey,
    /// The value expression.
    pub value: Expr,
}

/// Object key in construction - either literal or dynamic.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKey {
    /// Literal string key: `{foo: .bar}`
    Literal(String),
    /// Dynamic key from expression: `{(.name): .value}` or `{$name}`
    Expr(Box<Expr>),
}

/// Literal values that can appear in jq expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// null
    Null,
    /// true or false
    Bool(bool),
    /// Integer number
    Int(i64),
    /// Floating-point number
    Float(f64),
    /// String literal
    String(String),
}

impl Expr {
    /// Chain multiple expressions together.
    pub fn pipe(mut exprs: Vec<Expr>) -> Self {
        if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Expr::Pipe(exprs)
        }
    }

    /// Create a comma expression (multiple outputs).
    pub fn comma(mut exprs: Vec<Expr>) -> Self {
        if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Expr::Comma(exprs)
        }
    }

    /// Create a field access expression.
    pub fn field(name: impl Into<String>) -> Self {
        Expr::Field(name.into())
    }

    /// Create a literal expression.
    pub fn literal(lit: Literal) -> Self {
        Expr::Literal(lit)
    }

    /// Returns true if this is the identity expression.
    pub fn is_identity(&self) -> bool {
        matches!(self, Expr::Identity)
    }
}

impl ObjectEntry {
    /// Create a new object entry with a literal key.
    pub fn new(key: impl Into<String>, value: Expr) -> Self {
        ObjectEntry {
            key: ObjectKey::Literal(key.into()),
            value,
        }
    }

    /// Create a new object entry with a dynamic key.
    pub fn dynamic(key_expr: Expr, value: Expr) -> Self {
        ObjectEntry {
            key: ObjectKey::Expr(Box::new(key_expr)),
            value,
        }
    }
}
