//! jq-like query engine over owned JSON values.
//!
//! Queries go through three stages: [`parse`] builds an [`Expr`], [`compile`] resolves
//! builtins and checks variable scoping against a declared variable list, and
//! [`Code::run`] evaluates the compiled query against an input with positional variable
//! values.
//!
//! # Supported Syntax
//!
//! | Expression | Meaning |
//! |------------|---------|
//! | `.` | Identity (return the whole input) |
//! | `.foo`, `."foo"` | Access field "foo" of an object |
//! | `.[0]`, `.[-1]` | Array index, counting from the end when negative |
//! | `.[$k]`, `.[expr]` | Dynamic index |
//! | `.[]` | Iterate all elements of an array or object |
//! | `.[2:5]` | Slice an array or string |
//! | `..` | Recursive descent |
//! | `.foo?` | Suppress errors |
//! | `a \| b`, `a, b` | Pipe and comma |
//! | `[...]`, `{k: v, (e): v, $x}` | Array and object construction |
//! | `+ - * / %` | Arithmetic |
//! | `== != < <= > >=` | Comparison |
//! | `and`, `or`, `not` | Boolean logic |
//! | `a // b` | Alternative (default if falsy) |
//! | `if c then a elif d then b else e end` | Conditional |
//! | `try a catch b` | Error handling |
//! | `e as $x \| body` | Variable binding |
//! | `reduce e as $x (init; update)` | Reduction |
//! | `p = v`, `p \|= f` | Assignment |
//!
//! # Example
//!
//! ```
//! use jqfunc::jq::{compile, parse, JqValue};
//!
//! let expr = parse(".users[] | select(.age >= $min) | .name").unwrap();
//! let code = compile(&expr, &["$min"]).unwrap();
//!
//! let input: JqValue = serde_json::from_str(
//!     r#"{"users": [{"name": "Alice", "age": 30}, {"name": "Bob", "age": 20}]}"#,
//! )
//! .unwrap();
//! let names: Vec<_> = code
//!     .run(input, vec![JqValue::Int(25)])
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(names, vec![JqValue::string("Alice")]);
//! ```

mod compile;
mod eval;
mod expr;
mod parser;
mod value;

pub use compile::{compile, Code, CompileError};
pub use eval::{EvalError, Outputs};
pub use expr::{
    ArithOp, Builtin, CompareOp, Expr, Literal, ObjectEntry, ObjectKey, TypeFilter,
};
pub use parser::{parse, ParseError};
pub use value::JqValue;
