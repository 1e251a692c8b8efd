//! # jqfunc
//!
//! jq-backed functions for typed configuration languages.
//!
//! A configuration file declares named functions whose bodies are jq queries. Each
//! definition is compiled once and exposed to the host as a callable taking a subject
//! followed by the declared parameters.
//!
//! ## Quick Start
//!
//! ```
//! use jqfunc::host::{HostValue, SourceRange};
//! use jqfunc::{Function, FunctionDefinition};
//!
//! let def = FunctionDefinition::new(
//!     "get_field",
//!     vec!["field".to_string()],
//!     ".[$field]",
//!     SourceRange::default(),
//! );
//! let func = Function::new(def.compile().unwrap(), "input");
//!
//! // Text subjects are JSON documents. A lone string result comes back unquoted,
//! // anything else as JSON text.
//! let doc = HostValue::string(r#"{"name":"Alice","age":30}"#);
//! let name = func.call(&[doc.clone(), HostValue::string("name")]).unwrap();
//! assert_eq!(name, HostValue::string("Alice"));
//! let age = func.call(&[doc, HostValue::string("age")]).unwrap();
//! assert_eq!(age, HostValue::string("30"));
//! ```
//!
//! ## Modules
//!
//! - [`jq`] - jq parser, compiler and evaluator
//! - [`host`] - typed host values, expressions, bodies and diagnostics
//! - [`decode`] - reading function blocks out of a configuration body
//!
//! ## Features
//!
//! - `cli` - the `jqfunc` command-line tool

pub mod bridge;
pub mod config;
pub mod decode;
pub mod error;
pub mod exec;
pub mod function;
pub mod host;
pub mod jq;
pub mod params;
pub mod shape;
pub mod table;

pub use bridge::{decode_text, encode_text, from_native, to_native, ConversionError};
pub use config::{ConfigError, Settings};
pub use decode::{decode_definition, decode_functions};
pub use error::{Cause, JqFunctionError};
pub use exec::execute;
pub use function::{CompiledFunction, Function, FunctionDefinition, Parameter};
pub use params::parse_params;
pub use shape::{shape, SubjectKind};
pub use table::{compile_batch, CallError, FunctionTable};
