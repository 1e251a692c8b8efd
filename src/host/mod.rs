//! The typed configuration host.
//!
//! These are the host-side shapes the function engine consumes and produces: typed
//! values, parsed expressions and bodies, source ranges, and diagnostics.

mod body;
mod diagnostics;
mod expr;
mod range;
mod value;

pub use body::{Attribute, Block, Body};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use expr::{Expression, TemplatePart, TraversalStep};
pub use range::{SourcePos, SourceRange};
pub use value::{HostType, HostValue, HostValueError};
