//! Running a compiled query and collecting its outputs.

use tracing::trace;

use crate::jq::{Code, EvalError, JqValue};

/// Run `code` against `subject` with positional parameter values.
///
/// Outputs are pulled one at a time until the query finishes. The first error the query
/// raises ends the run; the outputs collected before it are discarded.
pub fn execute(code: &Code, subject: JqValue, params: Vec<JqValue>) -> Result<Vec<JqValue>, EvalError> {
    let mut results = Vec::new();
    for output in code.run(subject, params) {
        match output {
            Ok(value) => results.push(value),
            Err(err) => {
                trace!(collected = results.len(), error = %err, "query raised an error");
                return Err(err);
            }
        }
    }
    trace!(results = results.len(), "query finished");
    Ok(results)
}
