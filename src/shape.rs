//! Shaping a query's outputs into the value a call returns.
//!
//! | outputs | text subject | result |
//! |---------|--------------|--------|
//! | 0 | yes | the text `null` |
//! | 0 | no | a host null |
//! | 1 string | yes | the string itself, not re-encoded |
//! | 1 other | yes | the value encoded as JSON text |
//! | 1 | no | the value as a host value |
//! | 2+ | yes | an array of all outputs, encoded as JSON text |
//! | 2+ | no | an array of all outputs, as a host value |

use crate::bridge::{encode_text, from_native};
use crate::error::Cause;
use crate::host::HostValue;
use crate::jq::JqValue;

/// Whether the call's subject arrived as JSON text or as a typed host value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
    Text,
    Typed,
}

/// Turn the ordered outputs of one run into the call's result.
pub fn shape(mut results: Vec<JqValue>, kind: SubjectKind) -> Result<HostValue, Cause> {
    let result = match results.len() {
        0 => {
            return Ok(match kind {
                SubjectKind::Text => HostValue::string("null"),
                SubjectKind::Typed => HostValue::null(),
            })
        }
        1 => results.remove(0),
        _ => JqValue::Array(results),
    };

    match kind {
        SubjectKind::Text => match result {
            JqValue::String(s) => Ok(HostValue::String(s)),
            other => encode_text(&other)
                .map(HostValue::String)
                .map_err(Cause::EncodeResult),
        },
        SubjectKind::Typed => from_native(&result).map_err(Cause::ConvertResult),
    }
}
