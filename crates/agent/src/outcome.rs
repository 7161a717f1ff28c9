//! The result of one agent turn.

use serde::{Deserialize, Serialize};
use sitewright_core::directive::FinalPayload;

/// What a turn produced.
///
/// Serialises as `{"final": true, "result": {...}}` when the model finished,
/// or `{"final": false, "result": null}` when the step budget ran out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    #[serde(rename = "final")]
    pub is_final: bool,

    pub result: Option<FinalPayload>,
}

impl TurnOutcome {
    pub fn finished(payload: FinalPayload) -> Self {
        Self {
            is_final: true,
            result: Some(payload),
        }
    }

    pub fn exhausted() -> Self {
        Self {
            is_final: false,
            result: None,
        }
    }
}
