//! Interpretation of the service's JSON reply.

use panverify_core::VerificationOutcome;
use serde::{Deserialize, Deserializer};

/// Description used when the reply carries no usable message.
pub const NO_MESSAGE: &str = "no message available";

#[derive(Debug, Deserialize)]
struct ServiceReply {
    /// `None` when the key is absent, `Some(None)` for an explicit null.
    #[serde(default, deserialize_with = "present")]
    status: Option<Option<String>>,
    #[serde(default)]
    messages: Vec<ServiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ServiceMessage {
    #[serde(default)]
    desc: Option<String>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Map a 2xx body to an outcome.
///
/// Valid only when the status equals `valid_status` (an absent status key
/// counts as equal, an explicit null does not) and the first message carries
/// a description. Bodies that do not
/// parse are invalid with a `malformed response` message.
#[must_use]
pub fn interpret(body: &str, valid_status: &str) -> VerificationOutcome {
    let reply: ServiceReply = match serde_json::from_str(body) {
        Ok(reply) => reply,
        Err(e) => return VerificationOutcome::invalid(format!("malformed response: {e}")),
    };

    let status_ok = match reply.status {
        None => true,
        Some(status) => status.as_deref() == Some(valid_status),
    };

    match reply.messages.into_iter().next().and_then(|m| m.desc) {
        Some(desc) if status_ok => VerificationOutcome::valid(desc),
        Some(desc) => VerificationOutcome::invalid(desc),
        None => VerificationOutcome::invalid(NO_MESSAGE),
    }
}
