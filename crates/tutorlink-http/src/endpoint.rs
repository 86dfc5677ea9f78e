//! Endpoint announcement parsing.
//!
//! The first `endpoint` event on the handshake stream carries the command
//! endpoint for this session, either as a bare (usually relative) URI or as
//! `{"uri": "..."}`. The session id rides along as a query parameter.

use tutorlink_protocol::{Error, Result};
use url::Url;

/// Query parameter names that carry the session id, in lookup order.
pub const SESSION_ID_PARAMS: &[&str] = &["sessionId", "session_id"];

/// Session identity extracted from an endpoint announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAnnouncement {
    /// Server-assigned session id
    pub session_id: String,
    /// Absolute command endpoint, session id included
    pub command_endpoint: Url,
}

/// Parse the data of an `endpoint` event, resolving it against `base`.
///
/// # Errors
///
/// Returns [`Error::HandshakeRejected`] when the data is empty, is JSON
/// without a `uri` string, cannot be resolved to a URL, or carries no
/// session id.
pub fn parse_announcement(data: &str, base: &Url) -> Result<EndpointAnnouncement> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return Err(Error::rejected("empty endpoint announcement"));
    }

    let uri = if trimmed.starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(trimmed)
            .map_err(|e| Error::rejected(format!("invalid endpoint JSON: {e}")))?;
        value["uri"]
            .as_str()
            .ok_or_else(|| Error::rejected("endpoint announcement missing 'uri' field"))?
            .to_string()
    } else {
        trimmed.to_string()
    };

    let command_endpoint = base
        .join(&uri)
        .map_err(|e| Error::rejected(format!("unusable endpoint '{uri}': {e}")))?;

    let session_id = session_id_of(&command_endpoint)
        .ok_or_else(|| Error::rejected(format!("endpoint '{uri}' carries no session id")))?;

    Ok(EndpointAnnouncement {
        session_id,
        command_endpoint,
    })
}

/// Session id embedded in a command endpoint URL, if any.
pub fn session_id_of(url: &Url) -> Option<String> {
    SESSION_ID_PARAMS.iter().find_map(|name| {
        url.query_pairs()
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    })
}
