//! The injected chat task.
//!
//! Runs inside the browser context, with access to its cookies and fetch
//! stack: extracts the access token from the session cookie, POSTs the
//! payload to the upstream streaming endpoint and pushes each decoded chunk
//! through the session's binding.

use arena_core::{Result, UpstreamConfig};

use crate::types::UpstreamPayload;

const TASK_TEMPLATE: &str = r#"(async () => {
    const payload = __PAYLOAD__;
    const cookieName = __COOKIE__;
    const row = document.cookie.split('; ').find((r) => r.startsWith(cookieName + '='));
    if (!row) {
        return { ok: false, kind: 'unauthenticated', error: 'session cookie ' + cookieName + ' not found' };
    }
    let accessToken;
    try {
        const raw = decodeURIComponent(row.slice(cookieName.length + 1));
        accessToken = JSON.parse(atob(raw)).access_token;
    } catch (e) {
        return { ok: false, kind: 'unauthenticated', error: 'session cookie is malformed: ' + String(e) };
    }
    if (!accessToken) {
        return { ok: false, kind: 'unauthenticated', error: 'session cookie has no access token' };
    }
    let response;
    try {
        response = await fetch(__ENDPOINT__, {
            method: 'POST',
            headers: {
                'Content-Type': 'application/json',
                'Authorization': 'Bearer ' + accessToken,
            },
            body: JSON.stringify(payload),
        });
    } catch (e) {
        return { ok: false, kind: 'upstream', error: 'request failed: ' + String(e) };
    }
    if (!response.ok) {
        return { ok: false, kind: 'upstream', error: 'upstream responded with status ' + response.status };
    }
    const deliver = window[__BINDING__];
    const reader = response.body.getReader();
    const decoder = new TextDecoder();
    try {
        while (true) {
            const { done, value } = await reader.read();
            if (done) break;
            deliver(decoder.decode(value));
        }
    } catch (e) {
        return { ok: false, kind: 'stream', error: 'stream read failed: ' + String(e) };
    }
    return { ok: true };
})()"#;

/// Render the task for one relay session. All dynamic values are embedded
/// as JSON literals, so caller-supplied content can never reach a code
/// position in the script.
///
/// The payload must be substituted last: each placeholder occurs exactly
/// once in the pristine template, and filling the payload first would let
/// later replacements rescan caller message content for placeholder names.
pub fn chat_task_script(
    binding: &str,
    payload: &UpstreamPayload,
    upstream: &UpstreamConfig,
) -> Result<String> {
    let script = TASK_TEMPLATE
        .replace("__COOKIE__", &serde_json::to_string(&upstream.auth_cookie)?)
        .replace(
            "__ENDPOINT__",
            &serde_json::to_string(&upstream.stream_endpoint)?,
        )
        .replace("__BINDING__", &serde_json::to_string(binding)?)
        .replace("__PAYLOAD__", &serde_json::to_string(payload)?);
    Ok(script)
}
