//! `{tag}` substitution for notification subjects, bodies and commands, and
//! `$VAR`/`${VAR}` expansion for configuration values.

use std::convert::Infallible;
use std::env;

use crate::notify::Snapshot;

pub const TIMESTAMP_FORMAT: &str = "%-d.%-m.%Y %H:%M:%S";

/// Render `template` against an event snapshot.
///
/// Unknown tags render as `[unknown tag 'name']` so a typo shows up in the
/// delivered message instead of silently vanishing.
pub fn render(template: &str, snapshot: &Snapshot) -> String {
    render_with(template, snapshot, &[])
}

/// Like [`render`], with extra tags that take precedence over snapshot fields.
pub fn render_with(template: &str, snapshot: &Snapshot, extra: &[(&str, &str)]) -> String {
    match render_escaped(template, snapshot, extra, |value| Ok::<_, Infallible>(value.to_string())) {
        Ok(out) => out,
        Err(never) => match never {},
    }
}

/// Like [`render_with`], passing every substituted value through `escape`.
/// Literal template text is copied unchanged.
pub fn render_escaped<E>(
    template: &str,
    snapshot: &Snapshot,
    extra: &[(&str, &str)],
    escape: impl Fn(&str) -> Result<String, E>,
) -> Result<String, E> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return Ok(out);
        };

        let tag = &after[..close];
        let value = match extra.iter().find(|(name, _)| *name == tag) {
            Some((_, value)) => escape(value)?,
            None => escape(&tag_value(tag, snapshot))?,
        };
        out.push_str(&value);
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

fn tag_value(tag: &str, s: &Snapshot) -> String {
    match tag {
        "id" => s.check_id.clone(),
        "check" => s.target.clone(),
        "type" => s.kind.to_string(),
        "params" => space_if_value(&s.params),
        "headers" => space_if_value(&s.headers),
        "look_for" => space_if_value(&s.look_for),
        "response" => s.body.clone(),
        "timestamp" => s.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        "response_code" | "responsecode" => s.status_code.unwrap_or_default().to_string(),
        "response_time" | "responsetime" => s.latency.as_millis().to_string(),
        "expected_code" | "expectedcode" => s.expected_code.to_string(),
        "expected_time" | "expectedtime" => s.expected_time.as_millis().to_string(),
        "error" => s.error.clone().unwrap_or_default(),
        unknown => format!("[unknown tag '{unknown}']"),
    }
}

fn space_if_value(value: &str) -> String {
    if value.is_empty() { String::new() } else { format!(" {value}") }
}

/// Replace `$VAR` and `${VAR}` with environment values (unset → empty).
pub fn expand_env(input: &str) -> String {
    expand_with(input, |name| env::var(name).ok())
}

pub fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        if name.is_empty() {
            out.push('$');
            rest = after;
            continue;
        }

        out.push_str(&lookup(name).unwrap_or_default());
        rest = &after[consumed..];
    }

    out.push_str(rest);
    out
}
