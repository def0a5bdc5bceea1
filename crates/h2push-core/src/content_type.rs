//! Content-type helpers: inference from push paths and media-type essence.

/// Guess a content-type from the extension of a push path.
///
/// Query strings and fragments are ignored. Textual types carry an explicit
/// UTF-8 charset, e.g. `/some.txt` -> `text/plain; charset=utf-8`.
pub fn infer_from_path(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or(path);

    let mime = mime_guess::from_path(path).first()?;
    let essence = mime.essence_str();

    if wants_charset(essence) {
        Some(format!("{essence}; charset=utf-8"))
    } else {
        Some(essence.to_string())
    }
}

/// The lower-cased `type/subtype` part of a content-type, without parameters.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn wants_charset(essence: &str) -> bool {
    essence.starts_with("text/")
        || matches!(
            essence,
            "application/javascript" | "application/json" | "application/xml"
        )
}
