//! Upload filename checks

/// Accepted image extensions, lower case
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "tiff"];

/// Whether the suffix after the last `.` is an allowed image extension
pub fn allowed_file(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, extension)) => {
            let extension = extension.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&extension.as_str())
        }
        None => false,
    }
}

/// Reduce a client-supplied filename to a safe single path component.
///
/// Directory parts are dropped, whitespace becomes `_`, anything outside
/// `[A-Za-z0-9._-]` is removed and leading dots are stripped. Returns
/// `upload` when nothing survives.
pub fn secure_filename(filename: &str) -> String {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    let cleaned = cleaned.trim_start_matches('.').trim_matches('_');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
