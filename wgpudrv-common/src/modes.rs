//! Display mode list formatting

use std::fmt::Write;

/// Formats display modes as `"WxH WxH ..."`.
///
/// Consecutive duplicates (same size, different refresh rate) collapse into
/// one entry. With a `limit`, only the last `limit` distinct sizes are kept,
/// in their original order.
pub fn mode_list(modes: &[(u32, u32)], limit: Option<usize>) -> String {
    let mut unique: Vec<(u32, u32)> = Vec::with_capacity(modes.len());
    for &mode in modes {
        if unique.last() != Some(&mode) {
            unique.push(mode);
        }
    }

    let start = match limit {
        Some(limit) => unique.len().saturating_sub(limit),
        None => 0,
    };

    let mut out = String::new();
    for (width, height) in &unique[start..] {
        if !out.is_empty() {
            out.push(' ');
        }
        let _ = write!(out, "{width}x{height}");
    }
    out
}
