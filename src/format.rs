use unicode_width::UnicodeWidthStr;

/// Width of `s` in terminal columns.
pub fn display_width(s: &str) -> usize {
    s.width()
}

/// Left-align `s` in a column `width` terminal cells wide. `format!`'s own
/// padding counts chars, which misaligns wide glyphs.
pub fn pad_right(s: &str, width: usize) -> String {
    let mut out = String::with_capacity(s.len() + width);
    out.push_str(s);
    for _ in display_width(s)..width {
        out.push(' ');
    }
    out
}

pub fn round_2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
