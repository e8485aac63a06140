//! Pure time-driven derivations for the fallback clip.
//!
//! Everything here is a function of elapsed milliseconds, so a frame can be reproduced for any
//! clock value without replaying the frames before it.

/// Prompts are trimmed and cut to this many characters before they are rendered.
pub const MAX_PROMPT_CHARS: usize = 240;

/// The reveal never shows fewer characters than this, even on the very first frame.
pub const MIN_REVEALED_CHARS: usize = 12;

/// Milliseconds per degree of background hue rotation (one full turn every 7.2 s).
pub const HUE_MS_PER_DEGREE: f64 = 20.0;

/// Trim `text` and keep at most [`MAX_PROMPT_CHARS`] characters.
pub fn truncate_prompt(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX_PROMPT_CHARS) {
        Some((idx, _)) => &trimmed[..idx],
        None => trimmed,
    }
}

/// Background hue in degrees, `[0, 360)`.
pub fn background_hue(elapsed_ms: f64) -> f64 {
    (elapsed_ms.max(0.0) / HUE_MS_PER_DEGREE).rem_euclid(360.0)
}

/// Fraction of the target duration that has elapsed, clamped to `[0, 1]`.
pub fn reveal_progress(elapsed_ms: f64, target_ms: f64) -> f64 {
    if target_ms <= 0.0 {
        return 1.0;
    }
    (elapsed_ms / target_ms).clamp(0.0, 1.0)
}

/// Number of characters visible at `progress` for a text of `len` characters.
pub fn revealed_chars(len: usize, progress: f64) -> usize {
    let by_progress = (len as f64 * progress.clamp(0.0, 1.0)).floor() as usize;
    by_progress.max(MIN_REVEALED_CHARS).min(len)
}

/// Portion of the (already truncated) `text` visible at `elapsed_ms`.
pub fn revealed_text(text: &str, elapsed_ms: f64, target_ms: f64) -> &str {
    let len = text.chars().count();
    let n = revealed_chars(len, reveal_progress(elapsed_ms, target_ms));
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
