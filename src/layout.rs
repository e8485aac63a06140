/// Maximum number of lines a wrapped block may occupy. Extra lines are dropped.
pub const MAX_LINES: usize = 8;

/// Greedy word wrap.
///
/// Words are separated by whitespace runs and packed into lines whose measured width stays
/// within `max_width`. A word that is wider than `max_width` on its own is placed alone on its
/// line without being split. At most [`MAX_LINES`] lines are returned; anything beyond that is
/// silently discarded.
pub fn wrap_lines(text: &str, max_width: f32, mut measure: impl FnMut(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let candidate = if line.is_empty() {
            word.to_owned()
        } else {
            format!("{line} {word}")
        };

        if measure(&candidate) > max_width {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            line = word.to_owned();
        } else {
            line = candidate;
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }

    lines.truncate(MAX_LINES);
    lines
}
