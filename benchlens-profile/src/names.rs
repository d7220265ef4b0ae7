//! Function-name normalization.

/// Shorten a symbol to `pkg.Func` form.
///
/// Keeps only the final `/`-separated segment of the package path, then
/// drops a trailing generic instantiation list. Slashes inside the list
/// (`Map[go.shape.string,example.com/x.T]`) do not count as path
/// separators.
pub fn clean_function_name(name: &str) -> &str {
    let head_end = name.find('[').unwrap_or(name.len());
    let start = name[..head_end].rfind('/').map_or(0, |i| i + 1);
    let short = &name[start..];

    if !short.ends_with(']') {
        return short;
    }

    let mut depth = 0usize;
    for (i, c) in short.char_indices().rev() {
        match c {
            ']' => depth += 1,
            '[' => {
                depth -= 1;
                if depth == 0 {
                    return &short[..i];
                }
            }
            _ => {}
        }
    }
    short
}
