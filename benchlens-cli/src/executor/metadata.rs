//! Run Metadata
//!
//! Toolchain version probing and the printable command line recorded on
//! every run. A toolchain that cannot be queried degrades to "unknown".

/// Probe `<toolchain> version` (e.g. "go version go1.22.1 linux/amd64")
pub fn toolchain_version(toolchain: &str) -> String {
    std::process::Command::new(toolchain)
        .arg("version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .and_then(|s| parse_version_line(&s))
        .unwrap_or_else(|| "unknown".to_string())
}

fn parse_version_line(line: &str) -> Option<String> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some("version"), Some(version)) => Some(version.to_string()),
        _ => None,
    }
}

/// Render a command line for display, quoting arguments that need it
pub fn render_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(|arg| {
            if arg.is_empty() || arg.contains(char::is_whitespace) || arg.contains('\'') {
                format!("'{}'", arg.replace('\'', r"'\''"))
            } else {
                arg.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
