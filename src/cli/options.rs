//! Argument shaping for `tests:run`
//!
//! Turns the raw group argument and the free-form `--options` string into the discrete values
//! that end up on the runner's argument list.

use super::test_interfaces::TestError;

/// Placeholder in forwarded options that is replaced with the group being run.
pub const GROUP_PLACEHOLDER: &str = "%group%";

/// Parse the comma-separated group argument.
///
/// Entries are trimmed and capitalized (first character only); empty entries are dropped.
/// Order and duplicates are kept. An empty result means "run the default groups".
pub fn parse_groups(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ucfirst)
        .collect()
}

/// Uppercase the first character, leaving the rest untouched.
pub fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Split forwarded runner options into discrete arguments.
///
/// Whitespace separates arguments. Single quotes group literally; double quotes group and honour
/// `\"`, `\\`, `\$` and `` \` `` escapes; a backslash outside quotes escapes the next character.
pub fn split_options(raw: &str) -> Result<Vec<String>, TestError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err(unterminated('\'', raw)),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => current.push(c),
                            Some(c) => {
                                current.push('\\');
                                current.push(c);
                            }
                            None => return Err(unterminated('"', raw)),
                        },
                        Some(c) => current.push(c),
                        None => return Err(unterminated('"', raw)),
                    }
                }
            }
            '\\' => {
                in_word = true;
                current.push(chars.next().unwrap_or('\\'));
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }

    if in_word {
        args.push(current);
    }

    Ok(args)
}

fn unterminated(quote: char, raw: &str) -> TestError {
    TestError::InvalidOptions(format!("unterminated {quote} quote in `{raw}`"))
}

/// Replace every `%group%` placeholder in the arguments with `group`.
pub fn substitute_group(args: &[String], group: &str) -> Vec<String> {
    args.iter().map(|arg| arg.replace(GROUP_PLACEHOLDER, group)).collect()
}

/// Whether the forwarded options ask the runner for a coverage report.
pub fn wants_coverage(options: &str) -> bool {
    options.contains("--coverage")
}
