//! PHP `date()` format notation translated to chrono patterns.
//!
//! Definitions store formats the way users write them (`d-m-Y`,
//! `Y-m-d H:i:s`). A backslash escapes the next character. Timezone
//! directives are rejected since date values carry no offset.

use crate::error::{TypeError, TypeResult};

fn directive(c: char) -> Option<&'static str> {
    let pattern = match c {
        // day
        'd' => "%d",
        'j' => "%-d",
        'D' => "%a",
        'l' => "%A",
        'N' => "%u",
        'w' => "%w",
        // week, month, year
        'W' => "%V",
        'm' => "%m",
        'n' => "%-m",
        'M' => "%b",
        'F' => "%B",
        'Y' => "%Y",
        'y' => "%y",
        'o' => "%G",
        // time
        'a' => "%P",
        'A' => "%p",
        'g' => "%-I",
        'G' => "%-H",
        'h' => "%I",
        'H' => "%H",
        'i' => "%M",
        's' => "%S",
        'u' => "%6f",
        'v' => "%3f",
        // full
        'c' => "%Y-%m-%dT%H:%M:%S",
        'U' => "%s",
        _ => return None,
    };
    Some(pattern)
}

/// Translate a PHP format string into a chrono format string.
pub fn to_chrono(format: &str) -> TypeResult<String> {
    let mut out = String::with_capacity(format.len() * 2);
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    push_literal(&mut out, escaped);
                }
            }
            c if c.is_ascii_alphabetic() => match directive(c) {
                Some(pattern) => out.push_str(pattern),
                None => {
                    return Err(TypeError::UnsupportedFormat {
                        format: format.to_string(),
                        character: c,
                    })
                }
            },
            c => push_literal(&mut out, c),
        }
    }
    Ok(out)
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

/// Whether the format prints any date part.
pub fn has_date(format: &str) -> bool {
    format.chars().any(|c| "djDlNwWmnMFYyocU".contains(c))
}

/// Whether the format prints any time part.
pub fn has_time(format: &str) -> bool {
    format.chars().any(|c| "aAgGhHisuvcU".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_formats() {
        assert_eq!(to_chrono("d-m-Y").unwrap(), "%d-%m-%Y");
        assert_eq!(to_chrono("Y-m-d H:i:s").unwrap(), "%Y-%m-%d %H:%M:%S");
        assert_eq!(to_chrono("j F Y, g:i a").unwrap(), "%-d %B %Y, %-I:%M %P");
    }

    #[test]
    fn test_escapes_and_percent() {
        assert_eq!(to_chrono(r"\d\a\y: d").unwrap(), "day: %d");
        assert_eq!(to_chrono("d%").unwrap(), "%d%%");
    }

    #[test]
    fn test_timezone_directive_rejected() {
        let err = to_chrono("Y-m-d T").unwrap_err();
        assert!(matches!(err, TypeError::UnsupportedFormat { character: 'T', .. }));
    }

    #[test]
    fn test_date_and_time_parts() {
        assert!(has_date("d-m-Y") && !has_time("d-m-Y"));
        assert!(has_time("H:i") && !has_date("H:i"));
    }
}
