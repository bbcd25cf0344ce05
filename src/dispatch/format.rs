//! # Command Formatter
//!
//! Positional substitution of arguments into command templates.
//!
//! Templates use `{}` for the next argument, `{N}` for argument `N` and
//! `{{` / `}}` for literal braces. A template submitted without arguments is
//! sent unchanged and is never scanned, so braces in it need no escaping.
//!
//! Substitution is textual: the final command is sent verbatim, with no
//! parameter binding. Only pass trusted or pre-sanitized values; wrap string
//! values in [`Literal`] to render them as quoted SQL literals.

use std::fmt::{self, Display, Write as _};

use crate::error::{DispatchError, Result};

/// Renders a value as a single-quoted SQL string literal.
///
/// Embedded single quotes are doubled. Backslashes are left alone, which is
/// correct for `standard_conforming_strings = on`.
#[derive(Debug, Clone, Copy)]
pub struct Literal<T>(pub T);

impl<T: Display> Display for Literal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.0.to_string();
        f.write_char('\'')?;
        for ch in raw.chars() {
            if ch == '\'' {
                f.write_char('\'')?;
            }
            f.write_char(ch)?;
        }
        f.write_char('\'')
    }
}

/// Substitute `args` into `template`.
///
/// Fails when a placeholder has no matching argument, an argument is never
/// referenced, a brace is unbalanced or a placeholder index is malformed.
pub fn format_command(template: &str, args: &[&dyn Display]) -> Result<String> {
    if args.is_empty() {
        return Ok(template.to_string());
    }

    let mut output = String::with_capacity(template.len() + args.len() * 8);
    let mut used = vec![false; args.len()];
    let mut next_positional = 0usize;
    let mut chars = template.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    output.push('{');
                    continue;
                }

                let mut placeholder = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    placeholder.push(inner);
                }
                if !closed {
                    return Err(DispatchError::format(
                        template,
                        format!("unclosed '{{' at byte {pos}"),
                    ));
                }

                let index = if placeholder.trim().is_empty() {
                    let index = next_positional;
                    next_positional += 1;
                    index
                } else {
                    placeholder.trim().parse::<usize>().map_err(|_| {
                        DispatchError::format(
                            template,
                            format!("invalid placeholder '{{{placeholder}}}' at byte {pos}"),
                        )
                    })?
                };

                let arg = args.get(index).ok_or_else(|| {
                    DispatchError::format(
                        template,
                        format!(
                            "placeholder at byte {pos} refers to argument {index} but only {} supplied",
                            args.len()
                        ),
                    )
                })?;
                used[index] = true;
                write!(output, "{arg}").map_err(|e| DispatchError::format(template, e.to_string()))?;
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    output.push('}');
                } else {
                    return Err(DispatchError::format(
                        template,
                        format!("unmatched '}}' at byte {pos}"),
                    ));
                }
            }
            other => output.push(other),
        }
    }

    if let Some(unused) = used.iter().position(|u| !u) {
        return Err(DispatchError::format(
            template,
            format!("argument {unused} is never used"),
        ));
    }

    Ok(output)
}
