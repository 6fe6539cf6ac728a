// ── Shell commands ──
//
// Shell commands are command handlers that render a template with the
// message tokens and hand the result to `sh -c`. Rendering quotes every
// substituted token, so message text never becomes shell syntax.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

/// Placeholder for all tokens after the command.
const ALL_ARGS: &str = "@";

// ── ShellTemplate ────────────────────────────────────────────────────

/// A command line with positional placeholders.
///
/// * `{0}` is the command token itself, `{1}`..`{N}` the following tokens.
/// * `{@}` expands to every token after the command, space separated.
///
/// Placeholders past the end of the token list render empty; anything
/// else in braces is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellTemplate {
    template: String,
}

impl ShellTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Template that runs `program` with the message arguments appended.
    pub fn passthrough(program: &str) -> Self {
        Self::new(format!("{program} {{@}}"))
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitute `tokens` into the template.
    pub fn render(&self, tokens: &[String]) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };

            let key = &after[..close];
            match substitute(key, tokens) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push('{');
                    out.push_str(key);
                    out.push('}');
                }
            }
            rest = &after[close + 1..];
        }

        out.push_str(rest);
        out
    }
}

impl fmt::Display for ShellTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

fn substitute(key: &str, tokens: &[String]) -> Option<String> {
    if key == ALL_ARGS {
        let args: Vec<String> = tokens.iter().skip(1).map(|t| quote(t)).collect();
        return Some(args.join(" "));
    }

    let index: usize = key.parse().ok()?;
    Some(tokens.get(index).map(|t| quote(t)).unwrap_or_default())
}

/// Single-quote a token for POSIX `sh`.
fn quote(token: &str) -> String {
    let safe = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if safe {
        token.to_owned()
    } else {
        format!("'{}'", token.replace('\'', r"'\''"))
    }
}

// ── ShellExecutor ────────────────────────────────────────────────────

/// Runs rendered shell command lines.
pub trait ShellExecutor: Send + Sync {
    /// Start `command_line`. Returns once the process is launched; the
    /// executor owns waiting for it.
    fn execute(&self, command_line: &str) -> std::io::Result<()>;
}

/// Executes through `sh -c` on the tokio runtime, logging the exit status
/// from a background task.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShell;

impl ShellExecutor for SystemShell {
    fn execute(&self, command_line: &str) -> std::io::Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| std::io::Error::other(format!("no async runtime: {e}")))?;

        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command_line)
            .kill_on_drop(false)
            .spawn()?;

        debug!(command_line, pid = child.id(), "shell command started");

        let line = command_line.to_owned();
        runtime.spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    info!(command_line = %line, "shell command finished");
                }
                Ok(status) => {
                    warn!(command_line = %line, %status, "shell command failed");
                }
                Err(e) => {
                    warn!(command_line = %line, error = %e, "could not wait for shell command");
                }
            }
        });
        Ok(())
    }
}

impl<T: ShellExecutor + ?Sized> ShellExecutor for Arc<T> {
    fn execute(&self, command_line: &str) -> std::io::Result<()> {
        (**self).execute(command_line)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
