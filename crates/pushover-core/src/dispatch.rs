// ── Dispatch registry ──
//
// Routes each fetched message to user code. The first whitespace token
// of the message body selects a command (native handler, shell command,
// or an alias of either); every parser then sees the message regardless
// of whether a command matched. A failing or panicking callback is
// logged and isolated: it never stops the callbacks after it.
//
// Callbacks run synchronously on the caller's task. In the realtime loop
// that is the socket task itself, so a slow handler delays the next
// signal until it returns.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tracing::{debug, error, warn};

use pushover_api::Message;

use crate::shell::{ShellExecutor, ShellTemplate, SystemShell};

/// Error type returned by handlers and parsers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by handlers and parsers.
pub type HandlerResult = Result<(), HandlerError>;

type CommandFn = Arc<dyn Fn(&[String], &Message) -> HandlerResult + Send + Sync>;
type ParserFn = Arc<dyn Fn(&Message) -> HandlerResult + Send + Sync>;

static GLOBAL: LazyLock<Arc<DispatchRegistry>> =
    LazyLock::new(|| Arc::new(DispatchRegistry::new()));

// ── Registry entries ─────────────────────────────────────────────────

#[derive(Clone)]
enum CommandEntry {
    Native(CommandFn),
    Shell(ShellTemplate),
}

/// Outcome of dispatching one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// First token of the body (empty for an empty body).
    pub command: String,
    /// Whether a command, shell command or alias handled it.
    pub matched: bool,
    /// Callbacks that returned an error or panicked.
    pub failures: usize,
}

// ── DispatchRegistry ─────────────────────────────────────────────────

/// Named commands, command parsers, unconditional parsers and shell
/// aliases, resolved against incoming messages.
///
/// Registration takes `&self`: the tables are concurrent maps and the
/// parser list is swapped atomically, so callbacks may be added while a
/// connection is dispatching. A registration under an existing name
/// replaces the previous one.
pub struct DispatchRegistry {
    commands: DashMap<String, CommandEntry>,
    command_parsers: DashMap<String, ParserFn>,
    aliases: DashMap<String, String>,
    parsers: ArcSwap<Vec<ParserFn>>,
    shell: Arc<dyn ShellExecutor>,
}

impl Default for DispatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchRegistry {
    /// An empty registry that runs shell commands through `sh -c`.
    pub fn new() -> Self {
        Self::with_shell_executor(Arc::new(SystemShell))
    }

    /// An empty registry using a custom shell executor.
    pub fn with_shell_executor(shell: Arc<dyn ShellExecutor>) -> Self {
        Self {
            commands: DashMap::new(),
            command_parsers: DashMap::new(),
            aliases: DashMap::new(),
            parsers: ArcSwap::from_pointee(Vec::new()),
            shell,
        }
    }

    /// The process-wide registry, created on first use and kept for the
    /// life of the process.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Register `handler` for messages whose first token is `name`.
    ///
    /// The handler receives every token of the body (the command first)
    /// and the message. Returns the handler unchanged so it stays usable
    /// as an ordinary function.
    pub fn register_command<F>(&self, name: impl Into<String>, handler: F) -> F
    where
        F: Fn(&[String], &Message) -> HandlerResult + Clone + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(command = %name, "registering command");
        self.insert_command(name, CommandEntry::Native(Arc::new(handler.clone())));
        handler
    }

    /// Register a parser that only runs when the first token is `name`.
    pub fn register_command_parser<F>(&self, name: impl Into<String>, parser: F) -> F
    where
        F: Fn(&Message) -> HandlerResult + Clone + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(command = %name, "registering command parser");
        self.command_parsers.insert(name, Arc::new(parser.clone()));
        parser
    }

    /// Register a parser that runs for every message, after any command
    /// and after every parser registered before it.
    pub fn register_parser<F>(&self, parser: F) -> F
    where
        F: Fn(&Message) -> HandlerResult + Clone + Send + Sync + 'static,
    {
        let entry: ParserFn = Arc::new(parser.clone());
        self.parsers.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&entry));
            next
        });
        debug!(parsers = self.parser_count(), "registered parser");
        parser
    }

    /// Register a shell command under `name`.
    pub fn register_shell_command(&self, name: impl Into<String>, template: ShellTemplate) {
        let name = name.into();
        debug!(command = %name, template = %template, "registering shell command");
        self.insert_command(name, CommandEntry::Shell(template));
    }

    /// Make `alias` dispatch to whatever is registered under `target`.
    ///
    /// Resolution happens at dispatch time and follows one level only.
    pub fn register_shell_command_alias(
        &self,
        alias: impl Into<String>,
        target: impl Into<String>,
    ) {
        let alias = alias.into();
        let target = target.into();
        debug!(%alias, %target, "registering alias");
        self.aliases.insert(alias, target);
    }

    fn insert_command(&self, name: String, entry: CommandEntry) {
        if self.commands.insert(name.clone(), entry).is_some() {
            debug!(command = %name, "replaced existing command");
        }
    }

    // ── Introspection ────────────────────────────────────────────────

    /// Whether `name` resolves to a command (directly or via an alias).
    pub fn has_command(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub fn parser_count(&self) -> usize {
        self.parsers.load().len()
    }

    /// Registered command and alias names, sorted.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .iter()
            .map(|e| e.key().clone())
            .chain(self.aliases.iter().map(|e| e.key().clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Route one message through the registry.
    ///
    /// Never fails: an unmatched command is normal and every callback
    /// error is logged and counted in the report.
    pub fn dispatch(&self, message: &Message) -> DispatchReport {
        let tokens = tokenize(message.body());
        let command = tokens.first().cloned().unwrap_or_default();
        let mut report = DispatchReport {
            command: command.clone(),
            ..DispatchReport::default()
        };

        debug!(message_id = message.id(), command = %command, "dispatching message");

        // Entries are cloned out so no map guard is held while user code runs.
        if let Some(entry) = self.resolve(&command) {
            report.matched = true;
            let ok = match entry {
                CommandEntry::Native(handler) => {
                    isolate("command", &command, message.id(), || {
                        handler(tokens.as_slice(), message)
                    })
                }
                CommandEntry::Shell(template) => {
                    isolate("shell command", &command, message.id(), || {
                        self.run_shell(&template, &tokens)
                    })
                }
            };
            if !ok {
                report.failures += 1;
            }
        }

        let command_parser = self.command_parsers.get(&command).map(|e| Arc::clone(e.value()));
        if let Some(parser) = command_parser {
            report.matched = true;
            if !isolate("command parser", &command, message.id(), || parser(message)) {
                report.failures += 1;
            }
        }

        let parsers = self.parsers.load_full();
        for (index, parser) in parsers.iter().enumerate() {
            let label = format!("#{index}");
            if !isolate("parser", &label, message.id(), || parser(message)) {
                report.failures += 1;
            }
        }

        report
    }

    /// Dispatch a batch in the order given.
    pub fn dispatch_all(&self, messages: &[Message]) -> Vec<DispatchReport> {
        messages.iter().map(|m| self.dispatch(m)).collect()
    }

    fn resolve(&self, name: &str) -> Option<CommandEntry> {
        if let Some(entry) = self.commands.get(name) {
            return Some(entry.value().clone());
        }

        let target = self.aliases.get(name).map(|t| t.value().clone())?;
        let entry = self.commands.get(&target).map(|e| e.value().clone());
        if entry.is_none() {
            warn!(alias = name, %target, "alias points at an unregistered command");
        }
        entry
    }

    fn run_shell(&self, template: &ShellTemplate, tokens: &[String]) -> HandlerResult {
        let command_line = template.render(tokens);
        debug!(%command_line, "running shell command");
        self.shell.execute(&command_line)?;
        Ok(())
    }
}

/// Split a message body on whitespace.
pub fn tokenize(body: &str) -> Vec<String> {
    body.split_whitespace().map(str::to_owned).collect()
}

/// Run one callback, containing both returned errors and panics.
fn isolate(kind: &str, name: &str, message_id: u64, f: impl FnOnce() -> HandlerResult) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(kind, name, message_id, error = %e, "handler failed");
            false
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            error!(kind, name, message_id, %reason, "handler panicked");
            false
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::{Map, Value, json};

    use super::*;

    #[derive(Default)]
    struct RecordingShell {
        lines: Mutex<Vec<String>>,
    }

    impl ShellExecutor for RecordingShell {
        fn execute(&self, command_line: &str) -> std::io::Result<()> {
            self.lines.lock().unwrap().push(command_line.to_owned());
            Ok(())
        }
    }

    fn message(id: u64, body: &str) -> Message {
        let raw: Map<String, Value> = match json!({ "id": id, "message": body }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        Message::from_raw(raw, Utc::now()).unwrap()
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn parsers_run_in_registration_order_for_every_message() {
        let registry = DispatchRegistry::new();
        let calls = log();
        for name in ["first", "second", "third"] {
            let calls = Arc::clone(&calls);
            registry.register_parser(move |m: &Message| {
                calls.lock().unwrap().push(format!("{name}:{}", m.id()));
                Ok(())
            });
        }

        registry.dispatch(&message(1, "no command here"));
        registry.dispatch(&message(2, ""));

        assert_eq!(
            entries(&calls),
            vec!["first:1", "second:1", "third:1", "first:2", "second:2", "third:2"]
        );
    }

    #[test]
    fn matching_command_receives_all_tokens() {
        let registry = DispatchRegistry::new();
        let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.register_command("deploy", move |tokens: &[String], _: &Message| {
            sink.lock().unwrap().push(tokens.to_vec());
            Ok(())
        });

        let report = registry.dispatch(&message(1, "deploy  web\tprod"));

        assert!(report.matched);
        assert_eq!(report.command, "deploy");
        assert_eq!(*seen.lock().unwrap(), vec![vec!["deploy", "web", "prod"]]);
    }

    #[test]
    fn unmatched_command_is_not_an_error() {
        let registry = DispatchRegistry::new();
        let calls = log();
        let sink = Arc::clone(&calls);
        registry.register_command("deploy", move |_: &[String], _: &Message| {
            sink.lock().unwrap().push("deploy".into());
            Ok(())
        });

        let report = registry.dispatch(&message(1, "hello world"));

        assert!(!report.matched);
        assert_eq!(report.failures, 0);
        assert!(entries(&calls).is_empty());
    }

    #[test]
    fn empty_body_uses_empty_command_name() {
        let registry = DispatchRegistry::new();
        let report = registry.dispatch(&message(1, "   "));
        assert_eq!(report.command, "");
        assert!(!report.matched);
    }

    #[test]
    fn re_registering_replaces_the_handler() {
        let registry = DispatchRegistry::new();
        let calls = log();

        let old = Arc::clone(&calls);
        registry.register_command("ping", move |_: &[String], _: &Message| {
            old.lock().unwrap().push("old".into());
            Ok(())
        });
        let new = Arc::clone(&calls);
        registry.register_command("ping", move |_: &[String], _: &Message| {
            new.lock().unwrap().push("new".into());
            Ok(())
        });

        registry.dispatch(&message(1, "ping"));
        registry.dispatch(&message(2, "ping"));

        assert_eq!(entries(&calls), vec!["new", "new"]);
    }

    #[test]
    fn registration_returns_the_callable() {
        fn greet(_: &[String], _: &Message) -> HandlerResult {
            Ok(())
        }

        let registry = DispatchRegistry::new();
        let returned = registry.register_command("greet", greet);
        assert!(returned(&[], &message(1, "greet")).is_ok());
        assert!(registry.has_command("greet"));
    }

    #[test]
    fn failing_handler_does_not_stop_parsers() {
        let registry = DispatchRegistry::new();
        let calls = log();

        registry.register_command("boom", |_: &[String], _: &Message| {
            Err("handler exploded".into())
        });
        registry.register_parser(|_: &Message| panic!("parser exploded"));
        let sink = Arc::clone(&calls);
        registry.register_parser(move |m: &Message| {
            sink.lock().unwrap().push(format!("after:{}", m.id()));
            Ok(())
        });

        let first = registry.dispatch(&message(1, "boom now"));
        let second = registry.dispatch(&message(2, "boom again"));

        assert_eq!(first.failures, 2);
        assert_eq!(second.failures, 2);
        assert_eq!(entries(&calls), vec!["after:1", "after:2"]);
    }

    #[test]
    fn command_parser_runs_only_for_its_command() {
        let registry = DispatchRegistry::new();
        let calls = log();
        let sink = Arc::clone(&calls);
        registry.register_command_parser("alert", move |m: &Message| {
            sink.lock().unwrap().push(m.body().to_owned());
            Ok(())
        });

        registry.dispatch(&message(1, "alert disk full"));
        registry.dispatch(&message(2, "other thing"));

        assert_eq!(entries(&calls), vec!["alert disk full"]);
    }

    #[test]
    fn shell_commands_render_with_tokens() {
        let shell = Arc::new(RecordingShell::default());
        let registry = DispatchRegistry::with_shell_executor(Arc::clone(&shell) as Arc<dyn ShellExecutor>);
        registry.register_shell_command("notify", ShellTemplate::new("notify-send {@}"));

        let report = registry.dispatch(&message(1, "notify backup finished"));

        assert!(report.matched);
        assert_eq!(*shell.lines.lock().unwrap(), vec!["notify-send backup finished"]);
    }

    #[test]
    fn aliases_resolve_to_their_target() {
        let shell = Arc::new(RecordingShell::default());
        let registry = DispatchRegistry::with_shell_executor(Arc::clone(&shell) as Arc<dyn ShellExecutor>);
        registry.register_shell_command("lock-screen", ShellTemplate::new("loginctl lock-session"));
        registry.register_shell_command_alias("lock", "lock-screen");
        registry.register_shell_command_alias("dangling", "missing");

        assert!(registry.dispatch(&message(1, "lock")).matched);
        assert!(!registry.dispatch(&message(2, "dangling")).matched);
        assert_eq!(*shell.lines.lock().unwrap(), vec!["loginctl lock-session"]);
        assert_eq!(registry.command_names(), vec!["dangling", "lock", "lock-screen"]);
    }

    #[test]
    fn shell_failures_are_isolated() {
        struct BrokenShell;
        impl ShellExecutor for BrokenShell {
            fn execute(&self, _: &str) -> std::io::Result<()> {
                Err(std::io::Error::other("no shell"))
            }
        }

        let registry = DispatchRegistry::with_shell_executor(Arc::new(BrokenShell));
        registry.register_shell_command("run", ShellTemplate::passthrough("true"));
        let calls = log();
        let sink = Arc::clone(&calls);
        registry.register_parser(move |_: &Message| {
            sink.lock().unwrap().push("parsed".into());
            Ok(())
        });

        let report = registry.dispatch(&message(1, "run"));
        assert_eq!(report.failures, 1);
        assert_eq!(entries(&calls), vec!["parsed"]);
    }

    #[test]
    fn raw_data_command_scenario() {
        let registry = DispatchRegistry::new();
        let tokens_seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let payloads = log();

        let sink = Arc::clone(&tokens_seen);
        let raw_sink = Arc::clone(&payloads);
        registry.register_command("mycmd_rawdata", move |tokens: &[String], m: &Message| {
            sink.lock().unwrap().extend(tokens.iter().cloned());
            raw_sink.lock().unwrap().push(format!("cmd:{}", m.raw()["message"]));
            Ok(())
        });
        for name in ["notify", "print"] {
            let sink = Arc::clone(&payloads);
            registry.register_parser(move |m: &Message| {
                sink.lock().unwrap().push(format!("{name}:{}", m.raw()["message"]));
                Ok(())
            });
        }

        registry.dispatch(&message(7, "mycmd_rawdata hello world"));

        assert_eq!(
            *tokens_seen.lock().unwrap(),
            vec!["mycmd_rawdata", "hello", "world"]
        );
        assert_eq!(
            entries(&payloads),
            vec![
                r#"cmd:"mycmd_rawdata hello world""#,
                r#"notify:"mycmd_rawdata hello world""#,
                r#"print:"mycmd_rawdata hello world""#,
            ]
        );
    }

    #[test]
    fn global_registry_is_shared() {
        let a = DispatchRegistry::global();
        let b = DispatchRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
