//! CLI dispatcher driving the `joplin` terminal binary.
//!
//! # Design
//! Commands are argument vectors, never shell strings: `CliCommand` collects
//! arguments and `JoplinCli::run` prepends `--profile <path>` before handing
//! the vector to a `CommandRunner`. Titles with spaces or quotes therefore
//! need no escaping.
//!
//! The CLI's `mknote` does not print the id it created, so `create_note` is a
//! short saga: select the folder, create a blank note, list the newest note to
//! recover its id, then set the remaining properties one command at a time.
//! Any step that exits non-zero aborts the saga with `CommandFailed` and no
//! later step runs. Nothing is rolled back: a blank note created before the
//! failure stays in the profile.

use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};

use serde_json::Value;
use tracing::{debug, warn, Span};

use crate::cancel::CancelToken;
use crate::config::CliConfig;
use crate::error::{ApiError, Result};
use crate::payload::NoteOptions;

/// Captured result of one CLI invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CliOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// One `joplin` subcommand and its arguments, without the profile prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliCommand {
    args: Vec<String>,
}

impl CliCommand {
    pub fn new(subcommand: &str) -> Self {
        Self {
            args: vec![subcommand.to_string()],
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn subcommand(&self) -> &str {
        &self.args[0]
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CliCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.args.join(" "))
    }
}

/// Spawns a program and waits for it.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &Path, args: &[String]) -> std::io::Result<CliOutput>;
}

/// Runs commands as real child processes. stdin is closed so an interactive
/// prompt fails instead of hanging.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &Path, args: &[String]) -> std::io::Result<CliOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;
        Ok(CliOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            // Killed by a signal.
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Stage of `JoplinCli::create_note` that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaStep {
    SelectFolder,
    CreateNote,
    FindNewest,
    SetProperty,
    AttachTag,
}

impl fmt::Display for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SagaStep::SelectFolder => "use",
            SagaStep::CreateNote => "mknote",
            SagaStep::FindNewest => "ls",
            SagaStep::SetProperty => "set",
            SagaStep::AttachTag => "tag",
        };
        f.write_str(name)
    }
}

/// Item kinds accepted by `ls -t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Note,
    Todo,
}

impl ItemType {
    fn flag(self) -> &'static str {
        match self {
            ItemType::Note => "n",
            ItemType::Todo => "t",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoAction {
    Toggle,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    Add,
    Remove,
    List,
}

impl TagAction {
    fn as_str(self) -> &'static str {
        match self {
            TagAction::Add => "add",
            TagAction::Remove => "remove",
            TagAction::List => "list",
        }
    }
}

#[derive(Debug)]
pub struct JoplinCli<R = ProcessRunner> {
    config: CliConfig,
    runner: R,
    cancel: CancelToken,
    span: Span,
}

impl JoplinCli<ProcessRunner> {
    pub fn new(config: CliConfig) -> Self {
        Self::with_runner(config, ProcessRunner)
    }
}

impl<R: CommandRunner> JoplinCli<R> {
    pub fn with_runner(config: CliConfig, runner: R) -> Self {
        let span = tracing::info_span!("joplin_cli", profile = %config.profile.display());
        Self {
            config,
            runner,
            cancel: CancelToken::new(),
            span,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Full argument vector for `command`, profile prefix included.
    pub fn argv(&self, command: &CliCommand) -> Vec<String> {
        let mut argv = Vec::with_capacity(command.args().len() + 2);
        argv.push("--profile".to_string());
        argv.push(self.config.profile.to_string_lossy().into_owned());
        argv.extend(command.args().iter().cloned());
        argv
    }

    /// Run one command and return its output, whatever the exit code.
    pub fn run(&self, command: &CliCommand) -> Result<CliOutput> {
        self.cancel.check()?;
        debug!(parent: &self.span, command = %command, "running joplin");
        let output = self
            .runner
            .run(&self.config.binary, &self.argv(command))
            .map_err(|source| ApiError::Process {
                program: self.config.binary.clone(),
                source,
            })?;
        debug!(parent: &self.span, command = command.subcommand(), exit_code = output.exit_code, "joplin exited");
        Ok(output)
    }

    // ---------------------------------------------------------------------
    // Single commands
    // ---------------------------------------------------------------------

    /// `ls -n 1 -s created_time -t <type> -f json`: newest item in the current folder.
    pub fn ls_newest(&self, item_type: ItemType) -> Result<CliOutput> {
        let command = CliCommand::new("ls")
            .arg("-n")
            .arg("1")
            .arg("-s")
            .arg("created_time")
            .arg("-t")
            .arg(item_type.flag())
            .arg("-f")
            .arg("json");
        self.run(&command)
    }

    pub fn mknote(&self, title: &str) -> Result<CliOutput> {
        self.run(&CliCommand::new("mknote").arg(title))
    }

    pub fn set(&self, id: &str, field: &str, value: &str) -> Result<CliOutput> {
        self.run(&CliCommand::new("set").arg(id).arg(field).arg(value))
    }

    pub fn rmnote(&self, id: &str) -> Result<CliOutput> {
        self.run(&CliCommand::new("rmnote").arg(id))
    }

    pub fn mkbook(&self, name: &str) -> Result<CliOutput> {
        self.run(&CliCommand::new("mkbook").arg(name))
    }

    pub fn rmbook(&self, name: &str) -> Result<CliOutput> {
        self.run(&CliCommand::new("rmbook").arg(name))
    }

    /// Make `name` the current folder for later commands.
    pub fn use_folder(&self, name: &str) -> Result<CliOutput> {
        self.run(&CliCommand::new("use").arg(name))
    }

    pub fn todo(&self, action: TodoAction, id: &str) -> Result<CliOutput> {
        let action = match action {
            TodoAction::Toggle => "toggle",
            TodoAction::Clear => "clear",
        };
        self.run(&CliCommand::new("todo").arg(action).arg(id))
    }

    pub fn done(&self, id: &str) -> Result<CliOutput> {
        self.run(&CliCommand::new("done").arg(id))
    }

    pub fn undone(&self, id: &str) -> Result<CliOutput> {
        self.run(&CliCommand::new("undone").arg(id))
    }

    pub fn ren(&self, id: &str, name: &str) -> Result<CliOutput> {
        self.run(&CliCommand::new("ren").arg(id).arg(name))
    }

    pub fn tag(&self, action: TagAction, tag: &str, note: &str) -> Result<CliOutput> {
        self.run(&CliCommand::new("tag").arg(action.as_str()).arg(tag).arg(note))
    }

    pub fn version(&self) -> Result<CliOutput> {
        self.run(&CliCommand::new("version"))
    }

    pub fn config_set(&self, name: &str, value: &str) -> Result<CliOutput> {
        self.run(&CliCommand::new("config").arg(name).arg(value))
    }

    // ---------------------------------------------------------------------
    // Compound operations
    // ---------------------------------------------------------------------

    /// One `set` per field, in order. Stops at the first non-zero exit and
    /// returns that output; otherwise returns the last command's output.
    pub fn set_properties(&self, id: &str, fields: &[(&str, &str)]) -> Result<CliOutput> {
        let mut last = None;
        for (field, value) in fields {
            let output = self.set(id, field, value)?;
            if !output.success() {
                return Ok(output);
            }
            last = Some(output);
        }
        last.ok_or_else(|| ApiError::invalid("no properties to set"))
    }

    /// Id of the newest item of `item_type` in the current folder.
    pub fn newest_id(&self, item_type: ItemType) -> Result<String> {
        let output = self.ls_newest(item_type)?;
        if !output.success() {
            return Err(ApiError::CommandFailed {
                step: SagaStep::FindNewest,
                output,
            });
        }
        first_id(&output.stdout)
    }

    /// Create a note in `folder` and fill in its body and options.
    ///
    /// Returns the output of the last command issued. If any step exits
    /// non-zero the saga stops there with `CommandFailed`.
    pub fn create_note(&self, title: &str, body: &str, folder: &str, options: &NoteOptions) -> Result<CliOutput> {
        self.step(SagaStep::SelectFolder, &CliCommand::new("use").arg(folder))?;
        self.step(SagaStep::CreateNote, &CliCommand::new("mknote").arg(title))?;

        let id = self.newest_id(ItemType::Note).inspect_err(|_| {
            warn!(parent: &self.span, title = %title, "note id not recovered; blank note left in profile");
        })?;
        debug!(parent: &self.span, id = %id, "recovered new note id");

        let is_todo = options.is_todo.to_string();
        let mut fields = vec![("body", body)];
        if !options.author.is_empty() {
            fields.push(("author", options.author.as_str()));
        }
        if !options.source_url.is_empty() {
            fields.push(("source_url", options.source_url.as_str()));
        }
        if options.is_todo != 0 {
            fields.push(("is_todo", is_todo.as_str()));
        }

        let commands = fields
            .into_iter()
            .map(|(field, value)| {
                let command = CliCommand::new("set").arg(id.as_str()).arg(field).arg(value);
                (SagaStep::SetProperty, command)
            })
            .chain(options.tag_list().into_iter().map(|tag| {
                let command = CliCommand::new("tag")
                    .arg(TagAction::Add.as_str())
                    .arg(tag)
                    .arg(id.as_str());
                (SagaStep::AttachTag, command)
            }));

        let mut last = CliOutput::default();
        for (step, command) in commands {
            last = self.step(step, &command).inspect_err(|_| {
                warn!(parent: &self.span, id = %id, "note creation aborted; blank note left in profile");
            })?;
        }
        Ok(last)
    }

    fn step(&self, step: SagaStep, command: &CliCommand) -> Result<CliOutput> {
        let output = self.run(command)?;
        if !output.success() {
            return Err(ApiError::CommandFailed { step, output });
        }
        Ok(output)
    }
}

/// Pull the `id` of the first entry out of `ls -f json` output.
///
/// The whole stdout is tried first, then each line, since the CLI may print
/// banner lines around the JSON.
fn first_id(stdout: &str) -> Result<String> {
    let parsed = std::iter::once(stdout)
        .chain(stdout.lines())
        .filter_map(|chunk| serde_json::from_str::<Value>(chunk.trim()).ok())
        .find_map(|value| {
            let entry = match value {
                Value::Array(items) => items.into_iter().next()?,
                other => other,
            };
            entry.get("id")?.as_str().map(str::to_string)
        });
    parsed.ok_or_else(|| ApiError::UnexpectedOutput(format!("no note id in listing: {:?}", stdout.trim())))
}
