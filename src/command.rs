use anyhow::{Context, Result};
use log::{debug, info};
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// A complete process environment as key/value pairs
pub type Environment = Vec<(OsString, OsString)>;

/// Shell used to run the generated scripts
pub const SHELL: &str = "/bin/sh";

/// Command execution context
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    /// Current working directory
    pub working_dir: Option<String>,
    /// Complete environment replacing the inherited one
    pub environment: Option<Environment>,
    /// Log the command instead of running it
    pub dry_run: bool,
}

/// Builder for CommandExecutor
pub struct CommandExecutorBuilder {
    context: CommandContext,
}

impl Default for CommandExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutorBuilder {
    /// Create a new CommandExecutorBuilder with default settings
    pub fn new() -> Self {
        Self {
            context: CommandContext::default(),
        }
    }

    /// Set the working directory
    pub fn working_dir<P: AsRef<Path>>(mut self, dir: Option<P>) -> Self {
        self.context.working_dir = dir.map(|d| d.as_ref().to_string_lossy().to_string());
        self
    }

    /// Replace the inherited environment with the given entries
    pub fn environment(mut self, env: Option<Environment>) -> Self {
        self.context.environment = env;
        self
    }

    /// Only log commands instead of executing them
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.context.dry_run = dry_run;
        self
    }

    /// Build the CommandExecutor
    pub fn build(self) -> Result<CommandExecutor> {
        if let Some(env) = &self.context.environment {
            if let Some((bad, _)) = env
                .iter()
                .find(|(key, _)| key.is_empty() || key.to_string_lossy().contains('='))
            {
                anyhow::bail!("Malformed environment variable name: {bad:?}");
            }
        }

        Ok(CommandExecutor {
            context: self.context,
        })
    }
}

/// Runs external commands to completion, capturing their output
pub struct CommandExecutor {
    context: CommandContext,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor {
    /// Create a new CommandExecutor with default settings
    pub fn new() -> Self {
        Self {
            context: CommandContext::default(),
        }
    }

    /// Create a builder for CommandExecutor with fluent configuration
    pub fn builder() -> CommandExecutorBuilder {
        CommandExecutorBuilder::new()
    }

    pub fn is_dry_run(&self) -> bool {
        self.context.dry_run
    }

    /// Run a generated script through the shell
    pub fn execute_script(&self, script: &Path, args: &[&str]) -> Result<Option<Output>> {
        let script = script.to_string_lossy();
        let mut full_args = Vec::with_capacity(args.len() + 1);
        full_args.push(script.as_ref());
        full_args.extend_from_slice(args);
        self.execute_command_with_args(SHELL, &full_args)
    }

    /// Execute a command with arguments and wait for it to complete.
    ///
    /// Returns `None` without launching anything in dry-run mode. A non-zero
    /// exit status is an error naming the last line the command printed; the
    /// full output goes to the debug log.
    pub fn execute_command_with_args(&self, cmd: &str, args: &[&str]) -> Result<Option<Output>> {
        let command_str = format_command(cmd, args);
        if self.context.dry_run {
            info!("dryrun: {command_str}");
            return Ok(None);
        }
        debug!("Launching command: {command_str}");

        let mut command = Command::new(cmd);
        command.args(args);

        if let Some(dir) = &self.context.working_dir {
            command.current_dir(dir);
        }

        if let Some(env) = &self.context.environment {
            command.env_clear();
            command.envs(env.clone());
        }

        command.stdin(Stdio::null());
        let output = command
            .output()
            .with_context(|| format!("Failed to spawn command: {command_str}"))?;

        if !output.status.success() {
            let text = combined_output(&output);
            debug!("... output of failed command {command_str}:\n{text}");
            let code = output.status.code().unwrap_or(-1);
            match last_line(&text) {
                Some(line) => {
                    anyhow::bail!("Command failed with status {code}: {command_str}: {line}")
                }
                None => anyhow::bail!("Command failed with status {code}: {command_str}"),
            }
        }

        Ok(Some(output))
    }
}

/// Format command and arguments for logging
fn format_command(cmd: &str, args: &[&str]) -> String {
    format!("{} {}", cmd, args.join(" "))
}

/// Last non-blank line of some command output
fn last_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|line| !line.is_empty())
}

/// Standard output followed by standard error, lossily decoded
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}
