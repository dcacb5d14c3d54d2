use crate::command::{run_command, CommandError};
use std::time::Duration;
use tracing::debug;

/// An AppleScript program, one statement per line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Script {
    lines: Vec<String>,
}

impl Script {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Interpreter arguments: one `-e <statement>` pair per line
    pub fn args(&self) -> Vec<&str> {
        self.lines
            .iter()
            .flat_map(|line| ["-e", line.as_str()])
            .collect()
    }

    /// The equivalent shell invocation, with every statement single-quoted
    pub fn command_line(&self, program: &str) -> String {
        let mut command = program.to_string();
        for line in &self.lines {
            command.push_str(" -e ");
            command.push_str(&shell_quote(line));
        }
        command
    }
}

/// Single-quote for POSIX shells; an embedded `'` becomes `'\''`
fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Runs scripts through `osascript`
#[derive(Clone, Debug)]
pub struct OsaScript {
    program: String,
    timeout: Duration,
}

impl OsaScript {
    pub fn new(timeout: Duration) -> Self {
        Self::with_program("osascript", timeout)
    }

    pub fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Execute `script` and return its trimmed standard output
    pub async fn run(&self, script: &Script) -> Result<String, ScriptError> {
        debug!("{}", script.command_line(&self.program));

        let output = run_command(&self.program, &script.args(), self.timeout).await?;
        if !output.status.success() {
            return Err(ScriptError::Failed {
                status: output.status.to_string(),
                stderr: output.stderr,
            });
        }

        Ok(output.stdout.trim().to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("script exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}
