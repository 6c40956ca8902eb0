//! External tool pipelines.
//!
//! A [`CommandChain`] is an ordered list of [`Command`]s whose standard
//! streams are wired together with anonymous pipes: the stdout of stage `i`
//! becomes the stdin of stage `i + 1`. Every stage is started before any
//! output is read, and the last stage's stdout is exposed as an
//! [`AsyncRead`](tokio::io::AsyncRead).
//!
//! Children are spawned with `kill_on_drop`, so dropping a [`RunningChain`]
//! or [`ChainHandle`] (client went away, spawn of a later stage failed)
//! terminates every stage and hands it to the runtime to be reaped.
//!
//! ```no_run
//! # async fn run() -> htsget_refserver::Result<()> {
//! use htsget_refserver::pipeline::{Command, CommandChain};
//!
//! let chain = CommandChain::new()
//!     .then(Command::new("samtools").args(["view", "-h", "in.bam", "chr1"]))
//!     .then(Command::new("samtools").args(["view", "-b", "-"]));
//! let bytes = chain.output().await?;
//! # Ok(())
//! # }
//! ```

pub mod trim;

use crate::{Error, Result};
use std::fmt;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout};

/// A single, not yet executed, program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    program: String,
    args: Vec<String>,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandChain {
    commands: Vec<Command>,
}

impl From<Command> for CommandChain {
    fn from(command: Command) -> Self {
        Self {
            commands: vec![command],
        }
    }
}

impl fmt::Display for CommandChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, command) in self.commands.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}", command)?;
        }
        Ok(())
    }
}

impl CommandChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage reading the previous stage's output.
    pub fn then(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Start every stage, wiring stdout to the next stage's stdin.
    ///
    /// If any stage fails to start, the stages already running are killed and
    /// the whole chain fails.
    pub fn spawn(&self) -> Result<RunningChain> {
        let Some((last, upstream)) = self.commands.split_last() else {
            return Err(Error::Internal("cannot run an empty command chain".to_string()));
        };

        tracing::debug!(chain = %self, "starting pipeline");

        let mut stages = Vec::with_capacity(self.commands.len());
        let mut stdin = Stdio::null();

        for command in upstream {
            let mut child = start(command, stdin)?;
            let stdout = take_stdout(&mut child, command)?;
            stages.push(Stage::new(command, child));
            stdin = stdout.try_into().map_err(|e: std::io::Error| {
                Error::Internal(format!("failed to wire output of {}: {}", command.program, e))
            })?;
        }

        let mut child = start(last, stdin)?;
        let stdout = take_stdout(&mut child, last)?;
        stages.push(Stage::new(last, child));

        Ok(RunningChain {
            stdout,
            handle: ChainHandle { stages },
        })
    }

    /// Run the chain to completion and collect the final stage's output.
    pub async fn output(&self) -> Result<Vec<u8>> {
        let (mut stdout, handle) = self.spawn()?.into_parts();
        let mut buf = Vec::new();
        stdout.read_to_end(&mut buf).await?;
        drop(stdout);
        handle.wait().await?;
        Ok(buf)
    }
}

fn start(command: &Command, stdin: Stdio) -> Result<Child> {
    tokio::process::Command::new(&command.program)
        .args(&command.args)
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Internal(format!("failed to start {}: {}", command.program, e)))
}

fn take_stdout(child: &mut Child, command: &Command) -> Result<ChildStdout> {
    child
        .stdout
        .take()
        .ok_or_else(|| Error::Internal(format!("no stdout captured for {}", command.program)))
}

#[derive(Debug)]
struct Stage {
    program: String,
    child: Child,
}

impl Stage {
    fn new(command: &Command, child: Child) -> Self {
        Self {
            program: command.program.clone(),
            child,
        }
    }
}

/// A started chain: the final stage's stdout plus ownership of every child.
#[derive(Debug)]
pub struct RunningChain {
    stdout: ChildStdout,
    handle: ChainHandle,
}

impl RunningChain {
    /// Split into the readable output and the handle that reaps the children.
    pub fn into_parts(self) -> (ChildStdout, ChainHandle) {
        (self.stdout, self.handle)
    }
}

/// Owns the child processes of a started chain.
#[derive(Debug)]
pub struct ChainHandle {
    stages: Vec<Stage>,
}

impl ChainHandle {
    /// Wait for every stage, in order, and fail if any exited unsuccessfully.
    ///
    /// All stages are waited on even after a failure is seen.
    pub async fn wait(self) -> Result<()> {
        let mut failure = None;

        for mut stage in self.stages {
            let status = stage.child.wait().await.map_err(|e| {
                Error::Internal(format!("failed to wait for {}: {}", stage.program, e))
            })?;

            if status.success() {
                tracing::debug!(program = %stage.program, "pipeline stage finished");
            } else {
                tracing::warn!(program = %stage.program, %status, "pipeline stage failed");
                failure.get_or_insert_with(|| format!("{} exited with {}", stage.program, status));
            }
        }

        match failure {
            Some(message) => Err(Error::Internal(message)),
            None => Ok(()),
        }
    }
}
