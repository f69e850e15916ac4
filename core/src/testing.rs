//! In-memory stand-ins for the network and the `joplin` binary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::io;
use std::sync::{Arc, Mutex};

use crate::cli::{CliOutput, CommandRunner};
use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, Transport};

/// Records every request and answers each with the same canned response.
#[derive(Debug)]
pub struct RecordingTransport {
    reply: Result<HttpResponse, String>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl RecordingTransport {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            reply: Ok(HttpResponse {
                status,
                headers: Vec::new(),
                body: body.as_bytes().to_vec(),
            }),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(body: &str) -> Self {
        Self::new(200, body)
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Transport for RecordingTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.sent.lock().unwrap().push(request);
        self.reply.clone().map_err(TransportError::from)
    }
}

/// Answers by subcommand (the argument after `--profile <path>`); anything
/// unscripted succeeds with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    replies: HashMap<String, CliOutput>,
    unspawnable: bool,
    calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, subcommand: &str, stdout: &str) -> Self {
        self.replies.insert(
            subcommand.to_string(),
            CliOutput {
                stdout: stdout.to_string(),
                ..CliOutput::default()
            },
        );
        self
    }

    pub fn fail(mut self, subcommand: &str, exit_code: i32, stderr: &str) -> Self {
        self.replies.insert(
            subcommand.to_string(),
            CliOutput {
                stdout: String::new(),
                stderr: stderr.to_string(),
                exit_code,
            },
        );
        self
    }

    pub fn unspawnable(mut self) -> Self {
        self.unspawnable = true;
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().iter().map(|(_, args)| args.clone()).collect()
    }

    pub fn programs(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &Path, args: &[String]) -> io::Result<CliOutput> {
        if self.unspawnable {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such binary"));
        }
        self.calls
            .lock()
            .unwrap()
            .push((program.to_path_buf(), args.to_vec()));
        let subcommand = args.get(2).map(String::as_str).unwrap_or_default();
        Ok(self.replies.get(subcommand).cloned().unwrap_or_default())
    }
}

/// Collects formatted `tracing` output so tests can inspect what was logged.
#[derive(Debug, Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// A subscriber recording every level into this buffer.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let sink = self.clone();
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
