//! Subprocess execution backend
//!
//! Bridges to an external code-execution agent. Each run spawns the
//! configured program, writes a JSON request to its stdin and reads its
//! stdout back as result records. The agent runs with the same privileges
//! as Ferry and may touch any file the user can.
//!
//! Request written to stdin:
//!
//! ```json
//! {"task": "...", "messages": [...], "settings": {...}}
//! ```
//!
//! Accepted stdout shapes, tried in order:
//! 1. One JSON array of records
//! 2. One JSON value per line (lines that are not JSON become text records)
//! 3. Plain text, taken as a single `output` record
//!
//! The timeout covers the whole exchange, including writing the request. An
//! agent that exits without reading its request is an error.

use sdk::errors::EngineError;
use sdk::execution::{ExecutionBackend, ExecutionSettings, ResultRecord};
use serde::Serialize;
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    task: &'a str,
    messages: &'a [Value],
    settings: &'a ExecutionSettings,
}

/// Execution backend that runs an external agent program
#[derive(Debug)]
pub struct SubprocessBackend {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    settings: ExecutionSettings,
    /// Prior turns forwarded as `messages`
    ///
    /// `ExecutionAdapter` resets before every task, so through the adapter
    /// this is always empty. Callers driving the backend directly can chain
    /// runs to give the agent follow-up context.
    messages: Vec<Value>,
}

impl SubprocessBackend {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
        settings: ExecutionSettings,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            settings,
            messages: Vec::new(),
        }
    }

    /// Turns the next run would forward
    pub fn messages(&self) -> &[Value] {
        &self.messages
    }

    fn spawn_and_wait(&self, payload: Vec<u8>) -> Result<String, EngineError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                EngineError::Execution(format!("Failed to start {}: {}", self.program, e))
            })?;

        // Every pipe gets its own thread so the deadline below covers all I/O
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());
        let stdin_writer = feed(child.stdin.take(), payload);

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!(
                    "{} exceeded {}s, killing it",
                    self.program,
                    self.timeout.as_secs()
                );
                let _ = child.kill();
                let _ = child.wait();
                return Err(EngineError::ExecutionTimeout(self.timeout.as_secs()));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(EngineError::Execution(format!(
                    "Failed waiting for {}: {}",
                    self.program, e
                )));
            }
        };

        let stdout = join_output(stdout_reader)?;
        let stderr = join_output(stderr_reader)?;
        let written = stdin_writer
            .join()
            .map_err(|_| EngineError::Execution("Request writer panicked".to_string()))?;

        if !status.success() {
            return Err(EngineError::Execution(format!(
                "{} exited with {}: {}",
                self.program,
                status,
                stderr.trim()
            )));
        }
        if let Err(e) = written {
            return Err(EngineError::Execution(format!(
                "{} exited without reading the request: {}",
                self.program, e
            )));
        }
        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", self.program, stderr.trim());
        }
        Ok(stdout)
    }
}

impl ExecutionBackend for SubprocessBackend {
    fn name(&self) -> &str {
        &self.program
    }

    fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    fn reset(&mut self) -> Result<(), EngineError> {
        self.messages.clear();
        Ok(())
    }

    fn run(&mut self, task: &str) -> Result<Vec<ResultRecord>, EngineError> {
        let request = RunRequest {
            task,
            messages: &self.messages,
            settings: &self.settings,
        };
        let payload = serde_json::to_vec(&request)
            .map_err(|e| EngineError::Execution(format!("Failed to encode request: {}", e)))?;

        let stdout = self.spawn_and_wait(payload)?;
        let records = parse_records(&stdout);

        self.messages.push(json!({"role": "user", "content": task}));
        self.messages.extend(
            records
                .iter()
                .map(|r| json!({"role": "assistant", "content": r.text()})),
        );
        Ok(records)
    }
}

/// Parse agent stdout into records
pub fn parse_records(stdout: &str) -> Vec<ResultRecord> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return match value {
            Value::Array(items) => items.into_iter().map(ResultRecord::from_value).collect(),
            other => vec![ResultRecord::from_value(other)],
        };
    }

    let lines: Vec<&str> = trimmed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let parsed: Vec<Option<Value>> = lines
        .iter()
        .map(|l| serde_json::from_str::<Value>(l).ok().filter(Value::is_object))
        .collect();

    if parsed.iter().any(Option::is_some) {
        lines
            .iter()
            .zip(parsed)
            .map(|(line, value)| match value {
                Some(value) => ResultRecord::from_value(value),
                None => ResultRecord::Opaque(Value::String((*line).to_string())),
            })
            .collect()
    } else {
        vec![ResultRecord::Output(trimmed.to_string())]
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<std::io::Result<String>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    })
}

/// Write the request and close stdin so the agent sees end of input
fn feed<W: Write + Send + 'static>(
    pipe: Option<W>,
    payload: Vec<u8>,
) -> thread::JoinHandle<std::io::Result<()>> {
    thread::spawn(move || match pipe {
        Some(mut pipe) => pipe.write_all(&payload).and_then(|_| pipe.flush()),
        None => Ok(()),
    })
}

fn join_output(
    handle: thread::JoinHandle<std::io::Result<String>>,
) -> Result<String, EngineError> {
    handle
        .join()
        .map_err(|_| EngineError::Execution("Output reader panicked".to_string()))?
        .map_err(EngineError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ExecutionSettings {
        ExecutionSettings::local_ollama("http://localhost:11434", "llama3.1:8b")
    }

    #[test]
    fn test_parse_json_array() {
        let records = parse_records(r#"[{"role":"assistant","content":"hi"},{"output":"42"}]"#);
        assert_eq!(
            records,
            vec![
                ResultRecord::Content("hi".into()),
                ResultRecord::Output("42".into())
            ]
        );
    }

    #[test]
    fn test_parse_json_lines() {
        let records = parse_records("{\"type\":\"code\"}\nrunning...\n{\"content\":\"done\"}\n");
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].text(), "running...");
        assert_eq!(records[2], ResultRecord::Content("done".into()));
    }

    #[test]
    fn test_parse_plain_text() {
        let records = parse_records("  Wrote 3 files\n");
        assert_eq!(records, vec![ResultRecord::Output("Wrote 3 files".into())]);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_records(" \n ").is_empty());
    }

    #[test]
    fn test_reset_clears_messages() {
        let mut backend = SubprocessBackend::new("true", vec![], Duration::from_secs(5), settings());
        backend.messages.push(json!({"role": "user", "content": "x"}));
        backend.reset().unwrap();
        assert!(backend.messages().is_empty());
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let mut backend = SubprocessBackend::new(
            "ferry-no-such-agent",
            vec![],
            Duration::from_secs(5),
            settings(),
        );
        let err = backend.run("list files").unwrap_err();
        assert!(matches!(err, EngineError::Execution(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reads_stdout_records() {
        let mut backend = SubprocessBackend::new(
            "sh",
            vec![
                "-c".into(),
                r#"cat > /dev/null; echo '[{"content":"listed 2 files"}]'"#.into(),
            ],
            Duration::from_secs(10),
            settings(),
        );
        let records = backend.run("list files").unwrap();
        assert_eq!(records, vec![ResultRecord::Content("listed 2 files".into())]);
        assert_eq!(backend.messages().len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_request_reaches_stdin() {
        let mut backend = SubprocessBackend::new(
            "cat",
            vec![],
            Duration::from_secs(10),
            settings(),
        );
        let records = backend.run("save notes").unwrap();
        // cat echoes the request object back
        assert_eq!(records.len(), 1);
        let ResultRecord::Opaque(value) = &records[0] else {
            panic!("expected opaque record, got {:?}", records[0]);
        };
        assert_eq!(value["task"], "save notes");
        assert_eq!(value["settings"]["model"], "ollama/llama3.1:8b");
        assert_eq!(value["settings"]["auto_run"], true);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_an_error() {
        let mut backend = SubprocessBackend::new(
            "sh",
            vec!["-c".into(), "echo boom >&2; exit 3".into()],
            Duration::from_secs(10),
            settings(),
        );
        let err = backend.run("delete temp").unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_covers_unread_request() {
        // Larger than any pipe buffer, so the write blocks until the kill
        let task = "x".repeat(256 * 1024);
        let mut backend = SubprocessBackend::new(
            "sleep",
            vec!["3".into()],
            Duration::from_millis(200),
            settings(),
        );

        let started = std::time::Instant::now();
        let err = backend.run(&task).unwrap_err();
        assert!(matches!(err, EngineError::ExecutionTimeout(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[test]
    fn test_agent_ignoring_request_is_an_error() {
        let task = "x".repeat(256 * 1024);
        let mut backend = SubprocessBackend::new("true", vec![], Duration::from_secs(10), settings());

        let err = backend.run(&task).unwrap_err();
        assert!(matches!(err, EngineError::Execution(_)));
        assert!(err.to_string().contains("without reading the request"));
        assert!(backend.messages().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_without_reset_forward_history() {
        let mut backend = SubprocessBackend::new("cat", vec![], Duration::from_secs(10), settings());

        backend.run("list files").unwrap();
        assert_eq!(backend.messages().len(), 2);
        assert_eq!(backend.messages()[0]["content"], "list files");

        // cat echoes the request, so the second reply shows what was forwarded
        let records = backend.run("delete the first one").unwrap();
        let ResultRecord::Opaque(value) = &records[0] else {
            panic!("expected opaque record, got {:?}", records[0]);
        };
        assert_eq!(value["messages"].as_array().unwrap().len(), 2);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "list files");

        backend.reset().unwrap();
        let records = backend.run("again").unwrap();
        let ResultRecord::Opaque(value) = &records[0] else {
            panic!("expected opaque record, got {:?}", records[0]);
        };
        assert!(value["messages"].as_array().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_agent() {
        let mut backend = SubprocessBackend::new(
            "sleep",
            vec!["5".into()],
            Duration::from_millis(200),
            settings(),
        );
        let err = backend.run("write a novel").unwrap_err();
        assert!(matches!(err, EngineError::ExecutionTimeout(_)));
    }
}
