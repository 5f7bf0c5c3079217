//! Terminal echo sink

use colored::*;
use whisk_runner::{EchoSink, Stream};

/// Prints `[job id] message` to the matching terminal stream
pub struct TerminalEcho;

impl EchoSink for TerminalEcho {
    fn echo(&self, message: &str, stream: Stream, job_id: &str) {
        let prefix = format!("[{}]", job_id).dimmed();
        match stream {
            Stream::Stdout => println!("{} {}", prefix, message),
            Stream::Stderr => eprintln!("{} {}", prefix, message),
        }
    }
}
