#![expect(clippy::print_stdout, reason = "CLI output is emitted here")]
#![expect(clippy::print_stderr, reason = "CLI output is emitted here")]

//! CLI output presenter.

use std::io::Write;
use std::path::Path;

use clap::ValueEnum;
use termhost_common::Colors;
use termhost_common::Tint;
use termhost_common::tint;

use crate::domain::IoEvent;
use crate::domain::OutputStream;

const PROGRAM_NAME: &str = "termhost";
const PROMPT_MAX_CWD: usize = 30;
const PROMPT_TAIL: usize = 27;

#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// The shell prompt for `cwd`. Long paths keep only their last 27
/// characters behind `...`.
pub fn prompt(cwd: &Path) -> String {
    format!("{} ", tint(&format!("{} $", shorten_cwd(cwd)), Tint::BoldGreen))
}

fn shorten_cwd(cwd: &Path) -> String {
    let display = cwd.display().to_string();
    let len = display.chars().count();
    if len <= PROMPT_MAX_CWD {
        return display;
    }
    let tail: String = display.chars().skip(len - PROMPT_TAIL).collect();
    format!("...{tail}")
}

pub trait Presenter {
    fn present_event(&self, event: &IoEvent);

    fn present_candidates(&self, candidates: &[String]);

    fn present_error(&self, message: &str);

    fn present_info(&self, message: &str);
}

pub fn presenter_for(format: OutputFormat) -> Box<dyn Presenter> {
    match format {
        OutputFormat::Text => Box::new(TextPresenter),
        OutputFormat::Json => Box::new(JsonPresenter),
    }
}

pub struct TextPresenter;

impl Presenter for TextPresenter {
    fn present_event(&self, event: &IoEvent) {
        match event {
            IoEvent::Output {
                stream: OutputStream::Stdout,
                data,
                ..
            } => {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(data.as_bytes());
                let _ = stdout.flush();
            }
            IoEvent::Output {
                stream: OutputStream::Stderr,
                data,
                ..
            } => {
                let mut stderr = std::io::stderr().lock();
                let _ = stderr.write_all(data.as_bytes());
                let _ = stderr.flush();
            }
            IoEvent::Error { message, .. } => self.present_error(message),
            IoEvent::CwdChanged { new_path, .. } => {
                println!("{} {}", Colors::dim("cwd:"), new_path.display());
            }
            IoEvent::ServerLog { message, .. } => println!("{message}"),
            IoEvent::Close { exit_code, .. } => {
                if *exit_code != 0 {
                    eprintln!("{}", Colors::dim(&format!("[exit {exit_code}]")));
                }
            }
        }
    }

    fn present_candidates(&self, candidates: &[String]) {
        for candidate in candidates {
            println!("{candidate}");
        }
    }

    fn present_error(&self, message: &str) {
        eprintln!("{}: {} {}", PROGRAM_NAME, Colors::error("Error:"), message);
    }

    fn present_info(&self, message: &str) {
        println!("{}", Colors::info(message));
    }
}

/// One JSON object per line, the same shape the host protocol uses.
pub struct JsonPresenter;

impl Presenter for JsonPresenter {
    fn present_event(&self, event: &IoEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => eprintln!("{PROGRAM_NAME}: failed to encode event: {err}"),
        }
    }

    fn present_candidates(&self, candidates: &[String]) {
        println!("{}", serde_json::json!({ "candidates": candidates }));
    }

    fn present_error(&self, message: &str) {
        eprintln!("{}", serde_json::json!({ "error": message }));
    }

    fn present_info(&self, message: &str) {
        println!("{}", serde_json::json!({ "info": message }));
    }
}
