use std::io::{self, Write};

use colored::Colorize;
use sidecar_core::{SessionEvent, TokenUsageStats};

/// Prints session events as they arrive.
#[derive(Debug, Default)]
pub struct Printer {
    streaming: bool,
}

impl Printer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::TurnStarted { .. } => {
                println!("{}", "Gemini:".green().bold());
                self.streaming = true;
            }
            SessionEvent::Token { content, .. } => {
                print!("{}", content);
                let _ = io::stdout().flush();
            }
            SessionEvent::AttachmentsReceived { count, .. } => {
                self.end_line();
                println!("{}", format!("🖼️  {} image(s) received", count).cyan());
                self.streaming = true;
            }
            SessionEvent::TurnCompleted { .. } => self.end_line(),
            SessionEvent::TurnStopped { .. } => {
                self.end_line();
                println!("{}", "🛑 Stopped.".yellow());
            }
            SessionEvent::TurnFailed { .. } => self.end_line(),
            SessionEvent::Notice { content } => {
                self.end_line();
                if content.starts_with('❌') {
                    println!("{}", content.red());
                } else {
                    println!("{}", content.yellow());
                }
            }
            SessionEvent::UsageUpdated { usage } => {
                if usage.is_critical {
                    self.end_line();
                    println!("{}", usage_line(&usage).red());
                } else if usage.is_warning {
                    self.end_line();
                    println!("{}", usage_line(&usage).yellow());
                } else {
                    log::debug!("{}", usage_line(&usage));
                }
            }
        }
    }

    fn end_line(&mut self) {
        if self.streaming {
            println!();
            self.streaming = false;
        }
    }
}

pub fn usage_line(usage: &TokenUsageStats) -> String {
    format!(
        "📊 Context: {} / {} tokens ({:.1}%), {} image(s)",
        usage.used, usage.total, usage.percentage, usage.image_count
    )
}

pub fn print_usage(usage: &TokenUsageStats) {
    let line = usage_line(usage);
    if usage.is_critical {
        println!("{}", line.red());
    } else if usage.is_warning {
        println!("{}", line.yellow());
    } else {
        println!("{}", line.dimmed());
    }
}
