//! Terminal session: slash commands, streaming output and Ctrl-C stop.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};
use colored::Colorize;
use sidecar_core::export::generate_markdown;
use sidecar_core::{ModelType, SessionEvent, TokenUsageStats};
use sidecar_session::{
    AnalyzeOutcome, QuickAction, QuickActionOutcome, SessionController, SubmitOutcome,
    SubmitRequest, TurnOutcome,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;

use crate::render::{print_usage, Printer};

const HELP: &str = "\
/clear                 clear the conversation
/optimize              remove images from the history
/usage                 show context usage
/export [path]         write the conversation as Markdown
/context <text>        set technical context for the next prompts
/capture               use the clipboard as technical context
/analyze               analyze the clipboard text as a page
/quick <action>        explain | refactor | fix | tests
/model <fast|smart>    switch model
/search                toggle search grounding
/quit                  leave (Ctrl-C stops a reply, or leaves at the prompt)";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Prompt(String),
    Clear,
    Optimize,
    Usage,
    Export(Option<PathBuf>),
    Context(String),
    Capture,
    Analyze,
    Quick(QuickAction),
    Model(ModelType),
    Search,
    Help,
    Quit,
    Invalid(String),
}

impl Command {
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            return Some(Self::Quit);
        }
        let Some(command) = input.strip_prefix('/') else {
            return Some(Self::Prompt(input.to_string()));
        };

        let (name, argument) = match command.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (command, ""),
        };

        let parsed = match name.to_ascii_lowercase().as_str() {
            "clear" => Self::Clear,
            "optimize" => Self::Optimize,
            "usage" => Self::Usage,
            "export" if argument.is_empty() => Self::Export(None),
            "export" => Self::Export(Some(PathBuf::from(argument))),
            "context" => Self::Context(argument.to_string()),
            "capture" => Self::Capture,
            "analyze" => Self::Analyze,
            "quick" => match QuickAction::from_str(argument) {
                Ok(action) => Self::Quick(action),
                Err(error) => Self::Invalid(error),
            },
            "model" => match ModelType::from_str(argument) {
                Ok(model) => Self::Model(model),
                Err(error) => Self::Invalid(error),
            },
            "search" => Self::Search,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => Self::Invalid(format!("unknown command /{other}, try /help")),
        };
        Some(parsed)
    }
}

/// `gemini-chat-YYYY-MM-DD.md`
pub fn default_export_name(now: DateTime<Local>) -> String {
    format!("gemini-chat-{}.md", now.format("%Y-%m-%d"))
}

pub fn write_export(controller: &SessionController, path: Option<&Path>) -> anyhow::Result<PathBuf> {
    let now = Local::now();
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(default_export_name(now)));
    let markdown = generate_markdown(controller.history().messages(), now);
    std::fs::write(&path, markdown)?;
    Ok(path)
}

/// Next input line, or `None` at end of input or when `interrupt` fires first.
async fn next_prompt<R, I>(input: &mut Lines<R>, interrupt: I) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        line = input.next_line() => line,
        _ = interrupt => {
            println!();
            Ok(None)
        }
    }
}

pub struct Terminal {
    controller: SessionController,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    printer: Printer,
    input: Lines<BufReader<Stdin>>,
    /// Where changed settings are saved; `None` keeps them in memory.
    settings_dir: Option<PathBuf>,
}

impl Terminal {
    pub fn new(
        controller: SessionController,
        events: mpsc::UnboundedReceiver<SessionEvent>,
        settings_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            controller,
            events,
            printer: Printer::new(),
            input: BufReader::new(tokio::io::stdin()).lines(),
            settings_dir,
        }
    }

    pub fn controller_mut(&mut self) -> &mut SessionController {
        &mut self.controller
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        let settings = self.controller.settings();
        println!("{}", "🤖 Gemini Code Sidecar".cyan().bold());
        println!(
            "{}",
            format!(
                "Model: {} | Search: {} | Type /help for commands",
                settings.model,
                if settings.use_search { "on" } else { "off" }
            )
            .dimmed()
        );
        if !self.controller.history().is_empty() {
            println!(
                "{}",
                format!("Restored {} messages", self.controller.history().len()).dimmed()
            );
        }
        println!();

        loop {
            print!("{} ", "You:".cyan().bold());
            std::io::Write::flush(&mut std::io::stdout())?;

            let Some(line) = next_prompt(&mut self.input, tokio::signal::ctrl_c()).await? else {
                break;
            };
            let Some(command) = Command::parse(&line) else {
                continue;
            };
            if command == Command::Quit {
                break;
            }
            self.execute(command).await?;
            println!();
        }

        println!("{}", "👋 Goodbye!".cyan());
        Ok(())
    }

    pub async fn execute(&mut self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Prompt(prompt) => {
                self.send(prompt).await?;
            }
            Command::Clear => {
                if self.controller.clear_chat().await {
                    println!("{}", "🧹 Conversation cleared.".green());
                }
            }
            Command::Optimize => {
                let removed = self.controller.optimize_history();
                println!("{}", format!("🗜️  Removed {} image(s)", removed).green());
            }
            Command::Usage => print_usage(&self.controller.usage()),
            Command::Export(path) => {
                let path = write_export(&self.controller, path.as_deref())?;
                println!("{}", format!("📄 Exported to {}", path.display()).green());
            }
            Command::Context(text) => {
                let length = text.chars().count();
                self.controller.set_extra_context(text);
                println!("{}", format!("📎 Context set ({} chars)", length).green());
            }
            Command::Capture => {
                if let Some(length) = self.controller.capture_context().await {
                    println!("{}", format!("📎 Captured {} chars", length).green());
                }
            }
            Command::Analyze => {
                let usage = self.controller.usage();
                let confirmed = self.confirm_if_critical(&usage).await?;
                let gate = move |_: &TokenUsageStats| confirmed;
                match self.controller.analyze_page(&gate).await {
                    Ok(AnalyzeOutcome::Submitted(outcome)) => self.follow_submit(outcome).await,
                    Ok(AnalyzeOutcome::NothingToAnalyze) => {
                        println!("{}", "⚠️ Nothing to analyze".yellow())
                    }
                    Err(error) => println!("{}", format!("❌ {}", error).red()),
                }
            }
            Command::Quick(action) => match self.controller.quick_action(action).await {
                Ok(QuickActionOutcome::Started { .. }) => {
                    self.run_turn().await;
                }
                Ok(QuickActionOutcome::Busy) => println!("{}", "⏳ Busy".yellow()),
                Ok(QuickActionOutcome::NoCode) => {
                    println!("{}", "⚠️ No code detected".yellow())
                }
                Err(error) => println!("{}", format!("❌ {}", error).red()),
            },
            Command::Model(model) => {
                let mut settings = self.controller.settings().clone();
                settings.model = model;
                self.save_settings(settings);
            }
            Command::Search => {
                let mut settings = self.controller.settings().clone();
                settings.use_search = !settings.use_search;
                self.save_settings(settings);
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => {}
            Command::Invalid(message) => println!("{}", message.red()),
        }
        self.drain_events();
        Ok(())
    }

    /// Submit a prompt and stream the reply.
    pub async fn send(&mut self, prompt: String) -> anyhow::Result<Option<TurnOutcome>> {
        let usage = self.controller.usage();
        let confirmed = self.confirm_if_critical(&usage).await?;
        let gate = move |_: &TokenUsageStats| confirmed;

        match self.controller.submit(SubmitRequest::new(prompt), &gate) {
            Ok(SubmitOutcome::Started { .. }) => Ok(self.run_turn().await),
            Ok(outcome) => {
                self.follow_submit(outcome).await;
                Ok(None)
            }
            Err(error) => {
                println!("{}", format!("❌ {}", error).red());
                Ok(None)
            }
        }
    }

    async fn follow_submit(&mut self, outcome: SubmitOutcome) {
        match outcome {
            SubmitOutcome::Started { .. } => {
                self.run_turn().await;
            }
            SubmitOutcome::Busy => println!("{}", "⏳ Busy".yellow()),
            SubmitOutcome::Empty => {}
            SubmitOutcome::Declined => println!("{}", "Not sent.".dimmed()),
        }
    }

    /// Drive the pending turn, printing events and stopping on Ctrl-C.
    async fn run_turn(&mut self) -> Option<TurnOutcome> {
        let cancel = self.controller.cancel_token();
        let outcome = {
            let Self {
                controller,
                events,
                printer,
                ..
            } = &mut *self;

            let drive = controller.drive();
            tokio::pin!(drive);
            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);
            let mut armed = cancel.is_some();

            loop {
                tokio::select! {
                    outcome = &mut drive => break outcome,
                    Some(event) = events.recv() => printer.print(event),
                    _ = &mut ctrl_c, if armed => {
                        armed = false;
                        if let Some(cancel) = &cancel {
                            cancel.cancel();
                        }
                    }
                }
            }
        };

        self.drain_events();
        outcome
    }

    async fn confirm_if_critical(&mut self, usage: &TokenUsageStats) -> anyhow::Result<bool> {
        if !usage.is_critical {
            return Ok(true);
        }
        print_usage(usage);
        print!(
            "{} ",
            "Context is almost full and the reply may fail. Send anyway? [y/N]".yellow()
        );
        std::io::Write::flush(&mut std::io::stdout())?;

        let answer = self.input.next_line().await?.unwrap_or_default();
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }

    fn save_settings(&mut self, settings: sidecar_core::Settings) {
        if let Some(dir) = &self.settings_dir {
            if let Err(error) = settings.save_to(dir) {
                log::error!("Failed to save settings: {}", error);
                println!("{}", format!("❌ Could not save settings: {}", error).red());
            }
        }
        self.controller.update_settings(settings);
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.printer.print(event);
        }
    }

    pub async fn shutdown(self) {
        self.controller.shutdown().await;
    }
}
