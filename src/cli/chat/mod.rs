pub mod connection;
pub mod conversation_state;
pub mod prompt;
pub mod render;

use std::io::Write;
use std::process::ExitCode;

use connection::{ConnectionError, ConnectionManager, IgnoreReason, SendOutcome};
use conversation_state::{ConversationState, Sender};
use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;
use eyre::Result;
use prompt::generate_prompt;
use render::{render_content, Style};
use rustyline::error::ReadlineError;
use tracing::{debug, warn};

use crate::config::ChatConfig;
use crate::ws_client::{Connector, WsConnector};

pub const SAMPLE_QUESTIONS: [&str; 4] = [
    "What activities can I do in Singapore?",
    "Tell me more about Singapore's culture",
    "What's the best time to visit Singapore?",
    "Recommend some local food in Singapore",
];

const WELCOME_TEXT: &str = "
Travel Assistant

Ask anything about planning a trip to Singapore.

/samples      List sample questions
/help         Show the help dialogue
/quit         Quit the application
";

const HELP_TEXT: &str = "
Travel Assistant

/samples      List sample questions
/ask <n>      Send sample question number n
/history      Show the whole conversation
/status       Show the connection status
/help         Show this help dialogue
/quit         Quit the application
";

const THINKING_TEXT: &str = "Thinking...";

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    config: ChatConfig,
    conversation_state: ConversationState,
    connection: ConnectionManager,
    style: Style,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        config: ChatConfig,
    ) -> Self {
        let connection = ConnectionManager::new(config.response_timeout);
        Self {
            output,
            input,
            interactive,
            config,
            conversation_state: ConversationState::new(),
            connection,
            style: if interactive { Style::Color } else { Style::Plain },
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        self.run_with(&WsConnector).await
    }

    /// Open the connection, run the session, and close the connection on
    /// the way out whether or not the session succeeded.
    pub async fn run_with(&mut self, connector: &dyn Connector) -> Result<ExitCode> {
        let endpoint = self.config.endpoint.clone();
        if let Err(e) = self
            .connection
            .open(connector, &endpoint, &mut self.conversation_state)
            .await
        {
            warn!("Could not connect to {}: {}", endpoint, e);
        }

        let result = self.session().await;
        self.connection.close().await;
        result
    }

    async fn session(&mut self) -> Result<ExitCode> {
        if self.interactive {
            self.print_welcome()?;
        }

        // Handle non-interactive mode (single query)
        if let Some(input) = self.input.take() {
            return self.run_once(&input).await;
        }

        if self.interactive {
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "{}", WELCOME_TEXT)?;
        Ok(())
    }

    /// Send one message and print only the reply.
    async fn run_once(&mut self, input: &str) -> Result<ExitCode> {
        self.connection.poll(&mut self.conversation_state);
        self.conversation_state.mark_rendered();

        match self.submit(input).await? {
            SendOutcome::Sent(_) => {}
            SendOutcome::Ignored(reason) => {
                writeln!(self.output, "Nothing sent ({:?}).", reason)?;
                return Ok(ExitCode::FAILURE);
            }
        }

        if self.await_reply().await? {
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(ExitCode::FAILURE)
        }
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            self.connection.poll(&mut self.conversation_state);
            self.refresh()?;

            // Input stays closed until the outstanding reply arrives.
            if self.connection.is_awaiting_response() {
                self.await_reply().await?;
                continue;
            }

            let prompt_text = generate_prompt(self.connection.state());
            match rl.readline(&prompt_text) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str());
                    }

                    if line.trim() == "/quit" {
                        break;
                    }

                    if let Err(e) = self.handle_input(&line).await {
                        writeln!(self.output, "Error: {}", e)?;
                    }
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => {
                    writeln!(self.output, "Error: {}", e)?;
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<()> {
        match input.trim() {
            "/help" => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            "/samples" => {
                self.print_samples()?;
            }
            "/history" => {
                self.print_history()?;
            }
            "/status" => {
                writeln!(
                    self.output,
                    "{}: {} ({} messages)",
                    self.config.endpoint,
                    self.connection.state(),
                    self.conversation_state.len()
                )?;
            }
            command if command == "/ask" || command.starts_with("/ask ") => {
                let arg = command["/ask".len()..].trim();
                match sample_question(arg) {
                    Some(question) => {
                        writeln!(self.output, "> {}", question)?;
                        self.submit(question).await?;
                    }
                    None => {
                        writeln!(
                            self.output,
                            "Pick a sample question between 1 and {}.",
                            SAMPLE_QUESTIONS.len()
                        )?;
                    }
                }
            }
            _ => {
                self.submit(input).await?;
            }
        }

        Ok(())
    }

    async fn submit(&mut self, text: &str) -> Result<SendOutcome> {
        let outcome = self
            .connection
            .send(text, &mut self.conversation_state)
            .await?;

        match outcome {
            SendOutcome::Sent(id) => debug!("Sent message #{}", id),
            SendOutcome::Ignored(IgnoreReason::NotConnected) => {
                warn!("Not connected to {}, message dropped", self.config.endpoint)
            }
            SendOutcome::Ignored(reason) => debug!("Input ignored: {:?}", reason),
        }

        // The user's own line is already on screen.
        self.conversation_state.mark_rendered();
        Ok(outcome)
    }

    /// Returns false when the reply deadline passed.
    async fn await_reply(&mut self) -> Result<bool> {
        self.show_thinking()?;
        let outcome = self
            .connection
            .wait_for_response(&mut self.conversation_state)
            .await;
        self.clear_thinking()?;

        let answered = match outcome {
            Ok(()) => true,
            Err(ConnectionError::ResponseTimeout(after)) => {
                writeln!(
                    self.output,
                    "No reply after {} seconds. You can send another message.",
                    after.as_secs()
                )?;
                false
            }
            Err(e) => return Err(e.into()),
        };

        self.refresh()?;
        Ok(answered)
    }

    /// Print every bot message that arrived since the last refresh.
    fn refresh(&mut self) -> Result<()> {
        for message in self.conversation_state.unrendered() {
            if message.sender() == Sender::Bot {
                let rendered = render_content(message);
                debug!(
                    "Rendering message #{} (structured: {})",
                    message.id(),
                    rendered.is_structured()
                );
                writeln!(self.output, "{}\n", rendered.format(self.style))?;
            }
        }
        self.conversation_state.mark_rendered();
        self.output.flush()?;
        Ok(())
    }

    fn print_samples(&mut self) -> Result<()> {
        writeln!(self.output, "Sample questions:")?;
        for (i, question) in SAMPLE_QUESTIONS.iter().enumerate() {
            writeln!(self.output, "  {}. {}", i + 1, question)?;
        }
        Ok(())
    }

    fn print_history(&mut self) -> Result<()> {
        for message in self.conversation_state.messages() {
            let who = match message.sender() {
                Sender::User => "you",
                Sender::Bot => "assistant",
            };
            writeln!(
                self.output,
                "[{}] {}\n{}\n",
                message.id(),
                who,
                render_content(message).format(self.style)
            )?;
        }
        Ok(())
    }

    fn show_thinking(&mut self) -> Result<()> {
        if self.interactive {
            queue!(self.output, Print(THINKING_TEXT))?;
            self.output.flush()?;
        }
        Ok(())
    }

    fn clear_thinking(&mut self) -> Result<()> {
        if self.interactive {
            queue!(self.output, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
            self.output.flush()?;
        }
        Ok(())
    }
}

/// `arg` is the 1-based number shown by `/samples`.
fn sample_question(arg: &str) -> Option<&'static str> {
    let n: usize = arg.parse().ok()?;
    SAMPLE_QUESTIONS.get(n.checked_sub(1)?).copied()
}
