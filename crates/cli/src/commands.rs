//! Console commands.
//!
//! One command per line. Question ids are the numbers shown by `list`.

use std::str::FromStr;
use std::sync::Arc;

use qaboard_common::{BoardError, BoardResult};
use qaboard_core::{ModalAction, OrderingPolicy, QuestionKey};
use qaboard_sync::{PollOutcome, Poller, Status};
use thiserror::Error;
use tracing::debug;

use crate::render::{render_list, render_modal};

/// Help text for the `help` command.
pub const HELP: &str = "\
Commands:
  list                 show the questions
  sort <policy>        display | newest | oldest | default
  answer <id>          toggle answered
  remove <id>          remove for this session
  vote <id>            add one vote
  open [id]            open the viewer on a question, or on the first one
  next | prev | close  navigate the viewer (ArrowRight, ArrowLeft, Escape also work)
  refresh              poll now
  quit                 exit";

/// A parsed console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    List,
    Sort(OrderingPolicy),
    Answer(usize),
    Remove(usize),
    Vote(usize),
    Open(Option<usize>),
    Modal(ModalAction),
    Refresh,
    Help,
    Quit,
}

/// Console input errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0} (try `help`)")]
    Unknown(String),

    #[error("`{0}` needs a question id")]
    MissingId(&'static str),

    #[error("Not a question id: {0}")]
    BadId(String),

    #[error("{0}")]
    Board(#[from] BoardError),
}

fn parse_id(word: Option<&str>) -> Result<Option<usize>, CommandError> {
    word.map(|w| w.parse().map_err(|_| CommandError::BadId(w.to_string())))
        .transpose()
}

fn required_id(name: &'static str, word: Option<&str>) -> Result<usize, CommandError> {
    parse_id(word)?.ok_or(CommandError::MissingId(name))
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err(CommandError::Empty);
        };
        let arg = words.next();

        if let Some(action) = ModalAction::from_key(head) {
            return Ok(Self::Modal(action));
        }

        Ok(match head.to_ascii_lowercase().as_str() {
            "list" | "ls" => Self::List,
            "sort" => Self::Sort(arg.unwrap_or_default().parse()?),
            "answer" => Self::Answer(required_id("answer", arg)?),
            "remove" | "rm" => Self::Remove(required_id("remove", arg)?),
            "vote" => Self::Vote(required_id("vote", arg)?),
            "open" => Self::Open(parse_id(arg)?),
            "next" => Self::Modal(ModalAction::Next),
            "prev" => Self::Modal(ModalAction::Prev),
            "close" => Self::Modal(ModalAction::Close),
            "refresh" => Self::Refresh,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => return Err(CommandError::Unknown(head.to_string())),
        })
    }
}

/// Executes commands against the shared board.
pub struct Console {
    poller: Arc<Poller>,
}

impl Console {
    /// Create a console for a poller and its board.
    #[must_use]
    pub const fn new(poller: Arc<Poller>) -> Self {
        Self { poller }
    }

    async fn key_for(&self, id: usize) -> BoardResult<QuestionKey> {
        self.poller
            .board()
            .lock()
            .await
            .key_for_id(id)
            .ok_or_else(|| BoardError::UnknownQuestion(format!("#{id}")))
    }

    async fn list(&self) -> String {
        render_list(self.poller.board().lock().await.view())
    }

    /// Run a command and return the text to print.
    pub async fn execute(&self, command: Command) -> BoardResult<String> {
        debug!(?command, "Console command");
        let board = self.poller.board();

        match command {
            Command::List => Ok(self.list().await),
            Command::Sort(policy) => {
                board.lock().await.set_policy(policy);
                Ok(format!("Sorted by {policy}\n{}", self.list().await))
            }
            Command::Answer(id) => {
                let key = self.key_for(id).await?;
                let answered = board.lock().await.toggle_answered(&key)?;
                Ok(if answered {
                    format!("#{id} marked answered")
                } else {
                    format!("#{id} marked unanswered")
                })
            }
            Command::Remove(id) => {
                let key = self.key_for(id).await?;
                board.lock().await.remove(&key)?;
                self.poller.set_status(Status::removed());
                Ok(self.list().await)
            }
            Command::Vote(id) => {
                let key = self.key_for(id).await?;
                let votes = board.lock().await.upvote(&key)?;
                Ok(format!("#{id} has {votes} vote(s)"))
            }
            Command::Open(id) => {
                let mut board = board.lock().await;
                match id {
                    Some(id) => board.open_id(id)?,
                    None => board.open_first(),
                }
                Ok(render_modal(&board.modal()))
            }
            Command::Modal(action) => {
                let mut board = board.lock().await;
                board.modal_action(action);
                Ok(render_modal(&board.modal()))
            }
            Command::Refresh => Ok(match self.poller.poll_once().await {
                PollOutcome::Skipped => "A refresh is already running".to_string(),
                PollOutcome::Failed(e) => return Err(e),
                PollOutcome::Empty | PollOutcome::Applied(_) => self.list().await,
            }),
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => Ok(String::new()),
        }
    }
}
