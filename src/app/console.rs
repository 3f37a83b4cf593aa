//! Line-oriented console UI.
//!
//! Reads commands from stdin, forwards them to the app actor and re-renders
//! the view on stdout whenever a new snapshot is published. Logs go to
//! stderr, so the view stays readable.

use std::io;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{AppHandle, AppSnapshot};
use crate::core::realtime::SessionState;
use crate::domain::DomainModule;

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand<A> {
    Start,
    Stop,
    List,
    Tools,
    Help,
    Quit,
    Action(A),
    Empty,
}

/// Parse a console line. Unknown verbs and bad arguments produce a message
/// for the user.
pub fn parse_line<D: DomainModule>(line: &str) -> Result<ConsoleCommand<D::Action>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(ConsoleCommand::Empty);
    };
    let verb = verb.to_lowercase();
    let args: Vec<&str> = words.collect();

    match verb.as_str() {
        "start" => Ok(ConsoleCommand::Start),
        "stop" => Ok(ConsoleCommand::Stop),
        "list" | "ls" => Ok(ConsoleCommand::List),
        "tools" => Ok(ConsoleCommand::Tools),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        _ => match D::parse_action(&verb, &args) {
            Some(action) => action.map(ConsoleCommand::Action),
            None => Err(format!("Unknown command '{verb}'. Type 'help' for commands.")),
        },
    }
}

pub fn help_text<D: DomainModule>() -> String {
    let mut lines = vec![
        "start         start a voice session".to_string(),
        "stop          end the voice session".to_string(),
        "list          show the current state".to_string(),
        "tools         print the tool announcement sent to the model".to_string(),
    ];
    lines.extend(D::action_help().iter().map(|line| line.to_string()));
    lines.push("help          show this help".to_string());
    lines.push("quit          exit".to_string());
    lines.join("\n")
}

fn session_line(state: SessionState, tools_configured: bool) -> String {
    match state {
        SessionState::Idle => "Session: idle (type 'start' to talk)".to_string(),
        SessionState::Connecting => "Session: connecting...".to_string(),
        SessionState::Active if tools_configured => {
            "Session: active, listening (type 'stop' to end)".to_string()
        }
        SessionState::Active => "Session: active, configuring tools...".to_string(),
    }
}

/// Full view: session status line followed by the domain rendering.
pub fn render_view<D: DomainModule>(snapshot: &AppSnapshot<D::Snapshot>) -> String {
    format!(
        "\n[{}] {}\n{}\n",
        D::KIND,
        session_line(snapshot.session, snapshot.tools_configured),
        D::render(&snapshot.domain)
    )
}

/// Run the console until `quit` or end of input, then shut the app down.
pub async fn run<D: DomainModule>(handle: AppHandle<D>, tools_json: String) -> io::Result<()> {
    let mut snapshots = handle.subscribe();
    let renderer = tokio::spawn(async move {
        let mut last = snapshots.borrow_and_update().clone();
        while snapshots.changed().await.is_ok() {
            let current = snapshots.borrow_and_update().clone();
            if current != last {
                println!("{}", render_view::<D>(&current));
                last = current;
            }
        }
    });

    println!("{}", render_view::<D>(&handle.snapshot()));
    println!("{}", help_text::<D>());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let sent = match parse_line::<D>(&line) {
            Ok(ConsoleCommand::Quit) => break,
            Ok(ConsoleCommand::Start) => handle.start().await,
            Ok(ConsoleCommand::Stop) => handle.stop().await,
            Ok(ConsoleCommand::Action(action)) => handle.act(action).await,
            Ok(ConsoleCommand::List) => {
                println!("{}", render_view::<D>(&handle.snapshot()));
                Ok(())
            }
            Ok(ConsoleCommand::Tools) => {
                println!("{tools_json}");
                Ok(())
            }
            Ok(ConsoleCommand::Help) => {
                println!("{}", help_text::<D>());
                Ok(())
            }
            Ok(ConsoleCommand::Empty) => Ok(()),
            Err(message) => {
                println!("{message}");
                Ok(())
            }
        };
        sent.map_err(io::Error::other)?;
    }

    // The app may already be gone if it failed; nothing left to stop then.
    let _ = handle.shutdown().await;
    renderer.abort();
    Ok(())
}
