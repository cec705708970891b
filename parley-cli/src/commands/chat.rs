use std::{
    io::{self, BufRead},
    thread,
};

use anyhow::{Context, Result, bail};
use client::{SessionError, SessionManager, SessionView};
use shared::{
    config::ClientConfig,
    models::{ConnectionState, Message},
};
use tokio::sync::{mpsc, watch};

use super::session;

/// One line typed at the chat prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Who,
    Blank,
    Unknown(&'a str),
    Say(&'a str),
}

impl<'a> Input<'a> {
    fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        match trimmed {
            "" => Self::Blank,
            "/quit" | "/exit" => Self::Quit,
            "/who" => Self::Who,
            command if command.starts_with('/') => Self::Unknown(command),
            _ => Self::Say(line.trim_end_matches(['\r', '\n'])),
        }
    }
}

pub async fn run(config: &ClientConfig) -> Result<()> {
    let credential = session::load_credential(&session::credentials_path())?;
    let mut manager = SessionManager::from_config(config)?;

    match manager.start(credential).await {
        Ok(()) => {}
        Err(SessionError::Unauthenticated) => {
            bail!("no credential available; run `parley login` first")
        }
        Err(err) => return Err(err).context("failed to start chat session"),
    }

    let identity = manager
        .view()
        .identity
        .map(|identity| identity.to_string())
        .unwrap_or_default();
    println!("Chatting as {identity}. Type a message, /who for active users, /quit to leave.");

    let renderer = tokio::spawn(render_loop(manager.subscribe()));
    let mut lines = spawn_stdin_reader()?;

    loop {
        let line = tokio::select! {
            line = lines.recv() => line.transpose().context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match Input::parse(&line) {
            Input::Quit => break,
            Input::Blank => {}
            Input::Who => print_presence(&manager.view()),
            Input::Unknown(command) => eprintln!("unknown command {command}; try /who or /quit"),
            Input::Say(text) => match manager.send(text).await {
                Ok(()) => {}
                Err(SessionError::NotConnected) => eprintln!(
                    "not connected ({}); message not sent",
                    manager.connection_state()
                ),
                Err(SessionError::EmptyMessage) => {}
                Err(err) => eprintln!("send failed: {err}"),
            },
        }
    }

    manager.stop().await;
    renderer.abort();
    println!("Left the chat.");
    Ok(())
}

/// Reads stdin on its own thread. A blocking read there never holds up
/// runtime shutdown, so ctrl-c exits even while a line is pending.
fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<io::Result<String>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::Builder::new()
        .name("parley-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(rx)
}

async fn render_loop(mut views: watch::Receiver<SessionView>) {
    let mut printed = 0;
    let mut state = ConnectionState::Closed;
    loop {
        let view = views.borrow_and_update().clone();
        render(&view, &mut printed, &mut state);
        if views.changed().await.is_err() {
            break;
        }
    }
}

fn render(view: &SessionView, printed: &mut usize, state: &mut ConnectionState) {
    if view.connection_state != *state {
        *state = view.connection_state;
        eprintln!("[{state}]");
    }
    if view.messages.len() < *printed {
        *printed = 0;
    }
    for message in &view.messages[*printed..] {
        println!("{}", format_line(view, message));
    }
    *printed = view.messages.len();
}

fn format_line(view: &SessionView, message: &Message) -> String {
    let author = if view.is_own(message) {
        "You"
    } else {
        message.sender.as_str()
    };
    format!("[{}] {author}: {}", message.timestamp.clock(), message.text)
}

fn print_presence(view: &SessionView) {
    if view.presence.is_empty() {
        println!("No active users.");
        return;
    }
    println!("Active users ({}):", view.presence.len());
    for entry in &view.presence {
        let marker = if view.identity.as_ref() == Some(&entry.username) {
            " (you)"
        } else {
            ""
        };
        match view.avatar_for(entry.username.as_str()) {
            Some(avatar) if !avatar.is_empty() => {
                println!("- {}{marker}  {avatar}", entry.username);
            }
            _ => println!("- {}{marker}", entry.username),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shared::models::{Identity, Timestamp};
    use std::sync::Arc;

    fn view_for(identity: &str) -> SessionView {
        SessionView {
            identity: Some(Identity::from(identity)),
            ..SessionView::default()
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Input::parse("/quit\n"), Input::Quit);
        assert_eq!(Input::parse("  /who "), Input::Who);
        assert_eq!(Input::parse("   "), Input::Blank);
        assert_eq!(Input::parse("/nick bob"), Input::Unknown("/nick bob"));
        assert_eq!(Input::parse("  hello there"), Input::Say("  hello there"));
    }

    #[test]
    fn test_own_messages_render_as_you() {
        let view = view_for("alice");
        let at = Timestamp(Utc.with_ymd_and_hms(2025, 3, 1, 9, 5, 0).unwrap());

        assert_eq!(
            format_line(&view, &Message::new("alice", "hi", at)),
            "[09:05] You: hi"
        );
        assert_eq!(
            format_line(&view, &Message::new("alicia", "hey", at)),
            "[09:05] alicia: hey"
        );
    }

    #[test]
    fn test_render_only_prints_new_messages() {
        let mut view = view_for("alice");
        let mut printed = 0;
        let mut state = ConnectionState::Closed;

        Arc::make_mut(&mut view.messages).push(Message::now("bob", "one"));
        render(&view, &mut printed, &mut state);
        Arc::make_mut(&mut view.messages).push(Message::now("bob", "two"));
        render(&view, &mut printed, &mut state);
        assert_eq!(printed, 2);

        render(&SessionView::default(), &mut printed, &mut state);
        assert_eq!(printed, 0);
    }
}
