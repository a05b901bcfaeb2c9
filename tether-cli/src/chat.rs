//! The interactive loop: stdin commands out, peer events in.

use std::io::{self, BufRead, Stdout};
use std::thread;

use anyhow::Result;
use tether::{Error, Event, Session};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::debug;

use crate::command::{Composer, Input};
use crate::console::Console;

/// Runs one chat until the user leaves or the connection ends.
///
/// The loop is the only writer of the console. Stdin lines arrive from a
/// detached reader thread so that leaving the chat never waits on a
/// pending terminal read.
pub async fn run(mut session: Session, mut console: Console<Stdout>) -> Result<()> {
    let mut lines = stdin_lines();
    let mut composer = Composer::default();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    console.banner(session.peer())?;
    loop {
        console.prompt(composer.in_block())?;
        tokio::select! {
            event = session.next_event() => {
                let Some(event) = event else { break };
                console.event(&event)?;
                if matches!(event, Event::Closed { .. }) {
                    break;
                }
            }
            line = lines.recv() => {
                console.line_entered();
                let input = match line {
                    Some(line) => composer.feed(&line?),
                    None => {
                        if let Some(input) = composer.finish() {
                            dispatch(&mut session, &mut console, input).await?;
                        }
                        break;
                    }
                };
                if let Some(input) = input
                    && !dispatch(&mut session, &mut console, input).await?
                {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                console.line_entered();
                console.notice("interrupted")?;
                break;
            }
        }
    }

    if let Err(e) = session.close().await {
        debug!(error = %e, "receive task ended with an error");
    }
    Ok(())
}

/// Carries out one command. Returns `false` when the chat should end.
async fn dispatch(
    session: &mut Session,
    console: &mut Console<Stdout>,
    input: Input,
) -> Result<bool> {
    let result = match input {
        Input::Exit => return Ok(false),
        Input::Help => {
            console.help()?;
            return Ok(true);
        }
        Input::Usage(usage) => {
            console.notice(usage)?;
            return Ok(true);
        }
        Input::Text(text) => session.sender().send_text(&text).await,
        Input::SendFile(path) => {
            console.notice(&format!("sending file: {}", path.display()))?;
            let sent = session.sender().send_file(&path).await;
            if let Ok(sent) = &sent {
                console.sent(sent)?;
            }
            sent.map(drop)
        }
    };

    let Err(e) = result else {
        return Ok(true);
    };
    if ends_connection(&e) {
        console.event(&Event::Closed {
            reason: Some(e.to_string()),
        })?;
        return Ok(false);
    }
    console.error(&e)?;
    Ok(true)
}

/// Whether a send failure means the stream can no longer be used.
fn ends_connection(e: &Error) -> bool {
    match e {
        Error::SourceChanged { .. } => true,
        Error::Io(e) => matches!(
            e.kind(),
            io::ErrorKind::BrokenPipe
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::NotConnected
                | io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

/// Forwards stdin lines from a detached thread. The channel closes at end of input.
fn stdin_lines() -> UnboundedReceiver<io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let failed = line.is_err();
            if tx.send(line).is_err() || failed {
                break;
            }
        }
    });
    rx
}
