//! Terminal front end standing in for the web widget: persona selector,
//! call button and the speaking indicator.

use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::audio::{CaptureSource, PlaybackSink};
use crate::indicator;
use crate::live::LiveConnector;
use crate::persona::AgentType;
use crate::session::{AgentStatus, ConnectionState, SessionController, SessionEnvelope};

/// Redraw interval for the bars while the agent is speaking
const SPEAKING_REDRAW: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Select(AgentType),
    /// The call button: connect when idle, hang up otherwise
    Toggle,
    HangUp,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "1" | "front" | "frontdesk" => Some(Command::Select(AgentType::FrontDesk)),
            "2" | "dispatch" | "emergency" => Some(Command::Select(AgentType::Dispatch)),
            "c" | "call" => Some(Command::Toggle),
            "d" | "end" | "hangup" => Some(Command::HangUp),
            "h" | "?" | "help" => Some(Command::Help),
            "q" | "quit" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}

/// One line describing the widget
pub fn render_status(status: &AgentStatus) -> String {
    let persona = status.persona.persona();
    let view = indicator::render(status.is_connected(), status.speaking);
    let action = match status.state {
        ConnectionState::Disconnected => format!("Call {}", persona.first_name()),
        ConnectionState::Connecting => "Connecting...".to_string(),
        ConnectionState::Connected => "End Call".to_string(),
    };

    let mut line = format!(
        "{} - {} {} [{}]",
        persona.name,
        persona.role,
        view.to_line(),
        action
    );
    if let Some(error) = &status.error {
        line.push_str(" ! ");
        line.push_str(error);
    }
    line
}

fn write_help<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "UPCA AI Voice Assistant")?;
    for (i, agent) in AgentType::ALL.iter().enumerate() {
        let persona = agent.persona();
        writeln!(
            out,
            "  {}  {:<11} {}: {}",
            i + 1,
            agent.selector_label(),
            persona.name,
            persona.description
        )?;
    }
    writeln!(out, "  c  call / end call    d  hang up    q  quit")?;
    writeln!(out, "Microphone access required")
}

/// Drive the controller from line commands on `input` until quit or end of input.
/// The session is always torn down before returning.
pub async fn run_widget<C, P, L, R, W>(
    controller: &mut SessionController<C, P, L>,
    events: &mut mpsc::UnboundedReceiver<SessionEnvelope>,
    input: R,
    out: &mut W,
) -> std::io::Result<()>
where
    C: CaptureSource,
    P: PlaybackSink,
    L: LiveConnector,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut status = controller.subscribe();
    let mut redraw = tokio::time::interval(SPEAKING_REDRAW);

    write_help(out)?;
    writeln!(out, "{}", render_status(&controller.status()))?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("Failed to read input: {}", e);
                        break;
                    }
                };
                match Command::parse(&line) {
                    Some(Command::Quit) => break,
                    Some(command) => apply(controller, command, out)?,
                    None if line.trim().is_empty() => {}
                    None => writeln!(out, "Unknown command '{}', type h for help", line.trim())?,
                }
            }
            Some(envelope) = events.recv() => controller.handle(envelope),
            Ok(()) = status.changed() => {
                let snapshot = status.borrow_and_update().clone();
                writeln!(out, "{}", render_status(&snapshot))?;
            }
            _ = redraw.tick() => {
                if controller.is_speaking() {
                    writeln!(out, "{}", render_status(&controller.status()))?;
                }
            }
        }
        out.flush()?;
    }

    controller.disconnect();
    Ok(())
}

fn apply<C, P, L, W>(
    controller: &mut SessionController<C, P, L>,
    command: Command,
    out: &mut W,
) -> std::io::Result<()>
where
    C: CaptureSource,
    P: PlaybackSink,
    L: LiveConnector,
    W: Write,
{
    match command {
        Command::Select(agent) => controller.switch_persona(agent),
        Command::Toggle if controller.state() == ConnectionState::Disconnected => {
            // Failures are already on the status line
            if let Err(e) = controller.connect(controller.persona()) {
                tracing::debug!("Connect failed: {}", e);
            }
        }
        Command::Toggle | Command::HangUp => controller.disconnect(),
        Command::Help => write_help(out)?,
        Command::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VoiceConfig;
    use crate::error::MISSING_KEY_MESSAGE;
    use crate::session::fakes::{FakeCapture, FakeConnector, FakePlayback};

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(" 2 "), Some(Command::Select(AgentType::Dispatch)));
        assert_eq!(Command::parse("CALL"), Some(Command::Toggle));
        assert_eq!(Command::parse("q"), Some(Command::Quit));
        assert_eq!(Command::parse("dance"), None);
    }

    #[test]
    fn test_render_offline_status() {
        let line = render_status(&AgentStatus::default());
        assert!(line.starts_with("Sarah (Front Desk) - Receptionist"));
        assert!(line.contains("Agent Offline"));
        assert!(line.ends_with("[Call Sarah]"));
    }

    #[test]
    fn test_render_error_status() {
        let status = AgentStatus {
            error: Some(MISSING_KEY_MESSAGE.to_string()),
            ..AgentStatus::default()
        };
        assert!(render_status(&status).ends_with(MISSING_KEY_MESSAGE));
    }

    #[tokio::test]
    async fn test_widget_selects_calls_and_hangs_up_on_quit() {
        let (mut controller, mut events) = SessionController::new(
            VoiceConfig::with_api_key("test-key"),
            FakeCapture::default(),
            FakePlayback::default(),
            FakeConnector::default(),
        );
        let mut out = Vec::new();

        run_widget(&mut controller, &mut events, &b"2\nc\nq\n"[..], &mut out)
            .await
            .unwrap();

        assert_eq!(controller.persona(), AgentType::Dispatch);
        let opened = controller.connector().opened();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].voice_name, "Fenrir");
        assert!(controller.connector().all_closed());
        assert_eq!(controller.state(), ConnectionState::Disconnected);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("UPCA AI Voice Assistant"));
    }

    #[tokio::test]
    async fn test_widget_without_key_reports_config_error() {
        let (mut controller, mut events) = SessionController::new(
            VoiceConfig::default(),
            FakeCapture::default(),
            FakePlayback::default(),
            FakeConnector::default(),
        );
        let mut out = Vec::new();

        run_widget(&mut controller, &mut events, &b"c\n"[..], &mut out)
            .await
            .unwrap();

        assert_eq!(controller.error(), Some(MISSING_KEY_MESSAGE));
        assert!(controller.connector().opened().is_empty());
    }
}
