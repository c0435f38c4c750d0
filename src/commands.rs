/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Topic(String),
    Shuffle,
    Today,
    Record,
    Stop,
    Back,
    Practice,
    History,
    Open(String),
    Close,
    Delete(Option<String>),
    Export {
        session: Option<String>,
        path: String,
    },
    Play(Option<String>),
    Pause,
    /// Seconds from the start
    Seek(f32),
    StopPlayback,
    Devices,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Unknown command '{0}'. Type 'help' for the list.")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

pub const HELP: &str = "\
Practice:  topic <text> | shuffle | today | record | stop | back
History:   history | open <n|id> | close | delete [n|id] | export [n|id] <file>
Playback:  play [n|id] | pause | seek <secs|m:ss> | stop-playback
General:   practice | devices | help | quit";

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "topic" if rest.is_empty() => return Err(ParseError::Usage("topic <text>")),
            "topic" => Command::Topic(rest.to_string()),
            "shuffle" => Command::Shuffle,
            "today" | "myday" => Command::Today,
            "record" | "r" => Command::Record,
            "stop" | "s" => Command::Stop,
            "back" | "b" => Command::Back,
            "practice" | "p" => Command::Practice,
            "history" | "h" => Command::History,
            "open" if rest.is_empty() => return Err(ParseError::Usage("open <n|id>")),
            "open" => Command::Open(rest.to_string()),
            "close" => Command::Close,
            "delete" | "rm" => Command::Delete(Some(rest.to_string()).filter(|r| !r.is_empty())),
            "export" => {
                let mut args = rest.split_whitespace();
                match (args.next(), args.next(), args.next()) {
                    (Some(path), None, None) => Command::Export {
                        session: None,
                        path: path.to_string(),
                    },
                    (Some(session), Some(path), None) => Command::Export {
                        session: Some(session.to_string()),
                        path: path.to_string(),
                    },
                    _ => return Err(ParseError::Usage("export [n|id] <file>")),
                }
            }
            "play" => Command::Play(Some(rest.to_string()).filter(|r| !r.is_empty())),
            "pause" | "resume" => Command::Pause,
            "seek" => match parse_position(rest) {
                Some(secs) => Command::Seek(secs),
                None => return Err(ParseError::Usage("seek <secs|m:ss>")),
            },
            "stop-playback" | "halt" => Command::StopPlayback,
            "devices" => Command::Devices,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

/// `75`, `12.5` or `1:15`.
fn parse_position(text: &str) -> Option<f32> {
    let secs = match text.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u32 = minutes.trim().parse().ok()?;
            let seconds: f32 = seconds.trim().parse().ok()?;
            if !(0.0..60.0).contains(&seconds) {
                return None;
            }
            minutes as f32 * 60.0 + seconds
        }
        None => text.trim().parse().ok()?,
    };
    (secs.is_finite() && secs >= 0.0).then_some(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_keeps_free_text() {
        assert_eq!(
            Command::parse("topic   My  favourite city ").unwrap(),
            Some(Command::Topic("My  favourite city".to_string()))
        );
        assert_eq!(Command::parse("topic"), Err(ParseError::Usage("topic <text>")));
    }

    #[test]
    fn test_blank_line_is_ignored() {
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_aliases_and_case() {
        assert_eq!(Command::parse("RECORD").unwrap(), Some(Command::Record));
        assert_eq!(Command::parse("q").unwrap(), Some(Command::Quit));
        assert_eq!(Command::parse("myday").unwrap(), Some(Command::Today));
        assert_eq!(Command::parse("devices").unwrap(), Some(Command::Devices));
    }

    #[test]
    fn test_delete_with_and_without_target() {
        assert_eq!(Command::parse("delete").unwrap(), Some(Command::Delete(None)));
        assert_eq!(
            Command::parse("delete 2").unwrap(),
            Some(Command::Delete(Some("2".to_string())))
        );
    }

    #[test]
    fn test_export_arguments() {
        assert_eq!(
            Command::parse("export take.wav").unwrap(),
            Some(Command::Export {
                session: None,
                path: "take.wav".to_string()
            })
        );
        assert_eq!(
            Command::parse("export 3 take.wav").unwrap(),
            Some(Command::Export {
                session: Some("3".to_string()),
                path: "take.wav".to_string()
            })
        );
        assert!(Command::parse("export").is_err());
        assert!(Command::parse("export 1 2 3").is_err());
    }

    #[test]
    fn test_playback_commands() {
        assert_eq!(Command::parse("play").unwrap(), Some(Command::Play(None)));
        assert_eq!(
            Command::parse("play 2").unwrap(),
            Some(Command::Play(Some("2".to_string())))
        );
        assert_eq!(Command::parse("resume").unwrap(), Some(Command::Pause));
        assert_eq!(Command::parse("stop-playback").unwrap(), Some(Command::StopPlayback));
        assert_eq!(Command::parse("stop").unwrap(), Some(Command::Stop));
    }

    #[test]
    fn test_seek_positions() {
        assert_eq!(Command::parse("seek 75").unwrap(), Some(Command::Seek(75.0)));
        assert_eq!(Command::parse("seek 1:15").unwrap(), Some(Command::Seek(75.0)));
        assert_eq!(Command::parse("seek 2.5").unwrap(), Some(Command::Seek(2.5)));
        assert!(Command::parse("seek").is_err());
        assert!(Command::parse("seek -4").is_err());
        assert!(Command::parse("seek 1:75").is_err());
        assert!(Command::parse("seek soon").is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            Command::parse("dance"),
            Err(ParseError::Unknown("dance".to_string()))
        );
    }
}
