use regex::Regex;

/// Text commands understood by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// Free-text query; may be empty, in which case the user gets a usage hint.
    Play(String),
    Pause,
    Resume,
    Stop,
    Queue,
}

/// Recognises `<prefix><name>[@bot] [args]`.
#[derive(Debug, Clone)]
pub struct CommandParser {
    pattern: Regex,
}

impl CommandParser {
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r"(?s)^{}([A-Za-z]+)(?:@\S+)?(?:\s+(.*))?$",
            regex::escape(prefix)
        ))?;
        Ok(Self { pattern })
    }

    /// `None` for ordinary chatter and unknown commands.
    pub fn parse(&self, text: &str) -> Option<Command> {
        let caps = self.pattern.captures(text.trim())?;
        let name = caps.get(1)?.as_str().to_ascii_lowercase();
        let args = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();

        let command = match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "play" | "p" => Command::Play(args.to_string()),
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "stop" => Command::Stop,
            "queue" | "q" => Command::Queue,
            _ => return None,
        };
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parser() -> CommandParser {
        CommandParser::new("!").unwrap()
    }

    #[test]
    fn test_parse_known_commands() {
        let p = parser();
        assert_eq!(p.parse("!start"), Some(Command::Start));
        assert_eq!(p.parse("!help"), Some(Command::Help));
        assert_eq!(p.parse("!pause"), Some(Command::Pause));
        assert_eq!(p.parse("!resume"), Some(Command::Resume));
        assert_eq!(p.parse("!stop"), Some(Command::Stop));
        assert_eq!(p.parse("!queue"), Some(Command::Queue));
        assert_eq!(p.parse("  !QUEUE  "), Some(Command::Queue));
    }

    #[test]
    fn test_parse_play_query() {
        let p = parser();
        assert_eq!(
            p.parse("!play  daft punk   one more time "),
            Some(Command::Play("daft punk   one more time".into()))
        );
        assert_eq!(p.parse("!play"), Some(Command::Play(String::new())));
        assert_eq!(
            p.parse("!play@MusicBot lofi"),
            Some(Command::Play("lofi".into()))
        );
    }

    #[test]
    fn test_ignores_chatter_and_unknown() {
        let p = parser();
        assert_eq!(p.parse("play something"), None);
        assert_eq!(p.parse("!dance"), None);
        assert_eq!(p.parse("!playlist x"), None);
        assert_eq!(p.parse(""), None);
    }

    #[test]
    fn test_prefix_is_literal() {
        let p = CommandParser::new(".").unwrap();
        assert_eq!(p.parse(".stop"), Some(Command::Stop));
        assert_eq!(p.parse("xstop"), None);

        let slash = CommandParser::new("/").unwrap();
        assert_eq!(slash.parse("/play abc"), Some(Command::Play("abc".into())));
    }
}
