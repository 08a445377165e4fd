//! Line-oriented pipeline console.
//!
//! ```text
//! list                       show filters and their parameters
//! add grayscale              append a filter
//! add resize <w> <h>         ... by dimensions
//! add resize <scale>         ... by scale factor
//! add lut [type [param]]     ... lookup table (identity by default)
//! enable <i> | disable <i>   toggle a filter
//! remove <i>                 drop a filter
//! move <from> <to>           reorder
//! set <i> <name> <value>     set a parameter (value is JSON or a bare word)
//! clear                      remove every filter
//! stats                      service status
//! help | quit
//! ```

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use framecast_core::{FramecastError, ParameterError, Pipeline, PipelineError};

use crate::config::FilterConfig;

const HELP: &str = "\
commands:
  list
  add grayscale | add resize <w> <h> | add resize <scale> | add lut [type [param]]
  enable <i> | disable <i> | remove <i> | move <from> <to>
  set <i> <name> <value>
  clear | stats | help | quit";

// ── Command ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List,
    Add(FilterConfig),
    Enable(usize),
    Disable(usize),
    Remove(usize),
    Move { from: usize, to: usize },
    Set { index: usize, name: String, value: Value },
    Clear,
    Stats,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command '{0}' (try 'help')")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("'{0}' is not a valid number")]
    BadNumber(String),

    #[error("invalid JSON value: {0}")]
    BadJson(String),
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let cmd = match (head.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("list" | "ls", []) => Command::List,
        ("clear", []) => Command::Clear,
        ("stats" | "status", []) => Command::Stats,
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        ("enable", [i]) => Command::Enable(number(i)?),
        ("disable", [i]) => Command::Disable(number(i)?),
        ("remove" | "rm", [i]) => Command::Remove(number(i)?),
        ("move" | "mv", [from, to]) => Command::Move {
            from: number(from)?,
            to: number(to)?,
        },
        ("set", [i, name, ..]) => {
            // The value may contain spaces, so take the raw remainder.
            let value = raw_tail(line, 3);
            if value.is_empty() {
                return Err(ParseError::Usage("set <i> <name> <value>"));
            }
            Command::Set {
                index: number(i)?,
                name: (*name).to_string(),
                value: parse_value(value)?,
            }
        }
        ("add", [kind, rest @ ..]) => Command::Add(parse_filter(kind, rest)?),
        ("enable" | "disable" | "remove" | "rm", _) => {
            return Err(ParseError::Usage("enable|disable|remove <i>"));
        }
        ("move" | "mv", _) => return Err(ParseError::Usage("move <from> <to>")),
        ("set", _) => return Err(ParseError::Usage("set <i> <name> <value>")),
        ("add", _) => return Err(ParseError::Usage("add grayscale|resize|lut ...")),
        ("list" | "ls" | "clear" | "stats" | "status" | "quit" | "exit", _) => {
            return Err(ParseError::Usage("this command takes no arguments"));
        }
        (other, _) => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    Ok(Some(cmd))
}

fn number<T: std::str::FromStr>(word: &str) -> Result<T, ParseError> {
    word.parse()
        .map_err(|_| ParseError::BadNumber(word.to_string()))
}

/// Text after the first `skip` whitespace-separated words.
fn raw_tail(line: &str, skip: usize) -> &str {
    let mut rest = line;
    for _ in 0..skip {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = &rest[end..];
    }
    rest.trim()
}

fn parse_value(text: &str) -> Result<Value, ParseError> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(e) if text.starts_with(['[', '{', '"']) => Err(ParseError::BadJson(e.to_string())),
        Err(_) => Ok(Value::String(text.to_string())),
    }
}

fn parse_filter(kind: &str, args: &[&str]) -> Result<FilterConfig, ParseError> {
    match (kind.to_ascii_lowercase().as_str(), args) {
        ("grayscale" | "gray", []) => Ok(FilterConfig::Grayscale { enabled: true }),
        ("resize", [scale]) => Ok(FilterConfig::Resize {
            width: None,
            height: None,
            scale: Some(number(scale)?),
            enabled: true,
        }),
        ("resize", [w, h]) => Ok(FilterConfig::Resize {
            width: Some(number(w)?),
            height: Some(number(h)?),
            scale: None,
            enabled: true,
        }),
        ("lut", [rest @ ..]) if rest.len() <= 2 => Ok(FilterConfig::Lut {
            lut_type: rest.first().copied().unwrap_or("identity").to_string(),
            param: match rest.get(1) {
                Some(p) => number(p)?,
                None => 1.0,
            },
            custom_lut: None,
            enabled: true,
        }),
        ("resize", _) => Err(ParseError::Usage("add resize <w> <h> | add resize <scale>")),
        ("lut", _) => Err(ParseError::Usage("add lut [type [param]]")),
        ("grayscale" | "gray", _) => Err(ParseError::Usage("add grayscale")),
        (other, _) => Err(ParseError::UnknownCommand(format!("add {other}"))),
    }
}

// ── Console ──────────────────────────────────────────────────────

/// Failure of a console command.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Setup(#[from] FramecastError),
}

impl ConsoleError {
    /// HTTP-style status code for the reply line.
    pub fn status(&self) -> u16 {
        match self {
            ConsoleError::Pipeline(e) | ConsoleError::Setup(FramecastError::Pipeline(e)) => {
                e.severity().http_status()
            }
            ConsoleError::Parse(_) | ConsoleError::Parameter(_) | ConsoleError::Setup(_) => 400,
        }
    }
}

type StatusFn = Box<dyn Fn() -> String + Send + Sync>;

/// Executes commands against a shared pipeline.
pub struct Console {
    pipeline: Arc<Pipeline>,
    status: StatusFn,
}

impl Console {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            status: Box::new(|| "no status available".to_string()),
        }
    }

    /// Source of the `stats` reply.
    pub fn with_status<F>(mut self, status: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.status = Box::new(status);
        self
    }

    /// Parse and run one line. `Ok(None)` for blank input.
    pub fn handle_line(&self, line: &str) -> Result<Option<String>, ConsoleError> {
        match parse(line)? {
            Some(cmd) => self.execute(cmd).map(Some),
            None => Ok(None),
        }
    }

    /// Run `cmd` and return the reply text.
    pub fn execute(&self, cmd: Command) -> Result<String, ConsoleError> {
        let p = &self.pipeline;
        let reply = match cmd {
            Command::List => self.list()?,
            Command::Add(entry) => {
                let filter = entry.build()?;
                let name = filter.name().to_string();
                p.add_filter(filter)?;
                format!("added {name} at {}", p.size() - 1)
            }
            Command::Enable(i) => {
                p.set_filter_enabled(i, true)?;
                format!("enabled {i}")
            }
            Command::Disable(i) => {
                p.set_filter_enabled(i, false)?;
                format!("disabled {i}")
            }
            Command::Remove(i) => {
                let removed = p.remove_filter(i)?;
                format!("removed {} from {i}", removed.name())
            }
            Command::Move { from, to } => {
                p.move_filter(from, to)?;
                format!("moved {from} -> {to}")
            }
            Command::Set { index, name, value } => {
                p.filter(index)?.set_parameter(&name, &value)?;
                format!("{index}.{name} = {value}")
            }
            Command::Clear => {
                p.clear()?;
                "cleared".to_string()
            }
            Command::Stats => (self.status)(),
            Command::Help => HELP.to_string(),
            Command::Quit => "bye".to_string(),
        };
        Ok(reply)
    }

    fn list(&self) -> Result<String, PipelineError> {
        let filters = match self.pipeline.filters() {
            Ok(filters) => filters,
            Err(PipelineError::EmptyPipeline) => return Ok("(no filters)".to_string()),
            Err(e) => return Err(e),
        };
        let lines: Vec<String> = filters
            .iter()
            .enumerate()
            .map(|(i, f)| {
                format!(
                    "[{i}] {:<10} {:<8} {}",
                    f.name(),
                    if f.is_enabled() { "on" } else { "off" },
                    f.parameters()
                )
            })
            .collect();
        Ok(lines.join("\n"))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn console() -> Console {
        Console::new(Arc::new(Pipeline::new("test"))).with_status(|| "all good".into())
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse("  ").unwrap(), None);
        assert_eq!(parse("# note").unwrap(), None);
        assert_eq!(parse("LIST").unwrap(), Some(Command::List));
        assert_eq!(parse("disable 2").unwrap(), Some(Command::Disable(2)));
        assert_eq!(
            parse("move 0 3").unwrap(),
            Some(Command::Move { from: 0, to: 3 })
        );
        assert_eq!(
            parse("set 1 custom_lut [0, 1, 2]").unwrap(),
            Some(Command::Set {
                index: 1,
                name: "custom_lut".into(),
                value: json!([0, 1, 2]),
            })
        );
        assert_eq!(
            parse("set 0 lut_type invert").unwrap(),
            Some(Command::Set {
                index: 0,
                name: "lut_type".into(),
                value: json!("invert"),
            })
        );
        assert_eq!(
            parse("add resize 0.5").unwrap(),
            Some(Command::Add(FilterConfig::Resize {
                width: None,
                height: None,
                scale: Some(0.5),
                enabled: true,
            }))
        );
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(parse("frobnicate"), Err(ParseError::UnknownCommand(_))));
        assert!(matches!(parse("remove x"), Err(ParseError::BadNumber(_))));
        assert!(matches!(parse("remove"), Err(ParseError::Usage(_))));
        assert!(matches!(parse("set 0 param"), Err(ParseError::Usage(_))));
        assert!(matches!(parse("set 0 custom_lut [1,"), Err(ParseError::BadJson(_))));
        assert!(matches!(parse("add blur"), Err(ParseError::UnknownCommand(_))));
    }

    #[test]
    fn edits_the_pipeline() {
        let c = console();
        assert_eq!(c.handle_line("list").unwrap().unwrap(), "(no filters)");

        c.handle_line("add grayscale").unwrap();
        c.handle_line("add lut invert").unwrap();
        c.handle_line("add resize 32 16").unwrap();
        assert_eq!(c.pipeline.size(), 3);

        c.handle_line("move 2 0").unwrap();
        c.handle_line("disable 1").unwrap();
        let listing = c.handle_line("list").unwrap().unwrap();
        let first: Vec<&str> = listing.lines().collect();
        assert!(first[0].contains("resize"));
        assert!(first[1].contains("grayscale") && first[1].contains("off"));

        c.handle_line("set 2 param 2.0").unwrap();
        assert_eq!(c.pipeline.filter(2).unwrap().parameters()["param"], json!(2.0));

        let removed = c.handle_line("remove 0").unwrap().unwrap();
        assert!(removed.contains("resize"));
        c.handle_line("clear").unwrap();
        assert!(c.pipeline.is_empty());
    }

    #[test]
    fn error_statuses() {
        let c = console();
        let err = c.handle_line("clear").unwrap_err();
        assert_eq!(err.status(), 404);

        c.handle_line("add grayscale").unwrap();
        assert_eq!(c.handle_line("remove 5").unwrap_err().status(), 400);
        assert_eq!(c.handle_line("set 0 sigma 1").unwrap_err().status(), 400);
        assert_eq!(c.handle_line("add lut custom").unwrap_err().status(), 400);
        assert_eq!(c.handle_line("bogus").unwrap_err().status(), 400);
    }

    #[test]
    fn stats_uses_status_source() {
        let c = console();
        assert_eq!(c.handle_line("stats").unwrap().unwrap(), "all good");
        assert!(c.handle_line("help").unwrap().unwrap().contains("move"));
    }
}
