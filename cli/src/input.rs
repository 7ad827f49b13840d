//! Parsing of interactive commands and JSONL element input.

use aliboard::Element;
use aliboard::store::generate_id;
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("unknown command `{0}`; try `help`")]
    Unknown(String),
    #[error("missing argument: {0}")]
    Missing(&'static str),
    #[error("not a number: {0}")]
    InvalidNumber(String),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("element needs a JSON object with a non-empty `type`")]
    InvalidElement,
}

/// One line typed at the `join` prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum InputCommand {
    Chat(String),
    Cursor { x: f64, y: f64 },
    Add(Element),
    Update(Element),
    Remove(String),
    Patch(Value),
    Stroke(Value),
    Ring(Option<String>),
    End(Option<String>),
    Presence(String),
    Grid { size: f64, kind: String },
    Snapshot,
    Publish,
    Elements,
    Log,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  chat <text>            send a chat line
  cursor <x> <y>         move the cursor
  add <json>             create an element (id generated when absent)
  update <json>          replace an element
  remove <id>            delete an element
  patch <json>           send an opaque board operation
  stroke <json>          send a finished stroke
  ring [to_id]           start a call
  end [to_id]            hang up
  presence <status>      announce status
  grid <size> [kind]     set grid (needs --grid-sync)
  snapshot               ask the server for the room snapshot
  publish                send local elements as a snapshot
  elements               print the local element store
  log                    print the patch log
  quit";

/// Parse one interactive line. Blank lines yield `None`.
///
/// # Errors
///
/// Returns [`InputError`] for unknown commands or malformed arguments.
pub fn parse_command(line: &str) -> Result<Option<InputCommand>, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let optional = || Some(rest.to_owned()).filter(|rest| !rest.is_empty());

    let command = match word {
        "chat" | "say" => InputCommand::Chat(required(rest, "chat text")?.to_owned()),
        "cursor" => {
            let mut parts = rest.split_whitespace();
            let x = number(parts.next().ok_or(InputError::Missing("x"))?)?;
            let y = number(parts.next().ok_or(InputError::Missing("y"))?)?;
            InputCommand::Cursor { x, y }
        }
        "add" => InputCommand::Add(element(required(rest, "element JSON")?)?),
        "update" => InputCommand::Update(element(required(rest, "element JSON")?)?),
        "remove" | "rm" => InputCommand::Remove(required(rest, "element id")?.to_owned()),
        "patch" => InputCommand::Patch(serde_json::from_str(required(rest, "patch JSON")?)?),
        "stroke" => InputCommand::Stroke(serde_json::from_str(required(rest, "stroke JSON")?)?),
        "ring" => InputCommand::Ring(optional()),
        "end" | "hangup" => InputCommand::End(optional()),
        "presence" => InputCommand::Presence(required(rest, "status")?.to_owned()),
        "grid" => {
            let mut parts = rest.split_whitespace();
            let size = number(parts.next().ok_or(InputError::Missing("grid size"))?)?;
            let kind = parts.next().unwrap_or("grid").to_owned();
            InputCommand::Grid { size, kind }
        }
        "snapshot" => InputCommand::Snapshot,
        "publish" => InputCommand::Publish,
        "elements" | "ls" => InputCommand::Elements,
        "log" => InputCommand::Log,
        "help" | "?" => InputCommand::Help,
        "quit" | "exit" => InputCommand::Quit,
        other => return Err(InputError::Unknown(other.to_owned())),
    };
    Ok(Some(command))
}

/// Parse one JSONL line into an element. Blank lines and non-element rows
/// (no `type`, or an export metadata row) yield `None`; a missing id is
/// generated.
///
/// # Errors
///
/// Returns [`InputError::Json`] when the line is not valid JSON.
pub fn parse_jsonl_element_line(line: &str) -> Result<Option<Element>, InputError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value = serde_json::from_str::<Value>(trimmed)?;
    let Some(map) = value.as_object() else {
        return Ok(None);
    };
    match map.get("type").and_then(Value::as_str) {
        None | Some("" | "board_export_meta") => Ok(None),
        Some(_) => Ok(Element::from_value(&with_id(map.clone()))),
    }
}

fn required<'a>(rest: &'a str, what: &'static str) -> Result<&'a str, InputError> {
    if rest.is_empty() {
        Err(InputError::Missing(what))
    } else {
        Ok(rest)
    }
}

fn number(text: &str) -> Result<f64, InputError> {
    text.parse::<f64>()
        .map_err(|_| InputError::InvalidNumber(text.to_owned()))
}

fn element(json: &str) -> Result<Element, InputError> {
    let Value::Object(map) = serde_json::from_str::<Value>(json)? else {
        return Err(InputError::InvalidElement);
    };
    Element::from_value(&with_id(map)).ok_or(InputError::InvalidElement)
}

fn with_id(mut map: Map<String, Value>) -> Value {
    let has_id = match map.get("id") {
        Some(Value::String(id)) => !id.is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    };
    if !has_id {
        map.insert("id".to_owned(), Value::String(generate_id(None)));
    }
    Value::Object(map)
}

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;
