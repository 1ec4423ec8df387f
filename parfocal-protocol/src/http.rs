//! HTTP route mapping
//!
//! The web interface issues plain GET/POST requests instead of command lines.
//! Each route corresponds to one [`Command`], so HTTP requests go through the
//! same dispatch path as serial and TCP commands.

use crate::command::{Argument, Command, ParseError};

/// Route that reports the current position
pub const ROUTE_POSITION: &str = "G-C";
/// Route that reports the current temperature
pub const ROUTE_TEMPERATURE: &str = "G-T";
/// Route that stops the motor
pub const ROUTE_HALT: &str = "M-Halt";
/// Route that moves to the `n_pos` form field
pub const ROUTE_GOTO: &str = "M-Go";
/// Form field carrying the absolute target of [`ROUTE_GOTO`]
pub const FIELD_NEW_POSITION: &str = "n_pos";

/// Jog routes and their signed step counts
const JOG_ROUTES: [(&str, i32); 8] = [
    ("M-m500", -500),
    ("M-m100", -100),
    ("M-m10", -10),
    ("M-m1", -1),
    ("M-p1", 1),
    ("M-p10", 10),
    ("M-p100", 100),
    ("M-p500", 500),
];

/// Map a request path (with or without a leading `/`) to a command
///
/// `new_position` is the value of the [`FIELD_NEW_POSITION`] form field, if
/// the request carried one.
pub fn route(path: &str, new_position: Option<&str>) -> Result<Command, ParseError> {
    let path = path.trim_start_matches('/');

    match path {
        ROUTE_POSITION => Ok(Command::GetPosition),
        ROUTE_TEMPERATURE => Ok(Command::GetTemperature),
        ROUTE_HALT => Ok(Command::Halt),
        ROUTE_GOTO => {
            let value = new_position.map(str::trim).unwrap_or("");
            Argument(value).position().map(Command::MoveTo)
        }
        _ => JOG_ROUTES
            .iter()
            .find(|(route, _)| *route == path)
            .map(|&(_, steps)| Command::MoveRelative(steps))
            .ok_or(ParseError::Malformed),
    }
}
