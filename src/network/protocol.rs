//! Line protocol spoken between nodes.
//!
//! Every exchange is one request line and one response line over a fresh
//! connection:
//!
//! ```text
//! request vote:<term>:<candidate id>   ->   granted | denied
//! health:<term>:<leader id>            ->   OK
//! ```

use std::fmt;
use std::str::FromStr;

use super::ProtocolError;

pub const REQUEST_VOTE_PREFIX: &str = "request vote:";
pub const HEARTBEAT_PREFIX: &str = "health:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    RequestVote { term: u64, candidate_id: String },
    Heartbeat { term: u64, leader_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Granted,
    Denied,
    Ok,
}

/// Splits `<term>:<id>`. The id is everything after the first colon, so
/// addresses like `localhost:8001` survive intact.
fn parse_term_and_id(body: &str) -> Result<(u64, String), ProtocolError> {
    let (term, id) = body.split_once(':').ok_or(ProtocolError::MissingIdentifier)?;
    // The last term has no successor, so no node could ever campaign past it.
    let term = term
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|&t| t < u64::MAX)
        .ok_or_else(|| ProtocolError::InvalidTerm(term.to_string()))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(ProtocolError::MissingIdentifier);
    }
    Ok((term, id.to_string()))
}

impl FromStr for Request {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(body) = line.strip_prefix(REQUEST_VOTE_PREFIX) {
            let (term, candidate_id) = parse_term_and_id(body)?;
            Ok(Request::RequestVote { term, candidate_id })
        } else if let Some(body) = line.strip_prefix(HEARTBEAT_PREFIX) {
            let (term, leader_id) = parse_term_and_id(body)?;
            Ok(Request::Heartbeat { term, leader_id })
        } else {
            Err(ProtocolError::UnknownRequest(line.to_string()))
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::RequestVote { term, candidate_id } => {
                write!(f, "{REQUEST_VOTE_PREFIX}{term}:{candidate_id}")
            }
            Request::Heartbeat { term, leader_id } => {
                write!(f, "{HEARTBEAT_PREFIX}{term}:{leader_id}")
            }
        }
    }
}

impl FromStr for Response {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        match line.trim() {
            "granted" => Ok(Response::Granted),
            "denied" => Ok(Response::Denied),
            "OK" => Ok(Response::Ok),
            other => Err(ProtocolError::UnknownResponse(other.to_string())),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Granted => write!(f, "granted"),
            Response::Denied => write!(f, "denied"),
            Response::Ok => write!(f, "OK"),
        }
    }
}
