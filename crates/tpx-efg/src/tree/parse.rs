//! Line-oriented game description format.
//!
//! One statement per line; `#` lines are comments and blank lines are
//! skipped. Statements:
//!
//! ```text
//! node <id> leaf payoffs <player>=<float> ...
//! node <id> chance actions <child>=<prob> ...
//! node <id> player <p> actions <child> ...
//! infoset <canonical> nodes <node> ...
//! ```
//!
//! Child order is positional and defines the action index. An `infoset`
//! statement groups its canonical node with the listed members.

use crate::*;
use anyhow::{bail, Context, Result};

/// One parsed statement, prior to any cross-record validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Leaf {
        id: String,
        payoffs: Vec<(Player, Utility)>,
    },
    Chance {
        id: String,
        outcomes: Vec<(String, Probability)>,
    },
    Decision {
        id: String,
        player: Player,
        children: Vec<String>,
    },
    Partition {
        canonical: String,
        members: Vec<String>,
    },
}

/// Parse a full description into records, tagging errors with the
/// offending line.
pub fn records(text: &str) -> Result<Vec<Record>> {
    let mut parsed = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        parsed.push(record(line).with_context(|| format!("line {}: {}", i + 1, line))?);
    }
    if parsed.is_empty() {
        bail!("empty game description");
    }
    Ok(parsed)
}

fn record(line: &str) -> Result<Record> {
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("node") => {
            let id = tokens.next().context("missing node id")?.to_string();
            match tokens.next() {
                Some("leaf") => {
                    keyword(tokens.next(), "payoffs")?;
                    let payoffs = tokens
                        .map(|t| {
                            let (player, value) = pair(t)?;
                            let player = player
                                .parse::<Player>()
                                .with_context(|| format!("bad player index '{}'", player))?;
                            Ok((player, value))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Record::Leaf { id, payoffs })
                }
                Some("chance") => {
                    keyword(tokens.next(), "actions")?;
                    let outcomes = tokens
                        .map(pair)
                        .collect::<Result<Vec<(String, Probability)>>>()?;
                    if outcomes.is_empty() {
                        bail!("chance node '{}' has no outcomes", id);
                    }
                    Ok(Record::Chance { id, outcomes })
                }
                Some("player") => {
                    let seat = tokens.next().context("missing player index")?;
                    let player = seat
                        .parse::<Player>()
                        .with_context(|| format!("bad player index '{}'", seat))?;
                    if player == CHANCE {
                        bail!("player index 0 is reserved for chance");
                    }
                    keyword(tokens.next(), "actions")?;
                    let children = tokens.map(String::from).collect::<Vec<_>>();
                    if children.is_empty() {
                        bail!("decision node '{}' has no actions", id);
                    }
                    Ok(Record::Decision {
                        id,
                        player,
                        children,
                    })
                }
                other => bail!("unknown node kind {:?}", other.unwrap_or("")),
            }
        }
        Some("infoset") => {
            let canonical = tokens.next().context("missing canonical node id")?.to_string();
            keyword(tokens.next(), "nodes")?;
            let members = tokens.map(String::from).collect::<Vec<_>>();
            Ok(Record::Partition { canonical, members })
        }
        other => bail!("unknown statement {:?}", other.unwrap_or("")),
    }
}

fn keyword(token: Option<&str>, expected: &str) -> Result<()> {
    match token {
        Some(t) if t == expected => Ok(()),
        other => bail!("expected '{}', found {:?}", expected, other.unwrap_or("")),
    }
}

/// Split a `key=value` token with a float value.
fn pair(token: &str) -> Result<(String, f64)> {
    let (key, value) = token
        .split_once('=')
        .with_context(|| format!("expected key=value, found '{}'", token))?;
    let value = value
        .parse::<f64>()
        .with_context(|| format!("bad number '{}'", value))?;
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_parse() {
        let text = "
            # a comment
            node a chance actions b=0.5 c=0.5
            node b player 1 actions d e
            node d leaf payoffs 1=1 2=-1
            infoset b nodes c
        ";
        let records = records(text).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(
            records[1],
            Record::Decision {
                id: "b".into(),
                player: 1,
                children: vec!["d".into(), "e".into()],
            }
        );
        assert_eq!(
            records[3],
            Record::Partition {
                canonical: "b".into(),
                members: vec!["c".into()],
            }
        );
    }

    #[test]
    fn empty_description_is_an_error() {
        assert!(records("# nothing here\n").is_err());
    }

    #[test]
    fn chance_player_index_is_rejected() {
        assert!(records("node a player 0 actions b").is_err());
    }

    #[test]
    fn errors_name_the_line() {
        let err = records("node a chance actions b=oops").unwrap_err();
        assert!(format!("{:#}", err).contains("line 1"));
    }
}
