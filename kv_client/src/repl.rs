//! This module contains code for the REPL (Read-Eval-Print-Loop) of the
//! cli. It is responsible for reading _and parsing_ user input, evaluating it,
//! and printing the result.

use crate::cli::to_ipv4_socket_addr;
use crate::client::{Client, RangeResult};
use shared::key::{Key, KeyRange, UNBOUNDED_END};
use shared::logger::{LogLevel, Logger};
use shared::value::{KeyValue, Value};
use std::io::Write;
use std::net::SocketAddr;
use tracing::{trace, warn};

/// A parsed line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Help,
    Quit,
    LogLevel(LogLevel),
    Connect(SocketAddr),
    Disconnect,
    Get(Vec<Key>),
    Put(KeyValue),
    MultiPut(Vec<KeyValue>),
    Delete(Vec<Key>),
    CompareAndPut { key: Key, expect: Value, value: Value },
    Range { range: KeyRange, limit: Option<u32> },
    DeleteRange(KeyRange),
    Move { from: Key, to: Key },
}

pub struct Repl {
    quit_requested: bool,
    logger: Logger,
    last_input: String,
    client: Client,
}

impl Repl {
    const PROMPT: &'static str = "StoreClient>";
    const HELP_MSG: &'static str = r#"Available commands:
help: print this help message
quit: quit the program
connect <address> <port>: connect to the server at <address> <port>
disconnect: disconnect from the server
get <key>...: get the values of one or more keys
put <key> <val>: put <key> <val> into the store
mput <key> <val> [<key> <val>...]: put all pairs in one atomic batch
delete <key>...: delete one or more keys in one atomic batch
cas <key> <expect> <val>: put <val> only if the current value is <expect>, '-' expects no value
range <key> [<end>|*] [<limit>]: list the pairs in [<key>, <end>), '*' for no end
prefix <prefix>: list the pairs whose key starts with <prefix>
delrange <key> [<end>|*]: delete the pairs in [<key>, <end>), '*' for no end
mv <from> <to>: move the value of <from> to <to>
logLevel <level>: set the log level to <level>"#;

    pub fn new(logger: Logger, client: Client) -> Self {
        Self {
            quit_requested: false,
            logger,
            last_input: String::with_capacity(30),
            client,
        }
    }
    pub async fn run(&mut self) {
        trace!("REPL running and awaiting user input");
        if let Some(addr) = self.client.is_connected() {
            self.print(&format!("Connected to {}", addr));
        }
        loop {
            if self.quit_requested {
                break;
            }
            if !self.read_line() {
                break;
            }

            let feedback: String = match self.eval_line().await {
                Ok(response) => response,
                Err(reason) => reason,
            };

            self.print(&feedback);
        }
        trace!("REPL stopped");
    }
    /// Returns false once stdin is exhausted.
    fn read_line(&mut self) -> bool {
        print!("{} ", Self::PROMPT);
        let _ = std::io::stdout().flush();
        self.last_input.clear();
        match std::io::stdin().read_line(&mut self.last_input) {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to read line: {}", e);
                false
            }
        }
    }
    async fn eval_line(&mut self) -> Result<String, String> {
        let input = parse_line(&self.last_input)?;
        self.eval(input).await.map_err(|e| e.to_string())
    }
    async fn eval(&mut self, input: Input) -> Result<String, crate::client::ClientError> {
        let feedback = match input {
            Input::Help => Self::HELP_MSG.to_string(),
            Input::Quit => {
                self.quit_requested = true;
                "Quitting...".to_string()
            }
            Input::LogLevel(level) => match self.logger.set_log_level(level) {
                Ok(old) => format!("Log level set from {} to {}", old, level),
                Err(e) => e.to_string(),
            },
            Input::Connect(addr) => {
                self.client.connect(&addr).await?;
                format!("Connected to {}", addr)
            }
            Input::Disconnect => {
                let addr = self.client.disconnect()?;
                format!("Disconnected from {}", addr)
            }
            Input::Get(keys) => {
                let kvs = self.client.batch_get(keys).await?;
                or_nothing(&kvs, "No such key")
            }
            Input::Put(kv) => match self.client.put(kv).await? {
                Some(prev) => format!("Updated, previously {}", prev),
                None => "Inserted".to_string(),
            },
            Input::MultiPut(kvs) => {
                let count = kvs.len();
                let prev = self.client.batch_put(kvs).await?;
                format!("Put {} pairs, {} of them existed before", count, prev.len())
            }
            Input::Delete(keys) => {
                let prev = self.client.batch_delete(keys).await?;
                if prev.is_empty() {
                    "Nothing to delete".to_string()
                } else {
                    format!("Deleted {} pairs\n{}", prev.len(), or_nothing(&prev, ""))
                }
            }
            Input::CompareAndPut { key, expect, value } => {
                match self.client.compare_and_put(key, expect, value).await? {
                    (true, _) => "Success".to_string(),
                    (false, Some(current)) => format!("Failed, current pair is {}", current),
                    (false, None) => "Failed, key does not exist".to_string(),
                }
            }
            Input::Range { range, limit } => {
                let RangeResult { kvs, more } = self.client.range(&range, limit, false).await?;
                let listing = or_nothing(&kvs, "Empty range");
                if more {
                    format!("{}\n... more pairs available", listing)
                } else {
                    listing
                }
            }
            Input::DeleteRange(range) => {
                let (deleted, _) = self.client.delete_range(&range).await?;
                format!("Deleted {} pairs", deleted)
            }
            Input::Move { from, to } => {
                match self.client.move_value(from.clone(), to).await? {
                    Some(kv) if kv.key == from => format!("Moved {}", kv),
                    Some(kv) => format!("Nothing to move, destination holds {}", kv),
                    None => "Nothing to move".to_string(),
                }
            }
        };
        Ok(feedback)
    }
    fn print(&self, msg: &str) {
        println!("{} {}", Self::PROMPT, msg);
    }
}

/// One pair per line, or `nothing` if there are none.
fn or_nothing(kvs: &[KeyValue], nothing: &str) -> String {
    if kvs.is_empty() {
        return nothing.to_string();
    }
    kvs.iter()
        .map(KeyValue::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_range_end(token: Option<&str>) -> Vec<u8> {
    match token {
        None => Vec::new(),
        Some("*") => UNBOUNDED_END.to_vec(),
        Some(end) => end.as_bytes().to_vec(),
    }
}

fn parse_line(line: &str) -> Result<Input, String> {
    let mut tokens = line.split_whitespace();
    let command = tokens
        .next()
        .ok_or("Command missing, type 'help' for usage information")?;
    let args = tokens.collect::<Vec<&str>>();
    let input = match (command, args.as_slice()) {
        ("help", _) => Input::Help,
        ("quit", _) => Input::Quit,
        ("logLevel", [level]) => Input::LogLevel(LogLevel::try_from(*level).map_err(|_| {
            "Could not parse argument as a valid log level".to_string()
        })?),
        ("connect", [addr, port]) => Input::Connect(to_ipv4_socket_addr(addr, port)?),
        ("disconnect", []) => Input::Disconnect,
        ("get", keys) if !keys.is_empty() => Input::Get(keys.iter().map(|k| Key::from(*k)).collect()),
        ("put", [key, value]) => Input::Put(KeyValue::new(*key, *value)),
        ("mput", pairs) if !pairs.is_empty() && pairs.len() % 2 == 0 => Input::MultiPut(
            pairs
                .chunks(2)
                .map(|pair| KeyValue::new(pair[0], pair[1]))
                .collect(),
        ),
        ("delete", keys) if !keys.is_empty() => {
            Input::Delete(keys.iter().map(|k| Key::from(*k)).collect())
        }
        ("cas", [key, expect, value]) => Input::CompareAndPut {
            key: Key::from(*key),
            expect: match *expect {
                "-" => Value::default(),
                expect => Value::from(expect),
            },
            value: Value::from(*value),
        },
        ("range", [key, rest @ ..]) if rest.len() <= 2 => {
            let limit = match rest.get(1) {
                Some(limit) => Some(
                    limit
                        .parse::<u32>()
                        .map_err(|e| format!("Could not parse limit {}: {}", limit, e))?,
                ),
                None => None,
            };
            Input::Range {
                range: KeyRange::new(*key, parse_range_end(rest.first().copied())),
                limit,
            }
        }
        ("prefix", [prefix]) => Input::Range {
            range: KeyRange::prefix(*prefix),
            limit: None,
        },
        ("delrange", [key, rest @ ..]) if rest.len() <= 1 => Input::DeleteRange(KeyRange::new(
            *key,
            parse_range_end(rest.first().copied()),
        )),
        ("mv", [from, to]) => Input::Move {
            from: Key::from(*from),
            to: Key::from(*to),
        },
        (
            "logLevel" | "connect" | "disconnect" | "get" | "put" | "mput" | "delete" | "cas"
            | "range" | "prefix" | "delrange" | "mv",
            _,
        ) => {
            return Err(format!(
                "Wrong number of arguments for {} command, type 'help' for usage information",
                command
            ))
        }
        (unknown, _) => return Err(format!("Unknown command {}\n{}", unknown, Repl::HELP_MSG)),
    };
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_point_commands() {
        assert_eq!(parse_line("  help  \n"), Ok(Input::Help));
        assert_eq!(
            parse_line("get a b"),
            Ok(Input::Get(vec![Key::from("a"), Key::from("b")]))
        );
        assert_eq!(parse_line("put k v"), Ok(Input::Put(KeyValue::new("k", "v"))));
        assert_eq!(
            parse_line("mput a 1 b 2"),
            Ok(Input::MultiPut(vec![
                KeyValue::new("a", "1"),
                KeyValue::new("b", "2")
            ]))
        );
        assert_eq!(
            parse_line("mv a b"),
            Ok(Input::Move {
                from: Key::from("a"),
                to: Key::from("b")
            })
        );
        assert_eq!(parse_line("logLevel trace"), Ok(Input::LogLevel(LogLevel::Trace)));
    }

    #[test]
    fn cas_dash_expects_absence() {
        assert_eq!(
            parse_line("cas lock - me"),
            Ok(Input::CompareAndPut {
                key: Key::from("lock"),
                expect: Value::default(),
                value: Value::from("me"),
            })
        );
    }

    #[test]
    fn parses_ranges() {
        assert_eq!(
            parse_line("range a"),
            Ok(Input::Range {
                range: KeyRange::new("a", ""),
                limit: None
            })
        );
        assert_eq!(
            parse_line("range a * 10"),
            Ok(Input::Range {
                range: KeyRange::new("a", UNBOUNDED_END.to_vec()),
                limit: Some(10)
            })
        );
        assert_eq!(
            parse_line("prefix user/"),
            Ok(Input::Range {
                range: KeyRange::prefix("user/"),
                limit: None
            })
        );
        assert_eq!(
            parse_line("delrange a c"),
            Ok(Input::DeleteRange(KeyRange::new("a", "c")))
        );
        assert!(parse_line("range a * ten").is_err());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_line("").is_err());
        assert!(parse_line("put onlykey").is_err());
        assert!(parse_line("mput a 1 b").is_err());
        assert!(parse_line("get").is_err());
        assert!(parse_line("logLevel loud").is_err());
        assert!(parse_line("frobnicate").is_err());
    }
}
