//! # Remote commands.
//!
//! Peers drive a scheduler by writing ordered entries under
//! `<root>/_commands/`; the watcher drains them in FIFO order. The command
//! grammar is a whitespace-separated verb plus arguments.

use crate::error::SchedulerError;

/// A control command received through the coordination store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `start <group> <id>`: start a stopped replica.
    Start { group: String, id: String },
    /// `stop <group> <id>`: request a close.
    Stop { group: String, id: String },
    /// `append <group> <n>`: grow the group by `n` auto-started replicas.
    Append { group: String, size: usize },
    /// `remove <group>`: remove the last replica of the group.
    Remove { group: String },
}

impl Command {
    /// Parses the wire form.
    ///
    /// # Errors
    /// Returns [`SchedulerError::Config`] on an unknown verb or malformed
    /// arguments; the watcher logs these as rejected commands.
    pub fn parse(input: &str) -> Result<Self, SchedulerError> {
        let tokens: Vec<&str> = input.split_whitespace().collect();

        match tokens.as_slice() {
            ["start", group, id] => Ok(Command::Start {
                group: group.to_string(),
                id: id.to_string(),
            }),
            ["stop", group, id] => Ok(Command::Stop {
                group: group.to_string(),
                id: id.to_string(),
            }),
            ["append", group, n] => {
                let size = n.parse().map_err(|_| SchedulerError::Config {
                    reason: format!("append size must be an integer, got '{n}'"),
                })?;
                Ok(Command::Append {
                    group: group.to_string(),
                    size,
                })
            }
            ["remove", group] => Ok(Command::Remove {
                group: group.to_string(),
            }),
            _ => Err(SchedulerError::Config {
                reason: format!("unrecognized command '{input}'"),
            }),
        }
    }
}

/// Prefix under which ordered commands are written.
pub fn commands_prefix(root: &str) -> String {
    format!("{root}/_commands/")
}

/// Key for the `seq`-th command; zero-padded so lexicographic order is FIFO.
pub fn command_key(root: &str, seq: u64) -> String {
    format!("{}{seq:020}", commands_prefix(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_verbs() {
        assert_eq!(
            Command::parse("start sync sync-2").unwrap(),
            Command::Start {
                group: "sync".into(),
                id: "sync-2".into()
            }
        );
        assert_eq!(
            Command::parse("stop sync sync-0").unwrap(),
            Command::Stop {
                group: "sync".into(),
                id: "sync-0".into()
            }
        );
        assert_eq!(
            Command::parse("append sync 3").unwrap(),
            Command::Append {
                group: "sync".into(),
                size: 3
            }
        );
        assert_eq!(
            Command::parse("remove sync").unwrap(),
            Command::Remove {
                group: "sync".into()
            }
        );
    }

    #[test]
    fn tolerates_extra_whitespace() {
        assert_eq!(
            Command::parse("  start   sync   sync-1 ").unwrap(),
            Command::Start {
                group: "sync".into(),
                id: "sync-1".into()
            }
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(Command::parse("reboot sync").is_err());
        assert!(Command::parse("append sync many").is_err());
        assert!(Command::parse("start sync").is_err());
        assert!(Command::parse("").is_err());
    }

    #[test]
    fn command_keys_sort_fifo() {
        let a = command_key("/root", 9);
        let b = command_key("/root", 10);
        assert!(a < b);
    }
}
