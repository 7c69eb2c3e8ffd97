//! In-band command interpreter
//!
//! Chat bodies starting with `/` are commands. The first whitespace
//! separated token picks the command (case-sensitive, exact match); the
//! rest are arguments. Replies are plain text that the server sends back
//! to the issuing user only.

use crate::block::BlockGraph;
use crate::registry::SessionRegistry;

/// A parsed `/Command`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/Name`
    Name,
    /// `/Block <name>+`
    Block(Vec<String>),
    /// `/UnBlock <name>+`
    UnBlock(Vec<String>),
    /// `/Blocked`
    Blocked,
    /// `/DisplayUsers`
    DisplayUsers,
    /// `/DisplayAllUsers`
    DisplayAllUsers,
    /// Anything else starting with `/`; inert
    Unknown(String),
}

impl Command {
    /// Parse a chat body; None if it is not a command at all
    pub fn parse(body: &str) -> Option<Self> {
        if !body.starts_with('/') {
            return None;
        }

        let mut tokens = body.split_whitespace();
        let head = tokens.next().unwrap_or("/");
        let args: Vec<String> = tokens.map(str::to_string).collect();

        let command = match head {
            "/Name" => Command::Name,
            "/Block" => Command::Block(args),
            "/UnBlock" => Command::UnBlock(args),
            "/Blocked" => Command::Blocked,
            "/DisplayUsers" => Command::DisplayUsers,
            "/DisplayAllUsers" => Command::DisplayAllUsers,
            other => Command::Unknown(other.to_string()),
        };
        Some(command)
    }

    /// Run the command on behalf of `sender`
    ///
    /// Returns the reply text, or None for unknown commands, which are
    /// dropped without any response.
    pub fn execute(
        &self,
        sender: &str,
        registry: &SessionRegistry,
        blocks: &mut BlockGraph,
    ) -> Option<String> {
        let reply = match self {
            Command::Name => format!("Your username is {}", sender),
            Command::Block(names) => {
                // Names already blocked are still reported
                let mut blocked: Vec<&str> = Vec::new();
                for name in names {
                    if name == sender || !registry.is_known(name) {
                        continue;
                    }
                    blocks.block(sender, name);
                    blocked.push(name);
                }
                if blocked.is_empty() {
                    "No users were blocked".to_string()
                } else {
                    format!(
                        "The following users will now be blocked: {}",
                        blocked.join(" ")
                    )
                }
            }
            Command::UnBlock(names) => {
                let unblocked: Vec<&str> = names
                    .iter()
                    .filter(|name| blocks.unblock(sender, name))
                    .map(String::as_str)
                    .collect();
                if unblocked.is_empty() {
                    "No users were un-blocked".to_string()
                } else {
                    format!(
                        "The following users will now be un-blocked: {}",
                        unblocked.join(" ")
                    )
                }
            }
            Command::Blocked => {
                let blocked = blocks.blocked_by(sender);
                if blocked.is_empty() {
                    "You have no users blocked".to_string()
                } else {
                    let names: Vec<&str> = blocked.iter().map(String::as_str).collect();
                    format!("You currently have these users blocked: {}", names.join(" "))
                }
            }
            Command::DisplayUsers => format!(
                "\n\nCURRENT USER(S) ONLINE\n{}\n{}",
                "-".repeat(22),
                registry.online().join("\n")
            ),
            Command::DisplayAllUsers => {
                let mut reply = format!("\n\n   ALL USER(S)\n{}\n", "-".repeat(22));
                for user in registry.list() {
                    let status = if user.active { "ONLINE" } else { "OFFLINE" };
                    reply.push_str(&format!("\n{} : {}", user.name, status));
                }
                reply
            }
            Command::Unknown(_) => return None,
        };
        Some(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::types::SessionId;
    use tokio::sync::mpsc;

    fn registry(online: &[&str], offline: &[&str]) -> SessionRegistry {
        let known = offline.iter().map(|n| n.to_string()).collect();
        let mut registry = SessionRegistry::with_known_users(known);
        for name in online {
            let (tx, _rx) = mpsc::channel(8);
            let id = SessionId::new();
            registry.connect(Session::new(id, tx));
            registry.register(name, id);
        }
        registry
    }

    #[test]
    fn test_parse() {
        assert_eq!(Command::parse("hello"), None);
        assert_eq!(Command::parse("/Name"), Some(Command::Name));
        assert_eq!(
            Command::parse("/Block  bob   carol "),
            Some(Command::Block(vec!["bob".into(), "carol".into()]))
        );
        assert_eq!(Command::parse("/Blocked"), Some(Command::Blocked));
        assert_eq!(
            Command::parse("/DisplayUsers extra"),
            Some(Command::DisplayUsers)
        );
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!(
            Command::parse("/name"),
            Some(Command::Unknown("/name".into()))
        );
        assert_eq!(Command::parse("/"), Some(Command::Unknown("/".into())));
    }

    #[test]
    fn test_name() {
        let registry = registry(&["alice"], &[]);
        let mut blocks = BlockGraph::new();
        let reply = Command::Name.execute("alice", &registry, &mut blocks);
        assert_eq!(reply.as_deref(), Some("Your username is alice"));
    }

    #[test]
    fn test_block_skips_unknown_and_self() {
        let registry = registry(&["alice", "bob"], &["carol"]);
        let mut blocks = BlockGraph::new();

        let cmd = Command::parse("/Block bob alice ghost carol").unwrap();
        let reply = cmd.execute("alice", &registry, &mut blocks);

        assert_eq!(
            reply.as_deref(),
            Some("The following users will now be blocked: bob carol")
        );
        assert!(blocks.has_blocked("alice", "bob"));
        assert!(blocks.has_blocked("alice", "carol"));
        assert!(!blocks.has_blocked("alice", "ghost"));
        assert!(!blocks.has_blocked("alice", "alice"));
    }

    #[test]
    fn test_block_already_blocked_is_reported() {
        let registry = registry(&["alice", "bob", "carol"], &[]);
        let mut blocks = BlockGraph::new();
        blocks.block("alice", "bob");

        let reply = Command::parse("/Block bob carol")
            .unwrap()
            .execute("alice", &registry, &mut blocks);

        assert_eq!(
            reply.as_deref(),
            Some("The following users will now be blocked: bob carol")
        );
        assert_eq!(blocks.blocked_by("alice").len(), 2);

        let reply = Command::parse("/Block bob")
            .unwrap()
            .execute("alice", &registry, &mut blocks);
        assert_eq!(
            reply.as_deref(),
            Some("The following users will now be blocked: bob")
        );
    }

    #[test]
    fn test_block_nothing() {
        let registry = registry(&["alice"], &[]);
        let mut blocks = BlockGraph::new();
        let reply = Command::parse("/Block ghost")
            .unwrap()
            .execute("alice", &registry, &mut blocks);
        assert_eq!(reply.as_deref(), Some("No users were blocked"));
    }

    #[test]
    fn test_unblock_only_present_names() {
        let registry = registry(&["alice", "bob", "carol"], &[]);
        let mut blocks = BlockGraph::new();
        blocks.block("alice", "bob");

        let reply = Command::parse("/UnBlock bob carol")
            .unwrap()
            .execute("alice", &registry, &mut blocks);

        assert_eq!(
            reply.as_deref(),
            Some("The following users will now be un-blocked: bob")
        );
        assert!(blocks.blocked_by("alice").is_empty());
    }

    #[test]
    fn test_blocked_listing() {
        let registry = registry(&["alice", "bob", "carol"], &[]);
        let mut blocks = BlockGraph::new();

        let reply = Command::Blocked.execute("alice", &registry, &mut blocks);
        assert_eq!(reply.as_deref(), Some("You have no users blocked"));

        blocks.block("alice", "carol");
        blocks.block("alice", "bob");
        let reply = Command::Blocked.execute("alice", &registry, &mut blocks);
        assert_eq!(
            reply.as_deref(),
            Some("You currently have these users blocked: bob carol")
        );
    }

    #[test]
    fn test_display_users() {
        let registry = registry(&["bob", "alice"], &["carol"]);
        let mut blocks = BlockGraph::new();

        let reply = Command::DisplayUsers
            .execute("alice", &registry, &mut blocks)
            .unwrap();
        assert!(reply.ends_with("----------------------\nalice\nbob"));
        assert!(!reply.contains("carol"));

        let reply = Command::DisplayAllUsers
            .execute("alice", &registry, &mut blocks)
            .unwrap();
        assert!(reply.contains("ALL USER(S)"));
        assert!(reply.contains("\nalice : ONLINE"));
        assert!(reply.contains("\ncarol : OFFLINE"));
    }

    #[test]
    fn test_unknown_command_is_inert() {
        let registry = registry(&["alice"], &[]);
        let mut blocks = BlockGraph::new();
        let cmd = Command::parse("/Frobnicate x").unwrap();
        assert_eq!(cmd.execute("alice", &registry, &mut blocks), None);
    }
}
