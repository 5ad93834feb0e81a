//! Admin command surface: parsing, authorization and replies.
//!
//! Transport-agnostic: the adapter hands in the raw text and the message the
//! command replied to, and sends back whatever string comes out.

use crate::{
    audit::AuditEvent,
    domain::{normalize_identity, ChatId, MessageRef, Sender},
    engine::RelayOutcome,
    service::RelayService,
    store::{Insert, Removal},
    Result,
};

pub const UNAUTHORIZED_COMMAND: &str = "🚫 You are not authorized to use this command.";
pub const UNAUTHORIZED_MESSAGE: &str = "🚫 You are not authorized to use this bot.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    AddGroup(Option<String>),
    RemoveGroup(Option<String>),
    ListGroups,
    AddUser(Option<String>),
    RemoveUser(Option<String>),
    ListUsers,
    Delete,
    Help,
    Unknown(String),
}

impl Command {
    /// Parse `/cmd[@botname] [arg ...]`.
    ///
    /// Returns `None` for non-command text, and for commands addressed to some
    /// other bot (`@botname` present and not equal to `bot_username`).
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let text = text.trim();
        if !text.starts_with('/') {
            return None;
        }

        let (cmd, target, rest) = split_command(text);
        if let (Some(target), Some(me)) = (target.as_deref(), bot_username) {
            let me = me.trim_start_matches('@');
            if !target.eq_ignore_ascii_case(me) {
                return None;
            }
        }
        let arg = rest.split_whitespace().next().map(|s| s.to_string());

        Some(match cmd.as_str() {
            "add_group" => Self::AddGroup(arg),
            "remove_group" => Self::RemoveGroup(arg),
            "list_groups" => Self::ListGroups,
            "add_user" => Self::AddUser(arg),
            "remove_user" => Self::RemoveUser(arg),
            "list_users" => Self::ListUsers,
            "delete" | "unrelay" => Self::Delete,
            "start" | "help" => Self::Help,
            _ => Self::Unknown(cmd),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::AddGroup(_) => "add_group",
            Self::RemoveGroup(_) => "remove_group",
            Self::ListGroups => "list_groups",
            Self::AddUser(_) => "add_user",
            Self::RemoveUser(_) => "remove_user",
            Self::ListUsers => "list_users",
            Self::Delete => "delete",
            Self::Help => "help",
            Self::Unknown(name) => name.as_str(),
        }
    }
}

fn split_command(text: &str) -> (String, Option<String>, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let mut name = first.trim_start_matches('/').splitn(2, '@');
    let cmd = name.next().unwrap_or("").to_lowercase();
    let target = name.next().map(|t| t.to_string());

    (cmd, target, rest)
}

pub fn help_text() -> String {
    [
        "🤖 <b>Relay bot</b>",
        "",
        "Text you send here is relayed to every configured group.",
        "",
        "/add_group &lt;group_id&gt; - add a destination group",
        "/remove_group &lt;group_id&gt; - remove a destination group",
        "/list_groups - list destination groups",
        "/add_user &lt;username&gt; - authorize a user",
        "/remove_user &lt;username&gt; - revoke a user",
        "/list_users - list authorized users",
        "/delete - reply to a relayed message to delete every copy",
    ]
    .join("\n")
}

fn usage(syntax: &str) -> String {
    format!("❌ Usage: {syntax}")
}

/// Run an already-parsed command on behalf of `sender`.
///
/// `reply_to` is the message the command was sent in reply to (used by `/delete`).
pub async fn execute(
    service: &RelayService,
    sender: &Sender,
    command: &Command,
    reply_to: Option<&MessageRef>,
) -> Result<String> {
    let authorized = service.authorizer().is_sender_authorized(sender).await?;
    service.audit(AuditEvent::command(sender, command.name(), authorized));
    if !authorized {
        return Ok(UNAUTHORIZED_COMMAND.to_string());
    }

    dispatch(service, sender, command, reply_to)
        .await
        .inspect_err(|e| {
            service.audit(AuditEvent::error(Some(sender), &e.to_string(), command.name()))
        })
}

async fn dispatch(
    service: &RelayService,
    sender: &Sender,
    command: &Command,
    reply_to: Option<&MessageRef>,
) -> Result<String> {
    let reply = match command {
        Command::AddGroup(None) => usage("/add_group &lt;group_id&gt;"),
        Command::AddGroup(Some(g)) => match service.groups().add(&ChatId::from(g.as_str())).await? {
            Insert::Added => format!("✅ Group {} added.", escape_html(g)),
            Insert::AlreadyExists => format!("❌ Group {} already exists.", escape_html(g)),
        },

        Command::RemoveGroup(None) => usage("/remove_group &lt;group_id&gt;"),
        Command::RemoveGroup(Some(g)) => {
            match service.groups().remove(&ChatId::from(g.as_str())).await? {
                Removal::Removed => format!("✅ Group {} removed.", escape_html(g)),
                Removal::NotFound => format!("❌ Group {} does not exist.", escape_html(g)),
            }
        }

        Command::ListGroups => {
            let groups = service.groups().list().await?;
            if groups.is_empty() {
                "ℹ️ No groups configured.".to_string()
            } else {
                let names: Vec<String> = groups.iter().map(|g| escape_html(g.as_str())).collect();
                format!("📋 Configured groups:\n{}", names.join(", "))
            }
        }

        Command::AddUser(arg) => {
            let Some(user) = arg.as_deref().and_then(normalize_identity) else {
                return Ok(usage("/add_user &lt;username&gt;"));
            };
            match service.users().add(&user).await? {
                Insert::Added => format!("✅ User {} added.", escape_html(&user)),
                Insert::AlreadyExists => format!("❌ User {} already exists.", escape_html(&user)),
            }
        }

        Command::RemoveUser(arg) => {
            let Some(user) = arg.as_deref().and_then(normalize_identity) else {
                return Ok(usage("/remove_user &lt;username&gt;"));
            };
            match service.users().remove(&user).await? {
                Removal::Removed => format!("✅ User {} removed.", escape_html(&user)),
                Removal::NotFound => format!("❌ User {} does not exist.", escape_html(&user)),
            }
        }

        Command::ListUsers => {
            let users = service.users().list().await?;
            if users.is_empty() {
                "ℹ️ No authorized users.".to_string()
            } else {
                let names: Vec<String> = users.iter().map(|u| escape_html(u)).collect();
                format!("📋 Authorized users:\n{}", names.join(", "))
            }
        }

        Command::Delete => {
            let Some(target) = reply_to else {
                return Ok(usage("reply to a relayed message with /delete"));
            };
            delete_reply(service, sender, target).await?
        }

        Command::Help => help_text(),
        Command::Unknown(name) => format!("❓ Unknown command: /{}", escape_html(name)),
    };

    Ok(reply)
}

async fn delete_reply(service: &RelayService, sender: &Sender, target: &MessageRef) -> Result<String> {
    // The target is either an original or one of its relayed copies.
    let relay_map = service.engine().relay_map();
    let original = if !relay_map.lookup(target).await?.is_empty() {
        target.clone()
    } else if let Some(orig) = relay_map.original_of(target).await? {
        orig
    } else {
        return Ok("ℹ️ No relayed copies found for that message.".to_string());
    };

    let out = service.cascade_delete(&original, Some(sender)).await?;
    let mut reply = format!(
        "🗑 Deleted {}/{} relayed copies.",
        out.deleted.len(),
        out.attempted()
    );
    if !out.failed.is_empty() {
        let failed: Vec<String> = out
            .failed
            .iter()
            .map(|f| escape_html(f.relayed.chat_id.as_str()))
            .collect();
        reply.push_str(&format!("\n⚠️ Could not delete in: {}", failed.join(", ")));
    }
    Ok(reply)
}

/// Feedback for the sender after a relay. `None` when every destination got the copy.
pub fn relay_summary(out: &RelayOutcome) -> Option<String> {
    if out.attempted() == 0 {
        return Some("ℹ️ No groups configured; nothing was relayed.".to_string());
    }
    if out.failed.is_empty() {
        return None;
    }
    let failed: Vec<String> = out
        .failed
        .iter()
        .map(|f| escape_html(f.destination.as_str()))
        .collect();
    Some(format!(
        "⚠️ Relayed to {}/{} groups. Failed: {}",
        out.delivered.len(),
        out.attempted(),
        failed.join(", ")
    ))
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{store::Store, testing::FakeTransport};
    use std::sync::Arc;

    async fn service() -> (RelayService, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::new());
        let store = Store::open_in_memory().await.unwrap();
        (RelayService::new(["root"], store, transport.clone()), transport)
    }

    fn admin() -> Sender {
        Sender::new(1, Some("root"))
    }

    async fn run(svc: &RelayService, sender: &Sender, text: &str) -> String {
        let cmd = Command::parse(text, Some("RelayBot")).expect("command");
        execute(svc, sender, &cmd, None).await.unwrap()
    }

    #[test]
    fn parses_bot_suffix_case_and_args() {
        assert_eq!(
            Command::parse("/Add_Group@RelayBot -1001 extra", Some("relaybot")),
            Some(Command::AddGroup(Some("-1001".to_string())))
        );
        assert_eq!(Command::parse("/add_user", None), Some(Command::AddUser(None)));
        assert_eq!(Command::parse("  /list_users  ", None), Some(Command::ListUsers));
        assert_eq!(Command::parse("/start", None), Some(Command::Help));
        assert_eq!(
            Command::parse("/frobnicate x", None),
            Some(Command::Unknown("frobnicate".to_string()))
        );
        assert_eq!(Command::parse("hello /add_group", None), None);
    }

    #[test]
    fn commands_for_other_bots_are_ignored() {
        assert_eq!(Command::parse("/delete@OtherBot", Some("RelayBot")), None);
        assert_eq!(Command::parse("/start@OtherBot", Some("@RelayBot")), None);
        assert_eq!(
            Command::parse("/delete@RelayBot", Some("@RelayBot")),
            Some(Command::Delete)
        );
        // Without a known username the suffix cannot be checked.
        assert_eq!(Command::parse("/delete@OtherBot", None), Some(Command::Delete));
    }

    #[tokio::test]
    async fn unauthorized_caller_is_rejected_without_side_effects() {
        let (svc, _) = service().await;
        let stranger = Sender::new(99, Some("stranger"));

        assert_eq!(run(&svc, &stranger, "/add_group -1").await, UNAUTHORIZED_COMMAND);
        assert_eq!(run(&svc, &stranger, "/list_users").await, UNAUTHORIZED_COMMAND);
        assert!(svc.groups().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn help_is_for_authorized_senders_only() {
        let (svc, _) = service().await;
        assert_eq!(
            run(&svc, &Sender::new(99, None), "/help").await,
            UNAUTHORIZED_COMMAND
        );
        assert!(run(&svc, &admin(), "/start").await.contains("/add_group"));
    }

    #[tokio::test]
    async fn storage_failures_propagate_and_are_audited() {
        let path = std::env::temp_dir().join(format!(
            "relaybot-commands-audit-{}-{}.log",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        let store = Store::open_in_memory().await.unwrap();
        let svc = RelayService::new(["root"], store.clone(), Arc::new(FakeTransport::new()))
            .with_audit(crate::audit::AuditLogger::new(path.clone(), true));
        store.close().await;

        let cmd = Command::parse("/list_groups", None).unwrap();
        let res = execute(&svc, &admin(), &cmd, None).await;
        assert!(matches!(res, Err(crate::Error::Storage(_))));

        let events: Vec<serde_json::Value> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], "command");
        assert_eq!(events[1]["event"], "error");
        assert_eq!(events[1]["command"], "list_groups");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn group_commands_report_outcomes() {
        let (svc, _) = service().await;
        let a = admin();

        assert_eq!(run(&svc, &a, "/list_groups").await, "ℹ️ No groups configured.");
        assert_eq!(run(&svc, &a, "/add_group -1001").await, "✅ Group -1001 added.");
        assert_eq!(
            run(&svc, &a, "/add_group -1001").await,
            "❌ Group -1001 already exists."
        );
        assert_eq!(run(&svc, &a, "/add_group @news").await, "✅ Group @news added.");
        assert_eq!(
            run(&svc, &a, "/list_groups").await,
            "📋 Configured groups:\n-1001, @news"
        );
        assert_eq!(
            run(&svc, &a, "/remove_group -42").await,
            "❌ Group -42 does not exist."
        );
        assert_eq!(run(&svc, &a, "/remove_group -1001").await, "✅ Group -1001 removed.");
        assert_eq!(
            run(&svc, &a, "/add_group").await,
            "❌ Usage: /add_group &lt;group_id&gt;"
        );
    }

    #[tokio::test]
    async fn user_commands_strip_at_and_grant_access() {
        let (svc, _) = service().await;
        let a = admin();
        let bob = Sender::new(2, Some("bob"));

        assert_eq!(run(&svc, &bob, "/list_groups").await, UNAUTHORIZED_COMMAND);
        assert_eq!(run(&svc, &a, "/add_user @bob").await, "✅ User bob added.");
        assert_eq!(run(&svc, &a, "/add_user bob").await, "❌ User bob already exists.");
        assert_eq!(run(&svc, &a, "/list_users").await, "📋 Authorized users:\nbob");

        // Granted users may manage the lists too.
        assert_eq!(run(&svc, &bob, "/list_groups").await, "ℹ️ No groups configured.");

        assert_eq!(run(&svc, &a, "/remove_user @bob").await, "✅ User bob removed.");
        assert_eq!(run(&svc, &bob, "/list_groups").await, UNAUTHORIZED_COMMAND);
        assert_eq!(
            run(&svc, &a, "/remove_user @").await,
            "❌ Usage: /remove_user &lt;username&gt;"
        );
    }

    #[tokio::test]
    async fn delete_requires_a_reply_target() {
        let (svc, _) = service().await;
        assert!(run(&svc, &admin(), "/delete")
            .await
            .starts_with("❌ Usage"));
    }

    #[tokio::test]
    async fn delete_cascades_from_original_or_copy() {
        let (svc, transport) = service().await;
        let a = admin();
        svc.groups().add(&ChatId::from("G1")).await.unwrap();
        svc.groups().add(&ChatId::from("G2")).await.unwrap();

        let orig = MessageRef::new(1i64, 10);
        svc.handle_text(&orig, &a, "hello").await.unwrap();

        let reply = execute(&svc, &a, &Command::Delete, Some(&orig)).await.unwrap();
        assert_eq!(reply, "🗑 Deleted 2/2 relayed copies.");
        assert_eq!(transport.deleted().len(), 2);

        // Relay again, then delete by pointing at one of the copies.
        let orig2 = MessageRef::new(1i64, 11);
        svc.handle_text(&orig2, &a, "again").await.unwrap();
        let copy = svc.engine().relay_map().lookup(&orig2).await.unwrap()[1].clone();
        transport.fail_delete_of(&copy);

        let reply = execute(&svc, &a, &Command::Delete, Some(&copy)).await.unwrap();
        assert_eq!(
            reply,
            "🗑 Deleted 1/2 relayed copies.\n⚠️ Could not delete in: G2"
        );
        assert!(svc
            .engine()
            .relay_map()
            .lookup(&orig2)
            .await
            .unwrap()
            .is_empty());

        let reply = execute(&svc, &a, &Command::Delete, Some(&orig2)).await.unwrap();
        assert_eq!(reply, "ℹ️ No relayed copies found for that message.");
    }

    #[tokio::test]
    async fn delete_finds_copies_sent_to_channel_handles() {
        let (svc, transport) = service().await;
        let a = admin();
        transport.resolve_handle("@news", -100777);
        svc.groups().add(&ChatId::from("@news")).await.unwrap();

        let orig = MessageRef::new(1i64, 10);
        svc.handle_text(&orig, &a, "hello").await.unwrap();

        // A reply in the channel arrives keyed by the numeric chat id.
        let copy = MessageRef::new(-100777i64, 1);
        let reply = execute(&svc, &a, &Command::Delete, Some(&copy)).await.unwrap();
        assert_eq!(reply, "🗑 Deleted 1/1 relayed copies.");
        assert_eq!(transport.deleted(), vec![copy]);
    }

    #[test]
    fn relay_summary_only_speaks_up_on_problems() {
        use crate::engine::{Delivered, DeliveryFailure};

        assert_eq!(
            relay_summary(&RelayOutcome::default()).as_deref(),
            Some("ℹ️ No groups configured; nothing was relayed.")
        );

        let ok = Delivered {
            destination: ChatId::from("G1"),
            relayed: MessageRef::new("G1", 1),
            link: Insert::Added,
        };
        let all_ok = RelayOutcome {
            delivered: vec![ok.clone()],
            failed: vec![],
        };
        assert_eq!(relay_summary(&all_ok), None);

        let partial = RelayOutcome {
            delivered: vec![ok],
            failed: vec![DeliveryFailure {
                destination: ChatId::from("G2"),
                relayed: None,
                error: "chat not found".to_string(),
            }],
        };
        assert_eq!(
            relay_summary(&partial).as_deref(),
            Some("⚠️ Relayed to 1/2 groups. Failed: G2")
        );
    }
}
