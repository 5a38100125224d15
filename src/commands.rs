//! Typed commands and the process-wide command bus.
//!
//! Sibling surfaces (toolbars, dialogs, the HTTP layer) publish [`Command`]s
//! without holding a reference to the navigator. Delivery is at most once per
//! subscriber; a lagging subscriber loses the oldest commands.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::schema::NodeKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Command {
    Reload,
    ToggleGroupingByClient,
    ToggleShowManagers,
    CollapseAll,
    OpenStatusManagement,
    ToggleOnlyFavorites,
    ResetOnlyFavorites,
    /// A structural mutation created `id`; reload, then focus it.
    NodeCreated {
        entity: NodeKind,
        id: String,
    },
    FocusNode {
        id: String,
    },
    ToggleNode {
        id: String,
    },
    ExpandAllFrom {
        id: String,
    },
    /// A section's status was changed elsewhere. `status_id: None` clears it.
    SectionStatusUpdated {
        section_id: String,
        status_id: Option<String>,
        status_name: Option<String>,
        status_color: Option<String>,
    },
    StatusRenamed {
        status_id: String,
        status_name: String,
        status_color: String,
    },
    StatusDeleted {
        status_id: String,
    },
    ProjectStatusUpdated {
        project_id: String,
        project_status: String,
    },
    SelectDetailTab {
        tab: String,
    },
}

/// Broadcast channel of commands.
#[derive(Debug, Clone)]
pub struct CommandBus {
    tx: broadcast::Sender<Command>,
}

impl CommandBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Fire and forget. Returns how many subscribers will see the command.
    pub fn publish(&self, command: Command) -> usize {
        debug!("Publishing {:?}", command);
        self.tx.send(command).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Command> {
        self.tx.subscribe()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_shape() {
        let cmd: Command = serde_json::from_str(
            r##"{"command":"section-status-updated","sectionId":"x1","statusId":"s","statusName":"Plan","statusColor":"#fff"}"##,
        )
        .unwrap();
        assert_eq!(
            cmd,
            Command::SectionStatusUpdated {
                section_id: "x1".to_string(),
                status_id: Some("s".to_string()),
                status_name: Some("Plan".to_string()),
                status_color: Some("#fff".to_string()),
            }
        );

        let cmd: Command =
            serde_json::from_str(r#"{"command":"node-created","entity":"stage","id":"s9"}"#)
                .unwrap();
        assert_eq!(
            cmd,
            Command::NodeCreated {
                entity: NodeKind::Stage,
                id: "s9".to_string()
            }
        );

        let cmd: Command = serde_json::from_str(r#"{"command":"collapse-all"}"#).unwrap();
        assert_eq!(cmd, Command::CollapseAll);
    }

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let bus = CommandBus::default();
        assert_eq!(bus.publish(Command::Reload), 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_once() {
        let bus = CommandBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(Command::CollapseAll), 2);
        assert_eq!(a.recv().await.unwrap(), Command::CollapseAll);
        assert_eq!(b.recv().await.unwrap(), Command::CollapseAll);
        assert!(a.try_recv().is_err());
    }
}
