use clap::{Parser, Subcommand};
use islandbar_shared_util::ItemId;
use serde::{Deserialize, Serialize};

use crate::{
    app,
    daemon_response::{self, DaemonResponseReceiver, DaemonResponseSender},
    session::{Launcher, PowerAction},
    tray::{affordance::FallbackMenuEntry, item_widget::MouseButton},
};

/// Struct that gets generated from `RawOpt`.
#[derive(Debug, PartialEq)]
pub struct Opt {
    pub log_debug: bool,
    pub config_path: Option<std::path::PathBuf>,
    pub action: Action,
}

#[derive(Parser, Debug, PartialEq)]
#[command(name = "islandbar", version, about = "Status bar state daemon")]
pub struct RawOpt {
    /// Write out debug logs.
    #[arg(long = "debug", global = true)]
    log_debug: bool,

    /// Override path to the configuration directory (the directory that contains islandbar.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Action {
    /// Generate a shell completion script
    ShellCompletions {
        #[arg(short, long)]
        shell: clap_complete::Shell,
    },

    /// Start the islandbar daemon, printing the bar state as one JSON document per line on every change.
    #[command(name = "daemon", alias = "d")]
    Daemon,

    #[command(flatten)]
    WithServer(ActionWithServer),
}

#[derive(Subcommand, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionWithServer {
    /// Ping the islandbar daemon, checking if it is reachable.
    #[command(name = "ping")]
    Ping,

    /// Kill the islandbar daemon
    #[command(name = "kill", alias = "k")]
    KillServer,

    /// Print the current bar state as JSON
    #[command(name = "state")]
    ShowState,

    /// Interact with the system tray
    #[command(subcommand)]
    Tray(TrayAction),

    /// Switch to one of the numbered workspaces
    #[command(name = "workspace", alias = "ws")]
    Workspace {
        #[arg(value_parser = clap::value_parser!(u8).range(1..=10))]
        id: u8,
    },

    /// Run an entry of the power menu
    #[command(name = "power")]
    Power {
        #[arg(value_enum)]
        action: PowerAction,
    },

    /// Open the program behind one of the launcher buttons
    #[command(name = "launch")]
    Launch {
        #[arg(value_enum)]
        launcher: Launcher,
    },
}

#[derive(Subcommand, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrayAction {
    /// Print the tray items and how they can be interacted with
    #[command(name = "list", alias = "ls")]
    List,

    /// Click a tray item, like a user would
    #[command(name = "click")]
    Click {
        /// Id of the item, as printed by `islandbar tray list`
        item_id: ItemId,

        /// Click with the secondary (right) mouse button
        #[arg(long)]
        secondary: bool,
    },

    /// Run an entry of the fallback menu, shown for items that claim to have a menu but don't export one
    #[command(name = "menu")]
    Menu {
        item_id: ItemId,

        #[arg(value_enum)]
        entry: FallbackMenuEntry,
    },
}

impl Opt {
    pub fn from_env() -> Self {
        let raw: RawOpt = RawOpt::parse();
        raw.into()
    }
}

impl From<RawOpt> for Opt {
    fn from(other: RawOpt) -> Self {
        let RawOpt { action, log_debug, config } = other;
        Opt { action, log_debug, config_path: config }
    }
}

impl ActionWithServer {
    pub fn into_daemon_command(self) -> (app::DaemonCommand, Option<DaemonResponseReceiver>) {
        let command = match self {
            ActionWithServer::Ping => {
                let (send, recv) = daemon_response::create_pair();
                let _ = send.send_success("pong".to_owned());
                return (app::DaemonCommand::NoOp, Some(recv));
            }
            ActionWithServer::KillServer => app::DaemonCommand::KillServer,
            ActionWithServer::ShowState => return with_response_channel(app::DaemonCommand::PrintState),
            ActionWithServer::Tray(TrayAction::List) => return with_response_channel(app::DaemonCommand::PrintTray),
            ActionWithServer::Tray(TrayAction::Click { item_id, secondary }) => {
                let button = if secondary { MouseButton::Secondary } else { MouseButton::Primary };
                return with_response_channel(|sender| app::DaemonCommand::TrayClick { item_id, button, sender });
            }
            ActionWithServer::Tray(TrayAction::Menu { item_id, entry }) => {
                return with_response_channel(|sender| app::DaemonCommand::TrayMenuEntry { item_id, entry, sender });
            }
            ActionWithServer::Workspace { id } => {
                return with_response_channel(|sender| app::DaemonCommand::SwitchWorkspace { id, sender });
            }
            ActionWithServer::Power { action } => {
                return with_response_channel(|sender| app::DaemonCommand::Power { action, sender });
            }
            ActionWithServer::Launch { launcher } => {
                return with_response_channel(|sender| app::DaemonCommand::Launch { launcher, sender });
            }
        };
        (command, None)
    }
}

fn with_response_channel<O, F>(f: F) -> (O, Option<DaemonResponseReceiver>)
where
    F: FnOnce(DaemonResponseSender) -> O,
{
    let (sender, recv) = daemon_response::create_pair();
    (f(sender), Some(recv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Opt {
        RawOpt::try_parse_from(std::iter::once("islandbar").chain(args.iter().copied())).unwrap().into()
    }

    #[test]
    fn test_parse_tray_click() {
        let opt = parse(&["tray", "click", ":1.5/StatusNotifierItem", "--secondary", "--debug"]);
        assert!(opt.log_debug);
        assert_eq!(
            opt.action,
            Action::WithServer(ActionWithServer::Tray(TrayAction::Click {
                item_id: ItemId::from(":1.5/StatusNotifierItem"),
                secondary: true
            }))
        );
    }

    #[test]
    fn test_parse_menu_entry() {
        let opt = parse(&["-c", "/tmp/bar", "tray", "menu", ":1.9/StatusNotifierItem", "quit"]);
        assert_eq!(opt.config_path, Some(std::path::PathBuf::from("/tmp/bar")));
        assert_eq!(
            opt.action,
            Action::WithServer(ActionWithServer::Tray(TrayAction::Menu {
                item_id: ItemId::from(":1.9/StatusNotifierItem"),
                entry: FallbackMenuEntry::Quit
            }))
        );
    }

    #[test]
    fn test_parse_daemon_and_kill() {
        assert_eq!(parse(&["daemon"]).action, Action::Daemon);
        assert_eq!(parse(&["k"]).action, Action::WithServer(ActionWithServer::KillServer));
        assert!(RawOpt::try_parse_from(["islandbar", "tray", "menu", "x", "restart"]).is_err());
    }

    #[test]
    fn test_parse_session_commands() {
        assert_eq!(parse(&["workspace", "3"]).action, Action::WithServer(ActionWithServer::Workspace { id: 3 }));
        assert_eq!(parse(&["ws", "10"]).action, Action::WithServer(ActionWithServer::Workspace { id: 10 }));
        assert!(RawOpt::try_parse_from(["islandbar", "workspace", "0"]).is_err());
        assert!(RawOpt::try_parse_from(["islandbar", "workspace", "11"]).is_err());

        assert_eq!(
            parse(&["power", "suspend"]).action,
            Action::WithServer(ActionWithServer::Power { action: PowerAction::Suspend })
        );
        assert!(RawOpt::try_parse_from(["islandbar", "power", "hibernate"]).is_err());
        assert_eq!(
            parse(&["launch", "bluetooth"]).action,
            Action::WithServer(ActionWithServer::Launch { launcher: Launcher::Bluetooth })
        );
    }

    #[test]
    fn test_ping_answers_immediately() {
        let (command, recv) = ActionWithServer::Ping.into_daemon_command();
        assert!(matches!(command, app::DaemonCommand::NoOp));
        assert_eq!(recv.unwrap().try_recv().unwrap(), daemon_response::DaemonResponse::Success("pong".to_owned()));
    }

    #[test]
    fn test_ipc_encoding() {
        let action = ActionWithServer::Tray(TrayAction::Menu { item_id: ItemId::from(":1.9/X"), entry: FallbackMenuEntry::Open });
        let bytes = bincode::serialize(&action).unwrap();
        assert_eq!(bincode::deserialize::<ActionWithServer>(&bytes).unwrap(), action);
    }
}
