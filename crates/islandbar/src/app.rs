use anyhow::Result;
use islandbar_shared_util::ItemId;

use crate::{
    bar::BarComposition,
    daemon_response::DaemonResponseSender,
    paths::BarPaths,
    session::{Launcher, PowerAction, SessionCommands},
    tray::{affordance::FallbackMenuEntry, item_widget::MouseButton},
};

#[derive(Debug)]
pub enum DaemonCommand {
    NoOp,
    KillServer,
    PrintState(DaemonResponseSender),
    PrintTray(DaemonResponseSender),
    TrayClick {
        item_id: ItemId,
        button: MouseButton,
        sender: DaemonResponseSender,
    },
    TrayMenuEntry {
        item_id: ItemId,
        entry: FallbackMenuEntry,
        sender: DaemonResponseSender,
    },
    SwitchWorkspace {
        id: u8,
        sender: DaemonResponseSender,
    },
    Power {
        action: PowerAction,
        sender: DaemonResponseSender,
    },
    Launch {
        launcher: Launcher,
        sender: DaemonResponseSender,
    },
}

pub struct App {
    pub bar: BarComposition,
    pub session: SessionCommands,
    pub paths: BarPaths,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").field("view", &self.bar.view()).field("paths", &self.paths).finish()
    }
}

impl App {
    /// Handle a DaemonCommand event.
    pub fn handle_command(&mut self, event: DaemonCommand) {
        log::debug!("Handling event: {:?}", &event);
        let result: Result<()> = match event {
            DaemonCommand::NoOp => Ok(()),
            DaemonCommand::KillServer => {
                log::info!("Received kill command, stopping server!");
                crate::application_lifecycle::send_exit()
            }
            DaemonCommand::PrintState(sender) => sender.respond_with_json(Ok(self.bar.view())),
            DaemonCommand::PrintTray(sender) => sender.respond_with_json(Ok(self.bar.tray().current_view())),
            DaemonCommand::TrayClick { item_id, button, sender } => {
                sender.respond_with_json(self.bar.tray().click(&item_id, button).map_err(anyhow::Error::from))
            }
            DaemonCommand::TrayMenuEntry { item_id, entry, sender } => {
                let result = self.bar.tray().menu_entry(&item_id, entry).map(|()| entry.label());
                sender.respond_with_json(result.map_err(anyhow::Error::from))
            }
            DaemonCommand::SwitchWorkspace { id, sender } => {
                sender.respond_with_json(self.session.switch_workspace(id).map(|()| id).map_err(anyhow::Error::from))
            }
            DaemonCommand::Power { action, sender } => {
                sender.respond_with_json(self.session.power(action).map(|()| action).map_err(anyhow::Error::from))
            }
            DaemonCommand::Launch { launcher, sender } => {
                sender.respond_with_json(self.session.launch(launcher).map(|()| launcher).map_err(anyhow::Error::from))
            }
        };

        crate::print_result_err!("while handling event", &result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        daemon_response::{self, DaemonResponse},
        config::BarConfig,
        focus_tracker::{test_util::FakeCompositor, FocusTracker},
        probe::test_util::FakeSystem,
        system_stats::MetricSampler,
        tray::{
            collection::TrayCollectionController,
            test_util::{FakeItem, FakeTray},
        },
        workspaces::WorkspaceTracker,
    };
    use std::{path::PathBuf, rc::Rc};

    fn app_with_items(items: Vec<Rc<FakeItem>>) -> (Rc<FakeSystem>, App) {
        let system = Rc::new(FakeSystem::default());
        let tray = Rc::new(FakeTray::default());
        tray.set_items(items);
        let compositor = Rc::new(FakeCompositor::default());
        let bar = BarComposition::new(
            MetricSampler::new(system.clone(), PathBuf::from("/nonexistent")),
            FocusTracker::new(compositor.clone()),
            WorkspaceTracker::new(compositor),
            TrayCollectionController::new(tray, system.clone()),
            "%H:%M".to_owned(),
        );
        let session = SessionCommands::new(system.clone(), &BarConfig::default());
        let app = App { bar, session, paths: BarPaths::from_config_dir("/nonexistent/islandbar").unwrap() };
        (system, app)
    }

    fn respond(app: &mut App, command: impl FnOnce(DaemonResponseSender) -> DaemonCommand) -> DaemonResponse {
        let (sender, mut recv) = daemon_response::create_pair();
        app.handle_command(command(sender));
        recv.try_recv().unwrap()
    }

    #[test]
    fn test_print_state_is_json() {
        let (_, mut app) = app_with_items(vec![]);
        let DaemonResponse::Success(json) = respond(&mut app, DaemonCommand::PrintState) else { panic!("expected success") };
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["title"], "");
        assert_eq!(value["title_visible"], false);
        assert_eq!(value["tray"]["visible"], false);
        assert_eq!(value["workspaces"]["items"].as_array().map(Vec::len), Some(10));
    }

    #[test]
    fn test_tray_click() {
        let item = Rc::new(FakeItem::new(":1.4/StatusNotifierItem").with_icon_name("mail"));
        let (_, mut app) = app_with_items(vec![item.clone()]);

        let id = ItemId::from(":1.4/StatusNotifierItem");
        let response =
            respond(&mut app, |sender| DaemonCommand::TrayClick { item_id: id.clone(), button: MouseButton::Primary, sender });
        assert!(matches!(response, DaemonResponse::Success(json) if json.contains("activated")));
        assert_eq!(item.activations.borrow().as_slice(), &[("activate", 2, 2)]);

        let unknown = ItemId::from(":1.99/StatusNotifierItem");
        let response =
            respond(&mut app, |sender| DaemonCommand::TrayClick { item_id: unknown, button: MouseButton::Primary, sender });
        assert!(matches!(response, DaemonResponse::Failure(err) if err.contains(":1.99")));
    }

    #[test]
    fn test_menu_entry_on_plain_item_fails() {
        let item = Rc::new(FakeItem::new(":1.4/StatusNotifierItem"));
        let (_, mut app) = app_with_items(vec![item]);
        let id = ItemId::from(":1.4/StatusNotifierItem");
        let response =
            respond(&mut app, |sender| DaemonCommand::TrayMenuEntry { item_id: id, entry: FallbackMenuEntry::Quit, sender });
        assert!(matches!(response, DaemonResponse::Failure(_)));
    }

    #[test]
    fn test_session_commands() {
        let (system, mut app) = app_with_items(vec![]);

        let response = respond(&mut app, |sender| DaemonCommand::SwitchWorkspace { id: 3, sender });
        assert_eq!(response, DaemonResponse::Success("3".to_owned()));
        let response = respond(&mut app, |sender| DaemonCommand::SwitchWorkspace { id: 12, sender });
        assert!(matches!(response, DaemonResponse::Failure(err) if err.contains("12")));

        let response = respond(&mut app, |sender| DaemonCommand::Power { action: PowerAction::Lock, sender });
        assert_eq!(response, DaemonResponse::Success("\"lock\"".to_owned()));
        let response = respond(&mut app, |sender| DaemonCommand::Launch { launcher: Launcher::Apps, sender });
        assert_eq!(response, DaemonResponse::Success("\"apps\"".to_owned()));

        assert_eq!(system.spawned.borrow().as_slice(), &["hyprctl dispatch workspace 3", "hyprlock", "rofi -show drun"]);
    }
}
