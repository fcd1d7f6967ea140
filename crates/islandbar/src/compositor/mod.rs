//! The window manager side of the bar: which window has focus, what its title is, and which
//! workspace is active.

use std::rc::Rc;

use islandbar_shared_util::HandlerId;

pub mod hyprland;

pub trait Window {
    /// The current title, or `None` if the compositor doesn't know one.
    fn title(&self) -> Option<String>;

    fn connect_title_changed(&self, handler: Box<dyn Fn()>) -> HandlerId;

    fn disconnect(&self, id: HandlerId) -> bool;
}

pub trait Compositor {
    fn focused_window(&self) -> Option<Rc<dyn Window>>;

    fn connect_focused_window_changed(&self, handler: Box<dyn Fn()>) -> HandlerId;

    /// Id of the workspace shown on the focused monitor. Named and special workspaces have ids
    /// outside of the numbered range the bar shows.
    fn active_workspace(&self) -> Option<i32>;

    fn connect_active_workspace_changed(&self, handler: Box<dyn Fn()>) -> HandlerId;

    /// Disconnect a handler of either signal.
    fn disconnect(&self, id: HandlerId) -> bool;
}

/// Stand-in for sessions without a supported compositor. Nothing is ever focused.
#[derive(Debug, Default)]
pub struct NoCompositor {
    focus_changed: islandbar_shared_util::Signal,
    workspace_changed: islandbar_shared_util::Signal,
}

impl Compositor for NoCompositor {
    fn focused_window(&self) -> Option<Rc<dyn Window>> {
        None
    }

    fn connect_focused_window_changed(&self, handler: Box<dyn Fn()>) -> HandlerId {
        self.focus_changed.connect(move |_| handler())
    }

    fn active_workspace(&self) -> Option<i32> {
        None
    }

    fn connect_active_workspace_changed(&self, handler: Box<dyn Fn()>) -> HandlerId {
        self.workspace_changed.connect(move |_| handler())
    }

    fn disconnect(&self, id: HandlerId) -> bool {
        self.focus_changed.disconnect(id) || self.workspace_changed.disconnect(id)
    }
}

/// Connect to the compositor of the current session.
///
/// Must be called from within a [`tokio::task::LocalSet`], as compositor bindings listen for events
/// in local tasks.
pub async fn connect_default() -> Rc<dyn Compositor> {
    if std::env::var_os(hyprland::INSTANCE_SIGNATURE_VAR).is_some() {
        match hyprland::Hyprland::connect().await {
            Ok(hyprland) => return hyprland,
            Err(err) => log::error!("Failed to connect to Hyprland, window titles and workspaces will not be shown: {:?}", err),
        }
    } else {
        log::warn!("No supported compositor detected, window titles and workspaces will not be shown");
    }
    Rc::new(NoCompositor::default())
}
