//! [`Compositor`] implementation for Hyprland, using its [IPC sockets].
//!
//! The initially focused window and active workspace are queried once over the request socket.
//! Afterwards everything is driven by the event socket.
//!
//! [IPC sockets]: https://wiki.hyprland.org/IPC/

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    path::PathBuf,
    rc::{Rc, Weak},
};

use anyhow::{Context, Result};
use islandbar_shared_util::{HandlerId, Signal, WindowAddress};
use serde::{de::DeserializeOwned, Deserialize};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
    task::JoinHandle,
};

use super::{Compositor, Window};

pub const INSTANCE_SIGNATURE_VAR: &str = "HYPRLAND_INSTANCE_SIGNATURE";

/// Events of the event socket that matter for focus, title and workspace tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HyprEvent {
    /// `activewindow>>CLASS,TITLE`, sent right before [`HyprEvent::ActiveWindowV2`].
    ActiveWindow { class: String, title: String },
    /// `activewindowv2>>ADDRESS`, with no address when nothing is focused.
    ActiveWindowV2(Option<WindowAddress>),
    /// `windowtitlev2>>ADDRESS,TITLE`
    WindowTitle { address: WindowAddress, title: String },
    /// `closewindow>>ADDRESS`
    CloseWindow(WindowAddress),
    /// The focused monitor now shows the workspace with this id. Sent as `workspacev2>>ID,NAME`,
    /// `focusedmonv2>>MONITOR,ID`, and as `workspace>>NAME` for numbered workspaces.
    Workspace(i32),
}

/// Parse one line of the event socket. Returns `None` for events that aren't tracked.
pub fn parse_event(line: &str) -> Option<HyprEvent> {
    let (name, data) = line.split_once(">>")?;
    match name {
        "activewindow" => {
            let (class, title) = data.split_once(',').unwrap_or((data, ""));
            Some(HyprEvent::ActiveWindow { class: class.to_owned(), title: title.to_owned() })
        }
        "activewindowv2" => {
            let address = data.trim().trim_matches(',');
            Some(HyprEvent::ActiveWindowV2(if address.is_empty() { None } else { Some(WindowAddress::new(address)) }))
        }
        "windowtitlev2" => {
            let (address, title) = data.split_once(',')?;
            Some(HyprEvent::WindowTitle { address: WindowAddress::new(address), title: title.to_owned() })
        }
        "closewindow" => Some(HyprEvent::CloseWindow(WindowAddress::new(data))),
        "workspace" => data.trim().parse().ok().map(HyprEvent::Workspace),
        "workspacev2" | "focusedmonv2" => {
            let (first, second) = data.split_once(',')?;
            let id = if name == "workspacev2" { first } else { second };
            id.trim().parse().ok().map(HyprEvent::Workspace)
        }
        _ => None,
    }
}

/// Directory containing the sockets of the running Hyprland instance.
fn socket_dir(signature: &str) -> PathBuf {
    let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from);
    match runtime_dir.map(|dir| dir.join("hypr").join(signature)) {
        Some(dir) if dir.exists() => dir,
        _ => PathBuf::from("/tmp/hypr").join(signature),
    }
}

#[derive(Debug, Deserialize)]
struct ActiveWindowReply {
    address: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActiveWorkspaceReply {
    id: i32,
}

/// Send a JSON request (`j/<command>`) over the request socket and parse the reply.
async fn request<T: DeserializeOwned>(socket_dir: &std::path::Path, command: &str) -> Result<T> {
    let socket = socket_dir.join(".socket.sock");
    let mut stream = UnixStream::connect(&socket)
        .await
        .with_context(|| format!("Failed to connect to Hyprland request socket at {}", socket.display()))?;
    stream.write_all(format!("j/{}", command).as_bytes()).await?;
    let mut reply = String::new();
    stream.read_to_string(&mut reply).await.context("Failed to read reply of Hyprland")?;
    serde_json::from_str(&reply).with_context(|| format!("Failed to parse {} reply of Hyprland", command))
}

async fn query_active_window(socket_dir: &std::path::Path) -> Result<Option<ActiveWindowReply>> {
    let reply: ActiveWindowReply = request(socket_dir, "activewindow").await?;
    Ok(if reply.address.as_deref().map_or(true, str::is_empty) { None } else { Some(reply) })
}

#[derive(Debug)]
pub struct HyprWindow {
    title: RefCell<Option<String>>,
    title_changed: Signal,
}

impl HyprWindow {
    fn new(title: Option<String>) -> Self {
        Self { title: RefCell::new(title), title_changed: Signal::new() }
    }

    fn set_title(&self, title: String) {
        let changed = self.title.borrow().as_deref() != Some(title.as_str());
        if changed {
            *self.title.borrow_mut() = Some(title);
            self.title_changed.emit(&());
        }
    }
}

impl Window for HyprWindow {
    fn title(&self) -> Option<String> {
        self.title.borrow().clone()
    }

    fn connect_title_changed(&self, handler: Box<dyn Fn()>) -> HandlerId {
        self.title_changed.connect(move |_| handler())
    }

    fn disconnect(&self, id: HandlerId) -> bool {
        self.title_changed.disconnect(id)
    }
}

#[derive(Debug, Default)]
pub struct Hyprland {
    windows: RefCell<HashMap<WindowAddress, Rc<HyprWindow>>>,
    focused: RefCell<Option<Rc<HyprWindow>>>,
    /// Title from the last `activewindow` event, waiting for the matching `activewindowv2`.
    pending_title: RefCell<Option<String>>,
    focus_changed: Signal,
    active_workspace: Cell<Option<i32>>,
    workspace_changed: Signal,
    event_reader: RefCell<Option<JoinHandle<()>>>,
}

impl Hyprland {
    pub async fn connect() -> Result<Rc<Self>> {
        let signature = std::env::var(INSTANCE_SIGNATURE_VAR).with_context(|| format!("{} is not set", INSTANCE_SIGNATURE_VAR))?;
        let socket_dir = socket_dir(&signature);

        let hyprland = Rc::new(Hyprland::default());
        match query_active_window(&socket_dir).await {
            Ok(Some(reply)) => {
                let address = WindowAddress::new(reply.address.as_deref().unwrap_or_default());
                let window = hyprland.window(address, reply.title);
                *hyprland.focused.borrow_mut() = Some(window);
            }
            Ok(None) => {}
            Err(err) => log::warn!("Could not query the focused window: {:?}", err),
        }
        match request::<ActiveWorkspaceReply>(&socket_dir, "activeworkspace").await {
            Ok(reply) => hyprland.active_workspace.set(Some(reply.id)),
            Err(err) => log::warn!("Could not query the active workspace: {:?}", err),
        }

        let event_socket = socket_dir.join(".socket2.sock");
        let stream = UnixStream::connect(&event_socket)
            .await
            .with_context(|| format!("Failed to connect to Hyprland event socket at {}", event_socket.display()))?;
        log::info!("Listening for Hyprland events on {}", event_socket.display());

        let reader = tokio::task::spawn_local(read_events(stream, Rc::downgrade(&hyprland)));
        *hyprland.event_reader.borrow_mut() = Some(reader);
        Ok(hyprland)
    }

    /// The window object for `address`, reusing the known one so handlers connected to it stay
    /// attached.
    fn window(&self, address: WindowAddress, title: Option<String>) -> Rc<HyprWindow> {
        let existing = self.windows.borrow().get(&address).cloned();
        match existing {
            Some(window) => {
                if let Some(title) = title {
                    window.set_title(title);
                }
                window
            }
            None => {
                let window = Rc::new(HyprWindow::new(title));
                self.windows.borrow_mut().insert(address, window.clone());
                window
            }
        }
    }

    pub fn handle_event(&self, event: HyprEvent) {
        match event {
            HyprEvent::ActiveWindow { title, .. } => {
                *self.pending_title.borrow_mut() = Some(title);
            }
            HyprEvent::ActiveWindowV2(address) => {
                let title = self.pending_title.borrow_mut().take();
                let window = address.map(|address| self.window(address, title));
                let changed = match (&*self.focused.borrow(), &window) {
                    (Some(old), Some(new)) => !Rc::ptr_eq(old, new),
                    (None, None) => false,
                    _ => true,
                };
                if changed {
                    *self.focused.borrow_mut() = window;
                    self.focus_changed.emit(&());
                }
            }
            HyprEvent::WindowTitle { address, title } => {
                let window = self.windows.borrow().get(&address).cloned();
                if let Some(window) = window {
                    window.set_title(title);
                }
            }
            HyprEvent::CloseWindow(address) => {
                self.windows.borrow_mut().remove(&address);
            }
            HyprEvent::Workspace(id) => {
                if self.active_workspace.replace(Some(id)) != Some(id) {
                    self.workspace_changed.emit(&());
                }
            }
        }
    }
}

impl Drop for Hyprland {
    fn drop(&mut self) {
        if let Some(reader) = self.event_reader.get_mut().take() {
            reader.abort();
        }
    }
}

impl Compositor for Hyprland {
    fn focused_window(&self) -> Option<Rc<dyn Window>> {
        self.focused.borrow().clone().map(|window| window as Rc<dyn Window>)
    }

    fn connect_focused_window_changed(&self, handler: Box<dyn Fn()>) -> HandlerId {
        self.focus_changed.connect(move |_| handler())
    }

    fn active_workspace(&self) -> Option<i32> {
        self.active_workspace.get()
    }

    fn connect_active_workspace_changed(&self, handler: Box<dyn Fn()>) -> HandlerId {
        self.workspace_changed.connect(move |_| handler())
    }

    fn disconnect(&self, id: HandlerId) -> bool {
        self.focus_changed.disconnect(id) || self.workspace_changed.disconnect(id)
    }
}

async fn read_events(stream: UnixStream, hyprland: Weak<Hyprland>) {
    let mut lines = BufReader::new(stream).lines();
    crate::loop_select_exiting! {
        line = lines.next_line() => match line {
            Ok(Some(line)) => {
                let Some(hyprland) = hyprland.upgrade() else { break };
                if let Some(event) = parse_event(&line) {
                    log::trace!("hyprland event: {:?}", event);
                    hyprland.handle_event(event);
                }
            }
            Ok(None) => {
                log::error!("Hyprland closed the event socket");
                break;
            }
            Err(err) => {
                log::error!("Failed to read from Hyprland event socket: {}", err);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_event() {
        assert_eq!(
            parse_event("activewindow>>kitty,~/src: nvim, again"),
            Some(HyprEvent::ActiveWindow { class: "kitty".to_owned(), title: "~/src: nvim, again".to_owned() })
        );
        assert_eq!(
            parse_event("activewindowv2>>55d1c0a2b3c0"),
            Some(HyprEvent::ActiveWindowV2(Some(WindowAddress::new("55d1c0a2b3c0"))))
        );
        assert_eq!(parse_event("activewindowv2>>,"), Some(HyprEvent::ActiveWindowV2(None)));
        assert_eq!(parse_event("activewindowv2>>"), Some(HyprEvent::ActiveWindowV2(None)));
        assert_eq!(
            parse_event("windowtitlev2>>abc,Firefox, the browser"),
            Some(HyprEvent::WindowTitle { address: WindowAddress::new("abc"), title: "Firefox, the browser".to_owned() })
        );
        assert_eq!(parse_event("closewindow>>abc"), Some(HyprEvent::CloseWindow(WindowAddress::new("abc"))));
        assert_eq!(parse_event("workspace>>2"), Some(HyprEvent::Workspace(2)));
        assert_eq!(parse_event("workspace>>special:scratch"), None);
        assert_eq!(parse_event("workspacev2>>4,4"), Some(HyprEvent::Workspace(4)));
        assert_eq!(parse_event("workspacev2>>-98,special:scratch"), Some(HyprEvent::Workspace(-98)));
        assert_eq!(parse_event("focusedmonv2>>DP-1,7"), Some(HyprEvent::Workspace(7)));
        assert_eq!(parse_event("focusedmon>>DP-1,7"), None);
        assert_eq!(parse_event("garbage"), None);
    }

    #[test]
    fn test_workspace_events() {
        let hyprland = Hyprland::default();
        assert_eq!(hyprland.active_workspace(), None);
        let changes = Rc::new(Cell::new(0));
        let handler = {
            let changes = changes.clone();
            hyprland.connect_active_workspace_changed(Box::new(move || changes.set(changes.get() + 1)))
        };

        hyprland.handle_event(HyprEvent::Workspace(3));
        // `workspace` and `workspacev2` both arrive for a single switch
        hyprland.handle_event(HyprEvent::Workspace(3));
        assert_eq!(hyprland.active_workspace(), Some(3));
        assert_eq!(changes.get(), 1);

        hyprland.handle_event(HyprEvent::Workspace(5));
        assert_eq!(changes.get(), 2);

        assert!(hyprland.disconnect(handler));
        hyprland.handle_event(HyprEvent::Workspace(1));
        assert_eq!(changes.get(), 2);
        assert_eq!(hyprland.active_workspace(), Some(1));
    }

    #[test]
    fn test_focus_and_title_events() {
        let hyprland = Hyprland::default();
        let focus_changes = Rc::new(Cell::new(0));
        {
            let focus_changes = focus_changes.clone();
            hyprland.connect_focused_window_changed(Box::new(move || focus_changes.set(focus_changes.get() + 1)));
        }

        hyprland.handle_event(HyprEvent::ActiveWindow { class: "kitty".to_owned(), title: "shell".to_owned() });
        hyprland.handle_event(HyprEvent::ActiveWindowV2(Some(WindowAddress::new("0xabc"))));
        let window = hyprland.focused_window().unwrap();
        assert_eq!(window.title().as_deref(), Some("shell"));
        assert_eq!(focus_changes.get(), 1);

        let title_changes = Rc::new(Cell::new(0));
        {
            let title_changes = title_changes.clone();
            window.connect_title_changed(Box::new(move || title_changes.set(title_changes.get() + 1)));
        }
        hyprland.handle_event(HyprEvent::WindowTitle { address: WindowAddress::new("abc"), title: "vim".to_owned() });
        hyprland.handle_event(HyprEvent::WindowTitle { address: WindowAddress::new("abc"), title: "vim".to_owned() });
        assert_eq!(window.title().as_deref(), Some("vim"));
        assert_eq!(title_changes.get(), 1);

        // refocusing the same window doesn't count as a change
        hyprland.handle_event(HyprEvent::ActiveWindowV2(Some(WindowAddress::new("abc"))));
        assert_eq!(focus_changes.get(), 1);

        hyprland.handle_event(HyprEvent::ActiveWindowV2(None));
        assert!(hyprland.focused_window().is_none());
        assert_eq!(focus_changes.get(), 2);
    }
}
