use std::path::{Path, PathBuf};

use notifier_host::Pixmap;
use serde::Serialize;

use super::{ThemedIcon, TrayItem};
use crate::probe::{self, SystemProbe};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IconSource {
    Themed(ThemedIcon),
    Pixmap(Pixmap),
    Name { name: String },
    File { path: PathBuf },
}

/// Find the icon to show for an item.
///
/// Sources are tried in order: themed icon, pixmap, icon name, the icon name of the tooltip, and
/// finally the icon of the process owning the item. Returns `None` if nothing yields an icon.
pub fn resolve_icon(item: &dyn TrayItem, probe: &dyn SystemProbe) -> Option<IconSource> {
    if let Some(themed) = item.themed_icon() {
        return Some(IconSource::Themed(themed));
    }
    if let Some(pixmap) = item.pixmap() {
        return Some(IconSource::Pixmap(pixmap));
    }
    if let Some(name) = item.icon_name() {
        return Some(IconSource::Name { name });
    }
    if let Some(name) = item.tooltip().and_then(|tooltip| tooltip.icon_name) {
        return Some(IconSource::Name { name });
    }
    find_icon_for_broken_item(item, probe)
}

/// Places an application's own icon is commonly installed to, most preferred first.
pub fn icon_candidates(name: &str, home: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = vec![
        PathBuf::from(format!("/usr/share/pixmaps/{}.png", name)),
        PathBuf::from(format!("/usr/share/pixmaps/{}.svg", name)),
        PathBuf::from(format!("/usr/share/icons/hicolor/scalable/apps/{}.svg", name)),
        PathBuf::from(format!("/usr/share/icons/hicolor/256x256/apps/{}.png", name)),
        PathBuf::from(format!("/usr/share/icons/hicolor/128x128/apps/{}.png", name)),
        PathBuf::from(format!("/usr/share/icons/hicolor/48x48/apps/{}.png", name)),
    ];
    if let Some(home) = home {
        let local_icons = home.join(".local/share/icons/hicolor");
        candidates.push(local_icons.join(format!("scalable/apps/{}.svg", name)));
        candidates.push(local_icons.join(format!("256x256/apps/{}.png", name)));
    }
    candidates
}

/// Some items (electron apps, mostly) don't provide any icon. Fall back to the icon of the program
/// that registered the item, found through the process owning the item's bus address.
///
/// The first installed icon file wins. Without one, the process name is used as icon name, as
/// many apps install their icon under their binary's name.
pub fn find_icon_for_broken_item(item: &dyn TrayItem, probe: &dyn SystemProbe) -> Option<IconSource> {
    let id = item.item_id();
    let process_name = probe::process_name_for_bus_address(probe, id.bus_address())?;
    let home = probe.home_dir();
    let icon_file = icon_candidates(&process_name, home.as_deref()).into_iter().find(|path| probe.is_file(path));
    match icon_file {
        Some(path) => {
            log::debug!("Using {} as icon for {}", path.display(), id);
            Some(IconSource::File { path })
        }
        None => Some(IconSource::Name { name: process_name }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        probe::test_util::FakeSystem,
        tray::{test_util::FakeItem, Tooltip},
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_themed_icon_beats_icon_name() {
        let item = FakeItem::new(":1.5/StatusNotifierItem").with_icon_name("nm-applet");
        *item.themed_icon.borrow_mut() =
            Some(ThemedIcon { name: "nm-signal-75".to_owned(), theme_path: Some("/opt/nm/icons".to_owned()) });
        assert_eq!(
            resolve_icon(&item, &FakeSystem::default()),
            Some(IconSource::Themed(ThemedIcon {
                name: "nm-signal-75".to_owned(),
                theme_path: Some("/opt/nm/icons".to_owned())
            }))
        );
    }

    #[test]
    fn test_pixmap_beats_icon_name() {
        let item = FakeItem::new(":1.5/StatusNotifierItem").with_icon_name("steam");
        let pixmap = Pixmap { width: 1, height: 1, rgba: vec![1, 2, 3, 4] };
        *item.pixmap.borrow_mut() = Some(pixmap.clone());
        assert_eq!(resolve_icon(&item, &FakeSystem::default()), Some(IconSource::Pixmap(pixmap)));
    }

    #[test]
    fn test_tooltip_icon_name() {
        let item = FakeItem::new(":1.5/StatusNotifierItem");
        *item.tooltip.borrow_mut() = Some(Tooltip { icon_name: Some("audio-volume-high".to_owned()), ..Default::default() });
        assert_eq!(
            resolve_icon(&item, &FakeSystem::default()),
            Some(IconSource::Name { name: "audio-volume-high".to_owned() })
        );
    }

    #[test]
    fn test_icon_candidate_order() {
        let candidates = icon_candidates("foo", Some(Path::new("/home/me")));
        assert_eq!(candidates.len(), 8);
        assert_eq!(candidates[0], PathBuf::from("/usr/share/pixmaps/foo.png"));
        assert_eq!(candidates[5], PathBuf::from("/usr/share/icons/hicolor/48x48/apps/foo.png"));
        assert_eq!(candidates[6], PathBuf::from("/home/me/.local/share/icons/hicolor/scalable/apps/foo.svg"));
        assert_eq!(candidates[7], PathBuf::from("/home/me/.local/share/icons/hicolor/256x256/apps/foo.png"));
        assert_eq!(icon_candidates("foo", None).len(), 6);
    }

    #[test]
    fn test_broken_item_uses_first_existing_file() {
        let item = FakeItem::new(":1.332/org/ayatana/NotificationItem/foo");
        let system = FakeSystem::default()
            .with_process(":1.332", 4242, "foo")
            .with_existing("/usr/share/pixmaps/foo.png")
            .with_existing("/usr/share/icons/hicolor/48x48/apps/foo.png");
        assert_eq!(
            resolve_icon(&item, &system),
            Some(IconSource::File { path: PathBuf::from("/usr/share/pixmaps/foo.png") })
        );
    }

    #[test]
    fn test_broken_item_falls_back_to_process_name() {
        let item = FakeItem::new(":1.332/StatusNotifierItem");
        let system = FakeSystem::default().with_process(":1.332", 4242, "foo");
        assert_eq!(resolve_icon(&item, &system), Some(IconSource::Name { name: "foo".to_owned() }));
    }

    #[test]
    fn test_broken_item_without_process() {
        let item = FakeItem::new(":1.332/StatusNotifierItem");
        assert_eq!(resolve_icon(&item, &FakeSystem::default()), None);
    }
}
