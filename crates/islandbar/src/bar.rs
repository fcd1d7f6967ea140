//! Assembles the published state of all components into the [`BarView`] that gets handed to the
//! renderer.

use std::fmt::Write;

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::{
    config::DEFAULT_CLOCK_FORMAT,
    focus_tracker::FocusTracker,
    session::{self, PowerMenuEntry},
    system_stats::{MetricSampler, MetricSnapshot},
    tray::collection::{TrayCollectionController, TrayView},
    workspaces::{WorkspaceTracker, WorkspacesView},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsView {
    pub cpu: String,
    pub cpu_temp: String,
    pub mem: String,
    pub disk: String,
    pub raw: MetricSnapshot,
}

impl From<MetricSnapshot> for StatsView {
    fn from(snapshot: MetricSnapshot) -> Self {
        StatsView {
            cpu: format!("{:.0}%", snapshot.cpu_percent),
            cpu_temp: format!("{:.0}°C", snapshot.cpu_temp_celsius),
            mem: format!("{:.0}%", snapshot.mem_percent),
            disk: format!("{:.0}%", snapshot.disk_percent),
            raw: snapshot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarView {
    pub title: String,
    /// The title island is only shown while some window with a title has focus.
    pub title_visible: bool,
    pub workspaces: WorkspacesView,
    pub clock: String,
    pub stats: StatsView,
    pub tray: TrayView,
    pub power_menu: Vec<PowerMenuEntry>,
}

/// Format `now` with a strftime-like `format`, falling back to the default format if `format` is
/// invalid.
pub fn format_clock<Tz: TimeZone>(now: &DateTime<Tz>, format: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    if write!(out, "{}", now.format(format)).is_ok() {
        return out;
    }
    log::debug!("Invalid clock format {:?}, using the default", format);
    now.format(DEFAULT_CLOCK_FORMAT).to_string()
}

pub struct BarComposition {
    sampler: MetricSampler,
    focus: FocusTracker,
    workspaces: WorkspaceTracker,
    tray: TrayCollectionController,
    clock_format: String,
    stats: MetricSnapshot,
    clock: String,
    last_emitted: Option<BarView>,
}

impl BarComposition {
    /// Takes a first metrics sample and clock reading right away.
    pub fn new(
        sampler: MetricSampler,
        focus: FocusTracker,
        workspaces: WorkspaceTracker,
        tray: TrayCollectionController,
        clock_format: String,
    ) -> Self {
        let mut bar = BarComposition {
            sampler,
            focus,
            workspaces,
            tray,
            clock_format,
            stats: MetricSnapshot::default(),
            clock: String::new(),
            last_emitted: None,
        };
        bar.refresh_stats();
        bar.refresh_clock(&chrono::Local::now());
        bar
    }

    pub fn focus(&self) -> &FocusTracker {
        &self.focus
    }

    pub fn workspaces(&self) -> &WorkspaceTracker {
        &self.workspaces
    }

    pub fn tray(&self) -> &TrayCollectionController {
        &self.tray
    }

    pub fn refresh_stats(&mut self) {
        self.stats = self.sampler.sample();
    }

    pub fn refresh_clock<Tz: TimeZone>(&mut self, now: &DateTime<Tz>)
    where
        Tz::Offset: std::fmt::Display,
    {
        self.clock = format_clock(now, &self.clock_format);
    }

    pub fn view(&self) -> BarView {
        let title = self.focus.current_title();
        BarView {
            title_visible: !title.is_empty(),
            title,
            workspaces: self.workspaces.current_view(),
            clock: self.clock.clone(),
            stats: StatsView::from(self.stats),
            tray: self.tray.current_view(),
            power_menu: session::power_menu(),
        }
    }

    /// The current view, if it differs from the one returned last time.
    pub fn take_changed_view(&mut self) -> Option<BarView> {
        let view = self.view();
        if self.last_emitted.as_ref() == Some(&view) {
            return None;
        }
        self.last_emitted = Some(view.clone());
        Some(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        focus_tracker::test_util::{FakeCompositor, FakeWindow},
        probe::test_util::FakeSystem,
        tray::test_util::{FakeItem, FakeTray},
    };
    use chrono::{FixedOffset, NaiveDate, Utc};
    use pretty_assertions::assert_eq;
    use std::{path::PathBuf, rc::Rc};

    fn sunday_afternoon() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2025, 1, 5).unwrap().and_hms_opt(15, 7, 0).unwrap().and_utc()
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(&sunday_afternoon(), DEFAULT_CLOCK_FORMAT), "Sun 5 Jan 3:07PM");
        let morning = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2025, 3, 12, 0, 5, 0).unwrap();
        assert_eq!(format_clock(&morning, DEFAULT_CLOCK_FORMAT), "Wed 12 Mar 12:05AM");
        assert_eq!(format_clock(&sunday_afternoon(), "%H:%M"), "15:07");
    }

    #[test]
    fn test_invalid_clock_format_falls_back() {
        assert_eq!(format_clock(&sunday_afternoon(), "%Q broken"), "Sun 5 Jan 3:07PM");
    }

    #[test]
    fn test_stats_labels() {
        let view = StatsView::from(MetricSnapshot {
            cpu_percent: 12.6,
            mem_percent: 60.0,
            disk_percent: 0.4,
            cpu_temp_celsius: 47.5,
        });
        assert_eq!((view.cpu.as_str(), view.mem.as_str(), view.disk.as_str()), ("13%", "60%", "0%"));
        assert_eq!(view.cpu_temp, "48°C");
    }

    fn composition() -> (Rc<FakeCompositor>, Rc<FakeTray>, BarComposition) {
        let system = Rc::new(FakeSystem::default());
        let compositor = Rc::new(FakeCompositor::default());
        let tray = Rc::new(FakeTray::default());
        let bar = BarComposition::new(
            MetricSampler::new(system.clone(), PathBuf::from("/nonexistent")),
            FocusTracker::new(compositor.clone()),
            WorkspaceTracker::new(compositor.clone()),
            TrayCollectionController::new(tray.clone(), system),
            "%Y-%m-%d %H:%M".to_owned(),
        );
        (compositor, tray, bar)
    }

    #[test]
    fn test_view_follows_components() {
        let (compositor, tray, bar) = composition();
        let view = bar.view();
        assert_eq!(view.title, "");
        assert!(!view.title_visible);
        assert!(!view.tray.visible);

        let window = FakeWindow::new(Some("editor"));
        compositor.focus(Some(&window));
        tray.set_items(vec![Rc::new(FakeItem::new(":1.1/A").with_icon_name("a"))]);
        let view = bar.view();
        assert_eq!(view.title, "editor");
        assert!(view.title_visible);
        assert!(view.tray.visible);
    }

    #[test]
    fn test_take_changed_view_deduplicates() {
        let (compositor, _tray, mut bar) = composition();
        assert!(bar.take_changed_view().is_some());
        assert!(bar.take_changed_view().is_none());

        let window = FakeWindow::new(Some("editor"));
        compositor.focus(Some(&window));
        assert_eq!(bar.take_changed_view().map(|view| view.title), Some("editor".to_owned()));
        assert!(bar.take_changed_view().is_none());

        bar.refresh_clock(&sunday_afternoon());
        assert_eq!(bar.take_changed_view().map(|view| view.clock), Some("2025-01-05 15:07".to_owned()));

        compositor.switch_workspace(Some(4));
        assert_eq!(bar.take_changed_view().and_then(|view| view.workspaces.active), Some(4));
        compositor.switch_workspace(Some(4));
        assert!(bar.take_changed_view().is_none());
    }

    #[test]
    fn test_view_lists_workspaces_and_power_menu() {
        let (compositor, _tray, bar) = composition();
        compositor.switch_workspace(Some(2));
        let view = bar.view();
        let active: Vec<u8> = view.workspaces.items.iter().filter(|entry| entry.active).map(|entry| entry.id).collect();
        assert_eq!(active, vec![2]);
        assert_eq!(view.power_menu.len(), 5);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["workspaces"]["active"], 2);
        assert_eq!(json["power_menu"][0]["action"], "shutdown");
    }
}
