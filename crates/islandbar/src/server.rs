use crate::{
    app::{self, DaemonCommand},
    bar::{BarComposition, BarView},
    compositor, config, error_handling_ctx,
    focus_tracker::FocusTracker,
    ipc_server,
    paths::BarPaths,
    probe::LocalSystem,
    session::SessionCommands,
    system_stats::MetricSampler,
    tray::{self, collection::TrayCollectionController},
    workspaces::WorkspaceTracker,
};
use anyhow::{Context, Result};
use std::{io::Write, rc::Rc};
use tokio::{sync::mpsc::UnboundedReceiver, time::MissedTickBehavior};

pub fn initialize_server(paths: BarPaths) -> Result<()> {
    log::info!("Loading paths: {}", &paths);

    let bar_config = match config::read_from_file(&paths.get_config_file()) {
        Ok(config) => config,
        Err(err) => {
            error_handling_ctx::print_error(&err);
            config::BarConfig::default()
        }
    };

    simple_signal::set_handler(&[simple_signal::Signal::Int, simple_signal::Signal::Term], move |_| {
        log::info!("Shutting down islandbar daemon...");
        if let Err(e) = crate::application_lifecycle::send_exit() {
            log::error!("Failed to send application shutdown event to workers: {:?}", e);
            std::process::exit(1);
        }
    });

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().context("Failed to initialize tokio runtime")?;
    let local = tokio::task::LocalSet::new();
    let result = local.block_on(&rt, run_daemon(paths.clone(), bar_config));

    let _ = std::fs::remove_file(paths.get_ipc_socket_file());
    log::info!("main application thread finished");
    result
}

async fn run_daemon(paths: BarPaths, bar_config: config::BarConfig) -> Result<()> {
    let (ui_send, ui_recv) = tokio::sync::mpsc::unbounded_channel();

    let ipc_server_join_handle = {
        let ui_send = ui_send.clone();
        let socket_file = paths.get_ipc_socket_file().to_path_buf();
        tokio::spawn(async move {
            let result = ipc_server::run_server(ui_send, socket_file).await;
            crate::print_result_err!("while running the IPC server", result);
        })
    };

    let probe = Rc::new(LocalSystem::new(bar_config.probe_timeout()));
    let compositor = compositor::connect_default().await;
    let sni_tray = tray::sni::spawn_tray(bar_config.tray_icon_size);

    let bar = BarComposition::new(
        MetricSampler::new(probe.clone(), bar_config.thermal_zone.clone()),
        FocusTracker::new(compositor.clone()),
        WorkspaceTracker::new(compositor),
        TrayCollectionController::new(sni_tray, probe.clone()),
        bar_config.clock_format.clone(),
    );
    let session = SessionCommands::new(probe, &bar_config);
    let mut app = app::App { bar, session, paths };

    run_event_loop(&mut app, &bar_config, ui_recv).await;

    ipc_server_join_handle.abort();
    Ok(())
}

/// Drive the bar until the application exits, printing the bar state to stdout whenever it changed.
async fn run_event_loop(app: &mut app::App, bar_config: &config::BarConfig, mut ui_recv: UnboundedReceiver<DaemonCommand>) {
    let mut stats_interval = tokio::time::interval(bar_config.stats_interval());
    stats_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut clock_interval = tokio::time::interval(bar_config.clock_interval());
    clock_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut title_recv = app.bar.focus().title();
    let mut workspace_recv = app.bar.workspaces().active();
    let mut tray_recv = app.bar.tray().view();
    // subscribed once, so an exit sent while handling a command isn't missed
    let mut exit_recv = crate::application_lifecycle::APPLICATION_EXIT_SENDER.subscribe();

    loop {
        tokio::select! {
            _ = stats_interval.tick() => app.bar.refresh_stats(),
            _ = clock_interval.tick() => app.bar.refresh_clock(&chrono::Local::now()),
            Ok(()) = title_recv.changed() => {},
            Ok(()) = workspace_recv.changed() => {},
            Ok(()) = tray_recv.changed() => {},
            _ = exit_recv.recv() => break,
            command = ui_recv.recv() => match command {
                Some(command) => app.handle_command(command),
                None => break,
            },
        }

        if let Some(view) = app.bar.take_changed_view() {
            match write_view(&mut std::io::stdout().lock(), &view) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {
                    log::info!("Stdout was closed, nobody is rendering the bar anymore");
                    break;
                }
                Err(err) => log::error!("Failed to write bar state: {}", err),
            }
        }
    }
    log::info!("Stopping islandbar daemon");
}

/// Write `view` as a single line of JSON and flush it, so the renderer sees it right away.
fn write_view(out: &mut impl Write, view: &BarView) -> std::io::Result<()> {
    let json = serde_json::to_string(view)?;
    writeln!(out, "{}", json)?;
    out.flush()
}
