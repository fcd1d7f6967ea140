use anyhow::{Context, Result};
use clap::CommandFactory as _;
use daemon_response::DaemonResponse;
use opts::ActionWithServer;
use paths::BarPaths;
use std::{os::unix::net, path::Path, time::Duration};

mod app;
mod application_lifecycle;
mod bar;
mod client;
mod compositor;
mod config;
mod daemon_response;
mod error_handling_ctx;
mod focus_tracker;
mod ipc_server;
mod opts;
mod paths;
mod probe;
mod server;
mod session;
mod system_stats;
mod tray;
mod util;
mod workspaces;

fn main() {
    let opts: opts::Opt = opts::Opt::from_env();

    let log_level_filter = if opts.log_debug { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if std::env::var("RUST_LOG").is_ok() {
        pretty_env_logger::init_timed();
    } else {
        pretty_env_logger::formatted_timed_builder()
            .filter(Some("islandbar"), log_level_filter)
            .filter(Some("notifier_host"), log_level_filter)
            .init();
    }

    if let opts::Action::ShellCompletions { shell } = opts.action {
        clap_complete::generate(shell, &mut opts::RawOpt::command(), "islandbar", &mut std::io::stdout());
        return;
    }

    if let Err(err) = run(opts) {
        error_handling_ctx::print_error(&err);
        std::process::exit(1);
    }
}

fn run(opts: opts::Opt) -> Result<()> {
    let paths = opts
        .config_path
        .map(BarPaths::from_config_dir)
        .unwrap_or_else(BarPaths::default)
        .context("Failed to initialize islandbar paths")?;

    match opts.action {
        opts::Action::ShellCompletions { .. } => unreachable!(),

        // make sure that there isn't already a daemon running.
        opts::Action::Daemon if check_server_running(paths.get_ipc_socket_file()) => {
            eprintln!("islandbar server already running.");
        }
        opts::Action::Daemon => {
            log::info!("Initializing islandbar server. ({})", paths.get_ipc_socket_file().display());
            let _ = std::fs::remove_file(paths.get_ipc_socket_file());
            server::initialize_server(paths)?;
        }

        opts::Action::WithServer(ActionWithServer::KillServer) => {
            if let Some(response) = handle_server_command(&paths, &ActionWithServer::KillServer, 1)? {
                handle_daemon_response(response);
            }
        }

        // a running daemon is necessary for this command
        opts::Action::WithServer(action) => {
            if let Some(response) = handle_server_command(&paths, &action, 5)? {
                handle_daemon_response(response);
            }
        }
    }
    Ok(())
}

/// attempt to send a command to the daemon and send it the given action repeatedly.
fn handle_server_command(paths: &BarPaths, action: &ActionWithServer, connect_attempts: usize) -> Result<Option<DaemonResponse>> {
    log::debug!("Trying to find server process at socket {}", paths.get_ipc_socket_file().display());
    let mut stream = attempt_connect(paths.get_ipc_socket_file(), connect_attempts).context("Failed to connect to daemon")?;
    log::debug!("Connected to islandbar server ({}).", &paths.get_ipc_socket_file().display());
    client::do_server_call(&mut stream, action).context("Error while forwarding command to server")
}

fn handle_daemon_response(res: DaemonResponse) {
    match res {
        DaemonResponse::Success(x) => println!("{}", x),
        DaemonResponse::Failure(x) => {
            eprintln!("{}", x);
            std::process::exit(1);
        }
    }
}

fn attempt_connect(socket_path: impl AsRef<Path>, attempts: usize) -> Option<net::UnixStream> {
    for _ in 0..attempts {
        if let Ok(mut con) = net::UnixStream::connect(&socket_path) {
            if client::do_server_call(&mut con, &opts::ActionWithServer::Ping).is_ok() {
                return net::UnixStream::connect(&socket_path).ok();
            }
        }
        std::thread::sleep(Duration::from_millis(200));
    }
    None
}

/// Check if a islandbar server is currently running by trying to send a ping message to it.
fn check_server_running(socket_path: impl AsRef<Path>) -> bool {
    let response = net::UnixStream::connect(socket_path)
        .ok()
        .and_then(|mut stream| client::do_server_call(&mut stream, &opts::ActionWithServer::Ping).ok());
    response.is_some()
}
