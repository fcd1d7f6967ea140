use crate::*;

use zbus::export::ordered_stream::{self, OrderedStreamExt};

/// Receiver of item lifecycle events produced by [`run_host`].
pub trait Host {
    fn add_item(&mut self, id: &str, item: Item);
    fn remove_item(&mut self, id: &str);
}

/// Register this connection as a StatusNotifierHost.
///
/// Returns the well-known name that was claimed, and a proxy to the StatusNotifierWatcher the host
/// registered itself with.
pub async fn register_as_host(
    con: &zbus::Connection,
) -> zbus::Result<(String, proxy::StatusNotifierWatcherProxy<'static>)> {
    // From <https://www.freedesktop.org/wiki/Specifications/StatusNotifierItem/StatusNotifierHost/>:
    //
    // Instances of this service are registered on the Dbus session bus, under a name on the
    // form org.freedesktop.StatusNotifierHost-id where id is an unique identifier, that keeps
    // the names unique on the bus, such as the process-id of the application or another type
    // of identifier if more that one StatusNotifierHost is registered by the same process.

    let pid = std::process::id();
    let mut i = 0;
    let wellknown_name = loop {
        let wellknown_name = format!("org.freedesktop.StatusNotifierHost-{}-{}", pid, i);
        let flags = [zbus::fdo::RequestNameFlags::DoNotQueue];

        use zbus::fdo::RequestNameReply::*;
        match con.request_name_with_flags(wellknown_name.as_str(), flags.into_iter().collect()).await? {
            PrimaryOwner => break wellknown_name,
            Exists | AlreadyOwner => {}
            InQueue => {
                return Err(zbus::Error::Failure(format!(
                    "request for {} was queued even though DoNotQueue was requested",
                    wellknown_name
                )))
            }
        };

        i += 1;
    };

    let snw = proxy::StatusNotifierWatcherProxy::new(con).await?;
    snw.register_status_notifier_host(&wellknown_name).await?;

    Ok((wellknown_name, snw))
}

/// Run the host forever, forwarding item registrations and removals to `host`.
///
/// Items that are already registered are added first, in the order the watcher reports them.
/// This only returns on error.
pub async fn run_host(host: &mut dyn Host, snw: &proxy::StatusNotifierWatcherProxy<'static>) -> Error {
    match serve_host(host, snw).await {
        Ok(()) => Error::DbusError(zbus::Error::Failure("StatusNotifierWatcher signal streams ended".to_owned())),
        Err(e) => e,
    }
}

async fn serve_host(host: &mut dyn Host, snw: &proxy::StatusNotifierWatcherProxy<'static>) -> Result<()> {
    enum ItemEvent {
        NewItem(proxy::StatusNotifierItemRegistered),
        GoneItem(proxy::StatusNotifierItemUnregistered),
    }

    // start listening before reading the initial list, so no registration falls in between
    let new_items = snw.receive_status_notifier_item_registered().await?;
    let gone_items = snw.receive_status_notifier_item_unregistered().await?;

    let mut item_names = std::collections::HashSet::new();

    for svc in snw.registered_status_notifier_items().await? {
        match Item::from_address(snw.connection(), &svc).await {
            Ok(item) => {
                item_names.insert(svc.to_owned());
                host.add_item(&svc, item);
            }
            Err(e) => {
                log::warn!("Could not create StatusNotifierItem from address {:?}: {:?}", svc, e);
            }
        }
    }

    let mut ev_stream = ordered_stream::join(
        OrderedStreamExt::map(new_items, ItemEvent::NewItem),
        OrderedStreamExt::map(gone_items, ItemEvent::GoneItem),
    );
    while let Some(ev) = ev_stream.next().await {
        match ev {
            ItemEvent::NewItem(sig) => {
                let args = sig.args()?;
                let svc = args.service;
                if item_names.contains(svc) {
                    log::info!("Got duplicate new item: {:?}", svc);
                } else {
                    match Item::from_address(snw.connection(), svc).await {
                        Ok(item) => {
                            item_names.insert(svc.to_owned());
                            host.add_item(svc, item);
                        }
                        Err(e) => {
                            log::warn!("Could not create StatusNotifierItem from address {:?}: {:?}", svc, e);
                        }
                    }
                }
            }
            ItemEvent::GoneItem(sig) => {
                let args = sig.args()?;
                let svc = args.service;
                if item_names.remove(svc) {
                    host.remove_item(svc);
                }
            }
        }
    }

    Ok(())
}
