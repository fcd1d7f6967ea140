use crate::names;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};
use zbus::{dbus_interface, export::ordered_stream::OrderedStreamExt, Interface};

/// Bookkeeping of registered hosts and items, kept apart from the DBus plumbing.
#[derive(Debug, Default)]
struct Registry {
    hosts: HashSet<String>,
    // Vec instead of a set: the RegisteredStatusNotifierItems property reports items in
    // registration order, which is the order trays display them in.
    items: Vec<String>,
}

impl Registry {
    /// Returns `None` if the host was already known, otherwise whether it is the first host.
    fn add_host(&mut self, host: &str) -> Option<bool> {
        if !self.hosts.insert(host.to_owned()) {
            return None;
        }
        Some(self.hosts.len() == 1)
    }

    /// Returns whether the removed host was the last one.
    fn remove_host(&mut self, host: &str) -> bool {
        self.hosts.remove(host) && self.hosts.is_empty()
    }

    fn add_item(&mut self, item: &str) -> bool {
        if self.items.iter().any(|x| x == item) {
            return false;
        }
        self.items.push(item.to_owned());
        true
    }

    fn remove_item(&mut self, item: &str) -> bool {
        let len_before = self.items.len();
        self.items.retain(|x| x != item);
        self.items.len() != len_before
    }
}

/// An instance of [`org.kde.StatusNotifierWatcher`]. It only tracks what tray items and trays
/// exist, and doesn't have any logic for displaying items (for that, see [`Host`][`crate::Host`]).
///
/// [`org.kde.StatusNotifierWatcher`]: https://freedesktop.org/wiki/Specifications/StatusNotifierItem/StatusNotifierWatcher/
#[derive(Debug, Default)]
pub struct Watcher {
    tasks: tokio::task::JoinSet<()>,

    // std mutex on purpose: it is never held across an await.
    registry: Arc<Mutex<Registry>>,
}

#[dbus_interface(name = "org.kde.StatusNotifierWatcher")]
impl Watcher {
    /// RegisterStatusNotifierHost method
    async fn register_status_notifier_host(
        &mut self,
        service: &str,
        #[zbus(header)] hdr: zbus::MessageHeader<'_>,
        #[zbus(connection)] con: &zbus::Connection,
        #[zbus(signal_context)] ctxt: zbus::SignalContext<'_>,
    ) -> zbus::fdo::Result<()> {
        let (service, _) = parse_service(service, hdr, con).await?;
        log::info!("new host: {}", service);

        let added_first = {
            let mut registry = self.registry.lock().unwrap(); // unwrap: mutex poisoning is okay
            match registry.add_host(service.as_str()) {
                Some(first) => first,
                None => return Ok(()),
            }
        };

        if added_first {
            self.is_status_notifier_host_registered_changed(&ctxt).await?;
        }
        Watcher::status_notifier_host_registered(&ctxt).await?;

        self.tasks.spawn({
            let registry = self.registry.clone();
            let ctxt = ctxt.to_owned();
            let con = con.to_owned();
            async move {
                if let Err(e) = wait_for_service_exit(&con, service.as_ref().into()).await {
                    log::error!("failed to wait for service exit: {}", e);
                }
                log::info!("lost host: {}", service);

                let removed_last = registry.lock().unwrap().remove_host(service.as_str()); // unwrap: mutex poisoning is okay
                if removed_last {
                    if let Err(e) = Watcher::invalidate_property(&ctxt, "IsStatusNotifierHostRegistered").await {
                        log::error!("failed to signal Watcher: {}", e);
                    }
                }
                if let Err(e) = Watcher::status_notifier_host_unregistered(&ctxt).await {
                    log::error!("failed to signal Watcher: {}", e);
                }
            }
        });

        Ok(())
    }

    /// StatusNotifierHostRegistered signal.
    #[dbus_interface(signal)]
    async fn status_notifier_host_registered(ctxt: &zbus::SignalContext<'_>) -> zbus::Result<()>;

    /// StatusNotifierHostUnregistered signal
    #[dbus_interface(signal)]
    async fn status_notifier_host_unregistered(ctxt: &zbus::SignalContext<'_>) -> zbus::Result<()>;

    /// IsStatusNotifierHostRegistered property
    #[dbus_interface(property)]
    async fn is_status_notifier_host_registered(&self) -> bool {
        !self.registry.lock().unwrap().hosts.is_empty() // unwrap: mutex poisoning is okay
    }

    /// RegisterStatusNotifierItem method
    async fn register_status_notifier_item(
        &mut self,
        service: &str,
        #[zbus(header)] hdr: zbus::MessageHeader<'_>,
        #[zbus(connection)] con: &zbus::Connection,
        #[zbus(signal_context)] ctxt: zbus::SignalContext<'_>,
    ) -> zbus::fdo::Result<()> {
        let (service, objpath) = parse_service(service, hdr, con).await?;
        let service = zbus::names::BusName::Unique(service);

        let item = format!("{}{}", service, objpath);

        let is_new = self.registry.lock().unwrap().add_item(&item); // unwrap: mutex poisoning is okay
        if !is_new {
            log::info!("new item: {} (duplicate)", item);
            return Ok(());
        }
        log::info!("new item: {}", item);

        self.registered_status_notifier_items_changed(&ctxt).await?;
        Watcher::status_notifier_item_registered(&ctxt, item.as_ref()).await?;

        self.tasks.spawn({
            let registry = self.registry.clone();
            let ctxt = ctxt.to_owned();
            let con = con.to_owned();
            async move {
                if let Err(e) = wait_for_service_exit(&con, service.as_ref()).await {
                    log::error!("failed to wait for service exit: {}", e);
                }
                log::info!("gone item: {}", &item);

                registry.lock().unwrap().remove_item(&item); // unwrap: mutex poisoning is okay

                if let Err(e) = Watcher::invalidate_property(&ctxt, "RegisteredStatusNotifierItems").await {
                    log::error!("failed to signal Watcher: {}", e);
                }
                if let Err(e) = Watcher::status_notifier_item_unregistered(&ctxt, item.as_ref()).await {
                    log::error!("failed to signal Watcher: {}", e);
                }
            }
        });

        Ok(())
    }

    /// StatusNotifierItemRegistered signal
    #[dbus_interface(signal)]
    async fn status_notifier_item_registered(ctxt: &zbus::SignalContext<'_>, service: &str) -> zbus::Result<()>;

    /// StatusNotifierItemUnregistered signal
    #[dbus_interface(signal)]
    async fn status_notifier_item_unregistered(ctxt: &zbus::SignalContext<'_>, service: &str) -> zbus::Result<()>;

    /// RegisteredStatusNotifierItems property
    #[dbus_interface(property)]
    async fn registered_status_notifier_items(&self) -> Vec<String> {
        self.registry.lock().unwrap().items.clone() // unwrap: mutex poisoning is okay
    }

    /// ProtocolVersion property
    #[dbus_interface(property)]
    fn protocol_version(&self) -> i32 {
        0
    }
}

impl Watcher {
    pub fn new() -> Watcher {
        Default::default()
    }

    /// Attach and run the Watcher (in the background) on a connection.
    ///
    /// If another process already owns the watcher name, this defers to it and succeeds.
    pub async fn attach_to(self, con: &zbus::Connection) -> zbus::Result<()> {
        if !con.object_server().at(names::WATCHER_OBJECT, self).await? {
            return Err(zbus::Error::Failure(format!(
                "Object already exists at {} on this connection -- is StatusNotifierWatcher already running?",
                names::WATCHER_OBJECT
            )));
        }

        // not AllowReplacement, not ReplaceExisting, not DoNotQueue
        let flags: [zbus::fdo::RequestNameFlags; 0] = [];
        match con.request_name_with_flags(names::WATCHER_BUS, flags.into_iter().collect()).await {
            Ok(zbus::fdo::RequestNameReply::PrimaryOwner) => Ok(()),
            Ok(_) | Err(zbus::Error::NameTaken) => Ok(()), // defer to existing
            Err(e) => Err(e),
        }
    }

    /// Emit PropertiesChanged invalidating `property`, without requiring `self`.
    async fn invalidate_property(ctxt: &zbus::SignalContext<'_>, property: &str) -> zbus::Result<()> {
        zbus::fdo::Properties::properties_changed(ctxt, Self::name(), &std::collections::HashMap::new(), &[property])
            .await
    }
}

/// Decode the service name that others give to us, into the [bus
/// name](https://dbus2.github.io/zbus/concepts.html#bus-name--service-name) and the [object
/// path](https://dbus2.github.io/zbus/concepts.html#objects-and-object-paths) within the
/// connection.
///
/// The freedesktop.org specification has the format of this be just the bus name, however some
/// status items pass non-conforming values. One common one is just the object path.
async fn parse_service<'a>(
    service: &'a str,
    hdr: zbus::MessageHeader<'_>,
    con: &zbus::Connection,
) -> zbus::fdo::Result<(zbus::names::UniqueName<'static>, &'a str)> {
    if service.starts_with('/') {
        // they sent us just the object path
        if let Some(sender) = hdr.sender()? {
            Ok((sender.to_owned(), service))
        } else {
            log::warn!("unknown sender");
            Err(zbus::fdo::Error::InvalidArgs("Unknown bus address".into()))
        }
    } else {
        let busname: zbus::names::BusName = match service.try_into() {
            Ok(x) => x,
            Err(e) => {
                log::warn!("received invalid bus name {:?}: {}", service, e);
                return Err(zbus::fdo::Error::InvalidArgs(e.to_string()));
            }
        };

        if let zbus::names::BusName::Unique(unique) = busname {
            Ok((unique.to_owned(), names::ITEM_OBJECT))
        } else {
            // A well-known name has to be converted to the unique name of its owner (e.g. :1.234), so
            // the item survives the owner dropping that name.
            let dbus = zbus::fdo::DBusProxy::new(con).await?;
            match dbus.get_name_owner(busname).await {
                Ok(owner) => Ok((owner.into_inner(), names::ITEM_OBJECT)),
                Err(e) => {
                    log::warn!("failed to get owner of {:?}: {}", service, e);
                    Err(e)
                }
            }
        }
    }
}

/// Wait for a DBus service to disappear
async fn wait_for_service_exit(con: &zbus::Connection, service: zbus::names::BusName<'_>) -> zbus::fdo::Result<()> {
    let dbus = zbus::fdo::DBusProxy::new(con).await?;
    let mut owner_changes = dbus.receive_name_owner_changed_with_args(&[(0, service.as_str())]).await?;

    if !dbus.name_has_owner(service.as_ref()).await? {
        return Ok(());
    }

    while let Some(sig) = owner_changes.next().await {
        let args = sig.args()?;
        if args.new_owner().is_none() {
            break;
        }
    }

    Ok(())
}
