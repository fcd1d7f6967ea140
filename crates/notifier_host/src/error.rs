use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Dbus connection error")]
    DbusError(#[from] zbus::Error),
    #[error("Dbus method call failed")]
    FdoError(#[from] zbus::fdo::Error),
    #[error("Service path {0} was not understood")]
    DbusAddressError(String),
    #[error("Could not parse introspection data of {service}: {message}")]
    Introspection { service: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
