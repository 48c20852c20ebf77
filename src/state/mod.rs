//! Plain data shared by the connection core.

mod connection;
mod killswitch;
mod location;
mod protocol;

pub use connection::{ActiveConnection, ConnectionStatus, StatusChange};
pub use killswitch::NetworkGuard;
pub use location::{Location, LocationCatalog, Region, SortDirection, SortKey};
pub use protocol::{Cipher, ConnectionConfiguration, DoubleHopRoute, Protocol, Transport};
