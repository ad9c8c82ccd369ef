//! Table declarations for a game server's session bookkeeping.
//!
//! A connected client is looked up by whichever handle the caller has at
//! hand: the socket endpoint a packet arrived from, the remote address (for
//! per-address limits and bans), the account name, the player id, the
//! inventory id, or the console-session token. Inventories outlive client
//! connections and are looked up by id or by the address that owns them.

use multidex::MultiIndex;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Per-connection state stored as the client row's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: u64,
    pub pings: u64,
}

impl Connection {
    pub fn new(id: u64) -> Self {
        Self { id, pings: 0 }
    }
}

pub mod client {
    use super::*;

    pub const ENDPOINT: usize = 1;
    pub const ADDRESS: usize = 2;
    pub const USERNAME: usize = 3;
    pub const PLAYER: usize = 4;
    pub const INVENTORY: usize = 5;
    pub const SESSION: usize = 6;

    pub type Keys = (SocketAddr, IpAddr, String, u32, u32, u64);
    pub type Table = MultiIndex<Connection, Keys>;
    pub type Row = multidex::Row<Connection, Keys>;

    /// Key tuple for a client connecting from `endpoint`.
    pub fn keys(endpoint: SocketAddr, username: &str, player: u32, inventory: u32, session: u64) -> Keys {
        (endpoint, endpoint.ip(), username.to_string(), player, inventory, session)
    }

    /// One-line rendering used by the shell.
    pub struct Line<'a>(pub usize, pub &'a Row);

    impl fmt::Display for Line<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let Line(pos, row) = self;
            let (endpoint, _, username, player, inventory, session) = row.keys();
            write!(
                f,
                "#{} conn={} endpoint={} user={} player={} inventory={} session={} pings={}",
                pos, row.value.id, endpoint, username, player, inventory, session, row.value.pings
            )
        }
    }
}

pub mod inventory {
    use super::*;

    pub const ID: usize = 1;
    pub const OWNER: usize = 2;

    pub type Keys = (u32, IpAddr);
    /// Item names held by each inventory.
    pub type Table = MultiIndex<Vec<String>, Keys>;
}

/// Which client key a shell command addresses, with its parsed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientKey {
    Endpoint(SocketAddr),
    Address(IpAddr),
    Username(String),
    Player(u32),
    Inventory(u32),
    Session(u64),
}

impl ClientKey {
    /// Parses a field name (`endpoint`, `address`, `user`, `player`,
    /// `inventory`, `session`) and its raw value.
    pub fn parse(field: &str, raw: &str) -> anyhow::Result<Self> {
        let key = match field.to_lowercase().as_str() {
            "endpoint" | "ep" => Self::Endpoint(raw.parse()?),
            "address" | "addr" | "ip" => Self::Address(raw.parse()?),
            "user" | "username" | "name" => Self::Username(raw.to_string()),
            "player" => Self::Player(raw.parse()?),
            "inventory" | "inv" => Self::Inventory(raw.parse()?),
            "session" => Self::Session(raw.parse()?),
            other => anyhow::bail!("unknown field: {}", other),
        };
        Ok(key)
    }
}

/// Calls a slot-generic lookup on a client table with the slot matching
/// `$key`.
#[macro_export]
macro_rules! on_client_key {
    ($table:expr, $key:expr, $method:ident) => {
        match $key {
            $crate::tables::ClientKey::Endpoint(k) => $table.$method::<{ $crate::tables::client::ENDPOINT }>(k),
            $crate::tables::ClientKey::Address(k) => $table.$method::<{ $crate::tables::client::ADDRESS }>(k),
            $crate::tables::ClientKey::Username(k) => $table.$method::<{ $crate::tables::client::USERNAME }>(k),
            $crate::tables::ClientKey::Player(k) => $table.$method::<{ $crate::tables::client::PLAYER }>(k),
            $crate::tables::ClientKey::Inventory(k) => $table.$method::<{ $crate::tables::client::INVENTORY }>(k),
            $crate::tables::ClientKey::Session(k) => $table.$method::<{ $crate::tables::client::SESSION }>(k),
        }
    };
}
