//! Line-oriented command interpreter over the client and inventory tables.
//!
//! Every command produces exactly one reply; failures are reported as
//! `ERR <reason>` lines instead of ending the session.

use crate::on_client_key;
use crate::tables::{client, inventory, ClientKey, Connection};
use anyhow::{bail, Context, Result};
use config::TableConfig;
use std::net::{IpAddr, SocketAddr};

/// Outcome of one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// Blank input; nothing to print.
    Silent,
    Exit,
}

pub struct Shell {
    clients: client::Table,
    inventories: inventory::Table,
    next_conn: u64,
}

impl Shell {
    pub fn new(config: TableConfig) -> Self {
        Self {
            clients: client::Table::with_config(config),
            inventories: inventory::Table::with_config(config),
            next_conn: 1,
        }
    }

    #[cfg(test)]
    pub fn clients(&self) -> &client::Table {
        &self.clients
    }

    #[cfg(test)]
    pub fn inventories(&self) -> &inventory::Table {
        &self.inventories
    }

    /// Parses and runs one command line.
    pub fn execute(&mut self, line: &str) -> Reply {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            return Reply::Silent;
        };
        let args: Vec<&str> = parts.collect();

        let outcome = match cmd.to_uppercase().as_str() {
            "CONNECT" => self.connect(&args),
            "FIND" => self.find(&args),
            "RANGE" => self.range(&args),
            "COUNT" => self.count(&args),
            "RENAME" => self.rename(&args),
            "PING" => self.ping(&args),
            "DROP" => self.drop_clients(&args),
            "POP" => Ok(self.pop()),
            "LIST" => Ok(self.list()),
            "GIVE" => self.give(&args),
            "INV" => self.show_inventory(&args),
            "OWNED" => self.owned(&args),
            "STATS" => Ok(self.stats()),
            "CHECK" => self.check(),
            "EXIT" | "QUIT" => return Reply::Exit,
            other => Ok(format!("unknown command: {}", other)),
        };

        Reply::Text(outcome.unwrap_or_else(|e| format!("ERR {:#}", e)))
    }

    fn connect(&mut self, args: &[&str]) -> Result<String> {
        let [endpoint, username, player, inv_id, session] = args else {
            bail!("usage: CONNECT endpoint username player inventory session");
        };
        let endpoint: SocketAddr = endpoint
            .parse()
            .with_context(|| format!("bad endpoint {:?}", endpoint))?;
        let player: u32 = player.parse().context("bad player id")?;
        let inv_id: u32 = inv_id.parse().context("bad inventory id")?;
        let session: u64 = session.parse().context("bad session token")?;

        if self.clients.contains::<{ client::ENDPOINT }>(&endpoint) {
            bail!("endpoint {} already connected", endpoint);
        }

        let conn = self.next_conn;
        let keys = client::keys(endpoint, username, player, inv_id, session);
        let pos = self.clients.emplace_back(Connection::new(conn), keys)?;
        self.next_conn += 1;

        // Inventories outlive connections; a returning player takes theirs
        // over from whatever address held it last.
        let owner = endpoint.ip();
        match self.inventories.position::<{ inventory::ID }>(&inv_id) {
            Some(at) => {
                self.inventories.set::<{ inventory::OWNER }>(at, owner)?;
            }
            None => {
                self.inventories.emplace_back(Vec::new(), (inv_id, owner))?;
            }
        }

        tracing::info!(conn, %endpoint, user = %username, "client connected");
        Ok(format!("OK #{} conn={}", pos, conn))
    }

    fn find(&self, args: &[&str]) -> Result<String> {
        let key = parse_key(args, "FIND")?;
        Ok(match on_client_key!(self.clients, &key, position) {
            Some(pos) => client::Line(pos, &self.clients[pos]).to_string(),
            None => "(nil)".to_string(),
        })
    }

    fn range(&self, args: &[&str]) -> Result<String> {
        let key = parse_key(args, "RANGE")?;
        let positions = on_client_key!(self.clients, &key, equal_range).positions();
        Ok(self.render(positions.iter().copied()))
    }

    fn count(&self, args: &[&str]) -> Result<String> {
        let key = parse_key(args, "COUNT")?;
        Ok(on_client_key!(self.clients, &key, count).to_string())
    }

    fn rename(&mut self, args: &[&str]) -> Result<String> {
        let [from, to] = args else {
            bail!("usage: RENAME username new_username");
        };
        let pos = self.user_position(from)?;
        let old = self.clients.set::<{ client::USERNAME }>(pos, to.to_string())?;
        Ok(format!("OK {} -> {}", old, to))
    }

    fn ping(&mut self, args: &[&str]) -> Result<String> {
        let [user] = args else {
            bail!("usage: PING username");
        };
        let pos = self.user_position(user)?;
        let Some(conn) = self.clients.value_mut(pos) else {
            bail!("no client at #{}", pos);
        };
        conn.pings += 1;
        Ok(format!("PONG {}", conn.pings))
    }

    fn drop_clients(&mut self, args: &[&str]) -> Result<String> {
        let key = parse_key(args, "DROP")?;
        let mut doomed = on_client_key!(self.clients, &key, equal_range)
            .positions()
            .to_vec();
        // Highest first so the remaining positions stay valid.
        doomed.sort_unstable_by(|a, b| b.cmp(a));
        for &pos in &doomed {
            let row = self.clients.erase(pos)?;
            tracing::info!(conn = row.value.id, "client dropped");
        }
        Ok(format!("OK dropped {}", doomed.len()))
    }

    fn pop(&mut self) -> String {
        match self.clients.pop_back() {
            Some(row) => format!("OK popped {}", client::Line(self.clients.len(), &row)),
            None => "(empty)".to_string(),
        }
    }

    fn list(&self) -> String {
        self.render(0..self.clients.len())
    }

    fn give(&mut self, args: &[&str]) -> Result<String> {
        let [inv_id, item] = args else {
            bail!("usage: GIVE inventory item");
        };
        let inv_id: u32 = inv_id.parse().context("bad inventory id")?;
        let Some(pos) = self.inventories.position::<{ inventory::ID }>(&inv_id) else {
            bail!("no inventory {}", inv_id);
        };
        let Some(items) = self.inventories.value_mut(pos) else {
            bail!("no inventory at #{}", pos);
        };
        items.push(item.to_string());
        Ok(format!("OK {} items", items.len()))
    }

    fn show_inventory(&self, args: &[&str]) -> Result<String> {
        let [inv_id] = args else {
            bail!("usage: INV inventory");
        };
        let inv_id: u32 = inv_id.parse().context("bad inventory id")?;
        Ok(match self.inventories.find::<{ inventory::ID }>(&inv_id) {
            Some(row) => format!(
                "inventory {} owner={} items=[{}]",
                inv_id,
                row.key::<{ inventory::OWNER }>(),
                row.value.join(", ")
            ),
            None => "(nil)".to_string(),
        })
    }

    fn owned(&self, args: &[&str]) -> Result<String> {
        let [owner] = args else {
            bail!("usage: OWNED address");
        };
        let owner: IpAddr = owner.parse().context("bad address")?;
        let ids: Vec<String> = self
            .inventories
            .equal_range::<{ inventory::OWNER }>(&owner)
            .map(|row| row.key::<{ inventory::ID }>().to_string())
            .collect();
        Ok(if ids.is_empty() {
            "(none)".to_string()
        } else {
            format!("inventories: {}", ids.join(" "))
        })
    }

    fn stats(&self) -> String {
        let clients = &self.clients;
        let inventories = &self.inventories;
        let client_buckets: Vec<usize> = (1..=clients.key_count())
            .filter_map(|slot| clients.bucket_count(slot))
            .collect();
        let inventory_buckets: Vec<usize> = (1..=inventories.key_count())
            .filter_map(|slot| inventories.bucket_count(slot))
            .collect();
        format!(
            "clients: len={} capacity={} buckets={:?}\ninventories: len={} capacity={} buckets={:?}",
            clients.len(),
            clients.capacity(),
            client_buckets,
            inventories.len(),
            inventories.capacity(),
            inventory_buckets
        )
    }

    fn check(&self) -> Result<String> {
        self.clients.check_consistency().context("client table")?;
        self.inventories.check_consistency().context("inventory table")?;
        Ok("OK".to_string())
    }

    // ---- Helpers ----

    fn user_position(&self, user: &str) -> Result<usize> {
        self.clients
            .position::<{ client::USERNAME }>(&user.to_string())
            .with_context(|| format!("no client named {}", user))
    }

    fn render(&self, positions: impl Iterator<Item = usize>) -> String {
        let lines: Vec<String> = positions
            .map(|pos| client::Line(pos, &self.clients[pos]).to_string())
            .collect();
        if lines.is_empty() {
            return "(empty)".to_string();
        }
        format!("{}\n({} clients)", lines.join("\n"), lines.len())
    }
}

fn parse_key(args: &[&str], cmd: &str) -> Result<ClientKey> {
    let [field, raw] = args else {
        bail!("usage: {} field value", cmd);
    };
    ClientKey::parse(field, raw)
}
