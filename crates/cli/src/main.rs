//! # CLI - Multidex session-table shell
//!
//! A REPL over the tables a game server keeps for its connected clients.
//! Reads commands from stdin, runs them against an in-memory client table
//! (six lookup keys) and inventory table (two lookup keys), and prints one
//! reply per command to stdout. Works interactively or with piped input.
//!
//! ## Commands
//!
//! ```text
//! CONNECT endpoint user player inventory session   Register a client
//! FIND field value      First client whose key matches (or "(nil)")
//! RANGE field value     Every client sharing that key
//! COUNT field value     Number of clients sharing that key
//! RENAME user new_user  Change a client's username
//! PING user             Bump a client's ping counter
//! DROP field value      Disconnect every client sharing that key
//! POP                   Disconnect the most recent client
//! LIST                  All clients in connection order
//! GIVE inventory item   Add an item to an inventory
//! INV inventory         Show an inventory
//! OWNED address         Inventories owned by an address
//! STATS                 Table sizes and bucket counts
//! CHECK                 Verify every index against its table
//! EXIT / QUIT           Leave
//! ```
//!
//! Fields: `endpoint`, `address`, `user`, `player`, `inventory`, `session`.
//!
//! ## Configuration
//!
//! ```text
//! MULTIDEX_LOG            log level on stderr         (default: "warn")
//! MULTIDEX_MIN_CAPACITY   first row allocation        (default: 5)
//! MULTIDEX_GROWTH_FACTOR  capacity multiplier         (default: 2)
//! MULTIDEX_MIN_BUCKETS    minimum buckets per index   (default: 5)
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! multidex shell (min_capacity=5, growth_factor=2, min_buckets=5)
//! > CONNECT 10.0.0.1:4000 ann 1 100 7
//! OK #0 conn=1
//! > FIND user ann
//! #0 conn=1 endpoint=10.0.0.1:4000 user=ann player=1 inventory=100 session=7 pings=0
//! > EXIT
//! bye
//! ```

mod shell;
mod tables;

use anyhow::Result;
use config::TableConfig;
use shell::{Reply, Shell};
use std::io::{self, BufRead, Write};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only command replies.
    let level: Level = env_or("MULTIDEX_LOG", "warn").parse().unwrap_or(Level::WARN);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = TableConfig::from_env()?;
    tracing::debug!(?config, "table config loaded");

    let mut shell = Shell::new(config);

    println!(
        "multidex shell (min_capacity={}, growth_factor={}, min_buckets={})",
        config.min_capacity, config.growth_factor, config.min_buckets
    );
    println!("Commands: CONNECT | FIND | RANGE | COUNT | RENAME | PING | DROP | POP | LIST");
    println!("          GIVE | INV | OWNED | STATS | CHECK | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        match shell.execute(&line) {
            Reply::Text(text) => println!("{}", text),
            Reply::Silent => {}
            Reply::Exit => {
                println!("bye");
                break;
            }
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}
