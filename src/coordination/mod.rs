//! # Coordination: mirroring lifecycle state to a shared store.
//!
//! The registry depends only on the [`Coordination`] port. When coordination
//! is enabled the port is backed by [`KvMirror`] over a [`KvStore`], and two
//! inbound services run alongside it: the command watcher (remote
//! start/stop/append/remove) and the root TTL refresher. When disabled,
//! [`NoopCoordination`] absorbs every publication and no services run.
//!
//! The store wire protocol is out of scope; [`MemoryKv`] ships as an
//! in-process implementation and a networked backend implements [`KvStore`].

mod command;
mod kv;
mod memory;
mod mirror;
mod port;
mod watcher;

pub use command::{command_key, commands_prefix, Command};
pub use kv::{KvEvent, KvStore};
pub use memory::MemoryKv;
pub use mirror::KvMirror;
pub use port::{Coordination, NoopCoordination};

pub(crate) use watcher::{spawn_ttl_refresher, CommandWatcher};
