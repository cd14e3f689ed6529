//! Task-domain glue: the `config` and `static_route` concurrency domains
//! realized as `tokio::mpsc` channels plus a single-consumer event loop,
//! modeled directly on `Bgp::event_loop` / `Rib::event_loop` (§5.1).
//!
//! The `db_table` domain has no loop of its own here: delivering an entry
//! event to a [`crate::condition::ConditionMatch`] is the condition
//! listener's job (an external collaborator, §4.6), and
//! [`crate::static_route::StaticRouteMatch::handle_event`] turns that
//! straight into an enqueue on this task's queue -- there's nothing left
//! for `db_table` to own on this side of the boundary.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::config::StaticRouteConfig;
use crate::static_route::manager::StaticRouteManager;

/// A `config`-domain event: structural changes to the configured prefix
/// set. Serialized -- only one of these is ever in flight.
pub enum ConfigMessage {
    Apply(Vec<StaticRouteConfig>),
    Update(Vec<StaticRouteConfig>),
    Flush,
}

/// Owns the config channel and the manager it drives. `serve` spawns the
/// event loop as its own task, the way `bgp::inst::Bgp::serve` and
/// `rib::inst::Rib::serve` do.
pub struct StaticRouteTask {
    manager: Arc<StaticRouteManager>,
    config_tx: UnboundedSender<ConfigMessage>,
    config_rx: UnboundedReceiver<ConfigMessage>,
    wake_rx: UnboundedReceiver<()>,
}

impl StaticRouteTask {
    pub fn new(manager: Arc<StaticRouteManager>) -> Self {
        let (config_tx, config_rx) = mpsc::unbounded_channel();
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        manager.set_wake(wake_tx);
        Self {
            manager,
            config_tx,
            config_rx,
            wake_rx,
        }
    }

    pub fn config_handle(&self) -> UnboundedSender<ConfigMessage> {
        self.config_tx.clone()
    }

    /// Spawns the event loop on the current Tokio runtime.
    pub fn serve(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.event_loop())
    }

    async fn event_loop(mut self) {
        loop {
            tokio::select! {
                Some(msg) = self.config_rx.recv() => {
                    self.handle_config(msg);
                }
                Some(()) = self.wake_rx.recv() => {}
                else => break,
            }
            self.manager.drain_queue();
        }
    }

    fn handle_config(&self, msg: ConfigMessage) {
        match msg {
            ConfigMessage::Apply(configs) => self.manager.process_static_route_config(&configs),
            ConfigMessage::Update(configs) => self.manager.update_static_route_config(&configs),
            ConfigMessage::Flush => self.manager.flush_static_route_config(),
        }
    }
}
