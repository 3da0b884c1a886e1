//! Ping-Pong Example: producers and consumers over crossbar channels.
//!
//! Runs three short scenarios on a single-threaded runtime:
//!
//! ```bash
//! cargo run --example ping_pong
//! ```
//!
//! 1. Point-to-point: one producer, one consumer, strict FIFO.
//! 2. Broadcast: one announcement wakes every waiting subscriber.
//! 3. Bridged: the channel contract layered over an external endpoint
//!    (here a loopback that echoes posts back as inbound deliveries).

use std::cell::RefCell;
use std::rc::Rc;

use tokio::task::{LocalSet, spawn_local, yield_now};
use tracing::info;

use crossbar::{
    Channel, ChannelKind, ChannelOptions, MessageEndpoint, PointToPointChannel, create_channel,
};

/// Loopback endpoint: every outbound post comes straight back inbound.
struct LoopbackEndpoint {
    handler: RefCell<Option<Box<dyn Fn(String)>>>,
}

impl MessageEndpoint<String> for LoopbackEndpoint {
    fn post(&self, message: String) {
        info!(msg = %message, "posting to endpoint");
        if let Some(handler) = self.handler.borrow().as_ref() {
            handler(format!("pong:{message}"));
        }
    }

    fn set_inbound_handler(&self, handler: Box<dyn Fn(String)>) {
        *self.handler.borrow_mut() = Some(handler);
    }
}

async fn point_to_point_scenario() {
    info!("--- point-to-point ---");
    let channel = Rc::new(PointToPointChannel::new());

    let consumer = spawn_local({
        let channel = Rc::clone(&channel);
        async move {
            for _ in 0..3 {
                let message: String = channel.recv().await;
                info!(msg = %message, "consumer received");
            }
        }
    });

    for seq in 0..3 {
        channel.send(format!("ping #{seq}"));
    }
    consumer.await.expect("consumer task");
}

async fn broadcast_scenario() {
    info!("--- broadcast ---");
    let channel = create_channel::<String>(ChannelOptions::new(ChannelKind::Broadcast))
        .expect("broadcast channel");

    let subscribers: Vec<_> = (0..3)
        .map(|id| {
            spawn_local({
                let channel = Rc::clone(&channel);
                async move {
                    let message = channel.recv().await;
                    info!(id, msg = %message, "subscriber woke up");
                }
            })
        })
        .collect();

    // Let every subscriber suspend before announcing.
    yield_now().await;
    channel.send("going live".to_string());

    for subscriber in subscribers {
        subscriber.await.expect("subscriber task");
    }
}

async fn bridged_scenario() {
    info!("--- bridged ---");
    let endpoint = Rc::new(LoopbackEndpoint {
        handler: RefCell::new(None),
    });
    let channel = create_channel::<String>(
        ChannelOptions::new(ChannelKind::Bridged)
            .with_endpoint(endpoint as Rc<dyn MessageEndpoint<String>>),
    )
    .expect("bridged channel");

    channel.send("hello".to_string());
    let reply = channel.recv().await;
    info!(msg = %reply, "bridged reply");
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let local = LocalSet::new();
    local
        .run_until(async {
            point_to_point_scenario().await;
            broadcast_scenario().await;
            bridged_scenario().await;
        })
        .await;
}
