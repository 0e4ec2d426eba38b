// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Callback dispatch (C9): per-packet-type and capability-event callback
//! lists, invoked synchronously from the inbound pump. A callback that
//! panics or returns an error is caught, logged, and does not prevent
//! later callbacks on the same packet from running.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::message::{Message, PacketType};

pub type MessageCallback = Arc<dyn Fn(&Message) + Send + Sync>;
pub type EventCallback = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// Registry of callbacks keyed by packet type, plus a side channel for
/// capability-backed events that do not arrive as catalogued messages.
#[derive(Default)]
pub struct Dispatcher {
    by_type: RwLock<Vec<(PacketType, Vec<MessageCallback>)>>,
    events: RwLock<Vec<(String, Vec<EventCallback>)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for `packet_type`. Callbacks for the same type
    /// run in registration order.
    pub fn on_message(&self, packet_type: PacketType, callback: MessageCallback) {
        let mut by_type = self.by_type.write();
        if let Some((_, callbacks)) = by_type.iter_mut().find(|(pt, _)| *pt == packet_type) {
            callbacks.push(callback);
        } else {
            by_type.push((packet_type, vec![callback]));
        }
    }

    pub fn on_event(&self, name: impl Into<String>, callback: EventCallback) {
        let name = name.into();
        let mut events = self.events.write();
        if let Some((_, callbacks)) = events.iter_mut().find(|(n, _)| *n == name) {
            callbacks.push(callback);
        } else {
            events.push((name, vec![callback]));
        }
    }

    /// Invoke every callback registered for this message's packet type.
    /// Called synchronously from the circuit's inbound pump; dispatch for
    /// one datagram always completes before the next is processed.
    pub fn dispatch_message(&self, message: &Message) {
        let packet_type = message.packet_type();
        let callbacks = {
            let by_type = self.by_type.read();
            by_type
                .iter()
                .find(|(pt, _)| *pt == packet_type)
                .map(|(_, callbacks)| callbacks.clone())
                .unwrap_or_default()
        };
        for callback in callbacks {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(message))) {
                log::error!(
                    "callback for {packet_type:?} panicked: {}",
                    panic_message(&payload)
                );
            }
        }
    }

    pub fn dispatch_event(&self, name: &str, payload: &[u8]) {
        let callbacks = {
            let events = self.events.read();
            events
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, callbacks)| callbacks.clone())
                .unwrap_or_default()
        };
        for callback in callbacks {
            if let Err(payload_panic) = panic::catch_unwind(AssertUnwindSafe(|| callback(name, payload))) {
                log::error!("event callback for {name} panicked: {}", panic_message(&payload_panic));
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::types::{CompletePingCheck, CompletePingCheckBlock};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn callbacks_run_in_registration_order() {
        let dispatcher = Dispatcher::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let order_a = order.clone();
        let order_b = order.clone();
        dispatcher.on_message(
            PacketType::CompletePingCheck,
            Arc::new(move |_| order_a.lock().push(1)),
        );
        dispatcher.on_message(
            PacketType::CompletePingCheck,
            Arc::new(move |_| order_b.lock().push(2)),
        );
        let message = Message::CompletePingCheck(CompletePingCheck {
            ping_id: CompletePingCheckBlock { ping_id: 0 },
        });
        dispatcher.dispatch_message(&message);
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn a_panicking_callback_does_not_block_the_next() {
        let dispatcher = Dispatcher::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        dispatcher.on_message(PacketType::CompletePingCheck, Arc::new(|_| panic!("boom")));
        dispatcher.on_message(
            PacketType::CompletePingCheck,
            Arc::new(move |_| {
                ran_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let message = Message::CompletePingCheck(CompletePingCheck {
            ping_id: CompletePingCheckBlock { ping_id: 0 },
        });
        dispatcher.dispatch_message(&message);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
