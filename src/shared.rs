//! Cross-context access to a [`Node`].
//!
//! The session engine owns the outbound queue and drains it when an assigned
//! data slot arrives, but applications often produce data from another
//! context - a sensor timer interrupt, a second task. The helpers here wrap
//! a `Node` in a `critical_section::Mutex<RefCell<...>>` global so that
//! enqueueing and engine access never overlap, which is the only
//! synchronization the protocol state needs.
//!
//! # Example
//! ```rust,ignore
//! use critical_section::Mutex;
//! use core::cell::RefCell;
//! use dqn915::node::Node;
//! use dqn915::shared::{global_node_init, global_node_setup, shared_enqueue};
//!
//! static NODE: Mutex<RefCell<Option<Node<MyRadio, MyClock, MyDelay, MyBloom, MyApp>>>> =
//!     global_node_init();
//!
//! fn main() {
//!     global_node_setup(&NODE, node);
//! }
//!
//! fn sensor_isr() {
//!     let _ = shared_enqueue(&NODE, &reading_bytes());
//! }
//! ```

use crate::admission::AdmissionSet;
use crate::node::{Node, NodeHandler, QueueError};
use crate::radio::{Clock, Radio};
use core::cell::RefCell;
use critical_section::Mutex;
use embedded_hal::delay::DelayNs;

/// Initializes the global static holder for a shared [`Node`].
pub const fn global_node_init<R, C, D, A, H>() -> Mutex<RefCell<Option<Node<R, C, D, A, H>>>>
where
    R: Radio,
    C: Clock,
    D: DelayNs,
    A: AdmissionSet,
    H: NodeHandler,
{
    Mutex::new(RefCell::new(None))
}

/// Places a constructed [`Node`] into the shared holder.
pub fn global_node_setup<R, C, D, A, H>(
    global: &'static Mutex<RefCell<Option<Node<R, C, D, A, H>>>>,
    node: Node<R, C, D, A, H>,
) where
    R: Radio,
    C: Clock,
    D: DelayNs,
    A: AdmissionSet,
    H: NodeHandler,
{
    critical_section::with(|cs| {
        *global.borrow_ref_mut(cs) = Some(node);
    });
}

/// Runs `f` against the shared [`Node`] inside a critical section.
///
/// Returns `None` when the holder has not been set up yet.
pub fn with_node<R, C, D, A, H, F, T>(
    global: &'static Mutex<RefCell<Option<Node<R, C, D, A, H>>>>,
    f: F,
) -> Option<T>
where
    R: Radio,
    C: Clock,
    D: DelayNs,
    A: AdmissionSet,
    H: NodeHandler,
    F: FnOnce(&mut Node<R, C, D, A, H>) -> T,
{
    critical_section::with(|cs| global.borrow_ref_mut(cs).as_mut().map(f))
}

/// Queues a chunk on the shared [`Node`] from any context.
///
/// Safe to call from an ISR; the capacity conditions of
/// [`Node::add_data_to_send`] are passed through.
pub fn shared_enqueue<R, C, D, A, H>(
    global: &'static Mutex<RefCell<Option<Node<R, C, D, A, H>>>>,
    data: &[u8],
) -> Result<(), QueueError>
where
    R: Radio,
    C: Clock,
    D: DelayNs,
    A: AdmissionSet,
    H: NodeHandler,
{
    with_node(global, |node| node.add_data_to_send(data)).unwrap_or(Err(QueueError::Uninitialized))
}
