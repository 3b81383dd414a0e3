use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify};
use tracing::Instrument;

use crate::error::Result;
use crate::telemetry;

/// Identity of a simulated machine.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MachineId {
    Coordinator,
    /// Worker at this position in the coordinator's roster.
    Worker(usize),
}

impl MachineId {
    /// Machine role, used as a metrics label.
    pub fn role(&self) -> &'static str {
        match self {
            MachineId::Coordinator => "coordinator",
            MachineId::Worker(_) => "worker",
        }
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineId::Coordinator => f.write_str("coordinator"),
            MachineId::Worker(index) => write!(f, "worker-{index}"),
        }
    }
}

/// Token for signaling a machine, or a whole computation, to stop.
#[derive(Clone, Debug)]
pub struct ShutdownToken {
    inner: Arc<ShutdownTokenInner>,
}

#[derive(Debug)]
struct ShutdownTokenInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ShutdownTokenInner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Signal cancellation. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until cancelled.
    pub async fn cancelled(&self) {
        // Register before checking the flag so a concurrent `cancel` between
        // the check and the await is not missed.
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

/// What a message reports about itself to the machine loop.
pub trait Payload {
    /// Short name of the message kind, for logs and events.
    fn kind(&self) -> &'static str;

    /// Simulated wire size in bytes.
    fn payload_size(&self) -> usize;
}

/// A message together with the address replies should go to.
pub struct Envelope<M> {
    pub sender: Option<Address<M>>,
    pub message: M,
}

impl<M: fmt::Debug> fmt::Debug for Envelope<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("sender", &self.sender.as_ref().map(Address::id))
            .field("message", &self.message)
            .finish()
    }
}

/// Handle used to send messages to a machine and to stop it.
pub struct Address<M> {
    id: MachineId,
    mailbox: mpsc::UnboundedSender<Envelope<M>>,
    stop: ShutdownToken,
}

impl<M> Clone for Address<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            mailbox: self.mailbox.clone(),
            stop: self.stop.clone(),
        }
    }
}

impl<M> fmt::Debug for Address<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Address")
            .field("id", &self.id)
            .field("stopped", &self.stop.is_cancelled())
            .finish()
    }
}

impl<M> Address<M> {
    pub fn id(&self) -> MachineId {
        self.id
    }

    /// Enqueue `message` on this machine's mailbox.
    ///
    /// Never blocks. Returns `false` when the machine has already exited and
    /// the message was dropped.
    pub fn send_me(&self, sender: Option<Address<M>>, message: M) -> bool {
        let delivered = self.mailbox.send(Envelope { sender, message }).is_ok();
        if !delivered {
            tracing::trace!(machine = %self.id, "mailbox closed, message dropped");
        }
        delivered
    }

    /// Ask the machine to stop. Idempotent; messages still queued are
    /// discarded.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

/// Create the address and receiving half for a machine that does not exist
/// yet. Lets a handler's completion hook capture its own machine's address.
pub fn mailbox<M>(id: MachineId) -> (Address<M>, Mailbox<M>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let address = Address {
        id,
        mailbox: sender,
        stop: ShutdownToken::new(),
    };
    let mailbox = Mailbox {
        address: address.clone(),
        receiver,
    };
    (address, mailbox)
}

/// Receiving half of a machine's message queue.
pub struct Mailbox<M> {
    address: Address<M>,
    receiver: mpsc::UnboundedReceiver<Envelope<M>>,
}

impl<M> fmt::Debug for Mailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("address", &self.address)
            .finish()
    }
}

impl<M> Mailbox<M> {
    /// Receive the next envelope directly, without a machine loop.
    pub async fn recv(&mut self) -> Option<Envelope<M>> {
        self.receiver.recv().await
    }
}

/// Per-dispatch view of the machine a handler runs on.
pub struct Context<M> {
    myself: Address<M>,
}

impl<M> Context<M> {
    pub fn id(&self) -> MachineId {
        self.myself.id
    }

    pub fn myself(&self) -> &Address<M> {
        &self.myself
    }

    /// Send `message` to `to`, naming this machine as the sender.
    pub fn send(&self, to: &Address<M>, message: M) -> bool {
        to.send_me(Some(self.myself.clone()), message)
    }
}

/// Message handling logic of a machine.
///
/// A machine dispatches one message at a time, so `handle` has exclusive
/// access to the handler state.
#[async_trait]
pub trait Handler: Send + 'static {
    type Message: Payload + Send + 'static;

    async fn handle(
        &mut self,
        ctx: &Context<Self::Message>,
        envelope: Envelope<Self::Message>,
    ) -> Result<()>;
}

/// Counters a machine reports once it has stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineStats {
    pub machine: MachineId,
    /// Messages dispatched successfully.
    pub messages_received: u64,
    /// Sum of [`Payload::payload_size`] over those messages.
    pub payload_bytes: u64,
}

impl MachineStats {
    fn new(machine: MachineId) -> Self {
        Self {
            machine,
            messages_received: 0,
            payload_bytes: 0,
        }
    }
}

/// Cancels the computation if the machine loop unwinds.
struct AbortOnUnwind {
    abort: ShutdownToken,
    armed: bool,
}

impl Drop for AbortOnUnwind {
    fn drop(&mut self) {
        if self.armed {
            self.abort.cancel();
        }
    }
}

/// A simulated machine: one mailbox, one handler, one task.
pub struct Machine<H: Handler> {
    handler: H,
    context: Context<H::Message>,
    receiver: mpsc::UnboundedReceiver<Envelope<H::Message>>,
    abort: ShutdownToken,
}

impl<H: Handler> fmt::Debug for Machine<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("id", &self.context.id())
            .field("handler", &std::any::type_name::<H>())
            .field("aborted", &self.abort.is_cancelled())
            .finish()
    }
}

impl<H: Handler> Machine<H> {
    /// Build a machine with a fresh mailbox.
    ///
    /// `abort` is shared by every machine of one computation: a handler error
    /// on any of them cancels it and all machines stop.
    pub fn new(id: MachineId, handler: H, abort: ShutdownToken) -> Self {
        let (_, mailbox) = mailbox(id);
        Self::with_mailbox(mailbox, handler, abort)
    }

    /// Build a machine around a mailbox created with [`mailbox`].
    pub fn with_mailbox(mailbox: Mailbox<H::Message>, handler: H, abort: ShutdownToken) -> Self {
        Self {
            handler,
            context: Context {
                myself: mailbox.address,
            },
            receiver: mailbox.receiver,
            abort,
        }
    }

    pub fn id(&self) -> MachineId {
        self.context.id()
    }

    pub fn address(&self) -> Address<H::Message> {
        self.context.myself.clone()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Dispatch messages until stopped or aborted.
    ///
    /// Stop and abort are checked before every dispatch, so nothing queued
    /// after either is handled. A handler error cancels the abort token and
    /// is returned.
    pub async fn run(mut self) -> Result<MachineStats> {
        let id = self.context.id();
        let span = telemetry::machine_span(id);

        async move {
            let mut guard = AbortOnUnwind {
                abort: self.abort.clone(),
                armed: true,
            };
            let stop = self.context.myself.stop.clone();
            let mut stats = MachineStats::new(id);
            tracing::debug!("machine started");

            loop {
                let envelope = tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = self.abort.cancelled() => {
                        tracing::debug!("computation aborted");
                        break;
                    }
                    next = self.receiver.recv() => match next {
                        Some(envelope) => envelope,
                        None => break,
                    },
                };

                let kind = envelope.message.kind();
                let size = envelope.message.payload_size();
                if let Err(err) = self.handler.handle(&self.context, envelope).await {
                    tracing::error!(kind, error = %err, "handler failed, aborting computation");
                    self.abort.cancel();
                    guard.armed = false;
                    return Err(err);
                }
                stats.messages_received += 1;
                stats.payload_bytes += size as u64;
            }

            self.receiver.close();
            guard.armed = false;
            telemetry::record_machine_stopped(&stats);
            Ok(stats)
        }
        .instrument(span)
        .await
    }
}
