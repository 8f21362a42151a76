//! The methods view of a [`Proxy`] (§4.F): call a method at a fixed
//! interface, blocking or getting a [`PendingCall`] back for the caller
//! to drive itself.

use crate::arg::{Arg, ReadArg};
use crate::error::Result;
use crate::message::{Message, MessageBuilder};
use crate::names::{InterfaceName, MemberName, OwnedInterfaceName};
use crate::pending_call::PendingCall;

use super::Proxy;

/// A view over one interface's methods on the object a [`Proxy`] points
/// at. Borrowed from the proxy rather than owned, so it's cheap to
/// re-derive per call site (`proxy.methods(iface).call(...)`).
pub struct Methods<'p> {
    proxy: &'p Proxy,
    interface: OwnedInterfaceName,
}

impl<'p> Methods<'p> {
    pub(crate) fn new(proxy: &'p Proxy, interface: OwnedInterfaceName) -> Self {
        Self { proxy, interface }
    }

    pub fn interface(&self) -> &InterfaceName {
        self.interface.as_borrowed()
    }

    /// A method-call builder pre-addressed at this interface/path/
    /// destination, left open for [`MessageBuilder::arg`] to be chained
    /// as many times as the method takes arguments (a call's body is a
    /// flat sequence of top-level values, not a single struct-typed
    /// field, so multi-argument calls append one at a time rather than
    /// passing a tuple to [`Self::call`]).
    pub fn message(&self, member: &MemberName) -> MessageBuilder {
        Message::method_call(self.proxy.path(), member)
            .interface(self.interface.as_borrowed())
            .destination(self.proxy.destination())
    }

    /// Call `member`, blocking until the reply arrives or the proxy's
    /// timeout elapses (§4.F "blocking ... form").
    ///
    /// `Args` is a single value — pass `()` for a call with no arguments,
    /// or use [`Self::message`] directly for more than one. `Ret` is read
    /// the same way on the way back: `()` for an empty-result return, the
    /// single result type otherwise.
    pub fn call<Args, Ret>(&self, member: &MemberName, args: Args) -> Result<Ret>
    where
        Args: Arg,
        Ret: for<'de> ReadArg<'de>,
    {
        let message = self.message(member).arg(&args).build(0)?;
        self.call_built(message)
    }

    /// Send an already-built method-call message and block for its reply,
    /// the counterpart to [`Self::message`] for calls with more than one
    /// argument.
    pub fn call_built<Ret>(&self, message: Message) -> Result<Ret>
    where
        Ret: for<'de> ReadArg<'de>,
    {
        let reply = self
            .proxy
            .connection()
            .send_with_reply_blocking(message, self.proxy.timeout())?;
        reply.read()
    }

    /// Call `member` without waiting for the reply, returning a
    /// [`PendingCall`] the caller polls, registers a callback on via
    /// [`PendingCall::on_ready`], or cancels itself (§4.F "callback, or
    /// cooperative-async form" — both build on this same non-blocking
    /// handle, a callback by registering one and a cooperative-async form
    /// by polling `is_ready`/`try_take` from a task's own loop).
    pub fn call_async<Args>(&self, member: &MemberName, args: Args) -> Result<PendingCall>
    where
        Args: Arg,
    {
        let message = self.message(member).arg(&args).build(0)?;
        self.proxy
            .connection()
            .send_with_reply(message, self.proxy.timeout())
    }

    /// Call `member` and don't wait for a reply at all, setting the
    /// `NO_REPLY_EXPECTED` flag so the destination doesn't bother sending
    /// one.
    pub fn call_no_reply<Args: Arg>(&self, member: &MemberName, args: Args) -> Result<()> {
        let message = self.message(member).no_reply_expected().arg(&args).build(0)?;
        self.proxy.connection().send(message)?;
        Ok(())
    }
}
