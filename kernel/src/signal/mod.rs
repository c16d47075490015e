//! Signal dispositions and delivery policy.
//!
//! A process holds at most one pending signal; delivery happens on the
//! target's own thread at its next kernel crossing. In the hosted model a
//! fault is an unexpected panic escaping user code; the panic payload is
//! classified into the matching signal before delivery.

use std::any::Any;

use common::Signal;
use common::SignalHandlerFn;
use common::limits::EXCEPTION_STATUS;

/// What happens when a signal is delivered.
#[derive(Clone, Copy)]
pub enum SignalDisposition {
    Default,
    Handler(SignalHandlerFn),
}

/// Payload carried by a halting process thread. Caught at the thread
/// trampoline; anything else unwinding out of user code is a fault.
pub struct ProcessExit {
    pub status: u8,
}

/// Whether the default action for `signal` terminates the process.
pub fn default_kills(signal: Signal) -> bool {
    match signal {
        Signal::DivZero | Signal::Segfault | Signal::Interrupt => true,
        Signal::Alarm | Signal::User1 => false,
    }
}

/// Halt status used when the default action terminates the process.
pub fn fatal_status(signal: Signal) -> u8 {
    match signal {
        Signal::DivZero | Signal::Segfault => EXCEPTION_STATUS,
        _ => 0,
    }
}

/// Map a foreign panic payload to the signal describing the fault.
pub fn classify_fault(payload: &(dyn Any + Send)) -> Signal {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("");
    if message.contains("divide by zero") {
        Signal::DivZero
    } else {
        Signal::Segfault
    }
}
