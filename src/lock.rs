//! Device lock
//!
//! Keeps the DW3000's own interrupt handler from starting a transaction while
//! another one is in progress. The vendor driver calls this its mutex,
//! although it is not one: it is a plain mask of the interrupt, with the
//! prior state handed back to the caller.
//!
//! The lock is not reentrant. Locking twice without unlocking in between
//! yields a token that says "was masked", so the inner unlock leaves the
//! interrupt masked and only the outer unlock unmasks it.

use core::fmt;

use crate::irq::{InterruptGate, IrqGate};

/// How the device lock keeps the interrupt handler out
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Strategy {
    /// Mask the DW3000's interrupt line at the interrupt controller
    ///
    /// Other interrupts keep running.
    InterruptGate,

    /// Enter a global critical section
    ///
    /// Works without an interrupt line, and with platforms that dispatch the
    /// DW3000 interrupt in a way the gate can't mask. Needs a
    /// `critical-section` implementation to be linked in.
    #[cfg(any(test, feature = "critical-section"))]
    CriticalSection,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::InterruptGate
    }
}

/// The state to restore when unlocking
///
/// Returned by [`DeviceLock::lock`] and passed back, unchanged, to
/// [`DeviceLock::unlock`].
#[derive(Clone, Copy)]
#[must_use = "the token must be passed back to unlock"]
pub struct LockToken(Restore);

#[derive(Clone, Copy)]
enum Restore {
    Gate { was_enabled: bool },
    #[cfg(any(test, feature = "critical-section"))]
    CriticalSection(critical_section::RestoreState),
}

impl LockToken {
    /// Whether the interrupt was unmasked before locking
    ///
    /// Always `false` for a critical-section token.
    pub fn was_enabled(&self) -> bool {
        match self.0 {
            Restore::Gate { was_enabled } => was_enabled,
            #[cfg(any(test, feature = "critical-section"))]
            Restore::CriticalSection(_) => false,
        }
    }
}

impl fmt::Debug for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Restore::Gate { was_enabled } => {
                write!(f, "LockToken {{ was_enabled: {:?} }}", was_enabled)
            }
            #[cfg(any(test, feature = "critical-section"))]
            Restore::CriticalSection(_) => write!(f, "LockToken(CriticalSection)"),
        }
    }
}

/// Serializes access to the DW3000
pub struct DeviceLock {
    strategy: Strategy,
}

impl DeviceLock {
    /// Creates a lock using `strategy`
    pub fn new(strategy: Strategy) -> Self {
        DeviceLock { strategy }
    }

    /// The strategy this lock uses
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Keeps the interrupt handler out until [`unlock`] is called
    ///
    /// [`unlock`]: #method.unlock
    pub fn lock<G>(&mut self, irq: &mut IrqGate<G>) -> LockToken
    where
        G: InterruptGate,
    {
        match self.strategy {
            Strategy::InterruptGate => {
                let was_enabled = irq.is_enabled();
                if was_enabled {
                    irq.disable();
                }
                LockToken(Restore::Gate { was_enabled })
            }
            #[cfg(any(test, feature = "critical-section"))]
            Strategy::CriticalSection => {
                // Safety: The matching `release` happens in `unlock`, with the
                // state returned here. Locks are not nested across strategies,
                // since a lock's strategy never changes.
                let state = unsafe { critical_section::acquire() };
                LockToken(Restore::CriticalSection(state))
            }
        }
    }

    /// Restores the state captured in `token`
    pub fn unlock<G>(&mut self, irq: &mut IrqGate<G>, token: LockToken)
    where
        G: InterruptGate,
    {
        match token.0 {
            Restore::Gate { was_enabled } => {
                if was_enabled {
                    irq.enable();
                }
            }
            #[cfg(any(test, feature = "critical-section"))]
            Restore::CriticalSection(state) => {
                // Safety: `state` comes from the `acquire` in `lock`.
                unsafe { critical_section::release(state) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Event, MockGate, Rig};

    fn gate(rig: &Rig, enabled: bool) -> IrqGate<MockGate> {
        IrqGate::new(Some(rig.gate(enabled, 0)))
    }

    #[test]
    fn lock_masks_and_unlock_restores() {
        let rig = Rig::new();
        let mut irq = gate(&rig, true);
        let mut lock = DeviceLock::new(Strategy::InterruptGate);

        let token = lock.lock(&mut irq);
        assert!(token.was_enabled());
        assert!(!irq.is_enabled());

        lock.unlock(&mut irq, token);
        assert!(irq.is_enabled());
        assert_eq!(rig.events(), [Event::IrqDisable, Event::IrqEnable]);
    }

    #[test]
    fn unlock_leaves_a_masked_interrupt_masked() {
        let rig = Rig::new();
        let mut irq = gate(&rig, false);
        let mut lock = DeviceLock::new(Strategy::InterruptGate);

        let token = lock.lock(&mut irq);
        assert!(!token.was_enabled());
        lock.unlock(&mut irq, token);

        assert!(!irq.is_enabled());
        assert!(rig.events().is_empty());
    }

    #[test]
    fn nested_lock_unmasks_only_at_the_outer_unlock() {
        let rig = Rig::new();
        let mut irq = gate(&rig, true);
        let mut lock = DeviceLock::new(Strategy::InterruptGate);

        let outer = lock.lock(&mut irq);
        let inner = lock.lock(&mut irq);
        lock.unlock(&mut irq, inner);
        assert!(!irq.is_enabled());

        lock.unlock(&mut irq, outer);
        assert!(irq.is_enabled());
    }

    #[test]
    fn gate_strategy_without_a_line() {
        let mut irq: IrqGate<MockGate> = IrqGate::new(None);
        let mut lock = DeviceLock::new(Strategy::default());

        let token = lock.lock(&mut irq);
        assert!(!token.was_enabled());
        lock.unlock(&mut irq, token);
        assert!(!irq.is_enabled());
    }

    #[test]
    fn critical_section_leaves_the_gate_alone() {
        let rig = Rig::new();
        let mut irq = gate(&rig, true);
        let mut lock = DeviceLock::new(Strategy::CriticalSection);

        let token = lock.lock(&mut irq);
        assert!(irq.is_enabled());
        lock.unlock(&mut irq, token);

        assert!(rig.events().is_empty());
    }
}
