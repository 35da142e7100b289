//! Per-channel interrupt line with a scoped mask guard.
//!
//! State shared between a completion handler and the main loop lives inside
//! an `IrqLine`. The handler reaches it only through `enter_handler`, the main
//! loop only through `mask`; while a mask guard is alive the handler cannot
//! run, and an interrupt raised meanwhile stays pending until the guard drops.

use std::ops::{Deref, DerefMut};

use parking_lot::{Mutex, MutexGuard};

/// Interrupt-protected state for one hardware channel
#[derive(Debug, Default)]
pub struct IrqLine<T> {
    state: Mutex<T>,
}

impl<T> IrqLine<T> {
    pub fn new(state: T) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Mask this line's interrupt until the returned guard drops
    pub fn mask(&self) -> IrqGuard<'_, T> {
        IrqGuard {
            state: self.state.lock(),
        }
    }

    /// Run as the completion handler; waits while the line is masked
    pub fn enter_handler(&self) -> IrqGuard<'_, T> {
        IrqGuard {
            state: self.state.lock(),
        }
    }
}

/// Scoped critical section over one interrupt source.
///
/// Unmasks on every exit path, early returns included.
pub struct IrqGuard<'a, T> {
    state: MutexGuard<'a, T>,
}

impl<T> Deref for IrqGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.state
    }
}

impl<T> DerefMut for IrqGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_handler_waits_for_unmask() {
        let line = Arc::new(IrqLine::new(0u32));
        let handler_ran = Arc::new(AtomicBool::new(false));

        let guard = line.mask();

        let handler = {
            let line = Arc::clone(&line);
            let handler_ran = Arc::clone(&handler_ran);
            thread::spawn(move || {
                *line.enter_handler() += 1;
                handler_ran.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!handler_ran.load(Ordering::SeqCst));
        assert_eq!(*guard, 0);

        drop(guard);
        handler.join().unwrap();
        assert_eq!(*line.mask(), 1);
    }

    #[test]
    fn test_early_return_unmasks() {
        fn bail_early(line: &IrqLine<bool>) -> Option<()> {
            let state = line.mask();
            if !*state {
                return None;
            }
            Some(())
        }

        let line = IrqLine::new(false);
        assert!(bail_early(&line).is_none());

        // Would deadlock if the guard leaked
        *line.enter_handler() = true;
        assert!(bail_early(&line).is_some());
    }
}
