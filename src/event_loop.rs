use crate::scheduler::Scheduler;
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

type Binding = Box<dyn FnMut(&Scheduler)>;

#[derive(Default)]
struct Bindings {
    list: Vec<Binding>,
    polling: bool,
    cleared_while_polling: bool,
}

/// Ordered list of callbacks run once per poll, usually once per tick.
///
/// Handles are cheap clones of the same list. Bindings may schedule or
/// cancel commands, and may bind further callbacks; those run from the next
/// poll on. Panics raised by a binding propagate out of [`EventLoop::poll`].
#[derive(Clone, Default)]
pub struct EventLoop {
    bindings: Rc<RefCell<Bindings>>,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, binding: impl FnMut(&Scheduler) + 'static) {
        self.bindings.borrow_mut().list.push(Box::new(binding));
    }

    pub fn poll(&self, scheduler: &Scheduler) {
        let mut running = {
            let mut bindings = self.bindings.borrow_mut();
            bindings.polling = true;
            core::mem::take(&mut bindings.list)
        };

        for binding in &mut running {
            binding(scheduler);
        }

        let mut bindings = self.bindings.borrow_mut();
        let added = core::mem::take(&mut bindings.list);
        if !bindings.cleared_while_polling {
            bindings.list = running;
        }
        bindings.list.extend(added);
        bindings.polling = false;
        bindings.cleared_while_polling = false;
    }

    pub fn clear(&self) {
        let mut bindings = self.bindings.borrow_mut();
        bindings.list.clear();
        if bindings.polling {
            bindings.cleared_while_polling = true;
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.borrow().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop").field("bindings", &self.len()).finish()
    }
}
