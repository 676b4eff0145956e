use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, error, trace};

/// Anything that can be shown as a page.
pub trait Component {
    fn name(&self) -> &str;

    /// Dialogs are drawn on top of the page below them.
    fn is_dialog(&self) -> bool {
        false
    }
}

/// Gets notified about stack changes.
pub trait StackListener<C> {
    fn stack_pushed(&mut self, c: &C);
    fn stack_popped(&mut self, old: &C, top: Option<&C>);
    fn stack_top(&mut self, top: Option<&C>);
}

pub type Listener<C> = Rc<RefCell<dyn StackListener<C>>>;

/// Navigation stack. The bottom component is the root and is only removed by `clear`.
pub struct Stack<C> {
    components: Vec<C>,
    listeners: Vec<Listener<C>>,
}

impl<C: Component> Default for Stack<C> {
    fn default() -> Self {
        Self {
            components: Vec::new(),
            listeners: Vec::new(),
        }
    }
}

impl<C: Component> Stack<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, l: Listener<C>) {
        self.listeners.push(l);
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn is_last(&self) -> bool {
        self.components.len() == 1
    }

    pub fn top(&self) -> Option<&C> {
        self.components.last()
    }

    /// Components from bottom to top.
    pub fn peek(&self) -> &[C] {
        &self.components
    }

    pub fn push(&mut self, c: C) {
        trace!("Stack push {}", c.name());
        self.components.push(c);
        if let Some(top) = self.components.last() {
            for l in &self.listeners {
                l.borrow_mut().stack_pushed(top);
            }
        }
    }

    /// Pops the top component unless it is the root.
    pub fn pop(&mut self) -> Option<C> {
        if self.components.len() <= 1 {
            return None;
        }
        let old = self.components.pop()?;
        trace!("Stack pop {}", old.name());
        self.notify_popped(&old);
        Some(old)
    }

    pub fn clear(&mut self) {
        while let Some(old) = self.components.pop() {
            self.notify_popped(&old);
        }
    }

    fn notify_popped(&self, old: &C) {
        let top = self.components.last();
        for l in &self.listeners {
            let mut l = l.borrow_mut();
            l.stack_popped(old, top);
            l.stack_top(top);
        }
    }
}

/// Display side of the navigation stack: page ids in stack order and the front page.
#[derive(Debug, Default)]
pub struct PageRegistry {
    pages: Vec<String>,
    front: Option<String>,
    seq: usize,
}

impl PageRegistry {
    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn front(&self) -> Option<&str> {
        self.front.as_deref()
    }

    fn page_id(&mut self, c: &impl Component) -> String {
        if c.name().is_empty() {
            error!("Component has no name");
        }
        self.seq += 1;
        format!("{}-{}", c.name(), self.seq)
    }
}

impl<C: Component> StackListener<C> for PageRegistry {
    fn stack_pushed(&mut self, c: &C) {
        let id = self.page_id(c);
        self.pages.push(id.clone());
        self.front = Some(id);
    }

    fn stack_popped(&mut self, old: &C, _top: Option<&C>) {
        match self.pages.pop() {
            Some(id) if id.starts_with(old.name()) => {}
            Some(id) => error!("Popped page {id} does not belong to {}", old.name()),
            None => error!("No page left for {}", old.name()),
        }
    }

    fn stack_top(&mut self, top: Option<&C>) {
        self.front = top.and(self.pages.last().cloned());
    }
}

/// A navigation stack wired to its page registry.
pub struct Pages<C> {
    stack: Stack<C>,
    registry: Rc<RefCell<PageRegistry>>,
}

impl<C: Component> Default for Pages<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Component> Pages<C> {
    pub fn new() -> Self {
        let registry = Rc::new(RefCell::new(PageRegistry::default()));
        let mut stack = Stack::new();
        stack.add_listener(registry.clone());
        Self { stack, registry }
    }

    pub fn stack(&self) -> &Stack<C> {
        &self.stack
    }

    pub fn add_listener(&mut self, l: Listener<C>) {
        self.stack.add_listener(l);
    }

    pub fn push(&mut self, c: C) {
        self.stack.push(c);
    }

    pub fn pop(&mut self) -> Option<C> {
        self.stack.pop()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    pub fn current(&self) -> Option<&C> {
        self.stack.top()
    }

    /// The page below the top dialog, or the top page itself.
    pub fn base(&self) -> Option<&C> {
        self.stack.peek().iter().rev().find(|c| !c.is_dialog())
    }

    pub fn is_top_dialog(&self) -> bool {
        self.current().is_some_and(|c| c.is_dialog())
    }

    pub fn front_page(&self) -> Option<String> {
        self.registry.borrow().front().map(str::to_string)
    }

    pub fn page_ids(&self) -> Vec<String> {
        self.registry.borrow().pages().to_vec()
    }

    pub fn dump(&self) {
        debug!("Dumping pages");
        for (i, (c, id)) in self.stack.peek().iter().zip(self.page_ids()).enumerate() {
            debug!("{i} -- {id} -- {}", c.name());
        }
    }
}
