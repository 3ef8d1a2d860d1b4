use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Mutex};

use crate::core::{Command, Frame};
use crate::station::StationHandle;

/// A registered command callback.
///
/// Each handler sits behind its own lock so that dispatch can let go of the
/// registry before running user code; a slow handler never blocks other
/// threads from registering, and a handler is free to send from inside its
/// own invocation.
pub(crate) type Handler = Arc<Mutex<dyn FnMut(&StationHandle, &Frame<'_>) + Send>>;

/// Ordered collection of command registrations.
///
/// Identifiers need not be unique: every matching registration fires, in the
/// order the registrations were made. [`Command::CATCH_ALL`] matches any
/// inbound command.
pub(crate) struct CommandRegistry {
    entries: Vec<(Command, Handler)>,
}

impl CommandRegistry {
    pub(crate) fn new() -> Self {
        CommandRegistry { entries: Vec::new() }
    }

    /// Appends a registration at the end of the dispatch order.
    pub(crate) fn register(&mut self, command: Command, handler: Handler) {
        self.entries.push((command, handler));
    }

    /// Removes the first registration for `command`, if any.
    pub(crate) fn unregister(&mut self, command: Command) {
        if let Some(index) = self.entries.iter().position(|(id, _)| *id == command) {
            let _ = self.entries.remove(index);
        }
    }

    /// Clones out the handlers that should fire for `command`, in order.
    pub(crate) fn matching(&self, command: Command) -> Vec<Handler> {
        self.entries
            .iter()
            .filter(|(id, _)| *id == command || *id == Command::CATCH_ALL)
            .map(|(_, handler)| Arc::clone(handler))
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Debug for CommandRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let commands: Vec<Command> = self.entries.iter().map(|(id, _)| *id).collect();
        f.debug_struct("CommandRegistry").field("commands", &commands).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Handler {
        fn ignore(_: &StationHandle, _: &Frame<'_>) {}
        Arc::new(Mutex::new(ignore))
    }

    #[test]
    fn matching_preserves_registration_order() {
        let mut registry = CommandRegistry::new();
        let first = noop();
        let second = noop();
        let catch_all = noop();

        registry.register(Command(b'X'), Arc::clone(&first));
        registry.register(Command::CATCH_ALL, Arc::clone(&catch_all));
        registry.register(Command(b'X'), Arc::clone(&second));

        let matched = registry.matching(Command(b'X'));
        assert_eq!(3, matched.len());
        assert!(Arc::ptr_eq(&first, &matched[0]));
        assert!(Arc::ptr_eq(&catch_all, &matched[1]));
        assert!(Arc::ptr_eq(&second, &matched[2]));

        let matched = registry.matching(Command(b'Y'));
        assert_eq!(1, matched.len());
        assert!(Arc::ptr_eq(&catch_all, &matched[0]));
    }

    #[test]
    fn unregister_removes_first_match_only() {
        let mut registry = CommandRegistry::new();
        let first = noop();
        let second = noop();

        registry.register(Command(b'X'), Arc::clone(&first));
        registry.register(Command(b'X'), Arc::clone(&second));
        registry.unregister(Command(b'X'));

        let matched = registry.matching(Command(b'X'));
        assert_eq!(1, matched.len());
        assert!(Arc::ptr_eq(&second, &matched[0]));
    }

    #[test]
    fn unregister_missing_command_is_a_no_op() {
        let mut registry = CommandRegistry::new();
        registry.register(Command(b'X'), noop());
        registry.unregister(Command(b'Y'));
        assert_eq!(1, registry.matching(Command(b'X')).len());
    }
}
