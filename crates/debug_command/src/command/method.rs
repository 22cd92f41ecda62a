use std::rc::Rc;

use super::{CommandError, CommandFlags, CommandMeta, HostError};

pub(crate) type MethodAction = Rc<dyn Fn() -> Result<(), HostError>>;

pub struct MethodCommand {
    meta: CommandMeta,
    flags: CommandFlags,
    action: MethodAction,
}

impl MethodCommand {
    pub(crate) fn new(meta: CommandMeta, action: MethodAction) -> Self {
        Self {
            meta,
            flags: CommandFlags::default(),
            action,
        }
    }

    pub fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    /// Runs the action inline. Whatever the host returns comes back unchanged.
    pub fn invoke(&self) -> Result<(), CommandError> {
        (self.action)().map_err(CommandError::Host)
    }

    pub fn is_interactable(&self) -> bool {
        self.flags.is_interactable()
    }

    pub fn set_interactable(&self, value: bool) {
        self.flags.set_interactable(value);
    }

    pub fn is_visible(&self) -> bool {
        self.flags.is_visible()
    }

    pub fn set_visible(&self, value: bool) {
        self.flags.set_visible(value);
    }
}
