use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

use super::{CommandError, CommandFlags, CommandMeta, HostError};
use crate::runner::{CompletionCallback, CoroutineBody, MethodHandle, TaskRunner};

pub(crate) type CoroutineFactory = Rc<dyn Fn() -> Result<CoroutineBody, HostError>>;
pub(crate) type HandleFactory = Rc<dyn Fn() -> Result<MethodHandle, HostError>>;

/// Gate for asynchronous commands: `Pending` from invocation until the completion callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AsyncState {
    #[default]
    Idle,
    Pending,
}

struct AsyncGate {
    flags: CommandFlags,
    state: Rc<Cell<AsyncState>>,
}

impl AsyncGate {
    fn new() -> Self {
        Self {
            flags: CommandFlags::default(),
            state: Rc::new(Cell::new(AsyncState::Idle)),
        }
    }

    fn is_interactable(&self) -> bool {
        self.flags.is_interactable() && self.state.get() == AsyncState::Idle
    }

    fn enter(&self, meta: &CommandMeta) -> Result<(), CommandError> {
        if !self.is_interactable() {
            return Err(CommandError::NotInteractable {
                display_name: meta.display_name.clone(),
            });
        }
        self.state.set(AsyncState::Pending);
        Ok(())
    }

    fn reset(&self) {
        self.state.set(AsyncState::Idle);
    }

    /// Completion hook: reopen the gate, then hand over to the caller's callback.
    fn completion(&self, label: String, on_complete: Option<CompletionCallback>) -> CompletionCallback {
        let state = self.state.clone();
        Box::new(move || {
            state.set(AsyncState::Idle);
            debug!(command = %label, "async command completed");
            if let Some(on_complete) = on_complete {
                on_complete();
            }
        })
    }
}

pub struct CoroutineCommand {
    meta: CommandMeta,
    gate: AsyncGate,
    factory: CoroutineFactory,
}

impl CoroutineCommand {
    pub(crate) fn new(meta: CommandMeta, factory: CoroutineFactory) -> Self {
        Self {
            meta,
            gate: AsyncGate::new(),
            factory,
        }
    }

    pub fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    pub fn state(&self) -> AsyncState {
        self.gate.state.get()
    }

    /// Starts the coroutine on `runner`. Returns immediately; `on_complete` runs on a later tick.
    pub fn invoke(
        &self,
        runner: &mut TaskRunner,
        on_complete: Option<CompletionCallback>,
    ) -> Result<(), CommandError> {
        self.gate.enter(&self.meta)?;
        let body = match (self.factory)() {
            Ok(body) => body,
            Err(error) => {
                self.gate.reset();
                return Err(CommandError::Host(error));
            }
        };
        let label = self.meta.display_name.clone();
        let completion = self.gate.completion(label.clone(), on_complete);
        runner.run(label, body, Some(completion));
        Ok(())
    }

    pub fn is_interactable(&self) -> bool {
        self.gate.is_interactable()
    }

    pub fn set_interactable(&self, value: bool) {
        self.gate.flags.set_interactable(value);
    }

    pub fn is_visible(&self) -> bool {
        self.gate.flags.is_visible()
    }

    pub fn set_visible(&self, value: bool) {
        self.gate.flags.set_visible(value);
    }
}

pub struct HandleMethodCommand {
    meta: CommandMeta,
    gate: AsyncGate,
    factory: HandleFactory,
}

impl HandleMethodCommand {
    pub(crate) fn new(meta: CommandMeta, factory: HandleFactory) -> Self {
        Self {
            meta,
            gate: AsyncGate::new(),
            factory,
        }
    }

    pub fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    pub fn state(&self) -> AsyncState {
        self.gate.state.get()
    }

    /// Calls the host method and polls the handle it returns once per tick.
    pub fn invoke(
        &self,
        runner: &mut TaskRunner,
        on_complete: Option<CompletionCallback>,
    ) -> Result<(), CommandError> {
        self.gate.enter(&self.meta)?;
        let handle = match (self.factory)() {
            Ok(handle) => handle,
            Err(error) => {
                self.gate.reset();
                return Err(CommandError::Host(error));
            }
        };
        let label = self.meta.display_name.clone();
        let completion = self.gate.completion(label.clone(), on_complete);
        runner.watch(label, handle, Some(completion));
        Ok(())
    }

    pub fn is_interactable(&self) -> bool {
        self.gate.is_interactable()
    }

    pub fn set_interactable(&self, value: bool) {
        self.gate.flags.set_interactable(value);
    }

    pub fn is_visible(&self) -> bool {
        self.gate.flags.is_visible()
    }

    pub fn set_visible(&self, value: bool) {
        self.gate.flags.set_visible(value);
    }
}
