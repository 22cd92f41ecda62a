use std::any::{self, Any};
use std::cell::Cell;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::command::{Command, CommandError};
use crate::definition::{short_type_name, CategoryType, CommandDefinition, DebugCategory};
use crate::model::{CommandModel, PropertySnapshot};
use crate::prefs::{PrefsError, PrefsHandle};
use crate::registry::{CommandRegistry, DefinitionId};
use crate::runner::{CompletionCallback, TaskFailure, TaskRunner};
use crate::view_state::{FloatingGroupFilter, LastCategory};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no command '{display_name}' in category '{category}'")]
    UnknownCommand {
        category: String,
        display_name: String,
    },
    #[error("command '{display_name}' is a property and cannot be invoked")]
    NotInvocable { display_name: String },
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// What one frame produced.
#[derive(Debug, Default)]
pub struct TickReport {
    pub failures: Vec<TaskFailure>,
    /// Set on frames where the auto-refresh timer fired.
    pub refreshed: Option<Vec<PropertySnapshot>>,
}

/// One debug session: registry, model, scheduler, prefs and view state.
///
/// Every registry change is followed by the model's rebuild inside the same call,
/// so callers never observe a half-built category map.
#[derive(Debug)]
pub struct DebugSession {
    registry: CommandRegistry,
    model: CommandModel,
    runner: TaskRunner,
    prefs: PrefsHandle,
    group_filter: FloatingGroupFilter,
    last_category: LastCategory,
    refresh_due: Rc<Cell<bool>>,
}

impl DebugSession {
    pub fn new(prefs: PrefsHandle) -> Self {
        let mut session = Self {
            registry: CommandRegistry::new(),
            model: CommandModel::new(prefs.clone()),
            runner: TaskRunner::new(),
            group_filter: FloatingGroupFilter::load(prefs.clone()),
            last_category: LastCategory::new(prefs.clone()),
            prefs,
            refresh_due: Rc::new(Cell::new(false)),
        };
        session.attach();
        session
    }

    pub fn in_memory() -> Self {
        Self::new(PrefsHandle::in_memory())
    }

    // Hooks the refresh flag into the model and resumes a saved auto-refresh toggle.
    fn attach(&mut self) {
        let due = self.refresh_due.clone();
        self.model.on_auto_refresh(move || due.set(true));
        if self.model.is_auto_refresh() {
            self.model.update_auto_refresh(true, false, &mut self.runner);
        }
    }

    pub fn prefs(&self) -> &PrefsHandle {
        &self.prefs
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn model(&self) -> &CommandModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut CommandModel {
        &mut self.model
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    pub fn group_filter(&self) -> &FloatingGroupFilter {
        &self.group_filter
    }

    pub fn group_filter_mut(&mut self) -> &mut FloatingGroupFilter {
        &mut self.group_filter
    }

    pub fn add_category<T: DebugCategory + Default>(
        &mut self,
        name: &str,
        order: i32,
        display_name: &str,
    ) -> String {
        self.add_category_type(CategoryType::of::<T>(), name, order, display_name)
    }

    pub fn add_category_type(
        &mut self,
        category_type: CategoryType,
        name: &str,
        order: i32,
        display_name: &str,
    ) -> String {
        let name = self
            .registry
            .add_category_type(category_type, name, order, display_name);
        self.model.on_add_category(&mut self.registry);
        name
    }

    pub fn add_command(&mut self, definition: CommandDefinition) -> DefinitionId {
        let id = self.registry.add_command(definition);
        self.model.on_add_category(&mut self.registry);
        id
    }

    pub fn remove_command(&mut self, id: DefinitionId) -> bool {
        if !self.registry.remove_command(id) {
            return false;
        }
        self.model.on_add_category(&mut self.registry);
        true
    }

    /// Instance behind a declared category. An empty name means the type's short name.
    pub fn category_instance<T: Any>(&self, category_name: &str) -> Option<Rc<T>> {
        let name = if category_name.is_empty() {
            short_type_name(any::type_name::<T>())
        } else {
            category_name
        };
        self.model.instance_as::<T>(name)
    }

    pub fn refresh_category_first(&mut self) {
        self.model.refresh_category_first(&mut self.registry);
    }

    pub fn refresh_property(&self) -> Vec<PropertySnapshot> {
        self.model.refresh_properties()
    }

    pub fn find_command(&self, category: &str, display_name: &str) -> Option<Rc<Command>> {
        self.model.find_command(category, display_name)
    }

    pub fn set_interactable(&mut self, category: &str, tag: &str, is_interactable: bool) {
        self.model.set_interactable(category, tag, is_interactable);
    }

    pub fn is_interactable(&self, category: &str, tag: &str) -> bool {
        self.model.is_interactable(category, tag)
    }

    pub fn set_visible(&mut self, category: &str, tag: &str, is_visible: bool) {
        self.model.set_visible(category, tag, is_visible);
    }

    pub fn is_visible(&self, category: &str, tag: &str) -> bool {
        self.model.is_visible(category, tag)
    }

    pub fn is_auto_refresh(&self) -> bool {
        self.model.is_auto_refresh()
    }

    pub fn update_auto_refresh(&mut self, is_auto_refresh: bool, is_floating_window: bool) {
        self.model
            .update_auto_refresh(is_auto_refresh, is_floating_window, &mut self.runner);
    }

    pub fn delete_all_saved_properties(&self) -> usize {
        CommandRegistry::delete_all_saved_properties(&self.prefs)
    }

    pub fn delete_all_properties_in_category(&self, category_name: &str) -> usize {
        CommandRegistry::delete_all_properties_in_category(&self.prefs, category_name)
    }

    pub fn delete_saved_property(&self, category_name: &str, property_name: &str) -> bool {
        CommandRegistry::delete_saved_property(&self.prefs, category_name, property_name)
    }

    /// Remembers the selected category and returns its index, if it exists.
    pub fn select_category(&self, category_name: &str) -> Option<usize> {
        let index = self
            .model
            .category_names()
            .iter()
            .position(|name| *name == category_name)?;
        self.last_category.remember(category_name);
        Some(index)
    }

    /// Category to open first: the remembered one, else the first.
    pub fn initial_category_index(&self) -> usize {
        self.last_category.select_index(&self.model.category_names())
    }

    pub fn invoke(&mut self, category: &str, display_name: &str) -> Result<(), SessionError> {
        self.invoke_with(category, display_name, None)
    }

    /// Runs a method command inline or starts an async one; `on_complete` fires when it is done.
    pub fn invoke_with(
        &mut self,
        category: &str,
        display_name: &str,
        on_complete: Option<CompletionCallback>,
    ) -> Result<(), SessionError> {
        let command = self.model.find_command(category, display_name).ok_or_else(|| {
            SessionError::UnknownCommand {
                category: category.to_string(),
                display_name: display_name.to_string(),
            }
        })?;

        match command.as_ref() {
            Command::Method(method) => {
                method.invoke()?;
                if let Some(on_complete) = on_complete {
                    on_complete();
                }
            }
            Command::Coroutine(coroutine) => coroutine.invoke(&mut self.runner, on_complete)?,
            Command::HandleMethod(handle) => handle.invoke(&mut self.runner, on_complete)?,
            _ => {
                return Err(SessionError::NotInvocable {
                    display_name: display_name.to_string(),
                })
            }
        }
        debug!(category, command = display_name, "command invoked");
        Ok(())
    }

    /// Advances the scheduler one frame and re-reads properties if auto-refresh fired.
    pub fn tick(&mut self, delta_seconds: f32) -> TickReport {
        let failures = self.runner.tick(delta_seconds);
        for failure in &failures {
            warn!(task = %failure.label, error = %failure.source, "async command step failed");
        }
        let refreshed = self
            .refresh_due
            .replace(false)
            .then(|| self.model.refresh_properties());
        TickReport {
            failures,
            refreshed,
        }
    }

    pub fn save(&self) -> Result<(), PrefsError> {
        self.prefs.save()
    }

    /// Tears the session down. It can be populated again afterwards.
    pub fn dispose(&mut self) {
        self.model.dispose(&mut self.runner);
        self.registry.dispose();
        self.refresh_due.set(false);
        self.attach();
    }
}
