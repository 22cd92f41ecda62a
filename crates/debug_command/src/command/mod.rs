mod async_method;
mod method;
mod numeric;
mod property;

use std::cell::Cell;

use thiserror::Error;

pub use async_method::{AsyncState, CoroutineCommand, HandleMethodCommand};
pub use method::MethodCommand;
pub use numeric::{NumericCommand, NumericPropertyCommand, NumericValue};
pub use property::{
    BoolPropertyCommand, CharPropertyCommand, EnumPropertyCommand, GetOnlyPropertyCommand,
    MutablePropertyCommand, StringPropertyCommand,
};

pub(crate) use numeric::NumericSettings;
pub(crate) use property::{EnumAccess, PropertyAccess};

/// Error type host closures return. The core moves it through untouched.
pub type HostError = Box<dyn std::error::Error + Send + Sync>;

pub const DEFAULT_GROUP_NAME: &str = "Others";
pub const DEFAULT_ORDER: i32 = i32::MAX;

/// Ordered `(label, value)` rows describing a command for a details panel.
pub type DetailContext = Vec<(&'static str, String)>;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command '{display_name}' is not interactable")]
    NotInteractable { display_name: String },
    #[error("'{value}' is not a variant of enum command '{display_name}'")]
    UnknownEnumVariant { display_name: String, value: String },
    #[error("{0}")]
    Host(HostError),
}

impl CommandError {
    /// Hands back the host's original error, if this is one.
    pub fn into_host_error(self) -> Option<HostError> {
        match self {
            CommandError::Host(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMeta {
    pub display_name: String,
    pub group_name: String,
    pub group_order: Option<i32>,
    pub tag_name: Option<String>,
    pub description: Option<String>,
    pub order: i32,
}

impl CommandMeta {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            group_name: DEFAULT_GROUP_NAME.to_string(),
            group_order: None,
            tag_name: None,
            description: None,
            order: DEFAULT_ORDER,
        }
    }

    fn base_detail_context(&self, type_name: &str) -> DetailContext {
        let mut context = vec![("Type", type_name.to_string())];
        if let Some(tag_name) = &self.tag_name {
            context.push(("TagName", tag_name.clone()));
        }
        if self.order != DEFAULT_ORDER {
            context.push(("Order", self.order.to_string()));
        }
        context
    }
}

#[derive(Debug)]
pub(crate) struct CommandFlags {
    interactable: Cell<bool>,
    visible: Cell<bool>,
}

impl Default for CommandFlags {
    fn default() -> Self {
        Self {
            interactable: Cell::new(true),
            visible: Cell::new(true),
        }
    }
}

impl CommandFlags {
    pub(crate) fn is_interactable(&self) -> bool {
        self.interactable.get()
    }

    pub(crate) fn set_interactable(&self, value: bool) {
        self.interactable.set(value);
    }

    pub(crate) fn is_visible(&self) -> bool {
        self.visible.get()
    }

    pub(crate) fn set_visible(&self, value: bool) {
        self.visible.set(value);
    }
}

/// Closed set of command kinds a renderer matches on.
pub enum Command {
    GetOnly(GetOnlyPropertyCommand),
    Bool(BoolPropertyCommand),
    Char(CharPropertyCommand),
    String(StringPropertyCommand),
    Enum(EnumPropertyCommand),
    Numeric(NumericCommand),
    Method(MethodCommand),
    Coroutine(CoroutineCommand),
    HandleMethod(HandleMethodCommand),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("type", &self.type_name())
            .field("meta", self.meta())
            .field("interactable", &self.is_interactable())
            .field("visible", &self.is_visible())
            .finish()
    }
}

impl Command {
    pub fn meta(&self) -> &CommandMeta {
        match self {
            Command::GetOnly(command) => command.meta(),
            Command::Bool(command) => command.meta(),
            Command::Char(command) => command.meta(),
            Command::String(command) => command.meta(),
            Command::Enum(command) => command.meta(),
            Command::Numeric(command) => command.meta(),
            Command::Method(command) => command.meta(),
            Command::Coroutine(command) => command.meta(),
            Command::HandleMethod(command) => command.meta(),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.meta().display_name
    }

    pub fn group_name(&self) -> &str {
        &self.meta().group_name
    }

    pub fn group_order(&self) -> Option<i32> {
        self.meta().group_order
    }

    pub fn tag_name(&self) -> Option<&str> {
        self.meta().tag_name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.meta().description.as_deref()
    }

    pub fn order(&self) -> i32 {
        self.meta().order
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Command::GetOnly(_) => "GetOnly Property",
            Command::Bool(_) => "Bool Property",
            Command::Char(_) => "Char Property",
            Command::String(_) => "String Property",
            Command::Enum(_) => "Enum Property",
            Command::Numeric(command) => command.type_name(),
            Command::Method(_) => "Method",
            Command::Coroutine(_) => "Coroutine",
            Command::HandleMethod(_) => "Handle Method",
        }
    }

    pub fn is_interactable(&self) -> bool {
        match self {
            Command::GetOnly(_) => false,
            Command::Bool(command) => command.is_interactable(),
            Command::Char(command) => command.is_interactable(),
            Command::String(command) => command.is_interactable(),
            Command::Enum(command) => command.is_interactable(),
            Command::Numeric(command) => command.is_interactable(),
            Command::Method(command) => command.is_interactable(),
            Command::Coroutine(command) => command.is_interactable(),
            Command::HandleMethod(command) => command.is_interactable(),
        }
    }

    /// Read-only properties ignore this.
    pub fn set_interactable(&self, value: bool) {
        match self {
            Command::GetOnly(_) => {}
            Command::Bool(command) => command.set_interactable(value),
            Command::Char(command) => command.set_interactable(value),
            Command::String(command) => command.set_interactable(value),
            Command::Enum(command) => command.set_interactable(value),
            Command::Numeric(command) => command.set_interactable(value),
            Command::Method(command) => command.set_interactable(value),
            Command::Coroutine(command) => command.set_interactable(value),
            Command::HandleMethod(command) => command.set_interactable(value),
        }
    }

    pub fn is_visible(&self) -> bool {
        match self {
            Command::GetOnly(command) => command.is_visible(),
            Command::Bool(command) => command.is_visible(),
            Command::Char(command) => command.is_visible(),
            Command::String(command) => command.is_visible(),
            Command::Enum(command) => command.is_visible(),
            Command::Numeric(command) => command.is_visible(),
            Command::Method(command) => command.is_visible(),
            Command::Coroutine(command) => command.is_visible(),
            Command::HandleMethod(command) => command.is_visible(),
        }
    }

    pub fn set_visible(&self, value: bool) {
        match self {
            Command::GetOnly(command) => command.set_visible(value),
            Command::Bool(command) => command.set_visible(value),
            Command::Char(command) => command.set_visible(value),
            Command::String(command) => command.set_visible(value),
            Command::Enum(command) => command.set_visible(value),
            Command::Numeric(command) => command.set_visible(value),
            Command::Method(command) => command.set_visible(value),
            Command::Coroutine(command) => command.set_visible(value),
            Command::HandleMethod(command) => command.set_visible(value),
        }
    }

    /// Current value rendered as text; `None` for commands that carry no value.
    pub fn value_string(&self) -> Option<String> {
        match self {
            Command::GetOnly(command) => Some(command.get_value()),
            Command::Bool(command) => Some(command.get_value().to_string()),
            Command::Char(command) => Some(command.get_value().to_string()),
            Command::String(command) => Some(command.get_value()),
            Command::Enum(command) => Some(command.get_value()),
            Command::Numeric(command) => Some(command.value_string()),
            Command::Method(_) | Command::Coroutine(_) | Command::HandleMethod(_) => None,
        }
    }

    pub fn detail_context(&self) -> DetailContext {
        let base = self.meta().base_detail_context(self.type_name());
        match self {
            Command::GetOnly(command) => command.extend_detail_context(base),
            Command::Bool(command) => command.extend_detail_context(base),
            Command::Char(command) => command.extend_detail_context(base),
            Command::String(command) => command.extend_detail_context(base),
            Command::Enum(command) => command.extend_detail_context(base),
            Command::Numeric(command) => command.extend_detail_context(base),
            Command::Method(_) | Command::Coroutine(_) | Command::HandleMethod(_) => base,
        }
    }

    pub fn detail_suffix(&self) -> Option<String> {
        self.description()
            .map(|description| format!("\nDescription\n{description}"))
    }
}
