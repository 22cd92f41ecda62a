use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use super::{CommandError, CommandFlags, CommandMeta, DetailContext};
use crate::prefs::{PrefValue, PrefsHandle};

pub(crate) type Getter<T> = Rc<dyn Fn() -> T>;
pub(crate) type Setter<T> = Rc<dyn Fn(T)>;

/// Getter/setter pair plus the optional save key every mutable property shares.
pub(crate) struct PropertyAccess<T> {
    getter: Getter<T>,
    setter: Setter<T>,
    save_key: Option<String>,
    prefs: PrefsHandle,
}

impl<T: PrefValue> PropertyAccess<T> {
    pub(crate) fn new(
        getter: Getter<T>,
        setter: Setter<T>,
        save_key: Option<String>,
        prefs: PrefsHandle,
    ) -> Self {
        Self {
            getter,
            setter,
            save_key,
            prefs,
        }
    }

    pub(crate) fn get(&self) -> T {
        (self.getter)()
    }

    pub(crate) fn set(&self, value: T) {
        let saved = self
            .save_key
            .as_deref()
            .map(|key| (key, value.to_pref()));
        (self.setter)(value);
        if let Some((key, text)) = saved {
            self.prefs.set_string(key, text);
        }
    }

    pub(crate) fn saves_on_update(&self) -> bool {
        self.save_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    /// Value persisted under the save key, if one exists and parses.
    pub(crate) fn stored_value(&self) -> Option<T> {
        let key = self.save_key.as_deref()?;
        if !self.prefs.has_key(key) {
            return None;
        }
        let raw = self.prefs.get_string(key, "");
        let value = T::from_pref(&raw);
        if value.is_none() {
            warn!(key, raw = %raw, "saved command value does not parse; keeping live value");
        }
        value
    }

    fn push_detail_rows(&self, context: &mut DetailContext, value: String) {
        context.push(("Value", value));
        context.push(("SaveOnUpdate", self.saves_on_update().to_string()));
    }
}

/// Mutable property over a value with no extra input constraints (`bool`, `char`).
pub struct MutablePropertyCommand<T> {
    meta: CommandMeta,
    flags: CommandFlags,
    access: PropertyAccess<T>,
}

pub type BoolPropertyCommand = MutablePropertyCommand<bool>;
pub type CharPropertyCommand = MutablePropertyCommand<char>;

impl<T: PrefValue + fmt::Display> MutablePropertyCommand<T> {
    pub(crate) fn new(meta: CommandMeta, access: PropertyAccess<T>) -> Self {
        let command = Self {
            meta,
            flags: CommandFlags::default(),
            access,
        };
        if let Some(saved) = command.access.stored_value() {
            command.set_value(saved);
        }
        command
    }

    pub fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    pub fn get_value(&self) -> T {
        self.access.get()
    }

    pub fn set_value(&self, value: T) {
        self.access.set(value);
    }

    pub fn saves_on_update(&self) -> bool {
        self.access.saves_on_update()
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

    pub(crate) fn extend_detail_context(&self, mut context: DetailContext) -> DetailContext {
        self.access
            .push_detail_rows(&mut context, self.get_value().to_string());
        context
    }
}

pub struct StringPropertyCommand {
    meta: CommandMeta,
    flags: CommandFlags,
    access: PropertyAccess<String>,
    character_limit: usize,
}

impl StringPropertyCommand {
    /// `character_limit == 0` means unlimited.
    pub(crate) fn new(
        meta: CommandMeta,
        access: PropertyAccess<String>,
        character_limit: usize,
    ) -> Self {
        let command = Self {
            meta,
            flags: CommandFlags::default(),
            access,
            character_limit,
        };
        if let Some(saved) = command.access.stored_value() {
            command.set_value(saved);
        }
        command
    }

    pub fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    pub fn character_limit(&self) -> usize {
        self.character_limit
    }

    pub fn is_unlimited(&self) -> bool {
        self.character_limit == 0
    }

    pub fn get_value(&self) -> String {
        self.access.get()
    }

    pub fn set_value(&self, value: impl Into<String>) {
        let value = self.truncate(value.into());
        self.access.set(value);
    }

    fn truncate(&self, value: String) -> String {
        if self.is_unlimited() {
            return value;
        }
        match value.char_indices().nth(self.character_limit) {
            Some((cut, _)) => value[..cut].to_string(),
            None => value,
        }
    }

    pub fn saves_on_update(&self) -> bool {
        self.access.saves_on_update()
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

    pub(crate) fn extend_detail_context(&self, mut context: DetailContext) -> DetailContext {
        self.access.push_detail_rows(&mut context, self.get_value());
        let limit = if self.is_unlimited() {
            "Unlimited".to_string()
        } else {
            self.character_limit.to_string()
        };
        context.push(("CharacterLimit", limit));
        context
    }
}

/// Type-erased accessors for an enum property; the setter reports whether the name matched.
pub(crate) struct EnumAccess {
    pub(crate) names: &'static [&'static str],
    pub(crate) getter: Rc<dyn Fn() -> &'static str>,
    pub(crate) setter: Rc<dyn Fn(&str) -> bool>,
}

pub struct EnumPropertyCommand {
    meta: CommandMeta,
    flags: CommandFlags,
    access: EnumAccess,
    save_key: Option<String>,
    prefs: PrefsHandle,
}

impl EnumPropertyCommand {
    pub(crate) fn new(
        meta: CommandMeta,
        access: EnumAccess,
        save_key: Option<String>,
        prefs: PrefsHandle,
    ) -> Self {
        let command = Self {
            meta,
            flags: CommandFlags::default(),
            access,
            save_key,
            prefs,
        };
        if let Some(key) = command.save_key.as_deref() {
            if command.prefs.has_key(key) {
                let saved = command.prefs.get_string(key, "");
                if let Err(error) = command.set_value(&saved) {
                    warn!(key, %error, "ignoring saved enum value");
                }
            }
        }
        command
    }

    pub fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    pub fn names(&self) -> &'static [&'static str] {
        self.access.names
    }

    pub fn get_value(&self) -> String {
        (self.access.getter)().to_string()
    }

    pub fn set_value(&self, name: &str) -> Result<(), CommandError> {
        if !(self.access.setter)(name) {
            return Err(CommandError::UnknownEnumVariant {
                display_name: self.meta.display_name.clone(),
                value: name.to_string(),
            });
        }
        if let Some(key) = self.save_key.as_deref() {
            self.prefs.set_string(key, name);
        }
        Ok(())
    }

    pub fn saves_on_update(&self) -> bool {
        self.save_key.as_deref().is_some_and(|key| !key.is_empty())
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

    pub(crate) fn extend_detail_context(&self, mut context: DetailContext) -> DetailContext {
        context.push(("Value", self.get_value()));
        context.push(("SaveOnUpdate", self.saves_on_update().to_string()));
        context
    }
}

pub struct GetOnlyPropertyCommand {
    meta: CommandMeta,
    visible: Cell<bool>,
    getter: Rc<dyn Fn() -> Option<String>>,
}

impl GetOnlyPropertyCommand {
    pub(crate) fn new(meta: CommandMeta, getter: Rc<dyn Fn() -> Option<String>>) -> Self {
        Self {
            meta,
            visible: Cell::new(true),
            getter,
        }
    }

    pub fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    /// Empty when the accessor has nothing to show.
    pub fn get_value(&self) -> String {
        (self.getter)().unwrap_or_default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible.get()
    }

    pub fn set_visible(&self, value: bool) {
        self.visible.set(value);
    }

    pub(crate) fn extend_detail_context(&self, mut context: DetailContext) -> DetailContext {
        context.push(("Value", self.get_value()));
        context
    }
}
