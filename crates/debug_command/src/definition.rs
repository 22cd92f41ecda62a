use std::any::{self, Any};
use std::fmt;
use std::rc::Rc;

use crate::command::{
    Command, CoroutineCommand, EnumAccess, GetOnlyPropertyCommand, HandleMethodCommand, HostError,
    MethodCommand,
};
use crate::factory::BuildContext;
use crate::prefs::{PrefValue, PrefsHandle};
use crate::runner::{CoroutineBody, MethodHandle};

/// Metadata a registrant attaches to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAttribute {
    DisplayName(String),
    Group { name: String, order: Option<i32> },
    Tag(String),
    Description(String),
    Order(i32),
    /// Bounds are kept as text and parsed for the target numeric type at build time.
    InputRange { min: String, max: String },
    Increment(String),
    CharacterLimit(usize),
    SaveOnUpdate,
    Exclude,
}

impl CommandAttribute {
    pub fn display_name(name: impl Into<String>) -> Self {
        Self::DisplayName(name.into())
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::Group {
            name: name.into(),
            order: None,
        }
    }

    pub fn ordered_group(name: impl Into<String>, order: i32) -> Self {
        Self::Group {
            name: name.into(),
            order: Some(order),
        }
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self::Tag(name.into())
    }

    pub fn description(text: impl Into<String>) -> Self {
        Self::Description(text.into())
    }

    pub fn input_range(min: impl fmt::Display, max: impl fmt::Display) -> Self {
        Self::InputRange {
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    pub fn increment(step: impl fmt::Display) -> Self {
        Self::Increment(step.to_string())
    }
}

/// Value types a mutable property can carry: `bool`, `char`, `String` and the numeric primitives.
pub trait PropertyValue: PrefValue + 'static {
    #[doc(hidden)]
    fn build_command(
        context: &BuildContext<'_>,
        getter: Rc<dyn Fn() -> Self>,
        setter: Rc<dyn Fn(Self)>,
    ) -> Command;
}

/// Plain enum exposed as a pick-by-name property. Implement with [`impl_debug_enum!`].
pub trait DebugEnum: Copy + 'static {
    const NAMES: &'static [&'static str];

    fn name(self) -> &'static str;
    fn from_name(name: &str) -> Option<Self>;
}

/// Implements [`DebugEnum`] for a field-less enum by listing its variants.
///
/// ```
/// #[derive(Clone, Copy)]
/// enum Quality { Low, High }
/// debug_command::impl_debug_enum!(Quality { Low, High });
/// ```
#[macro_export]
macro_rules! impl_debug_enum {
    ($name:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::DebugEnum for $name {
            const NAMES: &'static [&'static str] = &[$(stringify!($variant)),+];

            fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($variant) => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

type CommandBuilder = Rc<dyn Fn(&BuildContext<'_>) -> Command>;

/// A command waiting to be built: category, name, attributes and a type-erased builder.
#[derive(Clone)]
pub struct CommandDefinition {
    category_name: String,
    display_name: String,
    attributes: Vec<CommandAttribute>,
    builder: CommandBuilder,
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("category_name", &self.category_name)
            .field("display_name", &self.display_name)
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl CommandDefinition {
    fn from_builder(
        category_name: impl Into<String>,
        display_name: impl Into<String>,
        builder: impl Fn(&BuildContext<'_>) -> Command + 'static,
    ) -> Self {
        Self {
            category_name: category_name.into(),
            display_name: display_name.into(),
            attributes: Vec::new(),
            builder: Rc::new(builder),
        }
    }

    pub fn get_only<T: fmt::Display + 'static>(
        category_name: impl Into<String>,
        display_name: impl Into<String>,
        getter: impl Fn() -> T + 'static,
    ) -> Self {
        Self::get_only_optional(category_name, display_name, move || Some(getter()))
    }

    /// Read-only property whose value may be absent; absent renders as an empty string.
    pub fn get_only_optional<T: fmt::Display + 'static>(
        category_name: impl Into<String>,
        display_name: impl Into<String>,
        getter: impl Fn() -> Option<T> + 'static,
    ) -> Self {
        let getter = Rc::new(getter);
        Self::from_builder(category_name, display_name, move |context| {
            let getter = getter.clone();
            Command::GetOnly(GetOnlyPropertyCommand::new(
                context.meta(),
                Rc::new(move || getter().map(|value| value.to_string())),
            ))
        })
    }

    pub fn mutable<T: PropertyValue>(
        category_name: impl Into<String>,
        display_name: impl Into<String>,
        getter: impl Fn() -> T + 'static,
        setter: impl Fn(T) + 'static,
    ) -> Self {
        let getter: Rc<dyn Fn() -> T> = Rc::new(getter);
        let setter: Rc<dyn Fn(T)> = Rc::new(setter);
        Self::from_builder(category_name, display_name, move |context| {
            T::build_command(context, getter.clone(), setter.clone())
        })
    }

    pub fn mutable_enum<E: DebugEnum>(
        category_name: impl Into<String>,
        display_name: impl Into<String>,
        getter: impl Fn() -> E + 'static,
        setter: impl Fn(E) + 'static,
    ) -> Self {
        let getter = Rc::new(getter);
        let setter = Rc::new(setter);
        Self::from_builder(category_name, display_name, move |context| {
            let getter = getter.clone();
            let setter = setter.clone();
            let access = EnumAccess {
                names: E::NAMES,
                getter: Rc::new(move || getter().name()),
                setter: Rc::new(move |name: &str| match E::from_name(name) {
                    Some(value) => {
                        setter(value);
                        true
                    }
                    None => false,
                }),
            };
            context.enum_command(access)
        })
    }

    pub fn method(
        category_name: impl Into<String>,
        display_name: impl Into<String>,
        action: impl Fn() -> Result<(), HostError> + 'static,
    ) -> Self {
        let action = Rc::new(action);
        Self::from_builder(category_name, display_name, move |context| {
            Command::Method(MethodCommand::new(context.meta(), action.clone()))
        })
    }

    /// The factory is called on every invocation and returns the steps to run, one per tick.
    pub fn coroutine(
        category_name: impl Into<String>,
        display_name: impl Into<String>,
        factory: impl Fn() -> Result<CoroutineBody, HostError> + 'static,
    ) -> Self {
        let factory = Rc::new(factory);
        Self::from_builder(category_name, display_name, move |context| {
            Command::Coroutine(CoroutineCommand::new(context.meta(), factory.clone()))
        })
    }

    pub fn handle_method(
        category_name: impl Into<String>,
        display_name: impl Into<String>,
        factory: impl Fn() -> Result<MethodHandle, HostError> + 'static,
    ) -> Self {
        let factory = Rc::new(factory);
        Self::from_builder(category_name, display_name, move |context| {
            Command::HandleMethod(HandleMethodCommand::new(context.meta(), factory.clone()))
        })
    }

    pub fn with(mut self, attribute: CommandAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn attr(&mut self, attribute: CommandAttribute) -> &mut Self {
        self.attributes.push(attribute);
        self
    }

    pub fn category_name(&self) -> &str {
        &self.category_name
    }

    /// Name given at creation. Also the save-key suffix for declared members.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn attributes(&self) -> &[CommandAttribute] {
        &self.attributes
    }

    pub fn is_excluded(&self) -> bool {
        self.attributes
            .iter()
            .any(|attribute| matches!(attribute, CommandAttribute::Exclude))
    }

    pub fn saves_on_update(&self) -> bool {
        self.attributes
            .iter()
            .any(|attribute| matches!(attribute, CommandAttribute::SaveOnUpdate))
    }

    /// Builds a command without persistence. `None` when the definition is excluded.
    pub fn create_command(&self, prefs: &PrefsHandle) -> Option<Command> {
        self.build(None, prefs)
    }

    pub(crate) fn build(&self, save_key: Option<String>, prefs: &PrefsHandle) -> Option<Command> {
        if self.is_excluded() {
            return None;
        }
        let context = BuildContext::new(&self.display_name, &self.attributes, save_key, prefs);
        Some((self.builder)(&context))
    }
}

/// Members a declared category exposes, in declaration order.
#[derive(Debug)]
pub struct CategoryMembers {
    category_name: String,
    definitions: Vec<CommandDefinition>,
}

impl CategoryMembers {
    pub(crate) fn new(category_name: impl Into<String>) -> Self {
        Self {
            category_name: category_name.into(),
            definitions: Vec::new(),
        }
    }

    pub fn category_name(&self) -> &str {
        &self.category_name
    }

    pub fn push(&mut self, definition: CommandDefinition) -> &mut CommandDefinition {
        self.definitions.push(definition);
        let last = self.definitions.len() - 1;
        &mut self.definitions[last]
    }

    pub fn get_only<T: fmt::Display + 'static>(
        &mut self,
        name: &str,
        getter: impl Fn() -> T + 'static,
    ) -> &mut CommandDefinition {
        let definition = CommandDefinition::get_only(self.category_name.clone(), name, getter);
        self.push(definition)
    }

    pub fn get_only_optional<T: fmt::Display + 'static>(
        &mut self,
        name: &str,
        getter: impl Fn() -> Option<T> + 'static,
    ) -> &mut CommandDefinition {
        let definition =
            CommandDefinition::get_only_optional(self.category_name.clone(), name, getter);
        self.push(definition)
    }

    pub fn mutable<T: PropertyValue>(
        &mut self,
        name: &str,
        getter: impl Fn() -> T + 'static,
        setter: impl Fn(T) + 'static,
    ) -> &mut CommandDefinition {
        let definition =
            CommandDefinition::mutable(self.category_name.clone(), name, getter, setter);
        self.push(definition)
    }

    pub fn mutable_enum<E: DebugEnum>(
        &mut self,
        name: &str,
        getter: impl Fn() -> E + 'static,
        setter: impl Fn(E) + 'static,
    ) -> &mut CommandDefinition {
        let definition =
            CommandDefinition::mutable_enum(self.category_name.clone(), name, getter, setter);
        self.push(definition)
    }

    pub fn method(
        &mut self,
        name: &str,
        action: impl Fn() -> Result<(), HostError> + 'static,
    ) -> &mut CommandDefinition {
        let definition = CommandDefinition::method(self.category_name.clone(), name, action);
        self.push(definition)
    }

    pub fn coroutine(
        &mut self,
        name: &str,
        factory: impl Fn() -> Result<CoroutineBody, HostError> + 'static,
    ) -> &mut CommandDefinition {
        let definition = CommandDefinition::coroutine(self.category_name.clone(), name, factory);
        self.push(definition)
    }

    pub fn handle_method(
        &mut self,
        name: &str,
        factory: impl Fn() -> Result<MethodHandle, HostError> + 'static,
    ) -> &mut CommandDefinition {
        let definition =
            CommandDefinition::handle_method(self.category_name.clone(), name, factory);
        self.push(definition)
    }

    pub(crate) fn into_definitions(self) -> Vec<CommandDefinition> {
        self.definitions
    }
}

/// Host type whose members become a category of commands.
pub trait DebugCategory: Any {
    fn declare(self: Rc<Self>, members: &mut CategoryMembers);
}

/// Last path segment of a type name, without generic arguments.
pub(crate) fn short_type_name(type_name: &'static str) -> &'static str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

type CategoryConstructor = Rc<dyn Fn(&mut CategoryMembers) -> Rc<dyn Any>>;

/// Type descriptor the registry keeps for a declared category.
#[derive(Clone)]
pub struct CategoryType {
    type_name: &'static str,
    constructor: Option<CategoryConstructor>,
}

impl fmt::Debug for CategoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryType")
            .field("type_name", &self.type_name)
            .field("constructible", &self.constructor.is_some())
            .finish()
    }
}

impl CategoryType {
    pub fn of<T: DebugCategory + Default>() -> Self {
        Self {
            type_name: any::type_name::<T>(),
            constructor: Some(Rc::new(|members: &mut CategoryMembers| {
                let instance = Rc::new(T::default());
                instance.clone().declare(members);
                instance as Rc<dyn Any>
            })),
        }
    }

    /// A type that cannot be built without arguments. The model skips it with a warning.
    pub fn without_constructor<T: 'static>() -> Self {
        Self {
            type_name: any::type_name::<T>(),
            constructor: None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn short_name(&self) -> &'static str {
        short_type_name(self.type_name)
    }

    pub fn is_constructible(&self) -> bool {
        self.constructor.is_some()
    }

    /// Creates the instance and collects its members. `None` without a constructor.
    pub(crate) fn instantiate(
        &self,
        category_name: &str,
    ) -> Option<(Rc<dyn Any>, Vec<CommandDefinition>)> {
        let constructor = self.constructor.as_ref()?;
        let mut members = CategoryMembers::new(category_name);
        let instance = constructor(&mut members);
        Some((instance, members.into_definitions()))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Weather {
        Sunny,
        Rain,
    }

    impl_debug_enum!(Weather { Sunny, Rain });

    #[derive(Default)]
    struct Player {
        lives: Cell<u8>,
    }

    impl DebugCategory for Player {
        fn declare(self: Rc<Self>, members: &mut CategoryMembers) {
            let this = self.clone();
            members
                .mutable("Lives", move || this.lives.get(), {
                    let this = self.clone();
                    move |value| this.lives.set(value)
                })
                .attr(CommandAttribute::SaveOnUpdate);
            members.method("Reset", || Ok(()));
        }
    }

    #[test]
    fn debug_enum_macro_maps_names_both_ways() {
        assert_eq!(Weather::NAMES, &["Sunny", "Rain"]);
        assert_eq!(Weather::Rain.name(), "Rain");
        assert_eq!(Weather::from_name("Sunny"), Some(Weather::Sunny));
        assert_eq!(Weather::from_name("Snow"), None);
    }

    #[test]
    fn category_type_collects_members_in_declaration_order() {
        let category_type = CategoryType::of::<Player>();
        assert_eq!(category_type.short_name(), "Player");

        let (instance, definitions) = category_type
            .instantiate("Player")
            .expect("default constructible");
        assert!(instance.downcast_ref::<Player>().is_some());
        let names = definitions
            .iter()
            .map(CommandDefinition::display_name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Lives", "Reset"]);
        assert!(definitions[0].saves_on_update());
        assert_eq!(definitions[0].category_name(), "Player");
    }

    #[test]
    fn type_without_constructor_cannot_be_instantiated() {
        struct NeedsArgs;
        let category_type = CategoryType::without_constructor::<NeedsArgs>();
        assert!(!category_type.is_constructible());
        assert!(category_type.instantiate("NeedsArgs").is_none());
        assert_eq!(category_type.short_name(), "NeedsArgs");
    }

    #[test]
    fn excluded_definition_builds_nothing() {
        let prefs = PrefsHandle::in_memory();
        let definition = CommandDefinition::method("Tools", "Hidden", || Ok(()))
            .with(CommandAttribute::Exclude);
        assert!(definition.create_command(&prefs).is_none());
    }

    #[test]
    fn enum_definition_builds_a_name_driven_command() {
        let prefs = PrefsHandle::in_memory();
        let weather = Rc::new(Cell::new(Weather::Sunny));
        let read = weather.clone();
        let write = weather.clone();
        let definition = CommandDefinition::mutable_enum(
            "World",
            "Weather",
            move || read.get(),
            move |value| write.set(value),
        );

        let Some(Command::Enum(command)) = definition.create_command(&prefs) else {
            panic!("expected an enum command");
        };
        command.set_value("Rain").expect("known variant");
        assert_eq!(weather.get(), Weather::Rain);
        assert!(command.set_value("Snow").is_err());
    }
}
