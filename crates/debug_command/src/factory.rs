use std::rc::Rc;

use rust_decimal::Decimal;
use tracing::warn;

use crate::command::{
    BoolPropertyCommand, CharPropertyCommand, Command, CommandMeta, EnumAccess,
    EnumPropertyCommand, NumericPropertyCommand, NumericSettings, NumericValue, PropertyAccess,
    StringPropertyCommand,
};
use crate::definition::{CommandAttribute, PropertyValue};
use crate::prefs::{PrefValue, PrefsHandle};

/// What a definition's builder sees: the member name, its attributes and where to persist.
pub struct BuildContext<'a> {
    member_name: &'a str,
    attributes: &'a [CommandAttribute],
    save_key: Option<String>,
    prefs: &'a PrefsHandle,
}

impl<'a> BuildContext<'a> {
    pub(crate) fn new(
        member_name: &'a str,
        attributes: &'a [CommandAttribute],
        save_key: Option<String>,
        prefs: &'a PrefsHandle,
    ) -> Self {
        Self {
            member_name,
            attributes,
            save_key,
            prefs,
        }
    }

    /// Later attributes win over earlier ones of the same kind.
    pub(crate) fn meta(&self) -> CommandMeta {
        let mut meta = CommandMeta::new(self.member_name);
        for attribute in self.attributes {
            match attribute {
                CommandAttribute::DisplayName(name) if !name.is_empty() => {
                    meta.display_name = name.clone();
                }
                CommandAttribute::Group { name, order } => {
                    if !name.is_empty() {
                        meta.group_name = name.clone();
                    }
                    meta.group_order = *order;
                }
                CommandAttribute::Tag(tag) if !tag.is_empty() => {
                    meta.tag_name = Some(tag.clone());
                }
                CommandAttribute::Description(text) => meta.description = Some(text.clone()),
                CommandAttribute::Order(order) => meta.order = *order,
                _ => {}
            }
        }
        meta
    }

    pub(crate) fn access<T: PrefValue>(
        &self,
        getter: Rc<dyn Fn() -> T>,
        setter: Rc<dyn Fn(T)>,
    ) -> PropertyAccess<T> {
        PropertyAccess::new(getter, setter, self.save_key.clone(), self.prefs.clone())
    }

    /// 0 means unlimited.
    pub(crate) fn character_limit(&self) -> usize {
        self.attributes
            .iter()
            .rev()
            .find_map(|attribute| match attribute {
                CommandAttribute::CharacterLimit(limit) => Some(*limit),
                _ => None,
            })
            .unwrap_or(0)
    }

    pub(crate) fn numeric_settings<T: NumericValue>(&self) -> NumericSettings<T> {
        let mut settings = NumericSettings::<T>::default();
        let mut digit_sources: Vec<&str> = Vec::new();

        for attribute in self.attributes {
            match attribute {
                CommandAttribute::InputRange { min, max } => {
                    match (T::parse_text(min), T::parse_text(max)) {
                        (Some(low), Some(high)) if low <= high => {
                            settings.range = Some((low, high));
                            digit_sources.push(min);
                            digit_sources.push(max);
                        }
                        (Some(_), Some(_)) => {
                            warn!(
                                member = self.member_name,
                                min = %min,
                                max = %max,
                                "input range minimum exceeds maximum; range ignored"
                            );
                        }
                        _ => {
                            warn!(
                                member = self.member_name,
                                min = %min,
                                max = %max,
                                kind = T::TYPE_NAME,
                                "input range does not parse for this type; range ignored"
                            );
                        }
                    }
                }
                CommandAttribute::Increment(text) => match T::parse_text(text) {
                    Some(increment) if increment > T::ZERO => {
                        settings.increment = increment;
                        digit_sources.push(text);
                    }
                    _ => {
                        warn!(
                            member = self.member_name,
                            increment = %text,
                            "increment must be a positive number; using the default"
                        );
                        settings.increment = T::ONE;
                    }
                },
                _ => {}
            }
        }

        if T::IS_FLOAT {
            settings.digits = digit_sources
                .into_iter()
                .map(fractional_digits)
                .max()
                .unwrap_or(0);
        }
        settings
    }

    pub(crate) fn enum_command(&self, access: EnumAccess) -> Command {
        Command::Enum(EnumPropertyCommand::new(
            self.meta(),
            access,
            self.save_key.clone(),
            self.prefs.clone(),
        ))
    }
}

/// Digits after the decimal point in attribute text like `"0.25"`.
fn fractional_digits(text: &str) -> u32 {
    let Some((_, fraction)) = text.trim().split_once('.') else {
        return 0;
    };
    fraction
        .chars()
        .take_while(char::is_ascii_digit)
        .count()
        .try_into()
        .unwrap_or(u32::MAX)
}

impl PropertyValue for bool {
    fn build_command(
        context: &BuildContext<'_>,
        getter: Rc<dyn Fn() -> Self>,
        setter: Rc<dyn Fn(Self)>,
    ) -> Command {
        Command::Bool(BoolPropertyCommand::new(
            context.meta(),
            context.access(getter, setter),
        ))
    }
}

impl PropertyValue for char {
    fn build_command(
        context: &BuildContext<'_>,
        getter: Rc<dyn Fn() -> Self>,
        setter: Rc<dyn Fn(Self)>,
    ) -> Command {
        Command::Char(CharPropertyCommand::new(
            context.meta(),
            context.access(getter, setter),
        ))
    }
}

impl PropertyValue for String {
    fn build_command(
        context: &BuildContext<'_>,
        getter: Rc<dyn Fn() -> Self>,
        setter: Rc<dyn Fn(Self)>,
    ) -> Command {
        Command::String(StringPropertyCommand::new(
            context.meta(),
            context.access(getter, setter),
            context.character_limit(),
        ))
    }
}

macro_rules! impl_numeric_property_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl PropertyValue for $ty {
                fn build_command(
                    context: &BuildContext<'_>,
                    getter: Rc<dyn Fn() -> Self>,
                    setter: Rc<dyn Fn(Self)>,
                ) -> Command {
                    let command = NumericPropertyCommand::new(
                        context.meta(),
                        context.access(getter, setter),
                        context.numeric_settings::<$ty>(),
                    );
                    Command::Numeric(<$ty as NumericValue>::into_command(command))
                }
            }
        )*
    };
}

impl_numeric_property_value!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64, Decimal);

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::command::NumericCommand;
    use crate::definition::CommandDefinition;
    use crate::registry::CommandRegistry;

    fn context_with(attributes: &[CommandAttribute]) -> (PrefsHandle, Vec<CommandAttribute>) {
        (PrefsHandle::in_memory(), attributes.to_vec())
    }

    #[test]
    fn meta_resolves_attributes_with_defaults() {
        let (prefs, attributes) = context_with(&[
            CommandAttribute::display_name("Move Speed"),
            CommandAttribute::ordered_group("Movement", 2),
            CommandAttribute::tag("player"),
            CommandAttribute::description("metres per second"),
            CommandAttribute::Order(7),
        ]);
        let context = BuildContext::new("speed", &attributes, None, &prefs);
        let meta = context.meta();

        assert_eq!(meta.display_name, "Move Speed");
        assert_eq!(meta.group_name, "Movement");
        assert_eq!(meta.group_order, Some(2));
        assert_eq!(meta.tag_name.as_deref(), Some("player"));
        assert_eq!(meta.description.as_deref(), Some("metres per second"));
        assert_eq!(meta.order, 7);

        let bare = BuildContext::new("speed", &[], None, &prefs).meta();
        assert_eq!(bare.display_name, "speed");
        assert_eq!(bare.group_name, "Others");
        assert_eq!(bare.tag_name, None);
    }

    #[test]
    fn range_needs_both_bounds_to_parse() {
        let (prefs, attributes) = context_with(&[CommandAttribute::input_range("0", "lots")]);
        let settings = BuildContext::new("x", &attributes, None, &prefs).numeric_settings::<i32>();
        assert_eq!(settings.range, None);

        let (prefs, attributes) = context_with(&[CommandAttribute::input_range(-5, 5)]);
        let settings = BuildContext::new("x", &attributes, None, &prefs).numeric_settings::<i32>();
        assert_eq!(settings.range, Some((-5, 5)));
    }

    #[test]
    fn inverted_range_and_bad_increment_fall_back_to_defaults() {
        let (prefs, attributes) = context_with(&[
            CommandAttribute::input_range(10, 0),
            CommandAttribute::increment(0),
        ]);
        let settings = BuildContext::new("x", &attributes, None, &prefs).numeric_settings::<u8>();
        assert_eq!(settings.range, None);
        assert_eq!(settings.increment, 1);

        let (prefs, attributes) = context_with(&[CommandAttribute::increment(-2)]);
        let settings = BuildContext::new("x", &attributes, None, &prefs).numeric_settings::<i64>();
        assert_eq!(settings.increment, 1);
    }

    #[test]
    fn float_digits_follow_the_most_precise_attribute_text() {
        let (prefs, attributes) = context_with(&[
            CommandAttribute::input_range("0", "1.5"),
            CommandAttribute::increment("0.125"),
        ]);
        let float = BuildContext::new("x", &attributes, None, &prefs).numeric_settings::<f32>();
        assert_eq!(float.digits, 3);
        assert_eq!(float.increment, 0.125);

        let int = BuildContext::new("x", &attributes, None, &prefs).numeric_settings::<i32>();
        assert_eq!(int.digits, 0);
        assert_eq!(int.range, None);
    }

    #[test]
    fn fractional_digits_ignores_trailing_text() {
        assert_eq!(fractional_digits("12"), 0);
        assert_eq!(fractional_digits(" 0.50 "), 2);
        assert_eq!(fractional_digits("1.5e3"), 1);
    }

    #[test]
    fn numeric_definition_builds_the_matching_variant() {
        let prefs = PrefsHandle::in_memory();
        let volume = Rc::new(Cell::new(0.5_f64));
        let read = volume.clone();
        let write = volume.clone();
        let definition = CommandDefinition::mutable(
            "Audio",
            "Volume",
            move || read.get(),
            move |value| write.set(value),
        )
        .with(CommandAttribute::input_range(0, 1))
        .with(CommandAttribute::increment(0.05));

        let command = definition.create_command(&prefs).expect("not excluded");
        let Command::Numeric(NumericCommand::F64(numeric)) = &command else {
            panic!("expected a double command, got {}", command.type_name());
        };
        assert_eq!(numeric.digits(), 2);
        numeric.fluctuate(3);
        assert_eq!(volume.get(), 0.65);
        assert_eq!(command.type_name(), "Double Property");
    }

    #[test]
    fn decimal_definition_tracks_digits_and_seeds_from_prefs() {
        let prefs = PrefsHandle::in_memory();
        prefs.set_string("DebugCommandProperty_Shop_Price", "12.3456");
        let price = Rc::new(Cell::new(Decimal::ZERO));
        let read = price.clone();
        let write = price.clone();
        let definition = CommandDefinition::mutable(
            "Shop",
            "Price",
            move || read.get(),
            move |value| write.set(value),
        )
        .with(CommandAttribute::input_range("0", "100"))
        .with(CommandAttribute::increment("0.05"))
        .with(CommandAttribute::SaveOnUpdate);

        let save_key = Some(CommandRegistry::save_property_key("Shop", "Price"));
        let command = definition.build(save_key, &prefs).expect("not excluded");
        let Command::Numeric(NumericCommand::Decimal(numeric)) = &command else {
            panic!("expected a decimal command, got {}", command.type_name());
        };
        assert_eq!(numeric.digits(), 2);
        assert_eq!(price.get(), Decimal::new(123456, 4));

        numeric.fluctuate(1);
        assert_eq!(price.get(), Decimal::new(1240, 2));
        assert_eq!(prefs.get_string("DebugCommandProperty_Shop_Price", ""), "12.40");
        assert_eq!(command.type_name(), "Decimal Property");
    }

    #[test]
    fn string_definition_uses_last_character_limit() {
        let prefs = PrefsHandle::in_memory();
        let definition = CommandDefinition::mutable("Chat", "Message", String::new, |_| {})
            .with(CommandAttribute::CharacterLimit(10))
            .with(CommandAttribute::CharacterLimit(3));

        let Some(Command::String(command)) = definition.create_command(&prefs) else {
            panic!("expected a string command");
        };
        assert_eq!(command.character_limit(), 3);
    }
}
