use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};

use super::{CommandFlags, CommandMeta, DetailContext, PropertyAccess};
use crate::prefs::PrefValue;

/// Numeric primitive a property command can saturate and step over.
pub trait NumericValue: Copy + PartialOrd + fmt::Display + PrefValue + 'static {
    const MIN: Self;
    const MAX: Self;
    const ZERO: Self;
    const ONE: Self;
    const TYPE_NAME: &'static str;
    /// Fractional types track a digit count from their attributes and round every step to it.
    const IS_FLOAT: bool;

    /// Strict parse of trimmed text. Floats reject non-finite results.
    fn parse_text(text: &str) -> Option<Self>;

    /// `None` on overflow (or a non-finite float result).
    fn try_add(self, rhs: Self) -> Option<Self>;
    fn try_sub(self, rhs: Self) -> Option<Self>;

    /// Rounds half away from zero to `digits` fractional digits. Integers are returned as-is.
    fn round_half_away(self, digits: u32) -> Self;

    fn into_command(command: NumericPropertyCommand<Self>) -> NumericCommand;
}

macro_rules! impl_integer_value {
    ($($ty:ty => $variant:ident, $name:literal);* $(;)?) => {
        $(
            impl NumericValue for $ty {
                const MIN: Self = <$ty>::MIN;
                const MAX: Self = <$ty>::MAX;
                const ZERO: Self = 0;
                const ONE: Self = 1;
                const TYPE_NAME: &'static str = $name;
                const IS_FLOAT: bool = false;

                fn parse_text(text: &str) -> Option<Self> {
                    text.trim().parse::<$ty>().ok()
                }

                fn try_add(self, rhs: Self) -> Option<Self> {
                    self.checked_add(rhs)
                }

                fn try_sub(self, rhs: Self) -> Option<Self> {
                    self.checked_sub(rhs)
                }

                fn round_half_away(self, _digits: u32) -> Self {
                    self
                }

                fn into_command(command: NumericPropertyCommand<Self>) -> NumericCommand {
                    NumericCommand::$variant(command)
                }
            }
        )*
    };
}

impl_integer_value! {
    i8 => I8, "SByte Property";
    u8 => U8, "Byte Property";
    i16 => I16, "Short Property";
    u16 => U16, "UShort Property";
    i32 => I32, "Int Property";
    u32 => U32, "UInt Property";
    i64 => I64, "Long Property";
    u64 => U64, "ULong Property";
}

// Past this many digits the f64 scale factor stops being exact.
const MAX_ROUNDING_DIGITS: u32 = 15;

macro_rules! impl_float_value {
    ($($ty:ty => $variant:ident, $name:literal);* $(;)?) => {
        $(
            impl NumericValue for $ty {
                const MIN: Self = <$ty>::MIN;
                const MAX: Self = <$ty>::MAX;
                const ZERO: Self = 0.0;
                const ONE: Self = 1.0;
                const TYPE_NAME: &'static str = $name;
                const IS_FLOAT: bool = true;

                fn parse_text(text: &str) -> Option<Self> {
                    text.trim()
                        .parse::<$ty>()
                        .ok()
                        .filter(|value| value.is_finite())
                }

                fn try_add(self, rhs: Self) -> Option<Self> {
                    let sum = self + rhs;
                    sum.is_finite().then_some(sum)
                }

                fn try_sub(self, rhs: Self) -> Option<Self> {
                    let difference = self - rhs;
                    difference.is_finite().then_some(difference)
                }

                fn round_half_away(self, digits: u32) -> Self {
                    if !self.is_finite() || digits > MAX_ROUNDING_DIGITS {
                        return self;
                    }
                    let scale = 10_f64.powi(digits as i32);
                    let scaled = f64::from(self) * scale;
                    if !scaled.is_finite() {
                        return self;
                    }
                    (scaled.round() / scale) as $ty
                }

                fn into_command(command: NumericPropertyCommand<Self>) -> NumericCommand {
                    NumericCommand::$variant(command)
                }
            }
        )*
    };
}

impl_float_value! {
    f32 => F32, "Float Property";
    f64 => F64, "Double Property";
}

impl NumericValue for Decimal {
    const MIN: Self = Decimal::MIN;
    const MAX: Self = Decimal::MAX;
    const ZERO: Self = Decimal::ZERO;
    const ONE: Self = Decimal::ONE;
    const TYPE_NAME: &'static str = "Decimal Property";
    const IS_FLOAT: bool = true;

    fn parse_text(text: &str) -> Option<Self> {
        text.trim().parse::<Decimal>().ok()
    }

    fn try_add(self, rhs: Self) -> Option<Self> {
        self.checked_add(rhs)
    }

    fn try_sub(self, rhs: Self) -> Option<Self> {
        self.checked_sub(rhs)
    }

    fn round_half_away(self, digits: u32) -> Self {
        self.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero)
    }

    fn into_command(command: NumericPropertyCommand<Self>) -> NumericCommand {
        NumericCommand::Decimal(command)
    }
}

/// Input constraints resolved from a member's attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NumericSettings<T> {
    pub(crate) range: Option<(T, T)>,
    pub(crate) increment: T,
    pub(crate) digits: u32,
}

impl<T: NumericValue> Default for NumericSettings<T> {
    fn default() -> Self {
        Self {
            range: None,
            increment: T::ONE,
            digits: 0,
        }
    }
}

pub struct NumericPropertyCommand<T> {
    meta: CommandMeta,
    flags: CommandFlags,
    access: PropertyAccess<T>,
    settings: NumericSettings<T>,
}

impl<T: NumericValue> NumericPropertyCommand<T> {
    pub(crate) fn new(
        meta: CommandMeta,
        access: PropertyAccess<T>,
        settings: NumericSettings<T>,
    ) -> Self {
        let command = Self {
            meta,
            flags: CommandFlags::default(),
            access,
            settings,
        };
        if let Some(saved) = command.access.stored_value() {
            command.set_value(saved);
        }
        command
    }

    pub fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    pub fn has_input_range(&self) -> bool {
        self.settings.range.is_some()
    }

    pub fn input_range_min(&self) -> T {
        self.settings.range.map_or(T::MIN, |(min, _)| min)
    }

    pub fn input_range_max(&self) -> T {
        self.settings.range.map_or(T::MAX, |(_, max)| max)
    }

    pub fn increment(&self) -> T {
        self.settings.increment
    }

    /// Fractional digits kept after stepping; always 0 for integers.
    pub fn digits(&self) -> u32 {
        self.settings.digits
    }

    pub fn clamp(&self, value: T) -> T {
        let min = self.input_range_min();
        let max = self.input_range_max();
        if value < min {
            min
        } else if value > max {
            max
        } else {
            value
        }
    }

    pub fn get_value(&self) -> T {
        self.clamp(self.access.get())
    }

    pub fn set_value(&self, value: T) {
        self.access.set(self.clamp(value));
    }

    pub fn saves_on_update(&self) -> bool {
        self.access.saves_on_update()
    }

    /// Lenient text input: `""`, `"-"` and `"."` read as zero, garbage saturates by sign.
    pub fn from_string(&self, text: &str) -> T {
        if matches!(text, "" | "-" | ".") {
            return T::ZERO;
        }
        match T::parse_text(text) {
            Some(value) => value,
            None if text.starts_with('-') => T::MIN,
            None => T::MAX,
        }
    }

    pub fn is_equal_or_under_min(&self, value: T) -> bool {
        value <= self.input_range_min()
    }

    pub fn is_equal_or_over_max(&self, value: T) -> bool {
        value >= self.input_range_max()
    }

    /// Steps `value` by the increment `|magnification|` times toward the sign of
    /// `magnification`, stopping at the range boundary without overflowing `T`.
    pub fn validate_value_for_fluctuation(&self, value: T, magnification: i32) -> T {
        let min = self.input_range_min();
        let max = self.input_range_max();
        let increment = self.settings.increment;
        let mut value = self.clamp(value);

        if magnification > 0 {
            for _ in 0..magnification.unsigned_abs() {
                if let Some(distance) = max.try_sub(value) {
                    if distance < increment {
                        return max;
                    }
                }
                value = value.try_add(increment).unwrap_or(max);
            }
        } else if magnification < 0 {
            for _ in 0..magnification.unsigned_abs() {
                if let Some(distance) = value.try_sub(min) {
                    if distance < increment {
                        return min;
                    }
                }
                value = value.try_sub(increment).unwrap_or(min);
            }
        }

        self.clamp(self.clamp(value).round_half_away(self.settings.digits))
    }

    /// Parses `text` leniently and stores the clamped result.
    pub fn set_from_string(&self, text: &str) {
        self.set_value(self.from_string(text));
    }

    /// Moves the live value `magnification` increments and stores it.
    pub fn fluctuate(&self, magnification: i32) {
        let next = self.validate_value_for_fluctuation(self.get_value(), magnification);
        self.set_value(next);
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
        context.push(("Value", self.get_value().to_string()));
        context.push(("SaveOnUpdate", self.saves_on_update().to_string()));
        let range = match self.settings.range {
            Some((min, max)) => format!("{min} ~ {max}"),
            None => "None".to_string(),
        };
        context.push(("InputRange", range));
        context.push(("Increment", self.settings.increment.to_string()));
        context
    }
}

/// One variant per supported primitive so renderers can pick a widget without downcasting.
pub enum NumericCommand {
    I8(NumericPropertyCommand<i8>),
    U8(NumericPropertyCommand<u8>),
    I16(NumericPropertyCommand<i16>),
    U16(NumericPropertyCommand<u16>),
    I32(NumericPropertyCommand<i32>),
    U32(NumericPropertyCommand<u32>),
    I64(NumericPropertyCommand<i64>),
    U64(NumericPropertyCommand<u64>),
    F32(NumericPropertyCommand<f32>),
    F64(NumericPropertyCommand<f64>),
    Decimal(NumericPropertyCommand<Decimal>),
}

macro_rules! each_numeric {
    ($value:expr, $command:ident => $body:expr) => {
        match $value {
            NumericCommand::I8($command) => $body,
            NumericCommand::U8($command) => $body,
            NumericCommand::I16($command) => $body,
            NumericCommand::U16($command) => $body,
            NumericCommand::I32($command) => $body,
            NumericCommand::U32($command) => $body,
            NumericCommand::I64($command) => $body,
            NumericCommand::U64($command) => $body,
            NumericCommand::F32($command) => $body,
            NumericCommand::F64($command) => $body,
            NumericCommand::Decimal($command) => $body,
        }
    };
}

impl NumericCommand {
    pub fn meta(&self) -> &CommandMeta {
        each_numeric!(self, command => command.meta())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            NumericCommand::I8(_) => i8::TYPE_NAME,
            NumericCommand::U8(_) => u8::TYPE_NAME,
            NumericCommand::I16(_) => i16::TYPE_NAME,
            NumericCommand::U16(_) => u16::TYPE_NAME,
            NumericCommand::I32(_) => i32::TYPE_NAME,
            NumericCommand::U32(_) => u32::TYPE_NAME,
            NumericCommand::I64(_) => i64::TYPE_NAME,
            NumericCommand::U64(_) => u64::TYPE_NAME,
            NumericCommand::F32(_) => f32::TYPE_NAME,
            NumericCommand::F64(_) => f64::TYPE_NAME,
            NumericCommand::Decimal(_) => Decimal::TYPE_NAME,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(
            self,
            NumericCommand::F32(_) | NumericCommand::F64(_) | NumericCommand::Decimal(_)
        )
    }

    pub fn value_string(&self) -> String {
        each_numeric!(self, command => command.get_value().to_string())
    }

    pub fn set_from_string(&self, text: &str) {
        each_numeric!(self, command => command.set_from_string(text))
    }

    pub fn fluctuate(&self, magnification: i32) {
        each_numeric!(self, command => command.fluctuate(magnification))
    }

    pub fn is_interactable(&self) -> bool {
        each_numeric!(self, command => command.is_interactable())
    }

    pub fn set_interactable(&self, value: bool) {
        each_numeric!(self, command => command.set_interactable(value))
    }

    pub fn is_visible(&self) -> bool {
        each_numeric!(self, command => command.is_visible())
    }

    pub fn set_visible(&self, value: bool) {
        each_numeric!(self, command => command.set_visible(value))
    }

    pub(crate) fn extend_detail_context(&self, context: DetailContext) -> DetailContext {
        each_numeric!(self, command => command.extend_detail_context(context))
    }
}
