pub mod command;
mod definition;
mod factory;
mod model;
pub mod prefs;
mod registry;
mod runner;
mod session;
mod view_state;

pub use command::{
    AsyncState, BoolPropertyCommand, CharPropertyCommand, Command, CommandError, CommandMeta,
    CoroutineCommand, DetailContext, EnumPropertyCommand, GetOnlyPropertyCommand,
    HandleMethodCommand, HostError, MethodCommand, MutablePropertyCommand, NumericCommand,
    NumericPropertyCommand, NumericValue, StringPropertyCommand, DEFAULT_GROUP_NAME,
    DEFAULT_ORDER,
};
pub use definition::{
    CategoryMembers, CategoryType, CommandAttribute, CommandDefinition, DebugCategory, DebugEnum,
    PropertyValue,
};
pub use factory::BuildContext;
pub use model::{
    CommandCategory, CommandGroupData, CommandModel, PropertySnapshot, TaggedCommandState,
    AUTO_REFRESH_ACTION, AUTO_REFRESH_INTERVAL_SECONDS,
};
pub use prefs::{PrefValue, PrefsError, PrefsHandle, PrefsStore};
pub use registry::{CategoryDeclaration, CommandRegistry, DefinitionId};
pub use runner::{
    CompletionCallback, CoroutineBody, MethodHandle, TaskFailure, TaskRunner, UpdateAction,
};
pub use rust_decimal::Decimal;
pub use session::{DebugSession, SessionError, TickReport};
pub use view_state::{FloatingGroupFilter, LastCategory};
