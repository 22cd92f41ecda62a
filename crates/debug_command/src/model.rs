use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, error, info, warn};

use crate::command::Command;
use crate::definition::CommandDefinition;
use crate::prefs::{keys, PrefsHandle};
use crate::registry::CommandRegistry;
use crate::runner::TaskRunner;

/// Runner action key for the auto-refresh timer.
pub const AUTO_REFRESH_ACTION: &str = "DebugCommandModelOnUpdate";
pub const AUTO_REFRESH_INTERVAL_SECONDS: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedCommandState {
    pub is_interactable: bool,
    pub is_visible: bool,
}

impl Default for TaggedCommandState {
    fn default() -> Self {
        Self {
            is_interactable: true,
            is_visible: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct CommandGroupData {
    pub is_collapsed: bool,
    order: Option<i32>,
    commands: Vec<Rc<Command>>,
}

impl CommandGroupData {
    pub fn order(&self) -> Option<i32> {
        self.order
    }

    pub fn commands(&self) -> &[Rc<Command>] {
        &self.commands
    }
}

#[derive(Debug)]
pub struct CommandCategory {
    display_name: String,
    grouped_commands: IndexMap<String, CommandGroupData>,
    tagged_commands: IndexMap<String, CommandGroupData>,
    tag_states: IndexMap<String, TaggedCommandState>,
    instance: Option<Rc<dyn Any>>,
}

impl CommandCategory {
    fn build(commands: Vec<Command>, display_name: String, instance: Option<Rc<dyn Any>>) -> Self {
        let mut grouped_commands: IndexMap<String, CommandGroupData> = IndexMap::new();
        let mut tagged_commands: IndexMap<String, CommandGroupData> = IndexMap::new();
        let mut tag_states: IndexMap<String, TaggedCommandState> = IndexMap::new();

        for command in commands {
            let command = Rc::new(command);

            let group = grouped_commands
                .entry(command.group_name().to_string())
                .or_default();
            group.commands.push(command.clone());
            if let Some(order) = command.group_order() {
                group.order = Some(order);
            }

            if let Some(tag) = command.tag_name().filter(|tag| !tag.is_empty()) {
                tagged_commands
                    .entry(tag.to_string())
                    .or_default()
                    .commands
                    .push(command.clone());
                tag_states.entry(tag.to_string()).or_default();
            }
        }

        for group in grouped_commands.values_mut() {
            group.commands.sort_by_key(|command| command.order());
        }
        grouped_commands.sort_by(|_, left, _, right| {
            (left.order.is_none(), left.order).cmp(&(right.order.is_none(), right.order))
        });

        Self {
            display_name,
            grouped_commands,
            tagged_commands,
            tag_states,
            instance,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn groups(&self) -> &IndexMap<String, CommandGroupData> {
        &self.grouped_commands
    }

    pub fn tag_state(&self, tag: &str) -> Option<TaggedCommandState> {
        self.tag_states.get(tag).copied()
    }
}

/// One property value re-read during a refresh pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySnapshot {
    pub category: String,
    pub group: String,
    pub display_name: String,
    pub value: String,
}

type RefreshListener = Box<dyn FnMut()>;
type StateListener = Box<dyn FnMut(bool, bool)>;

#[derive(Default)]
struct Listeners {
    auto_refresh: Vec<RefreshListener>,
    state_changed: Vec<StateListener>,
}

/// Timer and listeners shared with the runner action while auto-refresh is on.
#[derive(Default)]
struct AutoRefresh {
    timer: Cell<f32>,
    listeners: RefCell<Listeners>,
}

impl AutoRefresh {
    fn advance(&self, delta_seconds: f32) {
        let elapsed = self.timer.get() + delta_seconds;
        if elapsed > AUTO_REFRESH_INTERVAL_SECONDS {
            self.fire_auto_refresh();
            self.timer.set(0.0);
        } else {
            self.timer.set(elapsed);
        }
    }

    // Listeners are taken out while running so they may register more listeners.
    fn fire_auto_refresh(&self) {
        let mut listeners = std::mem::take(&mut self.listeners.borrow_mut().auto_refresh);
        for listener in listeners.iter_mut() {
            listener();
        }
        let mut slot = self.listeners.borrow_mut();
        listeners.append(&mut slot.auto_refresh);
        slot.auto_refresh = listeners;
    }

    fn fire_state_changed(&self, is_auto_refresh: bool, is_floating_window: bool) {
        let mut listeners = std::mem::take(&mut self.listeners.borrow_mut().state_changed);
        for listener in listeners.iter_mut() {
            listener(is_auto_refresh, is_floating_window);
        }
        let mut slot = self.listeners.borrow_mut();
        listeners.append(&mut slot.state_changed);
        slot.state_changed = listeners;
    }
}

/// Owns every built category and the tag-level overrides on them.
pub struct CommandModel {
    categories: IndexMap<String, CommandCategory>,
    prefs: PrefsHandle,
    should_refresh_first: bool,
    auto_refresh: Rc<AutoRefresh>,
}

impl fmt::Debug for CommandModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandModel")
            .field("categories", &self.categories.keys().collect::<Vec<_>>())
            .field("should_refresh_first", &self.should_refresh_first)
            .field("auto_refresh_timer", &self.auto_refresh.timer.get())
            .finish()
    }
}

impl CommandModel {
    pub fn new(prefs: PrefsHandle) -> Self {
        Self {
            categories: IndexMap::new(),
            prefs,
            should_refresh_first: true,
            auto_refresh: Rc::new(AutoRefresh::default()),
        }
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.categories.keys().map(String::as_str).collect()
    }

    pub fn category_display_names(&self) -> Vec<&str> {
        self.categories
            .values()
            .map(|category| category.display_name.as_str())
            .collect()
    }

    pub fn category(&self, name: &str) -> Option<&CommandCategory> {
        self.categories.get(name)
    }

    pub fn groups_for_category(&self, name: &str) -> Option<&IndexMap<String, CommandGroupData>> {
        self.categories
            .get(name)
            .map(|category| &category.grouped_commands)
    }

    pub fn groups_for_category_mut(
        &mut self,
        name: &str,
    ) -> Option<&mut IndexMap<String, CommandGroupData>> {
        self.categories
            .get_mut(name)
            .map(|category| &mut category.grouped_commands)
    }

    /// Instance backing a declared category; `None` for dynamic categories.
    pub fn instance(&self, name: &str) -> Option<Rc<dyn Any>> {
        self.categories
            .get(name)
            .and_then(|category| category.instance.clone())
    }

    pub fn instance_as<T: Any>(&self, name: &str) -> Option<Rc<T>> {
        self.instance(name)
            .and_then(|instance| instance.downcast::<T>().ok())
    }

    pub fn tagged_commands(&self, category: &str, tag: &str) -> Option<&[Rc<Command>]> {
        self.categories
            .get(category)
            .and_then(|category| category.tagged_commands.get(tag))
            .map(CommandGroupData::commands)
    }

    pub fn find_command(&self, category: &str, display_name: &str) -> Option<Rc<Command>> {
        self.categories
            .get(category)?
            .grouped_commands
            .values()
            .flat_map(|group| group.commands.iter())
            .find(|command| command.display_name() == display_name)
            .cloned()
    }

    /// First full build; later calls do nothing.
    pub fn refresh_category_first(&mut self, registry: &mut CommandRegistry) {
        if !self.should_refresh_first {
            return;
        }
        self.should_refresh_first = false;
        self.rebuild(registry);
    }

    /// Registry change handler. Previously built declared categories are kept as they are.
    pub fn on_add_category(&mut self, registry: &mut CommandRegistry) {
        self.rebuild(registry);
    }

    fn rebuild(&mut self, registry: &mut CommandRegistry) {
        let mut previous = std::mem::take(&mut self.categories);
        let prefs = self.prefs.clone();

        for declaration in registry.category_types() {
            let name = &declaration.name;
            if !declaration.category_type.is_constructible() {
                warn!(
                    category = %name,
                    kind = declaration.category_type.type_name(),
                    "debug category type has no default constructor; skipped"
                );
                continue;
            }
            if let Some(existing) = previous.shift_remove(name) {
                self.categories.insert(name.clone(), existing);
                continue;
            }
            let Some((instance, definitions)) = declaration.category_type.instantiate(name) else {
                continue;
            };

            let commands = definitions
                .iter()
                .filter_map(|definition| {
                    let save_key = definition
                        .saves_on_update()
                        .then(|| keys::property_key(name, definition.display_name()));
                    definition.build(save_key, &prefs)
                })
                .collect::<Vec<_>>();
            debug!(category = %name, commands = commands.len(), "category built");
            self.categories.insert(
                name.clone(),
                CommandCategory::build(commands, declaration.display_name.clone(), Some(instance)),
            );
        }

        let mut duplicated = Vec::new();
        for (name, definitions) in registry.command_definitions() {
            if self.categories.contains_key(name) {
                warn!(category = %name, "category name is already registered; dynamic commands dropped");
                duplicated.push(name.clone());
                continue;
            }
            let commands = definitions
                .values()
                .filter_map(|definition: &CommandDefinition| definition.create_command(&prefs))
                .collect::<Vec<_>>();
            self.categories.insert(
                name.clone(),
                CommandCategory::build(commands, name.clone(), None),
            );
        }

        for name in duplicated {
            registry.remove_category(&name);
        }
    }

    fn tag_entry(&mut self, category: &str, tag: &str) -> Option<&mut CommandCategory> {
        let found = self
            .categories
            .get_mut(category)
            .filter(|entry| entry.tag_states.contains_key(tag));
        if found.is_none() {
            error!(category, tag, "tag does not exist in the category");
        }
        found
    }

    pub fn set_interactable(&mut self, category: &str, tag: &str, is_interactable: bool) {
        let Some(entry) = self.tag_entry(category, tag) else {
            return;
        };
        if let Some(state) = entry.tag_states.get_mut(tag) {
            state.is_interactable = is_interactable;
        }
        if let Some(group) = entry.tagged_commands.get(tag) {
            for command in &group.commands {
                command.set_interactable(is_interactable);
            }
        }
    }

    pub fn is_interactable(&self, category: &str, tag: &str) -> bool {
        match self.tag_state(category, tag) {
            Some(state) => state.is_interactable,
            None => false,
        }
    }

    pub fn set_visible(&mut self, category: &str, tag: &str, is_visible: bool) {
        let Some(entry) = self.tag_entry(category, tag) else {
            return;
        };
        if let Some(state) = entry.tag_states.get_mut(tag) {
            state.is_visible = is_visible;
        }
        if let Some(group) = entry.tagged_commands.get(tag) {
            for command in &group.commands {
                command.set_visible(is_visible);
            }
        }
    }

    pub fn is_visible(&self, category: &str, tag: &str) -> bool {
        match self.tag_state(category, tag) {
            Some(state) => state.is_visible,
            None => false,
        }
    }

    fn tag_state(&self, category: &str, tag: &str) -> Option<TaggedCommandState> {
        let state = self
            .categories
            .get(category)
            .and_then(|entry| entry.tag_state(tag));
        if state.is_none() {
            error!(category, tag, "tag does not exist in the category");
        }
        state
    }

    pub fn is_auto_refresh(&self) -> bool {
        self.prefs.get_bool(keys::AUTO_REFRESH, false)
    }

    pub fn update_auto_refresh(
        &mut self,
        is_auto_refresh: bool,
        is_floating_window: bool,
        runner: &mut TaskRunner,
    ) {
        self.prefs.set_bool(keys::AUTO_REFRESH, is_auto_refresh);
        self.handle_on_update(is_auto_refresh, runner);
        info!(is_auto_refresh, is_floating_window, "auto refresh toggled");
        self.auto_refresh
            .fire_state_changed(is_auto_refresh, is_floating_window);
    }

    fn handle_on_update(&self, is_auto_refresh: bool, runner: &mut TaskRunner) {
        if is_auto_refresh {
            if runner.contains_action(AUTO_REFRESH_ACTION) {
                return;
            }
            let auto_refresh = self.auto_refresh.clone();
            runner.set_action(
                AUTO_REFRESH_ACTION,
                Box::new(move |delta_seconds| auto_refresh.advance(delta_seconds)),
            );
        } else {
            self.auto_refresh.timer.set(0.0);
            runner.delete_action(AUTO_REFRESH_ACTION);
        }
    }

    pub fn on_auto_refresh(&self, listener: impl FnMut() + 'static) {
        self.auto_refresh
            .listeners
            .borrow_mut()
            .auto_refresh
            .push(Box::new(listener));
    }

    /// Called with `(is_auto_refresh, is_floating_window)` after every toggle.
    pub fn on_auto_refresh_state_changed(&self, listener: impl FnMut(bool, bool) + 'static) {
        self.auto_refresh
            .listeners
            .borrow_mut()
            .state_changed
            .push(Box::new(listener));
    }

    /// Re-reads every live property value in display order.
    pub fn refresh_properties(&self) -> Vec<PropertySnapshot> {
        let mut snapshots = Vec::new();
        for (category_name, category) in &self.categories {
            for (group_name, group) in &category.grouped_commands {
                for command in &group.commands {
                    if let Some(value) = command.value_string() {
                        snapshots.push(PropertySnapshot {
                            category: category_name.clone(),
                            group: group_name.clone(),
                            display_name: command.display_name().to_string(),
                            value,
                        });
                    }
                }
            }
        }
        snapshots
    }

    /// Drops every category, stops the timer and forgets listeners.
    pub fn dispose(&mut self, runner: &mut TaskRunner) {
        self.categories.clear();
        self.should_refresh_first = true;
        self.handle_on_update(false, runner);
        *self.auto_refresh.listeners.borrow_mut() = Listeners::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{CategoryMembers, CategoryType, CommandAttribute, DebugCategory};

    #[derive(Default)]
    struct Player {
        speed: Cell<i32>,
    }

    impl DebugCategory for Player {
        fn declare(self: Rc<Self>, members: &mut CategoryMembers) {
            let this = self.clone();
            members
                .mutable("Speed", move || this.speed.get(), {
                    let this = self.clone();
                    move |value| this.speed.set(value)
                })
                .attr(CommandAttribute::ordered_group("Movement", 1))
                .attr(CommandAttribute::tag("cheat"))
                .attr(CommandAttribute::SaveOnUpdate);
            members
                .method("Kill", || Ok(()))
                .attr(CommandAttribute::tag("cheat"));
        }
    }

    #[derive(Default)]
    struct World;

    impl DebugCategory for World {
        fn declare(self: Rc<Self>, members: &mut CategoryMembers) {
            members.get_only("Time", || 12);
        }
    }

    fn model_with_player() -> (CommandModel, CommandRegistry) {
        let mut registry = CommandRegistry::new();
        registry.add_category::<Player>("Player", 0, "");
        let mut model = CommandModel::new(PrefsHandle::in_memory());
        model.refresh_category_first(&mut registry);
        (model, registry)
    }

    #[test]
    fn grouping_sorts_groups_by_order_and_commands_within_groups() {
        let mut registry = CommandRegistry::new();
        registry.add_command(
            CommandDefinition::method("Sort", "A", || Ok(()))
                .with(CommandAttribute::Order(5))
                .with(CommandAttribute::ordered_group("X", 1)),
        );
        registry.add_command(
            CommandDefinition::method("Sort", "B", || Ok(()))
                .with(CommandAttribute::Order(1))
                .with(CommandAttribute::group("X")),
        );
        registry.add_command(
            CommandDefinition::method("Sort", "C", || Ok(()))
                .with(CommandAttribute::Order(3))
                .with(CommandAttribute::ordered_group("Y", 0)),
        );
        registry.add_command(CommandDefinition::method("Sort", "D", || Ok(())));
        let mut model = CommandModel::new(PrefsHandle::in_memory());
        model.on_add_category(&mut registry);

        let groups = model.groups_for_category("Sort").expect("built");
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["Y", "X", "Others"]);
        let x = groups["X"]
            .commands()
            .iter()
            .map(|command| command.display_name())
            .collect::<Vec<_>>();
        assert_eq!(x, vec!["B", "A"]);
        assert_eq!(groups["X"].order(), Some(1));
    }

    #[test]
    fn group_order_is_last_write_wins() {
        let mut registry = CommandRegistry::new();
        registry.add_command(
            CommandDefinition::method("Tools", "First", || Ok(()))
                .with(CommandAttribute::ordered_group("G", 4)),
        );
        registry.add_command(
            CommandDefinition::method("Tools", "Second", || Ok(()))
                .with(CommandAttribute::ordered_group("G", 9)),
        );
        let mut model = CommandModel::new(PrefsHandle::in_memory());
        model.on_add_category(&mut registry);

        assert_eq!(model.groups_for_category("Tools").expect("built")["G"].order(), Some(9));
    }

    #[test]
    fn rebuild_keeps_existing_category_state() {
        let (mut model, mut registry) = model_with_player();
        model
            .groups_for_category_mut("Player")
            .and_then(|groups| groups.get_mut("Movement"))
            .expect("movement group")
            .is_collapsed = true;
        model.set_interactable("Player", "cheat", false);
        let before = model.find_command("Player", "Speed").expect("speed");

        registry.add_category::<World>("World", 1, "");
        model.on_add_category(&mut registry);

        assert_eq!(model.category_names(), vec!["Player", "World"]);
        let groups = model.groups_for_category("Player").expect("player");
        assert!(groups["Movement"].is_collapsed);
        assert!(!model.is_interactable("Player", "cheat"));
        let after = model.find_command("Player", "Speed").expect("speed");
        assert!(Rc::ptr_eq(&before, &after));
        assert!(!after.is_interactable());
    }

    #[test]
    fn dynamic_category_colliding_with_declared_one_is_rolled_back() {
        let (mut model, mut registry) = model_with_player();
        registry.add_command(CommandDefinition::method("Player", "Intruder", || Ok(())));
        model.on_add_category(&mut registry);

        assert!(!registry.command_definitions().contains_key("Player"));
        assert!(model.find_command("Player", "Intruder").is_none());
        assert!(model.find_command("Player", "Speed").is_some());
        assert!(model.instance_as::<Player>("Player").is_some());
    }

    #[test]
    fn category_without_constructor_is_skipped() {
        struct NeedsArgs;
        let mut registry = CommandRegistry::new();
        registry.add_category_type(CategoryType::without_constructor::<NeedsArgs>(), "", 0, "");
        registry.add_category::<World>("", 1, "Clock");
        let mut model = CommandModel::new(PrefsHandle::in_memory());
        model.on_add_category(&mut registry);

        assert_eq!(model.category_names(), vec!["World"]);
        assert_eq!(model.category_display_names(), vec!["Clock"]);
    }

    #[test]
    fn unknown_tag_reports_false_and_changes_nothing() {
        let (mut model, _registry) = model_with_player();
        assert!(!model.is_interactable("Player", "NoSuchTag"));
        assert!(!model.is_visible("Nowhere", "cheat"));
        model.set_visible("Player", "NoSuchTag", false);
        assert!(model.is_visible("Player", "cheat"));
    }

    #[test]
    fn tag_toggles_reach_every_tagged_command() {
        let (mut model, _registry) = model_with_player();
        model.set_visible("Player", "cheat", false);

        let tagged = model.tagged_commands("Player", "cheat").expect("tag");
        assert_eq!(tagged.len(), 2);
        assert!(tagged.iter().all(|command| !command.is_visible()));
        assert!(!model.is_visible("Player", "cheat"));
    }

    #[test]
    fn declared_member_with_save_on_update_persists_under_category_key() {
        let prefs = PrefsHandle::in_memory();
        prefs.set_string("DebugCommandProperty_Player_Speed", "42");
        let mut registry = CommandRegistry::new();
        registry.add_category::<Player>("Player", 0, "");
        let mut model = CommandModel::new(prefs.clone());
        model.refresh_category_first(&mut registry);

        let player = model.instance_as::<Player>("Player").expect("instance");
        assert_eq!(player.speed.get(), 42);

        let Some(command) = model.find_command("Player", "Speed") else {
            panic!("speed command missing");
        };
        let Command::Numeric(numeric) = command.as_ref() else {
            panic!("expected numeric command");
        };
        numeric.set_from_string("7");
        assert_eq!(prefs.get_string("DebugCommandProperty_Player_Speed", ""), "7");
    }

    #[test]
    fn refresh_category_first_builds_once() {
        let (mut model, mut registry) = model_with_player();
        let before = model.find_command("Player", "Speed").expect("speed");
        model.refresh_category_first(&mut registry);
        let after = model.find_command("Player", "Speed").expect("speed");
        assert!(Rc::ptr_eq(&before, &after));
    }

    #[test]
    fn auto_refresh_fires_after_interval_and_stops_when_disabled() {
        let (mut model, _registry) = model_with_player();
        let mut runner = TaskRunner::new();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        model.on_auto_refresh(move || counter.set(counter.get() + 1));
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        model.on_auto_refresh_state_changed(move |on, floating| sink.borrow_mut().push((on, floating)));

        model.update_auto_refresh(true, true, &mut runner);
        assert!(model.is_auto_refresh());
        assert!(runner.contains_action(AUTO_REFRESH_ACTION));

        runner.tick(0.6);
        assert_eq!(fired.get(), 0);
        runner.tick(0.6);
        assert_eq!(fired.get(), 1);
        runner.tick(0.6);
        assert_eq!(fired.get(), 1);

        model.update_auto_refresh(false, false, &mut runner);
        assert!(!runner.contains_action(AUTO_REFRESH_ACTION));
        runner.tick(5.0);
        assert_eq!(fired.get(), 1);
        assert_eq!(*changes.borrow(), vec![(true, true), (false, false)]);
    }

    #[test]
    fn refresh_properties_reads_current_values() {
        let (model, _registry) = model_with_player();
        let player = model.instance_as::<Player>("Player").expect("instance");
        player.speed.set(9);

        let snapshots = model.refresh_properties();
        assert_eq!(
            snapshots,
            vec![PropertySnapshot {
                category: "Player".to_string(),
                group: "Movement".to_string(),
                display_name: "Speed".to_string(),
                value: "9".to_string(),
            }]
        );
    }

    #[test]
    fn dispose_clears_categories_and_timer() {
        let (mut model, _registry) = model_with_player();
        let mut runner = TaskRunner::new();
        model.update_auto_refresh(true, false, &mut runner);

        model.dispose(&mut runner);
        assert!(model.category_names().is_empty());
        assert!(!runner.contains_action(AUTO_REFRESH_ACTION));
    }
}
