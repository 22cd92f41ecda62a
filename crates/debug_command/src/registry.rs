use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use crate::definition::{CategoryType, CommandDefinition, DebugCategory};
use crate::prefs::{keys, PrefsHandle};

/// A declared category as registered: final name, display name, order and type.
#[derive(Debug, Clone)]
pub struct CategoryDeclaration {
    pub name: String,
    pub display_name: String,
    pub order: i32,
    pub category_type: CategoryType,
}

/// Identifies one dynamically added definition for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefinitionId(u64);

/// Where commands come from: declared category types plus dynamically added definitions.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    declarations: Vec<CategoryDeclaration>,
    suffix_counters: HashMap<String, u32>,
    definitions: IndexMap<String, IndexMap<DefinitionId, CommandDefinition>>,
    next_definition_id: u64,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` as a category and returns the name it was stored under.
    pub fn add_category<T: DebugCategory + Default>(
        &mut self,
        name: &str,
        order: i32,
        display_name: &str,
    ) -> String {
        self.add_category_type(CategoryType::of::<T>(), name, order, display_name)
    }

    /// Empty `name` falls back to the type's short name; a taken name gets a `-N` suffix.
    pub fn add_category_type(
        &mut self,
        category_type: CategoryType,
        name: &str,
        order: i32,
        display_name: &str,
    ) -> String {
        let base_name = if name.is_empty() {
            category_type.short_name().to_string()
        } else {
            name.to_string()
        };
        let name = self.deduplicate(base_name);
        let display_name = if display_name.is_empty() {
            name.clone()
        } else {
            display_name.to_string()
        };

        debug!(category = %name, order, kind = category_type.type_name(), "category declared");
        self.declarations.push(CategoryDeclaration {
            name: name.clone(),
            display_name,
            order,
            category_type,
        });
        name
    }

    fn deduplicate(&mut self, name: String) -> String {
        if !self.has_declaration(&name) {
            return name;
        }
        let mut counter = self.suffix_counters.get(&name).copied().unwrap_or(0);
        let candidate = loop {
            counter += 1;
            let candidate = format!("{name}-{counter}");
            if !self.has_declaration(&candidate) {
                break candidate;
            }
        };
        self.suffix_counters.insert(name, counter);
        candidate
    }

    pub fn has_declaration(&self, name: &str) -> bool {
        self.declarations
            .iter()
            .any(|declaration| declaration.name == name)
    }

    /// Declarations sorted by order; ties keep registration order.
    pub fn category_types(&self) -> Vec<&CategoryDeclaration> {
        let mut declarations = self.declarations.iter().collect::<Vec<_>>();
        declarations.sort_by_key(|declaration| declaration.order);
        declarations
    }

    pub fn declaration(&self, name: &str) -> Option<&CategoryDeclaration> {
        self.declarations
            .iter()
            .find(|declaration| declaration.name == name)
    }

    pub fn add_command(&mut self, definition: CommandDefinition) -> DefinitionId {
        let id = DefinitionId(self.next_definition_id);
        self.next_definition_id += 1;
        debug!(
            category = definition.category_name(),
            command = definition.display_name(),
            "dynamic command added"
        );
        self.definitions
            .entry(definition.category_name().to_string())
            .or_default()
            .insert(id, definition);
        id
    }

    /// Removes one definition; a category left empty disappears with it.
    pub fn remove_command(&mut self, id: DefinitionId) -> bool {
        let Some(category_name) = self
            .definitions
            .iter()
            .find(|(_, definitions)| definitions.contains_key(&id))
            .map(|(name, _)| name.clone())
        else {
            return false;
        };

        if let Some(definitions) = self.definitions.get_mut(&category_name) {
            definitions.shift_remove(&id);
            if definitions.is_empty() {
                self.definitions.shift_remove(&category_name);
            }
        }
        true
    }

    pub fn remove_category(&mut self, category_name: &str) -> bool {
        self.definitions.shift_remove(category_name).is_some()
    }

    pub fn command_definitions(&self) -> &IndexMap<String, IndexMap<DefinitionId, CommandDefinition>> {
        &self.definitions
    }

    /// Clears everything. The registry can be used again afterwards.
    pub fn dispose(&mut self) {
        self.declarations.clear();
        self.suffix_counters.clear();
        self.definitions.clear();
    }

    pub fn save_property_key(category_name: &str, property_name: &str) -> String {
        keys::property_key(category_name, property_name)
    }

    /// Returns how many saved values were removed.
    pub fn delete_all_saved_properties(prefs: &PrefsHandle) -> usize {
        delete_keys(prefs, &format!("{}{}", keys::PROPERTY_PREFIX, keys::DELIMITER))
    }

    /// Only keys of this exact category go; `Player` leaves `PlayerTwo` alone.
    pub fn delete_all_properties_in_category(prefs: &PrefsHandle, category_name: &str) -> usize {
        delete_keys(prefs, &keys::category_prefix(category_name))
    }

    pub fn delete_saved_property(
        prefs: &PrefsHandle,
        category_name: &str,
        property_name: &str,
    ) -> bool {
        prefs.delete(&keys::property_key(category_name, property_name))
    }
}

fn delete_keys(prefs: &PrefsHandle, prefix: &str) -> usize {
    let targets = prefs.keys_with_prefix(prefix);
    for key in &targets {
        prefs.delete(key);
    }
    targets.len()
}
