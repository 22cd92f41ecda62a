use std::cell::{Cell, RefCell};
use std::rc::Rc;

use debug_command::{
    impl_debug_enum, CategoryMembers, CommandAttribute, CommandDefinition, CoroutineBody,
    DebugCategory, DebugSession, Decimal, DefinitionId, HostError, MethodHandle,
};
use tracing::info;

pub(crate) const PLAYER_CATEGORY: &str = "Player";
pub(crate) const WORLD_CATEGORY: &str = "World";
pub(crate) const NETWORK_CATEGORY: &str = "Network";
const CHEATS_TAG: &str = "Cheats";
const MAX_LIVES: u8 = 9;
const RESPAWN_FRAMES: u32 = 3;
const SNAPSHOT_FRAMES: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderQuality {
    Low,
    Medium,
    High,
}

impl_debug_enum!(RenderQuality { Low, Medium, High });

#[derive(Debug)]
pub(crate) struct PlayerCategory {
    god_mode: Cell<bool>,
    move_speed: Cell<f32>,
    lives: Cell<u8>,
    gold: Cell<Decimal>,
    nickname: RefCell<String>,
    grade: Cell<char>,
    position: Cell<(f32, f32)>,
}

impl Default for PlayerCategory {
    fn default() -> Self {
        Self {
            god_mode: Cell::new(false),
            move_speed: Cell::new(5.0),
            lives: Cell::new(3),
            gold: Cell::new(Decimal::new(1050, 2)),
            nickname: RefCell::new("player".to_string()),
            grade: Cell::new('C'),
            position: Cell::new((0.0, 0.0)),
        }
    }
}

impl PlayerCategory {
    pub(crate) fn move_speed(&self) -> f32 {
        self.move_speed.get()
    }

    pub(crate) fn lives(&self) -> u8 {
        self.lives.get()
    }

    pub(crate) fn gold(&self) -> Decimal {
        self.gold.get()
    }
}

impl DebugCategory for PlayerCategory {
    fn declare(self: Rc<Self>, members: &mut CategoryMembers) {
        let (get, set) = (self.clone(), self.clone());
        members
            .mutable(
                "GodMode",
                move || get.god_mode.get(),
                move |value: bool| set.god_mode.set(value),
            )
            .attr(CommandAttribute::tag(CHEATS_TAG))
            .attr(CommandAttribute::SaveOnUpdate);

        let (get, set) = (self.clone(), self.clone());
        members
            .mutable(
                "MoveSpeed",
                move || get.move_speed.get(),
                move |value: f32| set.move_speed.set(value),
            )
            .attr(CommandAttribute::ordered_group("Movement", 0))
            .attr(CommandAttribute::input_range(0, 20))
            .attr(CommandAttribute::increment(0.5))
            .attr(CommandAttribute::SaveOnUpdate);

        let (get, set) = (self.clone(), self.clone());
        members
            .mutable(
                "Lives",
                move || get.lives.get(),
                move |value: u8| set.lives.set(value),
            )
            .attr(CommandAttribute::input_range(0, MAX_LIVES))
            .attr(CommandAttribute::tag(CHEATS_TAG))
            .attr(CommandAttribute::SaveOnUpdate);

        let (get, set) = (self.clone(), self.clone());
        members
            .mutable(
                "Gold",
                move || get.gold.get(),
                move |value: Decimal| set.gold.set(value),
            )
            .attr(CommandAttribute::input_range("0", "9999.99"))
            .attr(CommandAttribute::increment("0.25"))
            .attr(CommandAttribute::tag(CHEATS_TAG))
            .attr(CommandAttribute::SaveOnUpdate);

        let (get, set) = (self.clone(), self.clone());
        members
            .mutable(
                "Nickname",
                move || get.nickname.borrow().clone(),
                move |value: String| *set.nickname.borrow_mut() = value,
            )
            .attr(CommandAttribute::CharacterLimit(12))
            .attr(CommandAttribute::SaveOnUpdate);

        let (get, set) = (self.clone(), self.clone());
        members
            .mutable(
                "Grade",
                move || get.grade.get(),
                move |value: char| set.grade.set(value),
            )
            .attr(CommandAttribute::Order(100));

        let this = self.clone();
        members
            .get_only("Position", move || {
                let (x, y) = this.position.get();
                format!("({x:.1}, {y:.1})")
            })
            .attr(CommandAttribute::ordered_group("Movement", 0));

        let this = self.clone();
        members
            .method("Heal", move || {
                this.lives.set(MAX_LIVES);
                info!(lives = MAX_LIVES, "player healed");
                Ok(())
            })
            .attr(CommandAttribute::tag(CHEATS_TAG))
            .attr(CommandAttribute::description("Refill lives"));

        let this = self;
        members
            .coroutine("Respawn", move || {
                let player = this.clone();
                let mut remaining = RESPAWN_FRAMES;
                let body: CoroutineBody = Box::new(std::iter::from_fn(move || {
                    if remaining == 0 {
                        player.position.set((0.0, 0.0));
                        info!("player respawned");
                        return None;
                    }
                    remaining -= 1;
                    Some(Ok(()))
                }));
                Ok(body)
            })
            .attr(CommandAttribute::group("Actions"));
    }
}

#[derive(Debug)]
pub(crate) struct WorldCategory {
    time_scale: Cell<f64>,
    gravity: Cell<f32>,
    seed: Cell<i64>,
    quality: Cell<RenderQuality>,
    weather: RefCell<String>,
    frames: Cell<u64>,
    debug_counter: Cell<u32>,
    snapshots: RefCell<Vec<(MethodHandle, u32)>>,
}

impl Default for WorldCategory {
    fn default() -> Self {
        Self {
            time_scale: Cell::new(1.0),
            gravity: Cell::new(-9.81),
            seed: Cell::new(42),
            quality: Cell::new(RenderQuality::Medium),
            weather: RefCell::new("Clear".to_string()),
            frames: Cell::new(0),
            debug_counter: Cell::new(0),
            snapshots: RefCell::new(Vec::new()),
        }
    }
}

impl WorldCategory {
    /// Host side of one frame: counts it and finishes snapshots whose work is done.
    pub(crate) fn advance_frame(&self) {
        self.frames.set(self.frames.get() + 1);
        self.snapshots.borrow_mut().retain_mut(|(handle, remaining)| {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                handle.complete();
                return false;
            }
            true
        });
    }

    pub(crate) fn quality(&self) -> RenderQuality {
        self.quality.get()
    }

    fn start_snapshot(&self) -> Result<MethodHandle, HostError> {
        let handle = MethodHandle::new();
        self.snapshots
            .borrow_mut()
            .push((handle.clone(), SNAPSHOT_FRAMES));
        info!(frame = self.frames.get(), "world snapshot started");
        Ok(handle)
    }
}

impl DebugCategory for WorldCategory {
    fn declare(self: Rc<Self>, members: &mut CategoryMembers) {
        let (get, set) = (self.clone(), self.clone());
        members
            .mutable(
                "TimeScale",
                move || get.time_scale.get(),
                move |value: f64| set.time_scale.set(value),
            )
            .attr(CommandAttribute::ordered_group("Simulation", 1))
            .attr(CommandAttribute::input_range(0, 4))
            .attr(CommandAttribute::increment(0.25))
            .attr(CommandAttribute::SaveOnUpdate);

        let (get, set) = (self.clone(), self.clone());
        members
            .mutable(
                "Gravity",
                move || get.gravity.get(),
                move |value: f32| set.gravity.set(value),
            )
            .attr(CommandAttribute::ordered_group("Simulation", 1));

        let (get, set) = (self.clone(), self.clone());
        members
            .mutable(
                "Seed",
                move || get.seed.get(),
                move |value: i64| set.seed.set(value),
            )
            .attr(CommandAttribute::increment(100));

        let (get, set) = (self.clone(), self.clone());
        members
            .mutable_enum(
                "Quality",
                move || get.quality.get(),
                move |value: RenderQuality| set.quality.set(value),
            )
            .attr(CommandAttribute::ordered_group("Rendering", 0))
            .attr(CommandAttribute::SaveOnUpdate);

        let (get, set) = (self.clone(), self.clone());
        members
            .mutable(
                "Weather",
                move || get.weather.borrow().clone(),
                move |value: String| *set.weather.borrow_mut() = value,
            )
            .attr(CommandAttribute::ordered_group("Rendering", 0))
            .attr(CommandAttribute::CharacterLimit(16));

        let this = self.clone();
        members.get_only("Frames", move || this.frames.get());

        let (get, set) = (self.clone(), self.clone());
        members
            .mutable(
                "DebugCounter",
                move || get.debug_counter.get(),
                move |value: u32| set.debug_counter.set(value),
            )
            .attr(CommandAttribute::Exclude);

        let this = self;
        members
            .handle_method("SaveSnapshot", move || this.start_snapshot())
            .attr(CommandAttribute::display_name("Save Snapshot"));
    }
}

/// Connection state behind the dynamically registered network commands.
#[derive(Debug, Default)]
pub(crate) struct NetworkState {
    latency_ms: Cell<Option<u32>>,
    reconnects: Cell<u32>,
}

impl NetworkState {
    pub(crate) fn reconnects(&self) -> u32 {
        self.reconnects.get()
    }

    pub(crate) fn definitions(state: &Rc<Self>) -> Vec<CommandDefinition> {
        let this = state.clone();
        let latency = CommandDefinition::get_only_optional(NETWORK_CATEGORY, "Latency", move || {
            this.latency_ms.get().map(|ms| format!("{ms} ms"))
        });

        let this = state.clone();
        let reconnect = CommandDefinition::method(NETWORK_CATEGORY, "Reconnect", move || {
            let attempt = this.reconnects.get() + 1;
            this.reconnects.set(attempt);
            this.latency_ms.set(Some(20 + attempt * 5));
            info!(attempt, "network reconnected");
            Ok(())
        })
        .with(CommandAttribute::group("Connection"));

        let this = state.clone();
        let disconnect = CommandDefinition::method(NETWORK_CATEGORY, "Disconnect", move || {
            this.latency_ms.set(None);
            info!("network disconnected");
            Ok(())
        })
        .with(CommandAttribute::group("Connection"));

        vec![latency, reconnect, disconnect]
    }
}

/// Everything the demo registered, kept so the loop can drive and inspect it.
#[derive(Debug)]
pub(crate) struct DemoHandles {
    pub(crate) network: Rc<NetworkState>,
    pub(crate) network_commands: Vec<DefinitionId>,
}

pub(crate) fn register_demo_categories(session: &mut DebugSession) -> DemoHandles {
    session.add_category::<PlayerCategory>(PLAYER_CATEGORY, 0, "");
    session.add_category::<WorldCategory>(WORLD_CATEGORY, 1, "World Settings");

    let network = Rc::new(NetworkState::default());
    let network_commands = NetworkState::definitions(&network)
        .into_iter()
        .map(|definition| session.add_command(definition))
        .collect();

    DemoHandles {
        network,
        network_commands,
    }
}

#[cfg(test)]
mod tests {
    use debug_command::{AsyncState, Command, PrefsHandle};

    use super::*;

    fn demo_session() -> (DebugSession, DemoHandles) {
        let mut session = DebugSession::in_memory();
        let handles = register_demo_categories(&mut session);
        session.refresh_category_first();
        (session, handles)
    }

    #[test]
    fn demo_registers_declared_and_dynamic_categories() {
        let (session, handles) = demo_session();
        assert_eq!(
            session.model().category_names(),
            vec![PLAYER_CATEGORY, WORLD_CATEGORY, NETWORK_CATEGORY]
        );
        assert_eq!(handles.network_commands.len(), 3);
        assert!(session.find_command(WORLD_CATEGORY, "DebugCounter").is_none());
        assert!(session.find_command(WORLD_CATEGORY, "Save Snapshot").is_some());
    }

    #[test]
    fn player_groups_follow_their_order() {
        let (session, _) = demo_session();
        let groups = session
            .model()
            .groups_for_category(PLAYER_CATEGORY)
            .expect("player groups");
        let names = groups.keys().map(String::as_str).collect::<Vec<_>>();
        assert_eq!(names, vec!["Movement", "Others", "Actions"]);
    }

    #[test]
    fn move_speed_saturates_at_its_range() {
        let (session, _) = demo_session();
        let command = session
            .find_command(PLAYER_CATEGORY, "MoveSpeed")
            .expect("move speed");
        let Command::Numeric(numeric) = command.as_ref() else {
            panic!("expected a numeric command");
        };
        numeric.set_from_string("99");
        let player = session
            .category_instance::<PlayerCategory>(PLAYER_CATEGORY)
            .expect("player");
        assert_eq!(player.move_speed(), 20.0);
    }

    #[test]
    fn gold_steps_exactly_and_stops_at_its_ceiling() {
        let (session, _) = demo_session();
        let command = session.find_command(PLAYER_CATEGORY, "Gold").expect("gold");
        assert_eq!(command.type_name(), "Decimal Property");
        let Command::Numeric(numeric) = command.as_ref() else {
            panic!("expected a numeric command");
        };
        let player = session
            .category_instance::<PlayerCategory>(PLAYER_CATEGORY)
            .expect("player");

        numeric.fluctuate(3);
        assert_eq!(player.gold(), Decimal::new(1125, 2));
        numeric.set_from_string("9999.9");
        numeric.fluctuate(1);
        assert_eq!(player.gold(), Decimal::new(999999, 2));
    }

    #[test]
    fn snapshot_completes_after_the_host_finishes_it() {
        let (mut session, _) = demo_session();
        let world = session
            .category_instance::<WorldCategory>(WORLD_CATEGORY)
            .expect("world");
        session
            .invoke(WORLD_CATEGORY, "Save Snapshot")
            .expect("snapshot starts");

        let command = session
            .find_command(WORLD_CATEGORY, "Save Snapshot")
            .expect("snapshot command");
        let Command::HandleMethod(snapshot) = command.as_ref() else {
            panic!("expected a handle method");
        };
        for _ in 0..SNAPSHOT_FRAMES {
            assert_eq!(snapshot.state(), AsyncState::Pending);
            world.advance_frame();
            session.tick(0.016);
        }
        assert_eq!(snapshot.state(), AsyncState::Idle);
    }

    #[test]
    fn network_latency_is_blank_until_connected() {
        let (mut session, handles) = demo_session();
        let latency = session
            .find_command(NETWORK_CATEGORY, "Latency")
            .expect("latency");
        assert_eq!(latency.value_string().as_deref(), Some(""));

        session
            .invoke(NETWORK_CATEGORY, "Reconnect")
            .expect("reconnect runs");
        assert_eq!(latency.value_string().as_deref(), Some("25 ms"));
        assert_eq!(handles.network.reconnects(), 1);
    }

    #[test]
    fn saved_quality_is_restored_on_the_next_session() {
        let prefs = PrefsHandle::in_memory();
        let mut first = DebugSession::new(prefs.clone());
        register_demo_categories(&mut first);
        let command = first
            .find_command(WORLD_CATEGORY, "Quality")
            .expect("quality");
        let Command::Enum(quality) = command.as_ref() else {
            panic!("expected an enum command");
        };
        quality.set_value("High").expect("known variant");

        let mut second = DebugSession::new(prefs);
        register_demo_categories(&mut second);
        let world = second
            .category_instance::<WorldCategory>(WORLD_CATEGORY)
            .expect("world");
        assert_eq!(world.quality(), RenderQuality::High);
    }
}
