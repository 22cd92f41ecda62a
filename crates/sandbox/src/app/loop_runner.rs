use std::process::ExitCode;

use debug_command::{Command, CompletionCallback, DebugSession};
use tracing::{debug, error, info, warn};

use super::bootstrap::AppWiring;
use super::config::{InvokeRequest, SetValue};
use super::demo::{PlayerCategory, WorldCategory, PLAYER_CATEGORY, WORLD_CATEGORY};

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        mut session,
        demo,
    } = app;

    session.refresh_category_first();
    let categories = session.model().category_names().join(", ");
    let selected = session.initial_category_index();
    info!(%categories, selected, "debug commands ready");

    session.update_auto_refresh(config.auto_refresh, config.floating_window);
    apply_set_values(&session, &config.set_values);
    invoke_requests(&mut session, &config.invoke);

    let world = session.category_instance::<WorldCategory>(WORLD_CATEGORY);
    for _ in 0..config.frames {
        if let Some(world) = world.as_ref() {
            world.advance_frame();
        }
        let report = session.tick(config.frame_seconds);
        if let Some(snapshots) = report.refreshed {
            for snapshot in &snapshots {
                debug!(
                    category = %snapshot.category,
                    group = %snapshot.group,
                    property = %snapshot.display_name,
                    value = %snapshot.value,
                    "property refreshed"
                );
            }
            info!(properties = snapshots.len(), "auto refresh");
        }
    }

    log_command_details(&session);
    if let Some(world) = world.as_ref() {
        info!(quality = ?world.quality(), "world state");
    }
    if let Some(player) = session.category_instance::<PlayerCategory>(PLAYER_CATEGORY) {
        info!(
            move_speed = player.move_speed(),
            lives = player.lives(),
            gold = %player.gold(),
            "player state"
        );
    }
    info!(
        reconnects = demo.network.reconnects(),
        pending_tasks = session.runner().pending_task_count(),
        "run finished"
    );

    for id in demo.network_commands {
        session.remove_command(id);
    }

    if let Err(err) = session.save() {
        error!(error = %err, "prefs_save_failed");
        return ExitCode::FAILURE;
    }
    session.dispose();
    info!("=== Debug Command Sandbox Shutdown ===");
    ExitCode::SUCCESS
}

fn apply_set_values(session: &DebugSession, values: &[SetValue]) {
    for entry in values {
        let Some(command) = session.find_command(&entry.category, &entry.command) else {
            warn!(category = %entry.category, command = %entry.command, "unknown command");
            continue;
        };
        match apply_text_value(&command, &entry.value) {
            Ok(()) => info!(
                category = %entry.category,
                command = %entry.command,
                value = %command.value_string().unwrap_or_default(),
                "property set"
            ),
            Err(message) => warn!(
                category = %entry.category,
                command = %entry.command,
                error = %message,
                "property not set"
            ),
        }
    }
}

fn invoke_requests(session: &mut DebugSession, requests: &[InvokeRequest]) {
    for request in requests {
        let label = format!("{}/{}", request.category, request.command);
        let on_complete: CompletionCallback =
            Box::new(move || info!(command = %label, "invocation completed"));
        if let Err(err) =
            session.invoke_with(&request.category, &request.command, Some(on_complete))
        {
            warn!(category = %request.category, command = %request.command, error = %err, "invoke failed");
        }
    }
}

/// Writes `text` into a property command the way an input field would.
pub(crate) fn apply_text_value(command: &Command, text: &str) -> Result<(), String> {
    if !command.is_interactable() {
        return Err(format!("'{}' is not interactable", command.display_name()));
    }
    match command {
        Command::Bool(property) => {
            let value = text
                .parse::<bool>()
                .map_err(|_| format!("invalid bool '{text}' (expected true or false)"))?;
            property.set_value(value);
        }
        Command::Char(property) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(value), None) => property.set_value(value),
                _ => return Err(format!("expected a single character, got '{text}'")),
            }
        }
        Command::String(property) => property.set_value(text),
        Command::Enum(property) => property.set_value(text).map_err(|err| err.to_string())?,
        Command::Numeric(property) => property.set_from_string(text),
        other => {
            return Err(format!(
                "'{}' is a {} and takes no value",
                other.display_name(),
                other.type_name()
            ))
        }
    }
    Ok(())
}

fn log_command_details(session: &DebugSession) {
    let model = session.model();
    for name in model.category_names() {
        let Some(groups) = model.groups_for_category(name) else {
            continue;
        };
        for (group_name, group) in session.group_filter().visible_groups(name, groups) {
            for command in group.commands() {
                if !command.is_visible() {
                    continue;
                }
                let detail = command
                    .detail_context()
                    .into_iter()
                    .map(|(label, value)| format!("{label}={value}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                debug!(category = name, group = group_name, %detail, "command");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::app::demo::register_demo_categories;

    fn demo_session() -> DebugSession {
        let mut session = DebugSession::in_memory();
        register_demo_categories(&mut session);
        session.refresh_category_first();
        session
    }

    fn find(session: &DebugSession, category: &str, name: &str) -> Rc<Command> {
        session.find_command(category, name).expect("command exists")
    }

    #[test]
    fn text_values_reach_each_property_kind() {
        let session = demo_session();
        let cases = [
            (PLAYER_CATEGORY, "GodMode", "true", "true"),
            (PLAYER_CATEGORY, "Lives", "300", "9"),
            (PLAYER_CATEGORY, "Grade", "A", "A"),
            (PLAYER_CATEGORY, "Nickname", "a-very-long-nickname", "a-very-long-"),
            (WORLD_CATEGORY, "Quality", "Low", "Low"),
            (WORLD_CATEGORY, "TimeScale", "7.5", "4"),
        ];
        for (category, name, input, expected) in cases {
            let command = find(&session, category, name);
            apply_text_value(&command, input).expect("value applies");
            assert_eq!(command.value_string().as_deref(), Some(expected), "{name}");
        }
    }

    #[test]
    fn bad_text_and_value_less_commands_are_rejected() {
        let session = demo_session();
        assert!(apply_text_value(&find(&session, PLAYER_CATEGORY, "GodMode"), "yes").is_err());
        assert!(apply_text_value(&find(&session, PLAYER_CATEGORY, "Grade"), "AB").is_err());
        assert!(apply_text_value(&find(&session, WORLD_CATEGORY, "Quality"), "Ultra").is_err());
        assert!(apply_text_value(&find(&session, PLAYER_CATEGORY, "Heal"), "1").is_err());
    }

    #[test]
    fn tagged_off_commands_refuse_input() {
        let mut session = demo_session();
        session.set_interactable(PLAYER_CATEGORY, "Cheats", false);
        let lives = find(&session, PLAYER_CATEGORY, "Lives");
        assert!(apply_text_value(&lives, "1").is_err());
        assert_eq!(lives.value_string().as_deref(), Some("3"));
    }
}
