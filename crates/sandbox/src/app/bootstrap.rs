use debug_command::{DebugSession, PrefsHandle, PrefsStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::config::{self, SandboxConfig};
use super::demo::{self, DemoHandles};

pub(crate) struct AppWiring {
    pub(crate) config: SandboxConfig,
    pub(crate) session: DebugSession,
    pub(crate) demo: DemoHandles,
}

pub(crate) fn build_app() -> Result<AppWiring, String> {
    init_tracing();
    info!("=== Debug Command Sandbox Startup ===");

    let config = config::load_config_from_env()?;
    let prefs = open_prefs(&config)?;
    let mut session = DebugSession::new(prefs);
    let demo = demo::register_demo_categories(&mut session);

    Ok(AppWiring {
        config,
        session,
        demo,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn open_prefs(config: &SandboxConfig) -> Result<PrefsHandle, String> {
    let Some(path) = config.prefs_path.as_ref() else {
        info!("no prefs path configured; prefs stay in memory");
        return Ok(PrefsHandle::in_memory());
    };
    let store = PrefsStore::load(path).map_err(|error| format!("open prefs: {error}"))?;
    info!(path = %path.display(), "prefs loaded");
    Ok(PrefsHandle::new(store))
}
