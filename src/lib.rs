//! Edge-Lens: on-device inference sessions.
//!
//! This is the crate shell that wires the domains together. No inference
//! logic lives here: only module declarations, startup (env + logging),
//! and `EdgeLens`, which builds one session per screen from config.
//!
//! Domains:
//!   - capture/   camera binding, frame buffers, scale + rotate
//!   - engine/    engine contracts, the construct-once handle, scripted engines
//!   - session/   one-shot and streaming request lifecycles, UI state
//!   - config.rs  per-feature engine configuration

pub mod capture;
pub mod config;
pub mod engine;
pub mod error;
pub mod session;

use config::LensConfig;
use engine::{ClassifierFactory, GeneratorFactory};
use session::{ClassifyProfile, ClassifySession, GenerateSession};
use std::sync::Arc;

/// Load `.env.local` → `.env` from the working directory, then start logging.
///
/// Safe to call more than once; only the first logger install wins.
pub fn init() {
    'env_load: for env_file in [".env.local", ".env"] {
        let path = std::path::Path::new(env_file);
        if path.exists() {
            match dotenvy::from_path(path) {
                Ok(_) => eprintln!("[STARTUP] Loaded {}", path.display()),
                Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
            }
            break 'env_load;
        }
    }

    if env_logger::try_init().is_ok() {
        log::info!("Edge-Lens starting up");
    }
}

/// Builds screen sessions from one config and the engine factories.
pub struct EdgeLens {
    config: LensConfig,
    classifiers: Arc<dyn ClassifierFactory>,
    generators: Arc<dyn GeneratorFactory>,
}

impl EdgeLens {
    pub fn new(
        config: LensConfig,
        classifiers: Arc<dyn ClassifierFactory>,
        generators: Arc<dyn GeneratorFactory>,
    ) -> Self {
        Self {
            config,
            classifiers,
            generators,
        }
    }

    /// Use the user config file plus environment overrides.
    pub fn from_user_config(
        classifiers: Arc<dyn ClassifierFactory>,
        generators: Arc<dyn GeneratorFactory>,
    ) -> Self {
        Self::new(config::load_config(), classifiers, generators)
    }

    pub fn config(&self) -> &LensConfig {
        &self.config
    }

    /// Session for the photo classification screen.
    pub fn take_photo(&self) -> ClassifySession {
        ClassifySession::attach(
            ClassifyProfile::take_photo(),
            self.config.take_photo.clone(),
            self.classifiers.clone(),
            self.config.fence_stale_results,
        )
    }

    /// Session for the live gesture reaction screen.
    pub fn reaction_gesture(&self) -> ClassifySession {
        ClassifySession::attach(
            ClassifyProfile::reaction_gesture(),
            self.config.reaction_gesture.clone(),
            self.classifiers.clone(),
            self.config.fence_stale_results,
        )
    }

    /// Session for the poem screen. Starts loading the model right away
    /// under the default config, so call from within a Tokio runtime.
    pub fn terrible_poem(&self) -> GenerateSession {
        GenerateSession::attach(
            self.config.terrible_poem.clone(),
            self.generators.clone(),
            self.config.fence_stale_results,
        )
    }
}
