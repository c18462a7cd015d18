use filegate_core::Config;
use filegate_services::FileService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub files: FileService,
}

impl AppState {
    pub fn new(config: Config, files: FileService) -> Self {
        Self { config, files }
    }
}
