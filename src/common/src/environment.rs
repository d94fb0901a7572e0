use crate::constants::DEVELOPMENT_BUILD;
use chrono::{DateTime, Utc};

/// Ambient context captured alongside every error record.
pub trait EnvironmentProvider: Send + Sync {
    /// Location the error happened at (page URL in a browser host).
    fn current_url(&self) -> String;
    fn user_agent(&self) -> String;
    fn build_version(&self) -> String;
    fn now(&self) -> DateTime<Utc>;
}

pub fn build_version_for(production: bool) -> String {
    if production {
        env!("CARGO_PKG_VERSION").to_string()
    } else {
        DEVELOPMENT_BUILD.to_string()
    }
}

/// Environment of the running process.
#[derive(Debug, Clone)]
pub struct ProcessEnvironment {
    production: bool,
    application: String,
}

impl ProcessEnvironment {
    pub fn new(production: bool) -> Self {
        Self {
            production,
            application: std::env::args()
                .next()
                .and_then(|arg0| {
                    std::path::Path::new(&arg0)
                        .file_name()
                        .map(|name| name.to_string_lossy().to_string())
                })
                .unwrap_or_else(|| "arcu".to_string()),
        }
    }

    /// Overrides the application name used in the URL and user agent.
    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = application.into();
        self
    }
}

impl EnvironmentProvider for ProcessEnvironment {
    fn current_url(&self) -> String {
        let cwd = std::env::current_dir()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        format!("file://{}#{}", cwd, self.application)
    }

    fn user_agent(&self) -> String {
        format!(
            "{}/{} ({}; {})",
            self.application,
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        )
    }

    fn build_version(&self) -> String {
        build_version_for(self.production)
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic environment for tests and replay.
#[derive(Debug, Clone)]
pub struct FixedEnvironment {
    pub url: String,
    pub user_agent: String,
    pub build_version: String,
    pub now: DateTime<Utc>,
}

impl Default for FixedEnvironment {
    fn default() -> Self {
        Self {
            url: "http://localhost:4200/test".to_string(),
            user_agent: "Test User Agent".to_string(),
            build_version: DEVELOPMENT_BUILD.to_string(),
            now: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl EnvironmentProvider for FixedEnvironment {
    fn current_url(&self) -> String {
        self.url.clone()
    }

    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn build_version(&self) -> String {
        self.build_version.clone()
    }

    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}
