//! Client configuration loaded from defaults, an optional config file, and
//! environment variables.
//!
//! Supports `.env` files for development.
//! Config precedence: env vars > .env file > dvxr.toml > defaults

use serde::{Deserialize, Serialize};

use crate::models::SurfaceOptions;

/// Load the client configuration.
///
/// Environment variables use the `DVXR` prefix and `__` as the section
/// separator, e.g. `DVXR__AUTH__CLIENT_ID` or `DVXR__SERVICE__BASE_URL`.
/// `DVXR__AUTH__SCOPES` and `DVXR__XR__OPTIONAL_FEATURES` are comma-separated.
pub fn load() -> Result<AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let cfg = config::Config::builder()
        // Defaults
        .add_source(config::Config::try_from(&AppConfig::default())?)
        // Optional config file
        .add_source(config::File::with_name("dvxr").required(false))
        // Environment variables (DVXR__SERVICE__BASE_URL, DVXR__AUTH__METHOD, etc.)
        .add_source(
            config::Environment::with_prefix("DVXR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("auth.scopes")
                .with_list_parse_key("xr.optional_features"),
        )
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    tracing::debug!(service = %app_config.service.base_url, "Configuration loaded");
    Ok(app_config)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub auth: AuthConfig,
    pub connection: ConnectionConfig,
    pub render: RenderConfig,
    pub surface: SurfaceConfig,
    pub xr: XrConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Origin of the streaming service (login page, directory, connect API).
    pub base_url: String,
    /// Origin of the first-party backend that performs the token exchange.
    pub auth_backend_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://desktop.vision".into(),
            auth_backend_url: "http://localhost:3000".into(),
        }
    }
}

/// How the login page is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// New browser context; the code comes back as a window message.
    #[default]
    Popup,
    /// Full-page navigation; the code comes back as query parameters.
    Redirect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Must match the API key configured on the exchange backend.
    pub client_id: String,
    pub scopes: Vec<String>,
    pub method: AuthMethod,
    /// Ask the login page to let the user pick a computer.
    pub select_computer: bool,
    /// Value of the `oauth` marker parameter added to the redirect URI.
    pub provider_tag: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: "6wlqRxEgp60JXkcGkLY2".into(),
            scopes: vec!["connect".into(), "list".into()],
            method: AuthMethod::Popup,
            select_computer: true,
            provider_tag: "desktopvision".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Upper bound between opening the transport and the first stream.
    pub stream_timeout_secs: u64,
    /// Per-request timeout for every HTTP call.
    pub http_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            stream_timeout_secs: 30,
            http_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Frame cadence used by hosts without a display-driven scheduler.
    pub frame_rate: u32,
    /// Camera eye height in meters.
    pub camera_height: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            camera_height: 1.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConfig {
    pub options: SurfaceOptions,
    /// Keep remote audio muted when a stream is bound.
    pub stream_muted: bool,
    /// Local clip used by the test surface.
    pub test_video_path: String,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            options: SurfaceOptions::default(),
            stream_muted: false,
            test_video_path: "/dvVid.mp4".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XrConfig {
    pub session_mode: String,
    pub optional_features: Vec<String>,
    pub reference_space: String,
}

impl Default for XrConfig {
    fn default() -> Self {
        Self {
            session_mode: "immersive-vr".into(),
            optional_features: vec![
                "local-floor".into(),
                "bounded-floor".into(),
                "hand-tracking".into(),
                "layers".into(),
            ],
            reference_space: "local-floor".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
    /// One JSON object per line instead of human-readable output.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "dvxr=info".into(),
            json: false,
        }
    }
}
