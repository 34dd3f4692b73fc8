use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use workspaces_auth::OidcConfig;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub store_url: String,
    pub store_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub auth_mode: AuthMode,
    pub local_auth_shared_secret: Option<String>,
    pub metrics_require_auth: bool,
    pub oidc: Option<OidcConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Local,
    Oidc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for StartupError {}

impl GatewayConfig {
    pub fn load() -> Result<Self, StartupError> {
        let mut merged = HashMap::new();

        if let Ok(config_path) = std::env::var("WORKSPACES_CONFIG_PATH") {
            let config_path = config_path.trim();
            if !config_path.is_empty() {
                let file_kv = parse_env_file(config_path)?;
                merged.extend(file_kv);
            }
        }

        merged.extend(std::env::vars());

        Self::from_kv(&merged)
    }

    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self, StartupError> {
        let bind_addr = parse_socket_addr(
            kv.get("WORKSPACES_BIND_ADDR"),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            "WORKSPACES_BIND_ADDR",
        )?;

        let auth_mode = parse_auth_mode(kv.get("WORKSPACES_AUTH_MODE"))?;

        let dev_allow_nonlocal_bind =
            parse_bool(kv.get("WORKSPACES_DEV_ALLOW_NONLOCAL_BIND")).unwrap_or(false);

        if !bind_addr.ip().is_loopback()
            && auth_mode != AuthMode::Oidc
            && !(dev_allow_nonlocal_bind && bind_addr.ip().is_unspecified())
        {
            return Err(StartupError {
                code: "ERR_NONLOCAL_BIND_REQUIRES_AUTH",
                message: "non-local bind requires oidc auth mode; refuse startup".to_string(),
            });
        }

        let store_url = require_nonempty(kv, "WORKSPACES_STORE_URL")?;
        if !(store_url.starts_with("http://") || store_url.starts_with("https://")) {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "WORKSPACES_STORE_URL must be an http(s) URL".to_string(),
            });
        }
        let store_url = store_url.trim_end_matches('/').to_string();

        let store_timeout_ms = parse_u64(
            kv.get("WORKSPACES_STORE_TIMEOUT_MS"),
            2000,
            "WORKSPACES_STORE_TIMEOUT_MS",
        )?;
        let request_timeout_ms = parse_u64(
            kv.get("WORKSPACES_REQUEST_TIMEOUT_MS"),
            5000,
            "WORKSPACES_REQUEST_TIMEOUT_MS",
        )?;
        if store_timeout_ms == 0 || request_timeout_ms == 0 {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "store and request timeouts must be >= 1ms".to_string(),
            });
        }

        let local_auth_shared_secret = optional_nonempty(kv, "WORKSPACES_LOCAL_AUTH_SHARED_SECRET");

        let metrics_require_auth =
            parse_bool(kv.get("WORKSPACES_METRICS_REQUIRE_AUTH")).unwrap_or(false);

        let oidc = if auth_mode == AuthMode::Oidc {
            Some(parse_oidc_config(kv)?)
        } else {
            None
        };

        Ok(Self {
            bind_addr,
            store_url,
            store_timeout_ms,
            request_timeout_ms,
            auth_mode,
            local_auth_shared_secret,
            metrics_require_auth,
            oidc,
        })
    }
}

fn parse_env_file(path: &str) -> Result<HashMap<String, String>, StartupError> {
    let contents = std::fs::read_to_string(path).map_err(|_| StartupError {
        code: "ERR_CONFIG_FILE_READ",
        message: format!("failed to read config file at {}", path),
    })?;
    parse_env_contents(&contents)
}

fn parse_env_contents(contents: &str) -> Result<HashMap<String, String>, StartupError> {
    let mut kv = HashMap::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| StartupError {
            code: "ERR_CONFIG_FILE_PARSE",
            message: format!("invalid config line {} (expected KEY=VALUE)", idx + 1),
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(StartupError {
                code: "ERR_CONFIG_FILE_PARSE",
                message: format!("invalid config line {} (empty key)", idx + 1),
            });
        }

        kv.insert(key.to_string(), strip_quotes(value.trim()).to_string());
    }

    Ok(kv)
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2
            && let Some(inner) = s.strip_prefix(quote).and_then(|s| s.strip_suffix(quote))
        {
            return inner;
        }
    }
    s
}

fn require_nonempty(
    kv: &HashMap<String, String>,
    key: &'static str,
) -> Result<String, StartupError> {
    optional_nonempty(kv, key).ok_or_else(|| StartupError {
        code: "ERR_MISSING_CONFIG",
        message: format!("missing required config key {}", key),
    })
}

fn optional_nonempty(kv: &HashMap<String, String>, key: &str) -> Option<String> {
    kv.get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn parse_socket_addr(
    value: Option<&String>,
    default: SocketAddr,
    key: &'static str,
) -> Result<SocketAddr, StartupError> {
    match value {
        None => Ok(default),
        Some(v) => v.trim().parse::<SocketAddr>().map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be a valid host:port socket address", key),
        }),
    }
}

fn parse_u64(value: Option<&String>, default: u64, key: &'static str) -> Result<u64, StartupError> {
    match value {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => v.trim().parse::<u64>().map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be an integer", key),
        }),
    }
}

fn parse_auth_mode(value: Option<&String>) -> Result<AuthMode, StartupError> {
    let mode = value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or("local");

    match mode {
        "local" => Ok(AuthMode::Local),
        "oidc" => Ok(AuthMode::Oidc),
        _ => Err(StartupError {
            code: "ERR_INVALID_CONFIG",
            message: "WORKSPACES_AUTH_MODE must be local or oidc".to_string(),
        }),
    }
}

fn parse_oidc_config(kv: &HashMap<String, String>) -> Result<OidcConfig, StartupError> {
    let issuer = require_nonempty(kv, "WORKSPACES_OIDC_ISSUER")?;

    let jwks_json = optional_nonempty(kv, "WORKSPACES_OIDC_JWKS_JSON");
    let jwks_url = optional_nonempty(kv, "WORKSPACES_OIDC_JWKS_URL");

    if jwks_json.is_none() && jwks_url.is_none() {
        return Err(StartupError {
            code: "ERR_INVALID_CONFIG",
            message: "oidc requires WORKSPACES_OIDC_JWKS_URL or WORKSPACES_OIDC_JWKS_JSON"
                .to_string(),
        });
    }

    let jwks_timeout_ms = parse_u64(
        kv.get("WORKSPACES_OIDC_JWKS_TIMEOUT_MS"),
        2000,
        "WORKSPACES_OIDC_JWKS_TIMEOUT_MS",
    )?;
    let jwks_refresh_ttl_secs = parse_u64(
        kv.get("WORKSPACES_OIDC_JWKS_REFRESH_TTL_SECS"),
        300,
        "WORKSPACES_OIDC_JWKS_REFRESH_TTL_SECS",
    )?;
    let clock_skew_secs = parse_u64(
        kv.get("WORKSPACES_OIDC_CLOCK_SKEW_SECS"),
        60,
        "WORKSPACES_OIDC_CLOCK_SKEW_SECS",
    )?;

    Ok(OidcConfig {
        issuer,
        audience: optional_nonempty(kv, "WORKSPACES_OIDC_AUDIENCE"),
        jwks_url,
        jwks_json,
        jwks_timeout: Duration::from_millis(jwks_timeout_ms),
        jwks_refresh_ttl: Duration::from_secs(jwks_refresh_ttl_secs),
        clock_skew: Duration::from_secs(clock_skew_secs),
        username_claim: optional_nonempty(kv, "WORKSPACES_OIDC_USERNAME_CLAIM")
            .unwrap_or_else(|| "preferred_username".to_string()),
    })
}

fn parse_bool(value: Option<&String>) -> Option<bool> {
    let value = value.map(|v| v.trim()).filter(|v| !v.is_empty())?;

    match value {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}
