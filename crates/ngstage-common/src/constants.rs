//! System-wide constants and default paths.

/// Name of the server configuration file at the application root.
pub const NGINX_CONF: &str = "nginx.conf";

/// Preferred operator configuration file.
pub const BUILDPACK_YML: &str = "buildpack.yml";

/// Fallback operator configuration file.
pub const NGINX_YML: &str = "nginx.yml";

/// Dependency manifest file at the buildpack root.
pub const MANIFEST_YML: &str = "manifest.yml";

/// Dependency name of the nginx distribution.
pub const NGINX_DEPENDENCY: &str = "nginx";

/// Dependency name of the OpenResty distribution.
pub const OPENRESTY_DEPENDENCY: &str = "openresty";

/// Channel used when no version is requested.
pub const MAINLINE_CHANNEL: &str = "mainline";

/// Channel whose use triggers a discouragement warning.
pub const STABLE_CHANNEL: &str = "stable";

/// Default resolver configuration file.
pub const DEFAULT_RESOLV_CONF: &str = "/etc/resolv.conf";

/// Nameserver used when the resolver configuration yields none.
///
/// This is the platform DNS address of the BOSH DNS job.
pub const DEFAULT_NAMESERVER: &str = "169.254.0.2";

/// Port substituted for `{{port}}` while syntax-checking a configuration.
pub const SYNTAX_CHECK_PORT: u16 = 8080;

/// Environment variable carrying the runtime-assigned port.
pub const PORT_ENV: &str = "PORT";

/// Length of the random marker used by the port-placeholder dry-run.
pub const PORT_NONCE_LENGTH: usize = 16;

/// Support binary copied into the dependency directory for launch-time
/// templating.
pub const SUPPORT_BINARY: &str = "ngstage";

/// Directory under the application root holding operator-supplied modules.
pub const LOCAL_MODULES_DIR: &str = "modules";

/// Directory under the application root where nginx writes its logs.
pub const LOGS_DIR: &str = "logs";

