//! Replay unified configuration layer.
//!
//! All environment reads go through this module; the rest of the workspace
//! accesses structured config instead of calling `std::env::var` directly.
//!
//! - `loader`: env_or / env_optional / env_bool helpers, env mutation wrappers,
//!   and the scoped environment guard used by plugins
//! - `schema`: PathsConfig, ObservabilityConfig
//! - `env_keys`: key constants (with aliases)

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{
    env_bool, env_optional, env_or, load_dotenv, load_dotenv_from_dir, remove_env_var,
    set_env_var, EnvSnapshot, ScopedEnvGuard,
};
pub use schema::{ObservabilityConfig, PathsConfig};
