//! Layered configuration for Enforcer.
//!
//! Configuration comes from defaults, an optional TOML or JSON file, and
//! environment variables named `ENFORCER__SECTION__KEY`:
//!
//! ```text
//! ENFORCER__ENFORCER__FALLTHROUGH=false
//! ENFORCER__ENFORCER__MOCK_HEADER=x-mock
//! ENFORCER__LOGGING__LEVEL=debug
//! ENFORCER__CONTROLLERS__DIRECTORY=./controllers
//! ```
//!
//! ```no_run
//! use enforcer_config::ConfigLoader;
//!
//! # fn main() -> Result<(), enforcer_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()
//!     .with_optional_file("enforcer.toml")?
//!     .load()?;
//! # let _ = config;
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/enforcer-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;

pub use config::{ControllersConfig, EnforcerConfig};
pub use error::ConfigError;
pub use loader::{ConfigFormat, ConfigLoader, DEFAULT_ENV_PREFIX};
