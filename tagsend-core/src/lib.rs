//! Tag-based batch messaging core.
//!
//! - [`storage`]: JSON-backed contact registry and friend details cache
//! - [`validator`]: message checks run before every batch
//! - [`dispatcher`]: sequential, paced sends through a [`driver::ChatDriver`]
//! - [`settings`]: layered TOML configuration with dotted-key lookup

pub mod dispatcher;
pub mod driver;
pub mod settings;
pub mod storage;
pub mod validator;

pub use dispatcher::{DispatchError, DispatchOptions, Dispatcher, Pacer, SendPlan, ThreadSleep};
pub use driver::{build_driver, ChatDriver, DriverCapabilities, DriverError};
pub use settings::{AppConfig, Settings, SettingsError};
pub use storage::{ContactStore, FriendDetailsStore, StoreError};
pub use validator::validate_message;
