pub mod config;
pub mod digest;
pub mod error;
pub mod model;

// Re-export commonly used types
pub use config::{
    Config, ConfigLoader, ConfigValidator, ExplorerConfig, PortalConfig, ServerConfig, SmsConfig,
    StorageConfig,
};
pub use error::{DomainError, InfraError, WifiAuthError};
pub use model::{
    unix_now, Channel, Client, Device, GatewaySetting, Order, SmsProviderKind, SmsSetting, Token,
    UserSetting, WeixinSetting, WificoinSetting,
};
