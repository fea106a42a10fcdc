mod platform;

pub use platform::{CONFIG_FILE, NotificationMode, PlatformConfig};
