pub mod config;
pub mod delivery;
pub mod domain;
pub mod telemetry;
pub mod transport;
pub mod usecase;

pub use delivery::view::NotificationView;
pub use domain::notification::{Notification, NotificationId, NotificationType, Priority};
pub use usecase::error::NotificationError;
pub use usecase::notifications::NotificationStore;
pub use usecase::session::NotificationSession;
