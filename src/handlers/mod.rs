pub mod admin;
pub mod announcement;
pub mod auth;
pub mod content;
pub mod payment;
pub mod storage;
pub mod user;
pub mod webhook;

pub use admin::admin_config;
pub use announcement::announcement_config;
pub use auth::auth_config;
pub use content::content_config;
pub use payment::payment_config;
pub use storage::storage_config;
pub use user::user_config;
