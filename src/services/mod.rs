pub mod announcement_service;
pub mod auth_service;
pub mod content_service;
pub mod payment_service;
pub mod storage_service;
pub mod user_service;

pub use announcement_service::*;
pub use auth_service::*;
pub use content_service::*;
pub use payment_service::*;
pub use storage_service::*;
pub use user_service::*;
