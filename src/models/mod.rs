pub mod announcement;
pub mod common;
pub mod content;
pub mod payment;
pub mod storage;
pub mod user;

pub use announcement::*;
pub use common::*;
pub use content::*;
pub use payment::*;
pub use storage::*;
pub use user::*;
