pub mod announcements;
pub mod content_reactions;
pub mod contents;
pub mod orders;
pub mod payment_notifications;
pub mod products;
pub mod users;

pub use announcements as announcement_entity;
pub use content_reactions as content_reaction_entity;
pub use contents as content_entity;
pub use orders as order_entity;
pub use payment_notifications as payment_notification_entity;
pub use products as product_entity;
pub use users as user_entity;

pub use content_reactions::ReactionKind;
pub use contents::{ContentKind, ContentStatus};
pub use orders::OrderStatus;
pub use users::UserRole;
