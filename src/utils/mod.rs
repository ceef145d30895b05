pub mod jwt;
pub mod money;
pub mod pagination;
pub mod password;
pub mod search;
pub mod trade_no;
pub mod username;

pub use jwt::*;
pub use money::{cents_to_yuan, yuan_to_cents};
pub use pagination::*;
pub use password::*;
pub use search::like_contains;
pub use trade_no::generate_out_trade_no;
pub use username::*;
