pub mod alipay;

pub use alipay::*;
