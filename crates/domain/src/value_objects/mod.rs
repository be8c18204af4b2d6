pub mod price;
pub mod quote;

pub use price::{Price, SqrtPriceX96};
pub use quote::Quote;
