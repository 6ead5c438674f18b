pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{AccountKind, OrderSide, OrderStatus, OrderType};
pub use error::CoreError;
pub use structs::{
    check_price, normalize_symbol, Account, Execution, OrderReceipt, OrderRecord, OrderRequest,
    OrderTicket, Position,
};
