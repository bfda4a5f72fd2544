mod chat_exchange;
mod stored_key;
mod winner;

pub use chat_exchange::{ChatExchange, NewChatExchange};
pub use stored_key::StoredKey;
pub use winner::{NewWinnerRecord, WinnerRecord};
