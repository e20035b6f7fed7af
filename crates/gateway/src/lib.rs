// wifiauth Gateway - WifiDog auth server
//
// This crate implements the HTTP side of the captive portal: the WifiDog
// protocol endpoints the router firmware calls, the channel callbacks the
// login page and providers call, and the order/token lifecycle behind them.

pub mod handlers;
pub mod orders;
pub mod page;
pub mod protocol;
pub mod server;
pub mod token;

pub use orders::OrderManager;
pub use page::LoginPage;
pub use protocol::*;
pub use server::{create_router, AppState, GatewayServer};
pub use token::{auth_token_url, TokenExtras, TokenIssuer};
