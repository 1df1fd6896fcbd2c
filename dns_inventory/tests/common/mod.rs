#![allow(unused_imports)]

pub mod db_setup;
pub mod mock_servers;
pub mod test_app;

pub use db_setup::*;
pub use mock_servers::*;
pub use test_app::*;
