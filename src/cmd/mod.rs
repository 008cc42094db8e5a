//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module   | Commands handled                                  |
//! |----------|---------------------------------------------------|
//! | `serve`  | `Serve`                                           |
//! | `items`  | `Init`, `List`, `Add`, `Move`, `Renumber`         |
//! | `key`    | `Key`                                             |
//! | `config` | `Config`                                          |

pub mod config;
pub mod items;
pub mod key;
pub mod serve;

pub use config::cmd_config;
pub use items::{cmd_add, cmd_init, cmd_list, cmd_move, cmd_renumber};
pub use key::cmd_key;
pub use serve::cmd_serve;
