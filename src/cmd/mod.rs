//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module      | Commands handled            |
//! |-------------|------------------------------|
//! | `project`   | `Init`                      |
//! | `parse_prd` | `ParsePrd`                  |
//! | `expand`    | `Expand`                    |
//! | `tasks`     | `List`, `SetStatus`, `Next` |

pub mod expand;
pub mod parse_prd;
pub mod project;
pub mod tasks;

pub use expand::cmd_expand;
pub use parse_prd::cmd_parse_prd;
pub use project::cmd_init;
pub use tasks::{cmd_list, cmd_next, cmd_set_status};
