mod link;
mod redirect;

pub use link::{create_handler, list_handler, patch_handler, stats_handler};
pub use redirect::{probe_handler, redirect_handler};
