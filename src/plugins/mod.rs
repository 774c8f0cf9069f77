//! Analysis plugins run over the walked process list
pub mod plugin_trait;
pub mod pslist;
pub mod pstree;

pub use pslist::PsListPlugin;
pub use pstree::PsTreePlugin;
