pub mod ghost_list;
pub mod intrusive_list;

pub use ghost_list::GhostList;
pub use intrusive_list::{IntrusiveList, SlotId};
