pub mod block;
pub mod coordinates;
pub mod hash;
pub mod layout;

pub use block::{BinaryInfo, BlockOrEbb, Tip, TipInfo};
pub use coordinates::{Epoch, EpochSlot, RelativeSlot, Slot};
pub use hash::{BlockHash, Hash32};
pub use layout::{EpochLayout, FixedLayout, LayoutError};
