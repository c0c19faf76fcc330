pub mod error;
pub mod bytes;
pub mod codec;
pub mod block;
pub mod rom;
pub mod segref;
pub mod format;
pub mod descriptor;
pub mod segment;
pub mod layout;
pub mod scheduler;
pub mod extract;
pub mod build;
pub mod listing;
pub mod assets;
pub mod session;

pub use error::{Error, ErrorKind, Result};
pub use codec::{CompType, get_codec};
pub use block::{BlockHeader, encode_block, decode_block};
pub use rom::Rom;
pub use segref::{SegRef, SegRefTable};
pub use format::GameFormat;
pub use descriptor::Descriptor;
pub use segment::GameData;
pub use listing::Listing;
pub use build::{BuiltRom, ChecksumFixup, ExternalTool};
pub use session::{Session, SessionOptions};
