//! Protocol-level constants shared by the codec and the router.

/// Current version of the Vigil agent (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "vigil";

/// Magic marker identifying the Vigil wire protocol. First four bytes of
/// every frame.
pub const FRAME_MAGIC: [u8; 4] = *b"VGLP";

/// Protocol version byte the agent speaks. A frame carrying any other
/// version is rejected before its payload is read.
pub const PROTOCOL_VERSION: u8 = 1;

/// Total header size: 4 magic bytes + 1 version byte + 8 length bytes.
pub const FRAME_HEADER_LEN: usize = 13;

/// Default upper bound on a declared payload length (128 MiB). A frame
/// declaring more than this is rejected before any payload is buffered,
/// so a corrupt length field cannot exhaust memory.
pub const DEFAULT_MAX_FRAME_LEN: u64 = 128 * 1024 * 1024;

/// Fixed domain string for routing keys. Every routing key in the process
/// shares this domain; it exists so the canonical form is self-describing.
pub const ROUTING_DOMAIN: &str = "vigil";
