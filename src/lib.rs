//! glTF 2.0 asset-pipeline core: container codec, typed data plane, scene
//! graph, skinning, morphing, keyframe animation and a canonical writer.
//!
//! The crate is organized around one owned value, [`Asset`]: the parsed
//! JSON document plus its resolved buffer bytes. Everything else derives
//! from it on demand:
//! - `import`: auto-detecting reader for `.gltf` / `.glb`
//! - `accessor`: strided, normalized, sparse-overlaid typed arrays
//! - `mesh` / `skin` / `animation`: decoded primitives, bind-pose skinning
//!   and channel evaluation
//! - `codec`: Draco / Meshopt plug-in registry and pre-pass
//! - `validate`: non-aborting diagnostics pass
//! - `export`: builder that packs payloads and emits GLB, separate or
//!   embedded layouts
//!
//! # Example
//!
//! ```no_run
//! use gltf_plane::{import, ReadOptions};
//!
//! let bytes = std::fs::read("model.glb").unwrap();
//! let output = import::from_slice(&bytes, None, &ReadOptions::default()).unwrap();
//! for diagnostic in &output.diagnostics {
//!     eprintln!("{}: {}", diagnostic.pointer, diagnostic.message);
//! }
//! println!("{} nodes", output.asset.root.nodes.len());
//! ```

pub mod accessor;
pub mod animation;
pub mod asset;
pub mod buffer;
pub mod codec;
pub mod error;
pub mod export;
pub mod extensions;
pub mod glb;
pub mod import;
pub mod json;
pub mod mesh;
pub mod skin;
pub mod validate;

pub use accessor::{AccessorData, DecodeCache, Decoded};
pub use animation::{NegativeTimePolicy, Value};
pub use asset::{Asset, Trs};
pub use buffer::{BufferPlane, BufferSet, Resolver};
pub use codec::{BufferCodec, CodecRegistry};
pub use error::{Error, Result};
pub use export::{ExportConfig, ExportOutput, OutputMode, Writer};
pub use import::{ReadOptions, ReadOutput};
pub use validate::{Diagnostic, Severity};
