//! User interface: key input and rendering.
//!
//! - **keymapper**: Key presses to VT100 byte sequences
//! - **renderer**: `Renderer` abstraction and the crossterm console renderer

pub mod keymapper;
pub mod renderer;

pub use keymapper::*;
pub use renderer::*;
