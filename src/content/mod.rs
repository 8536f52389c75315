//! Content-stream evaluation: graphics state and the operator machine.

pub mod graphics_state;
pub mod interpreter;

pub use graphics_state::{GraphicsState, Matrix, TextState};
pub use interpreter::{FontLoader, Interpreter, TextRun, MAX_FORM_DEPTH};
