//! PDF content stream parsing and execution.
//!
//! This module turns content streams into page objects. The
//! [`interpreter`] drives a [`stream_reader`] over the decoded bytes,
//! keeps the graphics state in a [`GraphicsStateStack`] and resolves
//! fonts, color spaces, patterns, shadings, images and forms from the
//! resource dictionaries.

pub mod bitstream;
pub mod clip_path;
pub mod color;
pub mod font;
pub mod form;
pub mod function;
pub mod graphics_state;
pub mod image;
pub mod inline_image;
pub mod interpreter;
pub mod marks;
pub mod mesh;
pub mod operand_stack;
pub mod page_object;
pub mod path;
pub mod pattern;
pub mod stream_reader;

pub use clip_path::ClipPath;
pub use color::{ColorSpace, RgbColor};
pub use form::{Form, RecursionState};
pub use graphics_state::{AllStates, GraphicsStateStack, TextRenderMode};
pub use interpreter::{ContentInterpreter, InterpreterOutput, Type3Metrics};
pub use marks::ContentMarks;
pub use page_object::{PageObject, PageObjectHolder, PageObjectKind};
pub use path::{FillType, Path};
