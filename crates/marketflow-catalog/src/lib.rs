//! # Marketflow Catalog
//!
//! The typed facade between the interpreter and domain code:
//! - an ASL-oriented type vocabulary with formats and composite/enum tables
//! - never-failing marshalling from JSON values to declared parameter kinds
//! - `MethodCatalog`, the `(name, arity)` dispatch table the interpreter
//!   invokes and the LLM prompt describes
//! - `OutputRecorder`, the side channel Task methods report findings through

pub mod catalog;
pub mod marshal;
pub mod recorder;
pub mod types;

pub use catalog::{CatalogBuilder, HostError, Method, MethodBuilder, MethodCatalog};
pub use recorder::{render_outputs, OutputRecorder, RecordedOutput};
pub use types::{AslKind, AslType, EnumTable, Format, ParamSpec, PropertySpec, TypeDef};
