// pbc — Pipeline Builder Compiler
//
// Library root. Snapshot model and editing, validation, ordering, type
// synchronization and Kubeflow code generation.

pub mod codegen;
pub mod diag;
pub mod graph;
pub mod id;
pub mod lexer;
pub mod literal;
pub mod normalize;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod sanitize;
pub mod sequence;
pub mod snapshot;
pub mod type_sync;
pub mod validate;
