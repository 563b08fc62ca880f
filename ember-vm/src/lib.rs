pub mod builtins;
pub mod chunk;
pub mod codec;
pub mod compiler;
pub mod env;
pub mod err;
pub mod ext;
pub mod htable;
pub mod native;
pub mod num;
pub mod reader;
pub mod seq;
pub mod val;
pub mod vm;

#[cfg(test)]
mod test;

pub use err::{CompileError, FoldError, RuntimeError};
pub use native::NativeFn;
pub use val::Value;
pub use vm::{Vm, VmOptions};
