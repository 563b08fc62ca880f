//! Optional host modules. They only touch the engine through
//! [Vm::add_function](crate::Vm::add_function) and [Vm::apply](crate::Vm::apply).

pub mod fs;
pub mod regexp;

use crate::vm::Vm;

pub fn import_all(vm: &mut Vm) {
    fs::import(vm);
    regexp::import(vm);
}
