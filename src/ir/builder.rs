// Tue Jan 20 2026 - Alex
//
// A small fluent builder for hand-writing test modules, in place of a real
// frontend (out of scope — see SPEC_FULL.md §1).

use crate::ir::function::{Function, Linkage};
use crate::ir::ids::{GlobalId, ValueId};
use crate::ir::instruction::{Callee, CallSite, Instruction};
use crate::ir::ty::Type;

pub struct FunctionBuilder {
    func: Function,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>, return_type: Type, linkage: Linkage) -> Self {
        Self {
            func: Function::new(name, return_type, linkage),
        }
    }

    pub fn param(&mut self, ty: Type) -> ValueId {
        self.func.add_param(ty)
    }

    pub fn alloca(&mut self) -> ValueId {
        let result = self.func.new_value(Type::ptr(Type::Opaque));
        self.func.push(Instruction::Alloca { result });
        result
    }

    pub fn load(&mut self, ptr: ValueId, ty: Type) -> ValueId {
        let result = self.func.new_value(ty);
        self.func.push(Instruction::Load { result, ptr });
        result
    }

    pub fn store(&mut self, ptr: ValueId, value: ValueId) {
        self.func.push(Instruction::Store { ptr, value });
    }

    pub fn gep(&mut self, base: ValueId, offset: i64, ty: Type) -> ValueId {
        let result = self.func.new_value(ty);
        self.func.push(Instruction::Gep { result, base, offset });
        result
    }

    pub fn global_addr(&mut self, global: GlobalId, ty: Type) -> ValueId {
        let result = self.func.new_value(ty);
        self.func.push(Instruction::GlobalAddr { result, global });
        result
    }

    pub fn function_addr(&mut self, function: crate::ir::ids::FunctionId, ty: Type) -> ValueId {
        let result = self.func.new_value(ty);
        self.func.push(Instruction::FunctionAddr { result, function });
        result
    }

    pub fn int_to_ptr(&mut self, value: ValueId, ty: Type) -> ValueId {
        let result = self.func.new_value(ty);
        self.func.push(Instruction::IntToPtr { result, value });
        result
    }

    pub fn ptr_to_int(&mut self, value: ValueId, ty: Type) -> ValueId {
        let result = self.func.new_value(ty);
        self.func.push(Instruction::PtrToInt { result, value });
        result
    }

    pub fn select(&mut self, a: ValueId, b: ValueId, ty: Type) -> ValueId {
        let result = self.func.new_value(ty);
        self.func.push(Instruction::Select { result, a, b });
        result
    }

    pub fn call_direct(
        &mut self,
        callee: crate::ir::ids::FunctionId,
        args: Vec<ValueId>,
        ret_ty: Option<Type>,
    ) -> Option<ValueId> {
        let result = ret_ty.map(|ty| self.func.new_value(ty));
        self.func.push(Instruction::Call(CallSite {
            callee: Callee::Direct(callee),
            args,
            vararg_args: Vec::new(),
            result,
        }));
        result
    }

    pub fn call_indirect(
        &mut self,
        callee: ValueId,
        args: Vec<ValueId>,
        ret_ty: Option<Type>,
    ) -> Option<ValueId> {
        let result = ret_ty.map(|ty| self.func.new_value(ty));
        self.func.push(Instruction::Call(CallSite {
            callee: Callee::Indirect(callee),
            args,
            vararg_args: Vec::new(),
            result,
        }));
        result
    }

    pub fn ret(&mut self, value: Option<ValueId>) {
        self.func.push(Instruction::Ret { value });
    }

    pub fn finish(self) -> Function {
        self.func
    }
}
