// Tue Jan 20 2026 - Alex

use crate::ir::ids::ValueId;
use crate::ir::instruction::Instruction;
use crate::ir::ty::{FunctionType, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Linkage {
    /// Defined in this module, not visible outside it; the local pass can
    /// see its body and external callers are never a concern.
    Internal,
    /// Defined in this module *and* visible outside it (an exported entry
    /// point like `main`, or a `pub` ABI boundary). Has a body — the local
    /// pass can see it — but its formal parameters must still be treated as
    /// reachable from unmodeled external callers.
    ExportedDefinition,
    /// Declared only — no body, treated as an unknown external callee.
    External,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<ValueId>,
    pub return_type: Type,
    pub linkage: Linkage,
    values: Vec<Type>,
    pub instructions: Vec<Instruction>,
}

impl Function {
    pub fn new(name: impl Into<String>, return_type: Type, linkage: Linkage) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type,
            linkage,
            values: Vec::new(),
            instructions: Vec::new(),
        }
    }

    /// No body to walk — declared only, callers must treat it as an
    /// unmodeled external callee. Driven by the instruction list itself
    /// rather than solely by `linkage`, since a body is what the local pass
    /// actually needs; `Linkage::External` functions are simply the ones a
    /// frontend never gives a body to.
    pub fn is_declaration(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Reachable from outside this module: either a true declaration (its
    /// real body, if any, lives elsewhere) or a defined-but-exported entry
    /// point whose formal parameters external callers may also supply.
    pub fn is_externally_visible(&self) -> bool {
        matches!(self.linkage, Linkage::External | Linkage::ExportedDefinition)
    }

    /// Allocates a fresh SSA value of the given type, scoped to this function.
    pub fn new_value(&mut self, ty: Type) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ty);
        id
    }

    pub fn add_param(&mut self, ty: Type) -> ValueId {
        let id = self.new_value(ty);
        self.params.push(id);
        id
    }

    pub fn value_type(&self, v: ValueId) -> &Type {
        &self.values[v.index()]
    }

    pub fn push(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// This function's calling signature, for `function_is_callable`'s
    /// arity/ABI comparison against an indirect call site. This IR has no
    /// way for a function to *declare* itself vararg-accepting (only a call
    /// site can supply extra vararg actuals), so `is_vararg` is always
    /// `false` here.
    pub fn signature(&self) -> FunctionType {
        FunctionType::new(
            self.params.iter().map(|&p| self.value_type(p).clone()).collect(),
            self.return_type.clone(),
            false,
        )
    }
}
